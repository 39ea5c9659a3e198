//! Labels, weights, query boundaries and initial scores of a dataset.
//!
//! Side files next to the data file take part when present:
//!
//! - `<data>.weight`: one weight per line
//! - `<data>.query`: one group size per line
//! - `<data>.init`: one line per row holding `num_class` initial scores
//!
//! Side files always describe the whole (global) file; when rows are
//! partitioned across machines they are cut down in
//! [`Metadata::check_or_partition`] or [`Metadata::partition_label`].
//! Initial scores are stored class-major: the score of class `k` for row `i`
//! lives at `k * num_data + i`.

use crate::core::error::{LightGBMError, Result};
use crate::core::types::{DataSize, Label, Score};
use crate::io::binary::{BinaryWriter, ByteReader};

use std::fs;
use std::io;
use std::path::Path;

/// Row metadata owned by a dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    num_data: DataSize,
    num_class: usize,
    label: Vec<Label>,
    weights: Vec<Label>,
    query_boundaries: Vec<DataSize>,
    queries: Vec<DataSize>,
    init_score: Vec<Score>,
}

impl Metadata {
    /// Empty metadata
    pub fn new() -> Self {
        Self::default()
    }

    /// Load whichever side files exist next to `data_filename`.
    pub fn load_side_files(data_filename: &str, num_class: usize) -> Result<Self> {
        let mut metadata = Metadata {
            num_class,
            ..Self::default()
        };
        metadata.load_weights(data_filename)?;
        metadata.load_query_boundaries(data_filename)?;
        metadata.load_initial_score(data_filename)?;
        Ok(metadata)
    }

    fn load_weights(&mut self, data_filename: &str) -> Result<()> {
        let Some(content) = read_side_file(data_filename, "weight")? else {
            return Ok(());
        };
        self.weights = content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| parse_side_value::<Label>(l, "weight"))
            .collect::<Result<_>>()?;
        log::info!("Loading weights: {} entries", self.weights.len());
        Ok(())
    }

    fn load_query_boundaries(&mut self, data_filename: &str) -> Result<()> {
        let Some(content) = read_side_file(data_filename, "query")? else {
            return Ok(());
        };
        let mut boundaries = vec![0];
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            let count = parse_side_value::<DataSize>(line, "query")?;
            if count < 0 {
                return Err(LightGBMError::format(format!(
                    "Query file holds a negative group size {}",
                    count
                )));
            }
            let last = boundaries[boundaries.len() - 1];
            boundaries.push(last + count);
        }
        log::info!("Loading query boundaries: {} queries", boundaries.len() - 1);
        self.query_boundaries = boundaries;
        Ok(())
    }

    fn load_initial_score(&mut self, data_filename: &str) -> Result<()> {
        let Some(content) = read_side_file(data_filename, "init")? else {
            return Ok(());
        };
        let rows: Vec<Vec<Score>> = content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|line| {
                line.split(|c: char| c == '\t' || c == ',' || c == ' ')
                    .filter(|t| !t.is_empty())
                    .map(|t| parse_side_value::<Score>(t, "init"))
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<_>>()?;
        if let Some(row) = rows.iter().find(|r| r.len() != self.num_class) {
            return Err(LightGBMError::format(format!(
                "Initial score file has a line with {} scores, expected {}",
                row.len(),
                self.num_class
            )));
        }
        let num_rows = rows.len();
        let mut init_score = vec![0.0; num_rows * self.num_class];
        for (i, row) in rows.iter().enumerate() {
            for (k, &score) in row.iter().enumerate() {
                init_score[k * num_rows + i] = score;
            }
        }
        log::info!("Loading initial scores: {} rows", num_rows);
        self.init_score = init_score;
        Ok(())
    }

    /// Size the per-row arrays before extraction.
    ///
    /// A weight or group column takes precedence over the matching side file.
    pub fn init_shape(
        &mut self,
        num_data: DataSize,
        num_class: usize,
        has_weight_column: bool,
        has_group_column: bool,
    ) {
        let rows = num_data.max(0) as usize;
        self.num_data = num_data;
        self.num_class = num_class;
        self.label = vec![0.0; rows];
        if has_weight_column {
            if !self.weights.is_empty() {
                log::warn!("Using weights in the data file, ignoring the additional weight file");
            }
            self.weights = vec![0.0; rows];
        }
        if has_group_column {
            if !self.query_boundaries.is_empty() {
                log::warn!("Using query ids in the data file, ignoring the additional query file");
                self.query_boundaries.clear();
            }
            self.queries = vec![0; rows];
        }
    }

    /// Set the label of row `idx`
    pub fn set_label_at(&mut self, idx: usize, value: f64) {
        self.label[idx] = value as Label;
    }

    /// Set the weight of row `idx`; ignored unless a weight column was declared
    pub fn set_weight_at(&mut self, idx: usize, value: f64) {
        if let Some(slot) = self.weights.get_mut(idx) {
            *slot = value as Label;
        }
    }

    /// Set the group id of row `idx`; ignored unless a group column was declared
    pub fn set_query_at(&mut self, idx: usize, value: f64) {
        if let Some(slot) = self.queries.get_mut(idx) {
            *slot = value as DataSize;
        }
    }

    /// Hand over a class-major initial score buffer.
    pub fn set_init_score(&mut self, init_score: Vec<Score>) {
        self.init_score = init_score;
    }

    /// Turn per-row group ids into boundaries, then validate every array
    /// against `num_data`, cutting side-file data down to `used_indices`
    /// when this machine kept only those of the `num_all_data` rows.
    ///
    /// `Some(&[])` means this machine selected no rows at all.
    pub fn check_or_partition(
        &mut self,
        num_all_data: DataSize,
        used_indices: Option<&[DataSize]>,
    ) -> Result<()> {
        if !self.queries.is_empty() {
            self.query_boundaries = boundaries_from_query_ids(&self.queries);
            self.queries.clear();
        }

        let num_data = self.num_data as usize;
        let num_all = num_all_data.max(0) as usize;
        let partitioned = used_indices.filter(|_| num_all != num_data);

        if let Some(used_indices) = partitioned.filter(|_| self.weights.len() == num_all) {
            self.weights = select(&self.weights, used_indices);
        }
        if !self.weights.is_empty() && self.weights.len() != num_data {
            return Err(LightGBMError::dataset(format!(
                "Weights size ({}) doesn't match data size ({})",
                self.weights.len(),
                num_data
            )));
        }

        if let Some(used_indices) =
            partitioned.filter(|_| self.query_boundaries.last() == Some(&num_all_data))
        {
            self.query_boundaries = partition_boundaries(&self.query_boundaries, used_indices)?;
        }
        if let Some(&last) = self.query_boundaries.last() {
            if last != self.num_data {
                return Err(LightGBMError::dataset(format!(
                    "Sum of query counts ({}) differs from the data size ({})",
                    last, num_data
                )));
            }
        }

        if let Some(used_indices) =
            partitioned.filter(|_| self.init_score.len() == num_all * self.num_class)
        {
            self.init_score = select_class_major(&self.init_score, num_all, self.num_class, used_indices);
        }
        if !self.init_score.is_empty() && self.init_score.len() != num_data * self.num_class {
            return Err(LightGBMError::dataset(format!(
                "Initial score size ({}) doesn't match data size ({} rows x {} classes)",
                self.init_score.len(),
                num_data,
                self.num_class
            )));
        }
        Ok(())
    }

    /// Keep only the rows in `used_indices` (ascending). No-op when empty.
    pub fn partition_label(&mut self, used_indices: &[DataSize]) -> Result<()> {
        if used_indices.is_empty() {
            return Ok(());
        }
        let num_all = self.num_data as usize;
        if let Some(&bad) = used_indices.iter().find(|&&i| i < 0 || i as usize >= num_all) {
            return Err(LightGBMError::dataset(format!(
                "Selected row {} is outside the {} loaded rows",
                bad, num_all
            )));
        }
        self.label = select(&self.label, used_indices);
        if !self.weights.is_empty() {
            self.weights = select(&self.weights, used_indices);
        }
        if !self.query_boundaries.is_empty() {
            self.query_boundaries = partition_boundaries(&self.query_boundaries, used_indices)?;
        }
        if !self.init_score.is_empty() {
            self.init_score =
                select_class_major(&self.init_score, num_all, self.num_class, used_indices);
        }
        self.num_data = used_indices.len() as DataSize;
        Ok(())
    }

    /// Number of rows
    pub fn num_data(&self) -> DataSize {
        self.num_data
    }

    /// Labels, one per row
    pub fn label(&self) -> &[Label] {
        &self.label
    }

    /// Weights, if any
    pub fn weights(&self) -> Option<&[Label]> {
        (!self.weights.is_empty()).then_some(self.weights.as_slice())
    }

    /// Query boundaries (`num_queries + 1` entries), if any
    pub fn query_boundaries(&self) -> Option<&[DataSize]> {
        (!self.query_boundaries.is_empty()).then_some(self.query_boundaries.as_slice())
    }

    /// Number of queries
    pub fn num_queries(&self) -> usize {
        self.query_boundaries.len().saturating_sub(1)
    }

    /// Class-major initial scores, if any
    pub fn init_score(&self) -> Option<&[Score]> {
        (!self.init_score.is_empty()).then_some(self.init_score.as_slice())
    }

    /// Group id of `row` derived from the boundaries
    pub fn query_of(&self, row: DataSize) -> Option<usize> {
        if self.query_boundaries.is_empty() {
            return None;
        }
        let pos = self.query_boundaries.partition_point(|&b| b <= row);
        (pos >= 1 && pos < self.query_boundaries.len()).then(|| pos - 1)
    }

    /// Size of the serialized metadata
    pub fn sizes_in_byte(&self) -> usize {
        4 * 4
            + 4 * self.label.len()
            + 4 * self.weights.len()
            + 4 * self.query_boundaries.len()
            + 4 * self.init_score.len()
    }

    /// Serialize the metadata
    pub fn save_binary<W: BinaryWriter + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_i32(self.num_data)?;
        writer.write_i32(self.weights.len() as i32)?;
        writer.write_i32(self.num_queries() as i32)?;
        writer.write_i32(self.init_score.len() as i32)?;
        for &label in &self.label {
            writer.write_f32(label)?;
        }
        for &weight in &self.weights {
            writer.write_f32(weight)?;
        }
        for &boundary in &self.query_boundaries {
            writer.write_i32(boundary)?;
        }
        for &score in &self.init_score {
            writer.write_f32(score)?;
        }
        Ok(())
    }

    /// Rebuild metadata from its serialized form.
    pub fn load_binary(buffer: &[u8], num_class: usize) -> Result<Self> {
        let mut reader = ByteReader::new(buffer, "metadata");
        let num_data = reader.read_len_i32()?;
        let num_weights = reader.read_len_i32()?;
        let num_queries = reader.read_len_i32()?;
        let num_init_score = reader.read_len_i32()?;
        let num_boundaries = if num_queries > 0 { num_queries + 1 } else { 0 };

        let declared = 4usize
            .checked_mul(num_data + num_weights + num_boundaries + num_init_score)
            .unwrap_or(usize::MAX);
        if declared != reader.remaining() {
            return Err(LightGBMError::format(format!(
                "Binary file error: metadata declares {} bytes of arrays but holds {}",
                declared,
                reader.remaining()
            )));
        }

        let label = read_f32s(&mut reader, num_data)?;
        let weights = read_f32s(&mut reader, num_weights)?;
        let query_boundaries = (0..num_boundaries)
            .map(|_| reader.read_i32())
            .collect::<Result<Vec<_>>>()?;
        let init_score = read_f32s(&mut reader, num_init_score)?;
        reader.finish()?;

        let metadata = Metadata {
            num_data: num_data as DataSize,
            num_class,
            label,
            weights,
            query_boundaries,
            queries: Vec::new(),
            init_score,
        };
        metadata.check_or_partition_loaded()?;
        Ok(metadata)
    }

    fn check_or_partition_loaded(&self) -> Result<()> {
        let num_data = self.num_data as usize;
        if !self.weights.is_empty() && self.weights.len() != num_data {
            return Err(LightGBMError::format(
                "Binary file error: weight count doesn't match row count",
            ));
        }
        if let Some(&last) = self.query_boundaries.last() {
            if last != self.num_data || self.query_boundaries.windows(2).any(|w| w[0] > w[1]) {
                return Err(LightGBMError::format(
                    "Binary file error: query boundaries don't cover the rows",
                ));
            }
        }
        if !self.init_score.is_empty() && self.init_score.len() != num_data * self.num_class {
            return Err(LightGBMError::format(
                "Binary file error: initial score count doesn't match rows x classes",
            ));
        }
        Ok(())
    }
}

fn read_side_file(data_filename: &str, suffix: &str) -> Result<Option<String>> {
    let path = format!("{}.{}", data_filename, suffix);
    if !Path::new(&path).is_file() {
        return Ok(None);
    }
    Ok(Some(fs::read_to_string(&path)?))
}

fn parse_side_value<T: std::str::FromStr>(token: &str, kind: &str) -> Result<T> {
    token
        .trim()
        .parse()
        .map_err(|_| LightGBMError::format(format!("Cannot parse {} value \"{}\"", kind, token.trim())))
}

fn read_f32s(reader: &mut ByteReader<'_>, count: usize) -> Result<Vec<f32>> {
    (0..count).map(|_| reader.read_f32()).collect()
}

fn select<T: Copy>(values: &[T], used_indices: &[DataSize]) -> Vec<T> {
    used_indices.iter().map(|&i| values[i as usize]).collect()
}

fn select_class_major(
    values: &[Score],
    num_all: usize,
    num_class: usize,
    used_indices: &[DataSize],
) -> Vec<Score> {
    let mut out = Vec::with_capacity(used_indices.len() * num_class);
    for k in 0..num_class {
        out.extend(used_indices.iter().map(|&i| values[k * num_all + i as usize]));
    }
    out
}

/// Consecutive rows with the same id form one group.
fn boundaries_from_query_ids(queries: &[DataSize]) -> Vec<DataSize> {
    let mut boundaries = vec![0];
    for (i, window) in queries.windows(2).enumerate() {
        if window[0] != window[1] {
            boundaries.push(i as DataSize + 1);
        }
    }
    boundaries.push(queries.len() as DataSize);
    boundaries
}

/// Boundaries of the groups that keep at least one of `used_indices`.
fn partition_boundaries(boundaries: &[DataSize], used_indices: &[DataSize]) -> Result<Vec<DataSize>> {
    let num_queries = boundaries.len().saturating_sub(1);
    let mut out = vec![0];
    let mut qid = 0;
    let mut cnt: DataSize = 0;
    for &row in used_indices {
        while qid < num_queries && row >= boundaries[qid + 1] {
            if cnt > 0 {
                let last = out[out.len() - 1];
                out.push(last + cnt);
                cnt = 0;
            }
            qid += 1;
        }
        if qid >= num_queries {
            return Err(LightGBMError::dataset(format!(
                "Row {} is beyond the last query boundary {}",
                row,
                boundaries.last().copied().unwrap_or(0)
            )));
        }
        cnt += 1;
    }
    if cnt > 0 {
        let last = out[out.len() - 1];
        out.push(last + cnt);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn shaped(num_data: DataSize) -> Metadata {
        let mut metadata = Metadata::new();
        metadata.init_shape(num_data, 1, true, false);
        for i in 0..num_data as usize {
            metadata.set_label_at(i, i as f64);
            metadata.set_weight_at(i, 1.0 + i as f64);
        }
        metadata
    }

    #[test]
    fn test_boundaries_from_query_ids() {
        assert_eq!(boundaries_from_query_ids(&[7, 7, 3, 3, 3, 7]), vec![0, 2, 5, 6]);
        assert_eq!(boundaries_from_query_ids(&[1]), vec![0, 1]);
    }

    #[test]
    fn test_group_column_becomes_boundaries() {
        let mut metadata = Metadata::new();
        metadata.init_shape(4, 1, false, true);
        for (i, q) in [1.0, 1.0, 2.0, 2.0].into_iter().enumerate() {
            metadata.set_query_at(i, q);
        }
        metadata.check_or_partition(4, None).unwrap();
        assert_eq!(metadata.query_boundaries(), Some(&[0, 2, 4][..]));
        assert_eq!(metadata.num_queries(), 2);
        assert_eq!(metadata.query_of(3), Some(1));
    }

    #[test]
    fn test_side_files() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("train.txt");
        let data = data.to_str().unwrap().to_string();
        fs::write(format!("{}.weight", data), "0.5\n1.5\n2\n").unwrap();
        fs::write(format!("{}.query", data), "2\n1\n").unwrap();
        fs::write(format!("{}.init", data), "0.1\t0.2\n0.3\t0.4\n0.5\t0.6\n").unwrap();

        let mut metadata = Metadata::load_side_files(&data, 2).unwrap();
        metadata.init_shape(3, 2, false, false);
        metadata.check_or_partition(3, None).unwrap();

        assert_eq!(metadata.weights(), Some(&[0.5, 1.5, 2.0][..]));
        assert_eq!(metadata.query_boundaries(), Some(&[0, 2, 3][..]));
        // class-major
        assert_eq!(metadata.init_score(), Some(&[0.1, 0.3, 0.5, 0.2, 0.4, 0.6][..]));
    }

    #[test]
    fn test_side_file_partition() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("train.txt");
        let data = data.to_str().unwrap().to_string();
        fs::write(format!("{}.weight", data), "1\n2\n3\n4\n5\n").unwrap();
        fs::write(format!("{}.query", data), "2\n3\n").unwrap();

        let mut metadata = Metadata::load_side_files(&data, 1).unwrap();
        metadata.init_shape(3, 1, false, false);
        metadata.check_or_partition(5, Some(&[2, 3, 4][..])).unwrap();
        assert_eq!(metadata.weights(), Some(&[3.0, 4.0, 5.0][..]));
        assert_eq!(metadata.query_boundaries(), Some(&[0, 3][..]));
    }

    #[test]
    fn test_empty_selection_keeps_no_side_file_rows() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("train.txt");
        let data = data.to_str().unwrap().to_string();
        fs::write(format!("{}.weight", data), "1\n2\n3\n4\n").unwrap();
        fs::write(format!("{}.query", data), "4\n").unwrap();

        let mut metadata = Metadata::load_side_files(&data, 1).unwrap();
        metadata.init_shape(0, 1, false, false);
        metadata.check_or_partition(4, Some(&[][..])).unwrap();
        assert_eq!(metadata.num_data(), 0);
        assert_eq!(metadata.weights(), None);
        assert_eq!(metadata.num_queries(), 0);

        // without a selection the side files must cover every row
        let mut metadata = Metadata::load_side_files(&data, 1).unwrap();
        metadata.init_shape(0, 1, false, false);
        assert!(metadata.check_or_partition(4, None).is_err());
    }

    #[test]
    fn test_check_detects_size_mismatch() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("train.txt");
        let data = data.to_str().unwrap().to_string();
        fs::write(format!("{}.query", data), "2\n2\n").unwrap();

        let mut metadata = Metadata::load_side_files(&data, 1).unwrap();
        metadata.init_shape(3, 1, false, false);
        assert!(metadata.check_or_partition(3, None).is_err());
    }

    #[test]
    fn test_bad_init_file() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("train.txt");
        let data = data.to_str().unwrap().to_string();
        fs::write(format!("{}.init", data), "0.1\t0.2\n0.3\n").unwrap();
        assert!(Metadata::load_side_files(&data, 2).is_err());
    }

    #[test]
    fn test_partition_label() {
        let mut metadata = shaped(5);
        metadata.query_boundaries = vec![0, 2, 5];
        metadata.partition_label(&[2, 3, 4]).unwrap();
        assert_eq!(metadata.num_data(), 3);
        assert_eq!(metadata.label(), &[2.0, 3.0, 4.0]);
        assert_eq!(metadata.weights(), Some(&[3.0, 4.0, 5.0][..]));
        assert_eq!(metadata.query_boundaries(), Some(&[0, 3][..]));

        let mut metadata = shaped(2);
        assert!(metadata.partition_label(&[3]).is_err());
    }

    #[test]
    fn test_partition_boundaries_rejects_rows_past_last_group() {
        assert!(partition_boundaries(&[0, 2], &[0, 2]).is_err());
        assert_eq!(partition_boundaries(&[0, 2, 2, 4], &[0, 3]).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_binary_round_trip() {
        let mut metadata = shaped(3);
        metadata.query_boundaries = vec![0, 1, 3];
        metadata.init_score = vec![0.5, 0.25, 0.125];

        let mut bytes = Vec::new();
        metadata.save_binary(&mut bytes).unwrap();
        assert_eq!(bytes.len(), metadata.sizes_in_byte());

        let loaded = Metadata::load_binary(&bytes, 1).unwrap();
        assert_eq!(loaded, metadata);

        assert!(Metadata::load_binary(&bytes[..bytes.len() - 4], 1).is_err());
        assert!(Metadata::load_binary(&bytes, 2).is_err());
    }
}
