//! Binary snapshot of a loaded dataset.
//!
//! Layout, little-endian, every section prefixed by its byte size as a u64:
//!
//! ```text
//! [header_size][header][metadata_size][metadata][feature_size][feature]...
//! ```
//!
//! The header holds `num_data`, `num_class`, `num_features` and
//! `num_total_features` (i32 each), then the used feature map as a u64
//! count followed by i32 entries, then one name per raw column as an i32
//! length followed by UTF-8 bytes. Feature payloads are opaque here and are
//! decoded by [`Feature::load_binary`].

use crate::core::constants::DEFAULT_BIN_SUFFIX;
use crate::core::error::{LightGBMError, Result};
use crate::core::types::DataSize;
use crate::dataset::dataset::Dataset;
use crate::dataset::feature::Feature;
use crate::dataset::metadata::Metadata;
use crate::dataset::sampling::UnitSelector;
use crate::io::binary::{BinaryWriter, ByteReader};

use static_assertions::const_assert_eq;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

const_assert_eq!(std::mem::size_of::<DataSize>(), 4);

/// How rows are split across machines when a snapshot is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotPartition {
    /// Rank of this machine
    pub rank: usize,
    /// Number of machines
    pub num_machines: usize,
    /// Every machine already holds only its shard
    pub is_pre_partition: bool,
    /// Seed of the row selection
    pub data_random_seed: i32,
}

impl SnapshotPartition {
    /// Keep every row
    pub fn whole() -> Self {
        SnapshotPartition {
            rank: 0,
            num_machines: 1,
            is_pre_partition: false,
            data_random_seed: 0,
        }
    }

    fn needs_selection(&self) -> bool {
        self.num_machines > 1 && !self.is_pre_partition
    }
}

impl Dataset {
    fn header_bytes(&self) -> io::Result<Vec<u8>> {
        let mut header = Vec::new();
        header.write_i32(self.num_data)?;
        header.write_i32(self.num_class as i32)?;
        header.write_i32(self.features.len() as i32)?;
        header.write_i32(self.num_total_features as i32)?;
        header.write_u64(self.used_feature_map.len() as u64)?;
        for &inner in &self.used_feature_map {
            header.write_i32(inner)?;
        }
        for name in &self.feature_names {
            header.write_i32(name.len() as i32)?;
            header.write_bytes(name.as_bytes())?;
        }
        Ok(header)
    }

    /// Write the snapshot to `bin_filename`.
    ///
    /// `None` writes `<data file>.bin` using [`DEFAULT_BIN_SUFFIX`] whatever the
    /// loader's `bin_suffix`; pass [`IoConfig::binary_filename`] for a custom
    /// suffix. An existing file is left untouched.
    ///
    /// [`IoConfig::binary_filename`]: crate::config::IoConfig::binary_filename
    pub fn save_binary_file(&self, bin_filename: Option<&str>) -> Result<()> {
        let path = bin_filename
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}.{}", self.data_filename, DEFAULT_BIN_SUFFIX));
        if Path::new(&path).exists() {
            log::warn!("File {} exists, cannot save binary to it", path);
            return Ok(());
        }

        let file = File::create(&path).map_err(|e| {
            LightGBMError::io_error(format!("Cannot write binary data to {}: {}", path, e))
        })?;
        let mut writer = BufWriter::new(file);
        log::info!("Saving data to binary file {}", path);

        let header = self.header_bytes()?;
        writer.write_u64(header.len() as u64)?;
        writer.write_bytes(&header)?;

        writer.write_u64(self.metadata.sizes_in_byte() as u64)?;
        self.metadata.save_binary(&mut writer)?;

        for feature in &self.features {
            writer.write_u64(feature.sizes_in_byte() as u64)?;
            feature.save_binary(&mut writer)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Read a snapshot written by [`Dataset::save_binary_file`].
    ///
    /// Under `partition` only this machine's rows (whole groups when query
    /// boundaries exist) are kept.
    pub fn load_binary_file(
        bin_filename: &str,
        data_filename: &str,
        partition: SnapshotPartition,
    ) -> Result<Dataset> {
        let file = File::open(bin_filename).map_err(|e| {
            LightGBMError::io_error(format!("Could not read binary data from {}: {}", bin_filename, e))
        })?;
        let mut reader = BufReader::new(file);

        let header = read_section(&mut reader, "header")?;
        let (mut dataset, num_features) = parse_header(&header, data_filename)?;

        let metadata_bytes = read_section(&mut reader, "metadata")?;
        let mut metadata = Metadata::load_binary(&metadata_bytes, dataset.num_class)?;
        if metadata.num_data() != dataset.num_data {
            return Err(LightGBMError::format(format!(
                "Binary file error: metadata holds {} rows but the header declares {}",
                metadata.num_data(),
                dataset.num_data
            )));
        }

        let num_global_data = dataset.num_data;
        let used_indices = if partition.needs_selection() {
            let mut selector = UnitSelector::new(
                partition.data_random_seed,
                partition.rank,
                partition.num_machines,
                metadata.query_boundaries(),
            );
            selector.select_all(num_global_data)?
        } else {
            Vec::new()
        };
        if partition.needs_selection() {
            if used_indices.is_empty() {
                return Err(LightGBMError::dataset(format!(
                    "Rank {} of {} selected no rows from binary file {}",
                    partition.rank, partition.num_machines, bin_filename
                )));
            }
            metadata.partition_label(&used_indices)?;
            dataset.num_data = used_indices.len() as DataSize;
        }
        dataset.metadata = metadata;

        for i in 0..num_features {
            let bytes = read_section(&mut reader, "feature")?;
            let feature = Feature::load_binary(&bytes, num_global_data, &used_indices)?;
            if dataset.used_feature_map.get(feature.feature_index()) != Some(&(i as i32)) {
                return Err(LightGBMError::format(format!(
                    "Binary file error: feature {} is stored for column {} which maps elsewhere",
                    i,
                    feature.feature_index()
                )));
            }
            dataset.features.push(feature);
        }

        let mut trailing = [0u8; 1];
        if reader.read(&mut trailing)? != 0 {
            return Err(LightGBMError::format(
                "Binary file error: unexpected data after the last feature",
            ));
        }

        dataset.is_loading_from_binfile = true;
        log::info!(
            "Loaded {} rows and {} features from binary file {}",
            dataset.num_data,
            dataset.features.len(),
            bin_filename
        );
        Ok(dataset)
    }
}

fn read_section<R: Read>(reader: &mut R, what: &str) -> Result<Vec<u8>> {
    let mut size_bytes = [0u8; 8];
    reader.read_exact(&mut size_bytes).map_err(|e| truncated(what, e))?;
    let size = u64::from_le_bytes(size_bytes);
    let mut buffer = Vec::new();
    reader.by_ref().take(size).read_to_end(&mut buffer)?;
    if buffer.len() as u64 != size {
        return Err(LightGBMError::format(format!(
            "Binary file error: {} should have size {} but only {} bytes remain",
            what,
            size,
            buffer.len()
        )));
    }
    Ok(buffer)
}

fn truncated(what: &str, err: io::Error) -> LightGBMError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        LightGBMError::format(format!("Binary file error: {} has the wrong size", what))
    } else {
        LightGBMError::from(err)
    }
}

/// Header fields, with features left empty, and the stored feature count.
fn parse_header(buffer: &[u8], data_filename: &str) -> Result<(Dataset, usize)> {
    let mut reader = ByteReader::new(buffer, "header");
    let num_data = reader.read_i32()?;
    let num_class = reader.read_len_i32()?;
    let num_features = reader.read_len_i32()?;
    let num_total_features = reader.read_len_i32()?;
    if num_data < 0 || num_class == 0 {
        return Err(LightGBMError::format(format!(
            "Binary file error: header declares {} rows and {} classes",
            num_data, num_class
        )));
    }

    let map_count = reader.read_count(4)?;
    let used_feature_map = (0..map_count)
        .map(|_| reader.read_i32())
        .collect::<Result<Vec<_>>>()?;
    if map_count != num_total_features {
        return Err(LightGBMError::format(format!(
            "Binary file error: used feature map has {} entries for {} columns",
            map_count, num_total_features
        )));
    }
    let mut seen = vec![false; num_features];
    for &inner in used_feature_map.iter().filter(|&&inner| inner >= 0) {
        match seen.get_mut(inner as usize) {
            Some(slot) if !*slot => *slot = true,
            _ => {
                return Err(LightGBMError::format(format!(
                    "Binary file error: used feature map entry {} is invalid for {} features",
                    inner, num_features
                )))
            }
        }
    }
    if seen.iter().any(|&s| !s) {
        return Err(LightGBMError::format(
            "Binary file error: used feature map leaves features unassigned",
        ));
    }

    let feature_names = (0..num_total_features)
        .map(|_| {
            let len = reader.read_len_i32()?;
            let bytes = reader.read_bytes(len)?;
            String::from_utf8(bytes.to_vec()).map_err(|_| {
                LightGBMError::format("Binary file error: feature name is not valid UTF-8")
            })
        })
        .collect::<Result<Vec<_>>>()?;
    reader.finish()?;

    let mut dataset = Dataset::new(data_filename, num_class);
    dataset.num_data = num_data;
    dataset.num_total_features = num_total_features;
    dataset.used_feature_map = used_feature_map;
    dataset.feature_names = feature_names;
    dataset.features = Vec::with_capacity(num_features);
    Ok((dataset, num_features))
}
