//! Line-oriented access to text data files.
//!
//! Lines are numbered from 0 after the optional header. Blank lines are
//! skipped everywhere, so every method sees the same numbering.

use crate::core::error::{LightGBMError, Result};
use crate::core::random::Random;
use crate::core::types::DataSize;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Lines kept by a filtered read, with their global line numbers.
#[derive(Debug, Clone, Default)]
pub struct FilteredLines {
    /// The kept lines, in file order
    pub lines: Vec<String>,
    /// Global line number of every kept line
    pub used_indices: Vec<DataSize>,
    /// Number of lines in the whole file
    pub total_lines: DataSize,
}

/// A bounded sample drawn while scanning a file once.
#[derive(Debug, Clone, Default)]
pub struct FileSample {
    /// Sampled lines
    pub sample: Vec<String>,
    /// Global line numbers kept by the filter (empty without a filter)
    pub used_indices: Vec<DataSize>,
    /// Number of lines in the whole file
    pub total_lines: DataSize,
}

/// Reader over one text data file.
#[derive(Debug, Clone)]
pub struct TextReader {
    filename: PathBuf,
    skip_header: bool,
    first_line: String,
}

impl TextReader {
    /// Open `filename`; with `skip_header` its first line is kept aside as the header.
    pub fn new<P: AsRef<Path>>(filename: P, skip_header: bool) -> Result<Self> {
        let filename = filename.as_ref().to_path_buf();
        let mut first_line = String::new();
        if skip_header {
            let mut reader = Self::open(&filename)?;
            reader.read_line(&mut first_line)?;
            let trimmed_len = first_line.trim_end_matches(['\n', '\r']).len();
            first_line.truncate(trimmed_len);
        }
        Ok(TextReader {
            filename,
            skip_header,
            first_line,
        })
    }

    fn open(filename: &Path) -> Result<BufReader<File>> {
        let file = File::open(filename).map_err(|e| {
            LightGBMError::io_error(format!(
                "Could not open data file {}: {}",
                filename.display(),
                e
            ))
        })?;
        Ok(BufReader::new(file))
    }

    /// Header line (empty when the file has none)
    pub fn first_line(&self) -> &str {
        &self.first_line
    }

    /// Path of the underlying file
    pub fn filename(&self) -> &Path {
        &self.filename
    }

    /// Iterate the data lines.
    pub fn lines(&self) -> Result<impl Iterator<Item = Result<String>>> {
        let skip = usize::from(self.skip_header);
        Ok(Self::open(&self.filename)?
            .lines()
            .skip(skip)
            .map(|line| {
                line.map(|mut l| {
                    let trimmed_len = l.trim_end_matches('\r').len();
                    l.truncate(trimmed_len);
                    l
                })
                .map_err(LightGBMError::from)
            })
            .filter(|line| !matches!(line, Ok(l) if l.trim().is_empty())))
    }

    /// First data line, used to detect the file dialect.
    pub fn first_data_line(&self) -> Result<Option<String>> {
        self.lines()?.next().transpose()
    }

    /// Read every data line into memory.
    pub fn read_all_lines(&self) -> Result<Vec<String>> {
        self.lines()?.collect()
    }

    /// Read the lines whose index passes `filter`.
    pub fn read_and_filter_lines<F>(&self, mut filter: F) -> Result<FilteredLines>
    where
        F: FnMut(DataSize) -> Result<bool>,
    {
        let mut out = FilteredLines::default();
        for (idx, line) in self.lines()?.enumerate() {
            let line = line?;
            let idx = to_data_size(idx)?;
            if filter(idx)? {
                out.lines.push(line);
                out.used_indices.push(idx);
            }
            out.total_lines = idx + 1;
        }
        Ok(out)
    }

    /// Reservoir-sample at most `sample_cnt` lines in one pass.
    pub fn sample_from_file(&self, random: &mut Random, sample_cnt: usize) -> Result<FileSample> {
        let mut out = FileSample::default();
        for (idx, line) in self.lines()?.enumerate() {
            let line = line?;
            let idx = to_data_size(idx)?;
            reservoir_push(&mut out.sample, line, idx, random, sample_cnt);
            out.total_lines = idx + 1;
        }
        Ok(out)
    }

    /// Reservoir-sample among the lines kept by `filter`, recording the kept indices.
    pub fn sample_and_filter_from_file<F>(
        &self,
        mut filter: F,
        random: &mut Random,
        sample_cnt: usize,
    ) -> Result<FileSample>
    where
        F: FnMut(DataSize) -> Result<bool>,
    {
        let mut out = FileSample::default();
        for (idx, line) in self.lines()?.enumerate() {
            let line = line?;
            let idx = to_data_size(idx)?;
            if filter(idx)? {
                let kept = to_data_size(out.used_indices.len())?;
                out.used_indices.push(idx);
                reservoir_push(&mut out.sample, line, kept, random, sample_cnt);
            }
            out.total_lines = idx + 1;
        }
        Ok(out)
    }

    /// Stream every line in chunks of `chunk_lines`.
    ///
    /// `process` receives the index of the chunk's first line and the chunk.
    /// Returns the number of lines read.
    pub fn read_all_and_process<F>(&self, chunk_lines: usize, mut process: F) -> Result<DataSize>
    where
        F: FnMut(DataSize, Vec<String>) -> Result<()>,
    {
        let chunk_lines = chunk_lines.max(1);
        let mut chunk = Vec::with_capacity(chunk_lines);
        let mut start = 0;
        let mut total = 0;
        for line in self.lines()? {
            chunk.push(line?);
            total += 1;
            if chunk.len() == chunk_lines {
                process(start, std::mem::replace(&mut chunk, Vec::with_capacity(chunk_lines)))?;
                start = total;
            }
        }
        if !chunk.is_empty() {
            process(start, chunk)?;
        }
        Ok(total)
    }

    /// Stream only the lines listed in `used_indices` (ascending), in chunks.
    ///
    /// Chunk start indices count kept lines, not file lines.
    pub fn read_part_and_process<F>(
        &self,
        used_indices: &[DataSize],
        chunk_lines: usize,
        mut process: F,
    ) -> Result<DataSize>
    where
        F: FnMut(DataSize, Vec<String>) -> Result<()>,
    {
        let chunk_lines = chunk_lines.max(1);
        let mut chunk = Vec::with_capacity(chunk_lines);
        let mut start = 0;
        let mut kept: DataSize = 0;
        let mut next = used_indices.iter().peekable();
        for (idx, line) in self.lines()?.enumerate() {
            let Some(&&wanted) = next.peek() else {
                break;
            };
            let line = line?;
            if to_data_size(idx)? != wanted {
                continue;
            }
            next.next();
            chunk.push(line);
            kept += 1;
            if chunk.len() == chunk_lines {
                process(start, std::mem::replace(&mut chunk, Vec::with_capacity(chunk_lines)))?;
                start = kept;
            }
        }
        if !chunk.is_empty() {
            process(start, chunk)?;
        }
        if next.peek().is_some() {
            return Err(LightGBMError::dataset(format!(
                "Data file {} has fewer lines than the selected rows",
                self.filename.display()
            )));
        }
        Ok(kept)
    }

    /// Count the data lines.
    pub fn count_line(&self) -> Result<DataSize> {
        let mut count = 0usize;
        for line in self.lines()? {
            line?;
            count += 1;
        }
        to_data_size(count)
    }
}

fn reservoir_push(
    sample: &mut Vec<String>,
    line: String,
    seen: DataSize,
    random: &mut Random,
    sample_cnt: usize,
) {
    if sample.len() < sample_cnt {
        sample.push(line);
    } else {
        let slot = random.next_int(0, seen + 1) as usize;
        if slot < sample_cnt {
            sample[slot] = line;
        }
    }
}

fn to_data_size(value: usize) -> Result<DataSize> {
    DataSize::try_from(value)
        .map_err(|_| LightGBMError::dataset(format!("Row count {} exceeds the supported range", value)))
}
