//! Per-line value parsers for the supported text dialects.
//!
//! The dialect is detected from the first data line: any `idx:value` token
//! means LibSVM, otherwise tabs mean TSV and commas mean CSV. Dense dialects
//! remove the label column and shift the columns after it down by one, so
//! every feature index a parser emits is already in post-label numbering.

use crate::core::constants::PARSE_ZERO_THRESHOLD;
use crate::core::error::{LightGBMError, Result};
use crate::core::types::SparseRow;
use crate::io::text_reader::TextReader;

use std::fmt;

/// Parses one line into sparse feature values and a label.
pub trait Parser: Send + Sync + fmt::Debug {
    /// Parse `line`, appending `(feature index, value)` pairs to `features`.
    /// Returns the label.
    fn parse_one_line(&self, line: &str, features: &mut SparseRow) -> Result<f64>;

    /// Dialect handled by this parser
    fn dialect(&self) -> DataDialect;
}

/// Text dialects understood by the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataDialect {
    /// Comma separated dense columns
    Csv,
    /// Tab separated dense columns
    Tsv,
    /// `label index:value index:value ...`
    LibSvm,
}

impl fmt::Display for DataDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataDialect::Csv => write!(f, "csv"),
            DataDialect::Tsv => write!(f, "tsv"),
            DataDialect::LibSvm => write!(f, "libsvm"),
        }
    }
}

/// Detect the dialect of a data line.
pub fn detect_dialect(line: &str) -> Option<DataDialect> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if line.contains(':') {
        Some(DataDialect::LibSvm)
    } else if line.contains('\t') {
        Some(DataDialect::Tsv)
    } else if line.contains(',') {
        Some(DataDialect::Csv)
    } else if line.split_whitespace().count() == 1 {
        // a single column file
        Some(DataDialect::Tsv)
    } else {
        None
    }
}

/// Create the parser for a data file by inspecting its first data line.
pub fn create_parser(reader: &TextReader, label_idx: usize) -> Result<Box<dyn Parser>> {
    let first = reader.first_data_line()?.unwrap_or_default();
    let dialect = detect_dialect(&first).ok_or_else(|| {
        LightGBMError::format(format!(
            "Unrecognized format of data file {}",
            reader.filename().display()
        ))
    })?;
    log::debug!("Data file {} is in {} format", reader.filename().display(), dialect);
    Ok(parser_for(dialect, label_idx))
}

/// Parser for an already known dialect.
pub fn parser_for(dialect: DataDialect, label_idx: usize) -> Box<dyn Parser> {
    match dialect {
        DataDialect::Csv => Box::new(DenseParser::new(',', label_idx)),
        DataDialect::Tsv => Box::new(DenseParser::new('\t', label_idx)),
        DataDialect::LibSvm => {
            if label_idx != 0 {
                log::warn!("Label should be the first column in a LibSVM file, ignoring label column {}", label_idx);
            }
            Box::new(LibSvmParser)
        }
    }
}

/// Parse a raw value; `na`, `nan`, `null` and empty tokens are NaN.
pub fn parse_value(token: &str) -> Result<f64> {
    let token = token.trim();
    if token.is_empty()
        || token.eq_ignore_ascii_case("na")
        || token.eq_ignore_ascii_case("nan")
        || token.eq_ignore_ascii_case("null")
    {
        return Ok(f64::NAN);
    }
    token
        .parse::<f64>()
        .map_err(|_| LightGBMError::format(format!("Cannot parse value \"{}\"", token)))
}

fn is_emitted(value: f64) -> bool {
    value.abs() > PARSE_ZERO_THRESHOLD
}

/// Dense CSV/TSV parser.
#[derive(Debug, Clone)]
pub struct DenseParser {
    delimiter: char,
    label_idx: usize,
}

impl DenseParser {
    /// Parser splitting on `delimiter` with the label at raw column `label_idx`
    pub fn new(delimiter: char, label_idx: usize) -> Self {
        DenseParser {
            delimiter,
            label_idx,
        }
    }
}

impl Parser for DenseParser {
    fn parse_one_line(&self, line: &str, features: &mut SparseRow) -> Result<f64> {
        let mut label = None;
        for (idx, token) in line.split(self.delimiter).enumerate() {
            if idx == self.label_idx {
                label = Some(parse_value(token)?);
                continue;
            }
            let value = parse_value(token)?;
            if is_emitted(value) {
                let feature_idx = if idx > self.label_idx { idx - 1 } else { idx };
                features.push((feature_idx, value));
            }
        }
        label.ok_or_else(|| {
            LightGBMError::format(format!(
                "Line \"{}\" has no label column {}",
                line, self.label_idx
            ))
        })
    }

    fn dialect(&self) -> DataDialect {
        if self.delimiter == ',' {
            DataDialect::Csv
        } else {
            DataDialect::Tsv
        }
    }
}

/// LibSVM parser; feature indices are taken verbatim.
#[derive(Debug, Clone, Copy)]
pub struct LibSvmParser;

impl Parser for LibSvmParser {
    fn parse_one_line(&self, line: &str, features: &mut SparseRow) -> Result<f64> {
        let mut tokens = line.split_whitespace().peekable();
        let label = match tokens.peek() {
            Some(first) if !first.contains(':') => {
                let value = parse_value(first)?;
                tokens.next();
                value
            }
            _ => 0.0,
        };
        for token in tokens {
            let (idx, value) = token.split_once(':').ok_or_else(|| {
                LightGBMError::format(format!("Malformed LibSVM token \"{}\"", token))
            })?;
            let idx = idx.trim().parse::<usize>().map_err(|_| {
                LightGBMError::format(format!("Malformed LibSVM feature index \"{}\"", idx))
            })?;
            let value = parse_value(value)?;
            if is_emitted(value) {
                features.push((idx, value));
            }
        }
        Ok(label)
    }

    fn dialect(&self) -> DataDialect {
        DataDialect::LibSvm
    }
}
