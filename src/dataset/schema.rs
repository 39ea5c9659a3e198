//! Column role resolution.
//!
//! Turns the label/weight/group/ignore column options plus an optional header
//! into one immutable [`ColumnSchema`]. Every index except the label is in
//! post-label numbering: raw columns after the label move down by one.

use crate::config::IoConfig;
use crate::core::constants::HEADER_SEPARATORS;
use crate::core::error::{LightGBMError, Result};

use std::collections::BTreeSet;

const NAME_PREFIX: &str = "name:";

/// Resolved column roles of a data file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnSchema {
    /// Raw index of the label column
    pub label_idx: usize,
    /// Weight column, post-label numbering
    pub weight_idx: Option<usize>,
    /// Group/query column, post-label numbering
    pub group_idx: Option<usize>,
    /// Columns never used as features, post-label numbering.
    /// Always contains the weight and group columns.
    pub ignore: BTreeSet<usize>,
    /// Header names with the label removed; empty without a header
    pub feature_names: Vec<String>,
}

impl ColumnSchema {
    /// Resolve column roles from `config` and the header line, if any.
    pub fn resolve(config: &IoConfig, header: Option<&str>) -> Result<Self> {
        let names: Vec<String> = header
            .map(|line| {
                line.split(HEADER_SEPARATORS)
                    .map(|name| name.trim().to_string())
                    .collect()
            })
            .unwrap_or_default();
        let lookup = |name: &str, option: &str| -> Result<usize> {
            if header.is_none() {
                return Err(LightGBMError::config(format!(
                    "Cannot resolve {} \"{}{}\": the data file has no header",
                    option, NAME_PREFIX, name
                )));
            }
            names.iter().position(|n| n == name).ok_or_else(|| {
                LightGBMError::config(format!(
                    "Could not find {} column {} in data file",
                    option, name
                ))
            })
        };

        let label_idx = match config.label_column.trim() {
            "" => 0,
            spec => match spec.strip_prefix(NAME_PREFIX) {
                Some(name) => lookup(name, "label")?,
                None => parse_index(spec, "label_column")?,
            },
        };
        log::info!("Using column {} as label", label_idx);

        let mut feature_names = names.clone();
        if !feature_names.is_empty() {
            if label_idx >= feature_names.len() {
                return Err(LightGBMError::config(format!(
                    "Label column {} is beyond the {} header columns",
                    label_idx,
                    feature_names.len()
                )));
            }
            feature_names.remove(label_idx);
        }

        let shift = |raw: usize| if raw > label_idx { raw - 1 } else { raw };
        let role = |spec: &str, option: &str| -> Result<Option<usize>> {
            let spec = spec.trim();
            if spec.is_empty() {
                return Ok(None);
            }
            let raw = match spec.strip_prefix(NAME_PREFIX) {
                Some(name) => lookup(name, option)?,
                None => parse_index(spec, option)?,
            };
            Ok(Some(shift(raw)))
        };

        let mut ignore = BTreeSet::new();
        let spec = config.ignore_column.trim();
        if !spec.is_empty() {
            match spec.strip_prefix(NAME_PREFIX) {
                Some(list) => {
                    for name in list.split(',').map(str::trim).filter(|n| !n.is_empty()) {
                        ignore.insert(shift(lookup(name, "ignore_column")?));
                    }
                }
                None => {
                    for token in spec.split(',').map(str::trim).filter(|t| !t.is_empty()) {
                        ignore.insert(shift(parse_index(token, "ignore_column")?));
                    }
                }
            }
        }

        let weight_idx = role(&config.weight_column, "weight_column")?;
        if let Some(idx) = weight_idx {
            log::info!("Using column {} as weight", idx);
            ignore.insert(idx);
        }
        let group_idx = role(&config.group_column, "group_column")?;
        if let Some(idx) = group_idx {
            log::info!("Using column {} as group/query id", idx);
            ignore.insert(idx);
        }

        Ok(ColumnSchema {
            label_idx,
            weight_idx,
            group_idx,
            ignore,
            feature_names,
        })
    }

    /// Whether the post-label column `idx` is excluded from the features
    pub fn is_ignored(&self, idx: usize) -> bool {
        self.ignore.contains(&idx)
    }
}

fn parse_index(spec: &str, option: &str) -> Result<usize> {
    spec.parse::<usize>().map_err(|_| {
        LightGBMError::invalid_parameter(option, spec, "must be a column index or name:<column>")
    })
}
