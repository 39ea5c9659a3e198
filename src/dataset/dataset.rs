//! Quantized, column-oriented dataset.
//!
//! A [`Dataset`] owns its retained feature columns and its row metadata.
//! `used_feature_map` has one entry per raw (post-label) column: either the
//! index of the column's [`Feature`] or [`UNUSED_FEATURE`] when the column
//! was ignored or found constant.

use crate::core::types::{BinIndex, DataSize, UNUSED_FEATURE};
use crate::dataset::bin_mapper::BinMapper;
use crate::dataset::feature::Feature;
use crate::dataset::metadata::Metadata;

use ndarray::Array2;

/// Main dataset structure handed to the trainer
#[derive(Debug, Clone)]
pub struct Dataset {
    pub(crate) data_filename: String,
    pub(crate) num_data: DataSize,
    pub(crate) num_class: usize,
    pub(crate) num_total_features: usize,
    pub(crate) used_feature_map: Vec<i32>,
    pub(crate) feature_names: Vec<String>,
    pub(crate) features: Vec<Feature>,
    pub(crate) metadata: Metadata,
    pub(crate) is_loading_from_binfile: bool,
}

impl Dataset {
    pub(crate) fn new(data_filename: &str, num_class: usize) -> Self {
        Dataset {
            data_filename: data_filename.to_string(),
            num_data: 0,
            num_class,
            num_total_features: 0,
            used_feature_map: Vec::new(),
            feature_names: Vec::new(),
            features: Vec::new(),
            metadata: Metadata::new(),
            is_loading_from_binfile: false,
        }
    }

    /// Allocate feature columns from freshly built mappers.
    ///
    /// `mappers` has one entry per raw column; ignored (`None`) and trivial
    /// columns are skipped with a warning. Names missing from
    /// `header_names` default to `Column_<i>`; header columns without a
    /// mapper stay unused.
    pub(crate) fn build_features(
        &mut self,
        mappers: Vec<Option<BinMapper>>,
        header_names: &[String],
        is_enable_sparse: bool,
    ) {
        self.num_total_features = mappers.len().max(header_names.len());
        self.feature_names = (0..self.num_total_features)
            .map(|i| {
                header_names
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| format!("Column_{}", i))
            })
            .collect();
        self.used_feature_map = vec![UNUSED_FEATURE; self.num_total_features];
        self.features.clear();

        for (i, mapper) in mappers.into_iter().enumerate() {
            match mapper {
                None => log::warn!("Ignoring feature {}", self.feature_names[i]),
                Some(mapper) if mapper.is_trivial() => {
                    log::warn!("Ignoring feature {}, only has one value", self.feature_names[i])
                }
                Some(mapper) => {
                    self.used_feature_map[i] = self.features.len() as i32;
                    self.features
                        .push(Feature::new(i, mapper, self.num_data, is_enable_sparse));
                }
            }
        }
        log::info!(
            "Constructed {} features out of {} columns",
            self.features.len(),
            self.num_total_features
        );
    }

    /// Reuse another dataset's quantization: mappers, feature map and names.
    pub fn copy_feature_mapper_from(&mut self, other: &Dataset, is_enable_sparse: bool) {
        self.features = other
            .features
            .iter()
            .map(|feature| {
                Feature::new(
                    feature.feature_index(),
                    feature.bin_mapper().clone(),
                    self.num_data,
                    is_enable_sparse,
                )
            })
            .collect();
        self.used_feature_map = other.used_feature_map.clone();
        self.feature_names = other.feature_names.clone();
        self.num_total_features = other.num_total_features;
        self.num_class = other.num_class;
    }

    /// Compact every column after extraction
    pub fn finish_load(&mut self) {
        for feature in &mut self.features {
            feature.finish_load();
        }
    }

    /// Path of the data file this dataset was loaded from
    pub fn data_filename(&self) -> &str {
        &self.data_filename
    }

    /// Number of rows
    pub fn num_data(&self) -> DataSize {
        self.num_data
    }

    /// Number of classes
    pub fn num_class(&self) -> usize {
        self.num_class
    }

    /// Number of retained feature columns
    pub fn num_features(&self) -> usize {
        self.features.len()
    }

    /// Number of raw (post-label) columns
    pub fn num_total_features(&self) -> usize {
        self.num_total_features
    }

    /// Raw column -> feature index, or `UNUSED_FEATURE`
    pub fn used_feature_map(&self) -> &[i32] {
        &self.used_feature_map
    }

    /// Names of every raw column
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Retained feature columns
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Feature column `idx`
    pub fn feature(&self, idx: usize) -> Option<&Feature> {
        self.features.get(idx)
    }

    /// Row metadata
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Mutable row metadata
    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    /// Whether the dataset was read from a binary snapshot
    pub fn is_loading_from_binfile(&self) -> bool {
        self.is_loading_from_binfile
    }

    /// Bin of raw column `raw_idx` at `row`; `None` for dropped columns
    pub fn feature_bin(&self, raw_idx: usize, row: usize) -> Option<BinIndex> {
        let inner = *self.used_feature_map.get(raw_idx)?;
        if inner < 0 {
            return None;
        }
        self.features.get(inner as usize).map(|f| f.bin_at(row))
    }

    /// Dense `num_data x num_features` matrix of bin codes
    pub fn to_bin_matrix(&self) -> Array2<BinIndex> {
        let rows = self.num_data.max(0) as usize;
        Array2::from_shape_fn((rows, self.features.len()), |(row, col)| {
            self.features[col].bin_at(row)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper(values: &[f64]) -> BinMapper {
        BinMapper::find_bin(values, values.len(), 255).unwrap()
    }

    #[test]
    fn test_build_features_skips_ignored_and_trivial() {
        let mut dataset = Dataset::new("train.txt", 1);
        dataset.num_data = 4;
        let mappers = vec![
            Some(mapper(&[1.0, 2.0, 3.0])),
            None,
            Some(mapper(&[5.0, 5.0])),
            Some(mapper(&[0.5, 1.5])),
        ];
        let names = vec!["a".to_string(), "b".to_string()];
        dataset.build_features(mappers, &names, true);

        assert_eq!(dataset.num_total_features(), 4);
        assert_eq!(dataset.used_feature_map(), &[0, -1, -1, 1]);
        assert_eq!(dataset.feature_names(), &["a", "b", "Column_2", "Column_3"]);
        assert_eq!(dataset.num_features(), 2);
        assert_eq!(dataset.feature(1).unwrap().feature_index(), 3);
        assert_eq!(dataset.feature_bin(1, 0), None);
        assert_eq!(dataset.feature_bin(9, 0), None);
    }

    #[test]
    fn test_copy_feature_mapper_from() {
        let mut train = Dataset::new("train.txt", 2);
        train.num_data = 10;
        train.build_features(vec![Some(mapper(&[1.0, 2.0])), None], &[], false);

        let mut valid = Dataset::new("valid.txt", 1);
        valid.num_data = 3;
        valid.copy_feature_mapper_from(&train, false);
        assert_eq!(valid.num_class(), 2);
        assert_eq!(valid.used_feature_map(), train.used_feature_map());
        assert_eq!(valid.feature(0).unwrap().num_data(), 3);
        assert!(valid.feature(0).unwrap().bin_mapper().check_align(train.feature(0).unwrap().bin_mapper()));

        let matrix = valid.to_bin_matrix();
        assert_eq!(matrix.dim(), (3, 1));
    }
}
