//! Core data types shared by the loader.
//!
//! The widths follow LightGBM's C++ typedefs so that binary snapshots keep
//! the same field sizes.

/// Row indexing type, equivalent to `data_size_t` in LightGBM C++.
/// 32-bit signed integer supporting up to 2 billion rows.
pub type DataSize = i32;

/// Initial score type, equivalent to `score_t` in LightGBM C++.
pub type Score = f32;

/// Target value and sample weight type, equivalent to `label_t` in LightGBM C++.
pub type Label = f32;

/// Bin index type for discretized feature values.
pub type BinIndex = u32;

/// Size type used by collective communication.
pub type CommSize = usize;

/// One parsed row: sparse (raw column index, value) pairs.
pub type SparseRow = Vec<(usize, f64)>;

/// Sentinel stored in `used_feature_map` for raw columns that are not trained on.
pub const UNUSED_FEATURE: i32 = -1;
