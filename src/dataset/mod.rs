//! Dataset construction.
//!
//! Leaves first:
//!
//! - [`bin_mapper`]: quantization of one column
//! - [`feature`]: dense or sparse quantized column storage
//! - [`metadata`]: labels, weights, query boundaries and initial scores
//! - [`schema`]: column role resolution
//! - [`sampling`]: communication-free row partitioning and sampling
//! - [`bin_builder`]: bin mapper construction, local or distributed
//! - [`extract`]: row-parallel extraction
//! - [`dataset`]: the [`Dataset`] container
//! - [`snapshot`]: the binary snapshot codec
//! - [`loader`]: the [`DatasetLoader`] entry points

pub mod bin_builder;
pub mod bin_mapper;
pub mod dataset;
pub mod extract;
pub mod feature;
pub mod loader;
pub mod metadata;
pub mod sampling;
pub mod schema;
pub mod snapshot;

pub use bin_builder::{construct_bin_mappers, SampleValues};
pub use bin_mapper::BinMapper;
pub use dataset::Dataset;
pub use extract::{Extractor, InitScoreFunction};
pub use feature::Feature;
pub use loader::DatasetLoader;
pub use metadata::Metadata;
pub use sampling::UnitSelector;
pub use schema::ColumnSchema;
pub use snapshot::SnapshotPartition;
