//! # LightGBM Ingest
//!
//! Dataset loading for a histogram-based gradient boosting trainer: text or
//! binary snapshot files in, quantized column-oriented [`Dataset`]s out,
//! consistently across one or many cooperating machines.
//!
//! ## Features
//!
//! - **Column roles**: label, weight, group and ignored columns given by
//!   index or by `name:<column>` against the header.
//! - **Communication-free partitioning**: every machine derives its own rows
//!   (or whole query groups) from a shared seed.
//! - **Distributed bin construction**: machines build mappers for disjoint
//!   column blocks and exchange them in a single all-gather.
//! - **Parallel extraction**: rows are parsed and quantized with Rayon,
//!   in memory or streamed from the file in two rounds.
//! - **Binary snapshots**: `<data>.<bin_suffix>` files reload without parsing.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lightgbm_ingest::{DatasetLoader, IoConfigBuilder, Network};
//!
//! # fn main() -> lightgbm_ingest::Result<()> {
//! lightgbm_ingest::init();
//!
//! let config = IoConfigBuilder::new()
//!     .has_header(true)
//!     .label_column("name:target")
//!     .build()?;
//! let mut loader = DatasetLoader::new(config)?;
//!
//! let train = loader.load_from_file("train.csv", &Network::single_machine())?;
//! let valid = loader.load_from_file_align_with_other_dataset("valid.csv", &train)?;
//!
//! println!("{} x {} bins", train.num_data(), train.num_features());
//! # let _ = valid;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    non_snake_case,
    non_upper_case_globals
)]

// Core infrastructure module
pub mod core;

// Configuration management module
pub mod config;

// Text and binary I/O
pub mod io;

// Dataset construction and loading
pub mod dataset;

pub use self::core::{
    constants::*,
    error::{LightGBMError, Result},
    network::{AllgatherFunction, LocalCluster, Network},
    random::Random,
    types::*,
};

pub use config::{IoConfig, IoConfigBuilder};

pub use dataset::{
    BinMapper, ColumnSchema, Dataset, DatasetLoader, Feature, InitScoreFunction, Metadata,
    SnapshotPartition, UnitSelector,
};

pub use io::{BinaryWriter, ByteReader, DataDialect, Parser, TextReader};

// Version information
pub use self::core::constants::LIGHTGBM_INGEST_VERSION as VERSION;

/// Initialize logging for the library.
///
/// Installs the `env_logger` backend honouring `RUST_LOG` (default `info`).
/// Safe to call more than once.
pub fn init() {
    core::initialize_logging();
}

/// Check if [`init`] has run.
pub fn is_initialized() -> bool {
    core::is_logging_initialized()
}
