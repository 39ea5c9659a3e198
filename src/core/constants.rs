//! Loader constants and configuration defaults.

/// Default maximum number of bins for feature discretization.
pub const DEFAULT_MAX_BIN: usize = 255;

/// Largest bin count a feature column can store.
pub const MAX_BIN_LIMIT: usize = 65535;

/// Default number of rows sampled to construct bin mappers.
pub const DEFAULT_BIN_CONSTRUCT_SAMPLE_CNT: usize = 50000;

/// Default number of output classes.
pub const DEFAULT_NUM_CLASS: usize = 1;

/// Default seed for row sampling and partitioning.
pub const DEFAULT_DATA_RANDOM_SEED: i32 = 1;

/// Default suffix of binary snapshot files.
pub const DEFAULT_BIN_SUFFIX: &str = "bin";

/// Default number of threads (0 means all cores).
pub const DEFAULT_NUM_THREADS: usize = 0;

/// Sampled values with an absolute value at or below this are treated as zero.
pub const SAMPLE_ZERO_THRESHOLD: f64 = 1e-15;

/// Parsed values with an absolute value at or below this are not emitted.
pub const PARSE_ZERO_THRESHOLD: f64 = 1e-10;

/// Tolerance used when comparing bin boundaries.
pub const EPSILON: f64 = 1e-15;

/// Sparse storage is chosen when the zero bin holds at least this share of rows.
pub const SPARSE_THRESHOLD: f64 = 0.8;

/// Number of lines handed to each parallel extraction pass in two-round loading.
pub const READ_CHUNK_LINES: usize = 65536;

/// Separators accepted between header column names.
pub const HEADER_SEPARATORS: &[char] = &['\t', ' ', ','];

/// Library version string
pub const LIGHTGBM_INGEST_VERSION: &str = env!("CARGO_PKG_VERSION");
