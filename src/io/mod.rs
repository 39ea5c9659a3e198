//! Text and binary I/O used by the loader.
//!
//! - [`text_reader`]: line source over data files
//! - [`parser`]: dialect detection and per-line parsing
//! - [`binary`]: little-endian writer and bounds-checked reader

pub mod binary;
pub mod parser;
pub mod text_reader;

pub use binary::{BinaryWriter, ByteReader};
pub use parser::{create_parser, detect_dialect, DataDialect, Parser};
pub use text_reader::{FileSample, FilteredLines, TextReader};
