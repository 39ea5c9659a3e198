//! Configuration of the dataset loader.

pub mod core;

pub use self::core::{IoConfig, IoConfigBuilder};
