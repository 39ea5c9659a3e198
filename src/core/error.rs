//! Error handling and error types for the dataset loader.
//!
//! Every invalid state detected while loading aborts the whole load: the
//! loader never hands back a partially built dataset. Errors are grouped by
//! the kind of fix the caller needs to make (configuration, input format,
//! data shape, or the collective network).

use std::io;
use thiserror::Error;

/// Main error type for the loader.
#[derive(Error, Debug)]
pub enum LightGBMError {
    /// Configuration errors: unresolvable column names, bad column specs,
    /// incompatible option combinations
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Invalid input parameters
    #[error("Invalid parameter: {parameter} = {value}, {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },

    /// Format errors: unrecognized text dialect, unparsable values,
    /// truncated or mismatched binary snapshot segments
    #[error("Format error: {message}")]
    Format { message: String },

    /// Data-shape errors: empty dataset, no usable features, query ids out of range
    #[error("Dataset error: {message}")]
    Dataset { message: String },

    /// Collective communication failures
    #[error("Network error: {message}")]
    Network { message: String },

    /// File I/O errors
    #[error("I/O error: {source}")]
    IO {
        #[from]
        source: io::Error,
    },

    /// JSON serialization errors
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    /// TOML parsing errors
    #[error("TOML error: {source}")]
    Toml {
        #[from]
        source: toml::de::Error,
    },

    /// Internal library errors (should not occur in normal usage)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Type alias for Results using LightGBMError
pub type Result<T> = std::result::Result<T, LightGBMError>;

impl LightGBMError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        LightGBMError::Config {
            message: message.into(),
        }
    }

    /// Create a format error
    pub fn format<S: Into<String>>(message: S) -> Self {
        LightGBMError::Format {
            message: message.into(),
        }
    }

    /// Create a dataset error
    pub fn dataset<S: Into<String>>(message: S) -> Self {
        LightGBMError::Dataset {
            message: message.into(),
        }
    }

    /// Create a network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        LightGBMError::Network {
            message: message.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter<P, V, R>(parameter: P, value: V, reason: R) -> Self
    where
        P: Into<String>,
        V: Into<String>,
        R: Into<String>,
    {
        LightGBMError::InvalidParameter {
            parameter: parameter.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create an IO error with custom message
    pub fn io_error<S: Into<String>>(message: S) -> Self {
        LightGBMError::IO {
            source: io::Error::new(io::ErrorKind::Other, message.into()),
        }
    }

    /// Create an internal error (should be used sparingly)
    pub fn internal<S: Into<String>>(message: S) -> Self {
        LightGBMError::Internal {
            message: message.into(),
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            LightGBMError::Config { .. } => "config",
            LightGBMError::InvalidParameter { .. } => "invalid_parameter",
            LightGBMError::Format { .. } => "format",
            LightGBMError::Dataset { .. } => "dataset",
            LightGBMError::Network { .. } => "network",
            LightGBMError::IO { .. } => "io",
            LightGBMError::Json { .. } => "json",
            LightGBMError::Toml { .. } => "toml",
            LightGBMError::Internal { .. } => "internal",
        }
    }
}

/// Convenience macros for error creation
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::core::error::LightGBMError::config($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::core::error::LightGBMError::config(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! format_error {
    ($msg:expr) => {
        $crate::core::error::LightGBMError::format($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::core::error::LightGBMError::format(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! dataset_error {
    ($msg:expr) => {
        $crate::core::error::LightGBMError::dataset($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::core::error::LightGBMError::dataset(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr) => {
        if !($cond) {
            return Err($err.into());
        }
    };
}
