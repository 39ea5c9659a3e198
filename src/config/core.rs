//! Core configuration structures for dataset loading.
//!
//! `IoConfig` gathers every option the loader consumes. It can be built in
//! code through [`IoConfigBuilder`], read from a JSON or TOML file, or parsed
//! from LightGBM style `key=value` parameters.

use crate::core::constants::*;
use crate::core::error::{LightGBMError, Result};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Configuration consumed by the dataset loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoConfig {
    /// Whether the first line of a text file holds column names
    pub has_header: bool,
    /// Label column: an index or `name:<column>`; empty means column 0
    pub label_column: String,
    /// Weight column: an index or `name:<column>`; empty means none
    pub weight_column: String,
    /// Group/query column: an index or `name:<column>`; empty means none
    pub group_column: String,
    /// Comma separated columns to ignore, as indices or `name:a,b,c`
    pub ignore_column: String,
    /// Sample from the file and re-read it instead of keeping all rows in memory
    pub use_two_round_loading: bool,
    /// Every machine already holds only its own shard of the data
    pub is_pre_partition: bool,
    /// Allow sparse storage for mostly-zero features
    pub is_enable_sparse: bool,
    /// Maximum number of bins per feature
    pub max_bin: usize,
    /// Number of rows sampled to construct bin mappers
    pub bin_construct_sample_cnt: usize,
    /// Number of classes (initial scores per row)
    pub num_class: usize,
    /// Seed of row sampling and of partition decisions
    pub data_random_seed: i32,
    /// Suffix appended to the data path to locate a binary snapshot
    pub bin_suffix: String,
    /// Write a binary snapshot after a text load
    pub is_save_binary_file: bool,
    /// Number of threads (0 = all cores)
    pub num_threads: usize,
}

impl Default for IoConfig {
    fn default() -> Self {
        IoConfig {
            has_header: false,
            label_column: String::new(),
            weight_column: String::new(),
            group_column: String::new(),
            ignore_column: String::new(),
            use_two_round_loading: false,
            is_pre_partition: false,
            is_enable_sparse: true,
            max_bin: DEFAULT_MAX_BIN,
            bin_construct_sample_cnt: DEFAULT_BIN_CONSTRUCT_SAMPLE_CNT,
            num_class: DEFAULT_NUM_CLASS,
            data_random_seed: DEFAULT_DATA_RANDOM_SEED,
            bin_suffix: DEFAULT_BIN_SUFFIX.to_string(),
            is_save_binary_file: false,
            num_threads: DEFAULT_NUM_THREADS,
        }
    }
}

impl IoConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.max_bin < 2 || self.max_bin > MAX_BIN_LIMIT {
            return Err(LightGBMError::invalid_parameter(
                "max_bin",
                self.max_bin.to_string(),
                format!("must be in range [2, {}]", MAX_BIN_LIMIT),
            ));
        }

        if self.bin_construct_sample_cnt == 0 {
            return Err(LightGBMError::invalid_parameter(
                "bin_construct_sample_cnt",
                "0",
                "must be greater than 0",
            ));
        }

        if self.num_class == 0 {
            return Err(LightGBMError::invalid_parameter(
                "num_class",
                "0",
                "must be at least 1",
            ));
        }

        if self.bin_suffix.is_empty() {
            return Err(LightGBMError::invalid_parameter(
                "bin_suffix",
                "",
                "must not be empty",
            ));
        }

        Ok(())
    }

    /// Load configuration from a `.json` or `.toml` file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| LightGBMError::config(format!("Failed to read config file: {}", e)))?;

        let config: IoConfig = match path.extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| LightGBMError::config(format!("Failed to parse JSON config: {}", e)))?,
            Some("toml") => toml::from_str(&content)
                .map_err(|e| LightGBMError::config(format!("Failed to parse TOML config: {}", e)))?,
            _ => {
                return Err(LightGBMError::config(
                    "Unsupported config file format. Use .json or .toml",
                ))
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a `.json` or `.toml` file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = match path.extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::to_string_pretty(self)
                .map_err(|e| LightGBMError::config(format!("Failed to serialize to JSON: {}", e)))?,
            Some("toml") => toml::to_string_pretty(self)
                .map_err(|e| LightGBMError::config(format!("Failed to serialize to TOML: {}", e)))?,
            _ => {
                return Err(LightGBMError::config(
                    "Unsupported config file format. Use .json or .toml",
                ))
            }
        };

        std::fs::write(path, content)
            .map_err(|e| LightGBMError::config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Build a configuration from `key=value` parameters.
    ///
    /// Keys follow LightGBM's names and aliases. Unknown keys are logged and
    /// skipped so a full training parameter set can be passed through.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self> {
        let mut config = IoConfig::default();
        let mut keys: Vec<_> = params.keys().collect();
        keys.sort();
        for key in keys {
            config.set_param(key, &params[key])?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Parse parameters given as `key=value` strings, e.g. from a command line.
    pub fn from_args<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut params = HashMap::new();
        for arg in args {
            let arg = arg.as_ref().trim();
            if arg.is_empty() || arg.starts_with('#') {
                continue;
            }
            let (key, value) = arg.split_once('=').ok_or_else(|| {
                LightGBMError::config(format!("Parameter {} should be of the form key=value", arg))
            })?;
            params.insert(key.trim().to_string(), value.trim().to_string());
        }
        Self::from_params(&params)
    }

    fn set_param(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "header" | "has_header" => self.has_header = parse_bool(key, value)?,
            "label" | "label_column" => self.label_column = value.to_string(),
            "weight" | "weight_column" => self.weight_column = value.to_string(),
            "group" | "group_column" | "query" | "query_column" | "group_id" | "query_id" => {
                self.group_column = value.to_string()
            }
            "ignore_column" | "ignore_feature" | "blacklist" => {
                self.ignore_column = value.to_string()
            }
            "two_round" | "use_two_round_loading" | "two_round_loading" => {
                self.use_two_round_loading = parse_bool(key, value)?
            }
            "pre_partition" | "is_pre_partition" => self.is_pre_partition = parse_bool(key, value)?,
            "is_sparse" | "is_enable_sparse" | "enable_sparse" => {
                self.is_enable_sparse = parse_bool(key, value)?
            }
            "max_bin" => self.max_bin = parse_number(key, value)?,
            "bin_construct_sample_cnt" | "subsample_for_bin" => {
                self.bin_construct_sample_cnt = parse_number(key, value)?
            }
            "num_class" | "num_classes" => self.num_class = parse_number(key, value)?,
            "data_random_seed" | "data_seed" => self.data_random_seed = parse_number(key, value)?,
            "bin_suffix" => self.bin_suffix = value.to_string(),
            "is_save_binary_file" | "save_binary" | "is_save_binary" => {
                self.is_save_binary_file = parse_bool(key, value)?
            }
            "num_threads" | "num_thread" | "nthread" | "nthreads" => {
                self.num_threads = parse_number(key, value)?
            }
            _ => log::debug!("Unknown parameter {} ignored by the loader", key),
        }
        Ok(())
    }

    /// Get the effective number of threads (0 means use all available cores)
    pub fn effective_num_threads(&self) -> usize {
        if self.num_threads == 0 {
            num_cpus::get()
        } else {
            self.num_threads
        }
    }

    /// Path of the binary snapshot that belongs to `data_filename`.
    pub fn binary_filename(&self, data_filename: &str) -> String {
        format!("{}.{}", data_filename, self.bin_suffix)
    }

    /// Get configuration as a parameter map
    pub fn as_parameter_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("header".to_string(), self.has_header.to_string());
        map.insert("label_column".to_string(), self.label_column.clone());
        map.insert("weight_column".to_string(), self.weight_column.clone());
        map.insert("group_column".to_string(), self.group_column.clone());
        map.insert("ignore_column".to_string(), self.ignore_column.clone());
        map.insert(
            "use_two_round_loading".to_string(),
            self.use_two_round_loading.to_string(),
        );
        map.insert("is_pre_partition".to_string(), self.is_pre_partition.to_string());
        map.insert("is_enable_sparse".to_string(), self.is_enable_sparse.to_string());
        map.insert("max_bin".to_string(), self.max_bin.to_string());
        map.insert(
            "bin_construct_sample_cnt".to_string(),
            self.bin_construct_sample_cnt.to_string(),
        );
        map.insert("num_class".to_string(), self.num_class.to_string());
        map.insert("data_random_seed".to_string(), self.data_random_seed.to_string());
        map.insert("bin_suffix".to_string(), self.bin_suffix.clone());
        map.insert(
            "is_save_binary_file".to_string(),
            self.is_save_binary_file.to_string(),
        );
        map.insert("num_threads".to_string(), self.num_threads.to_string());
        map
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "+" | "yes" => Ok(true),
        "false" | "0" | "-" | "no" => Ok(false),
        _ => Err(LightGBMError::invalid_parameter(
            key,
            value,
            "should be true or false",
        )),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| LightGBMError::invalid_parameter(key, value, "should be a number"))
}

/// Configuration builder for fluent configuration creation
#[derive(Debug, Clone)]
pub struct IoConfigBuilder {
    config: IoConfig,
    validation_errors: Vec<String>,
}

impl IoConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        IoConfigBuilder {
            config: IoConfig::default(),
            validation_errors: Vec::new(),
        }
    }

    /// Whether the data file has a header line
    pub fn has_header(mut self, has_header: bool) -> Self {
        self.config.has_header = has_header;
        self
    }

    /// Set the label column spec
    pub fn label_column<S: Into<String>>(mut self, spec: S) -> Self {
        self.config.label_column = spec.into();
        self
    }

    /// Set the weight column spec
    pub fn weight_column<S: Into<String>>(mut self, spec: S) -> Self {
        self.config.weight_column = spec.into();
        self
    }

    /// Set the group/query column spec
    pub fn group_column<S: Into<String>>(mut self, spec: S) -> Self {
        self.config.group_column = spec.into();
        self
    }

    /// Set the ignored columns spec
    pub fn ignore_column<S: Into<String>>(mut self, spec: S) -> Self {
        self.config.ignore_column = spec.into();
        self
    }

    /// Enable two-round loading
    pub fn use_two_round_loading(mut self, enabled: bool) -> Self {
        self.config.use_two_round_loading = enabled;
        self
    }

    /// Mark the input as already partitioned per machine
    pub fn is_pre_partition(mut self, enabled: bool) -> Self {
        self.config.is_pre_partition = enabled;
        self
    }

    /// Allow sparse feature storage
    pub fn is_enable_sparse(mut self, enabled: bool) -> Self {
        self.config.is_enable_sparse = enabled;
        self
    }

    /// Set maximum number of bins
    pub fn max_bin(mut self, max_bin: usize) -> Self {
        if max_bin < 2 {
            self.validation_errors
                .push("max_bin must be at least 2".to_string());
        }
        self.config.max_bin = max_bin;
        self
    }

    /// Set the number of rows sampled for bin construction
    pub fn bin_construct_sample_cnt(mut self, cnt: usize) -> Self {
        self.config.bin_construct_sample_cnt = cnt;
        self
    }

    /// Set number of classes
    pub fn num_class(mut self, num_class: usize) -> Self {
        if num_class == 0 {
            self.validation_errors
                .push("num_class must be at least 1".to_string());
        }
        self.config.num_class = num_class;
        self
    }

    /// Set the sampling and partition seed
    pub fn data_random_seed(mut self, seed: i32) -> Self {
        self.config.data_random_seed = seed;
        self
    }

    /// Set the binary snapshot suffix
    pub fn bin_suffix<S: Into<String>>(mut self, suffix: S) -> Self {
        self.config.bin_suffix = suffix.into();
        self
    }

    /// Save a binary snapshot after text loads
    pub fn is_save_binary_file(mut self, enabled: bool) -> Self {
        self.config.is_save_binary_file = enabled;
        self
    }

    /// Set number of threads
    pub fn num_threads(mut self, threads: usize) -> Self {
        self.config.num_threads = threads;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<IoConfig> {
        if !self.validation_errors.is_empty() {
            return Err(LightGBMError::config(format!(
                "Configuration validation failed: {}",
                self.validation_errors.join(", ")
            )));
        }

        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for IoConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = IoConfig::default();
        assert_eq!(config.max_bin, DEFAULT_MAX_BIN);
        assert_eq!(config.num_class, 1);
        assert_eq!(config.bin_suffix, "bin");
        assert!(config.is_enable_sparse);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = IoConfig::default();
        config.max_bin = 1;
        assert!(config.validate().is_err());

        config.max_bin = 70000;
        assert!(config.validate().is_err());

        config.max_bin = 63;
        config.bin_construct_sample_cnt = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_builder() {
        let config = IoConfigBuilder::new()
            .has_header(true)
            .label_column("name:target")
            .max_bin(63)
            .num_class(3)
            .build()
            .unwrap();

        assert!(config.has_header);
        assert_eq!(config.label_column, "name:target");
        assert_eq!(config.max_bin, 63);
        assert_eq!(config.num_class, 3);
    }

    #[test]
    fn test_config_builder_validation() {
        assert!(IoConfigBuilder::new().max_bin(1).build().is_err());
        assert!(IoConfigBuilder::new().num_class(0).build().is_err());
    }

    #[test]
    fn test_from_args_with_aliases() {
        let config = IoConfig::from_args([
            "header=true",
            "label=name:y",
            "query=2",
            "two_round=true",
            "max_bin=15",
            "data_seed=7",
            "objective=lambdarank",
        ])
        .unwrap();

        assert!(config.has_header);
        assert_eq!(config.label_column, "name:y");
        assert_eq!(config.group_column, "2");
        assert!(config.use_two_round_loading);
        assert_eq!(config.max_bin, 15);
        assert_eq!(config.data_random_seed, 7);
    }

    #[test]
    fn test_from_args_errors() {
        assert!(IoConfig::from_args(["max_bin"]).is_err());
        assert!(IoConfig::from_args(["max_bin=many"]).is_err());
        assert!(IoConfig::from_args(["header=maybe"]).is_err());
    }

    #[test]
    fn test_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let config = IoConfigBuilder::new()
            .weight_column("name:w")
            .is_pre_partition(true)
            .build()
            .unwrap();

        for name in ["io.json", "io.toml"] {
            let path = dir.path().join(name);
            config.save_to_file(&path).unwrap();
            let loaded = IoConfig::load_from_file(&path).unwrap();
            assert_eq!(loaded, config);
        }

        assert!(config.save_to_file(dir.path().join("io.yaml")).is_err());
    }

    #[test]
    fn test_binary_filename() {
        let config = IoConfig::default();
        assert_eq!(config.binary_filename("train.txt"), "train.txt.bin");
    }
}
