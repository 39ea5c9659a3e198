//! Dataset loading orchestration.
//!
//! Three entry points produce a finished [`Dataset`]:
//!
//! - [`DatasetLoader::load_from_file`] builds fresh bin mappers (locally or
//!   across machines) and extracts the rows of this machine
//! - [`DatasetLoader::load_from_file_align_with_other_dataset`] reuses the
//!   mappers of a training dataset, e.g. for validation data
//! - [`DatasetLoader::load_from_bin_file`] reads a binary snapshot
//!
//! A text load first looks for `<data>.<bin_suffix>` and reads the snapshot
//! instead when it exists.

use crate::config::IoConfig;
use crate::core::constants::READ_CHUNK_LINES;
use crate::core::error::{LightGBMError, Result};
use crate::core::network::Network;
use crate::core::random::Random;
use crate::core::types::{DataSize, Score};
use crate::dataset::bin_builder::{construct_bin_mappers, SampleValues};
use crate::dataset::dataset::Dataset;
use crate::dataset::extract::{Extractor, InitScoreFunction};
use crate::dataset::metadata::Metadata;
use crate::dataset::sampling::{sample_from_memory, UnitSelector};
use crate::dataset::schema::ColumnSchema;
use crate::dataset::snapshot::SnapshotPartition;
use crate::io::parser::{create_parser, Parser};
use crate::io::text_reader::{FileSample, FilteredLines, TextReader};
use crate::{config_error, dataset_error, ensure};

use std::collections::BTreeSet;
use std::path::Path;

/// Rows of this machine after sampling.
struct LocalRows {
    /// Global indices of the kept rows; `None` when every row is kept
    used_indices: Option<Vec<DataSize>>,
    /// Rows in the whole file
    num_global_data: DataSize,
}

/// Loads datasets from text files or binary snapshots.
pub struct DatasetLoader {
    config: IoConfig,
    random: Random,
    init_score_fn: Option<InitScoreFunction>,
    thread_pool: rayon::ThreadPool,
}

impl std::fmt::Debug for DatasetLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasetLoader")
            .field("config", &self.config)
            .field("has_init_score_fn", &self.init_score_fn.is_some())
            .field("num_threads", &self.thread_pool.current_num_threads())
            .finish()
    }
}

impl DatasetLoader {
    /// Create a loader; `config` is validated first.
    pub fn new(config: IoConfig) -> Result<Self> {
        config.validate()?;
        let thread_pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.effective_num_threads())
            .build()
            .map_err(|e| LightGBMError::internal(format!("Failed to create thread pool: {}", e)))?;
        Ok(DatasetLoader {
            random: Random::with_seed(config.data_random_seed),
            config,
            init_score_fn: None,
            thread_pool,
        })
    }

    /// Compute initial scores of every extracted row with `init_score_fn`.
    pub fn with_init_score_fn(mut self, init_score_fn: InitScoreFunction) -> Self {
        self.init_score_fn = Some(init_score_fn);
        self
    }

    /// Configuration in use
    pub fn config(&self) -> &IoConfig {
        &self.config
    }

    /// Load training data, building new bin mappers.
    ///
    /// With several machines every one of them must call this with the same
    /// file layout and configuration; bin mappers are exchanged through
    /// `network` in a single all-gather.
    pub fn load_from_file(&mut self, filename: &str, network: &Network) -> Result<Dataset> {
        let rank = network.rank();
        let num_machines = network.num_machines();

        let bin_filename = self.config.binary_filename(filename);
        if Path::new(&bin_filename).is_file() {
            return self.load_from_bin_file(filename, &bin_filename, rank, num_machines);
        }

        let reader = TextReader::new(filename, self.config.has_header)?;
        let header = self.config.has_header.then(|| reader.first_line());
        let schema = ColumnSchema::resolve(&self.config, header)?;
        if num_machines > 1 && !self.config.is_pre_partition && schema.group_idx.is_some() {
            return Err(config_error!(
                "Using a query id column without pre-partitioning the data is not supported \
                 for parallel training, please use an additional query file or pre-partition the data"
            ));
        }

        let parser = create_parser(&reader, schema.label_idx)?;
        let mut dataset = Dataset::new(filename, self.config.num_class);
        dataset.metadata = Metadata::load_side_files(filename, self.config.num_class)?;

        let mut random = self.random.clone();
        let loader = &*self;
        let dataset = loader.thread_pool.install(|| -> Result<Dataset> {
            let local = if !loader.config.use_two_round_loading {
                let (lines, local) =
                    loader.load_text_data_to_memory(&reader, &dataset.metadata, rank, num_machines)?;
                dataset.num_data = to_data_size(lines.len())?;
                let sample =
                    sample_from_memory(&mut random, &lines, loader.config.bin_construct_sample_cnt);
                loader.construct_bin_mappers_from_text_data(
                    &mut dataset,
                    &schema,
                    parser.as_ref(),
                    &sample,
                    network,
                )?;
                drop(sample);
                loader.extract_features_from_memory(&mut dataset, &schema, parser.as_ref(), &lines)?;
                local
            } else {
                let (sample, local) = loader.sample_text_data_from_file(
                    &reader,
                    &dataset.metadata,
                    &mut random,
                    rank,
                    num_machines,
                )?;
                dataset.num_data = match &local.used_indices {
                    Some(used) => to_data_size(used.len())?,
                    None => local.num_global_data,
                };
                loader.construct_bin_mappers_from_text_data(
                    &mut dataset,
                    &schema,
                    parser.as_ref(),
                    &sample,
                    network,
                )?;
                drop(sample);
                loader.extract_features_from_file(
                    &mut dataset,
                    &schema,
                    parser.as_ref(),
                    &reader,
                    local.used_indices.as_deref(),
                )?;
                local
            };
            dataset
                .metadata
                .check_or_partition(local.num_global_data, local.used_indices.as_deref())?;
            dataset.finish_load();
            Ok(dataset)
        })?;
        self.random = random;

        self.check_dataset(&dataset)?;
        if self.config.is_save_binary_file {
            dataset.save_binary_file(Some(&bin_filename))?;
        }
        log::info!(
            "Finished loading {} rows with {} features from {}",
            dataset.num_data(),
            dataset.num_features(),
            filename
        );
        Ok(dataset)
    }

    /// Load validation data quantized exactly like `train_data`.
    ///
    /// Every row is kept; the result is not checked for emptiness.
    pub fn load_from_file_align_with_other_dataset(
        &self,
        filename: &str,
        train_data: &Dataset,
    ) -> Result<Dataset> {
        let bin_filename = self.config.binary_filename(filename);
        if Path::new(&bin_filename).is_file() {
            return self.load_from_bin_file(filename, &bin_filename, 0, 1);
        }

        let reader = TextReader::new(filename, self.config.has_header)?;
        let header = self.config.has_header.then(|| reader.first_line());
        let schema = ColumnSchema::resolve(&self.config, header)?;
        let parser = create_parser(&reader, schema.label_idx)?;
        let mut dataset = Dataset::new(filename, self.config.num_class);
        dataset.metadata = Metadata::load_side_files(filename, self.config.num_class)?;

        self.thread_pool.install(|| -> Result<Dataset> {
            if !self.config.use_two_round_loading {
                let lines = reader.read_all_lines()?;
                dataset.num_data = to_data_size(lines.len())?;
                dataset.copy_feature_mapper_from(train_data, self.config.is_enable_sparse);
                self.extract_features_from_memory(&mut dataset, &schema, parser.as_ref(), &lines)?;
            } else {
                dataset.num_data = reader.count_line()?;
                dataset.copy_feature_mapper_from(train_data, self.config.is_enable_sparse);
                self.extract_features_from_file(&mut dataset, &schema, parser.as_ref(), &reader, None)?;
            }
            let num_data = dataset.num_data;
            dataset.metadata.check_or_partition(num_data, None)?;
            dataset.finish_load();
            Ok(dataset)
        })
    }

    /// Read a binary snapshot, keeping the rows of machine `rank`.
    pub fn load_from_bin_file(
        &self,
        data_filename: &str,
        bin_filename: &str,
        rank: usize,
        num_machines: usize,
    ) -> Result<Dataset> {
        ensure!(
            rank < num_machines.max(1),
            LightGBMError::invalid_parameter(
                "rank",
                rank.to_string(),
                format!("must be below the number of machines ({})", num_machines)
            )
        );
        let partition = SnapshotPartition {
            rank,
            num_machines,
            is_pre_partition: self.config.is_pre_partition,
            data_random_seed: self.config.data_random_seed,
        };
        log::info!("Loading data set from binary file {}", bin_filename);
        Dataset::load_binary_file(bin_filename, data_filename, partition)
    }

    /// Build an empty dataset of `num_data` rows from per-column samples.
    ///
    /// Rows are added afterwards with [`Dataset::push_rows`], labels through
    /// [`Dataset::metadata_mut`]; finish with [`Dataset::finish_load`].
    pub fn construct_from_sample_data(
        &self,
        sample_values: Vec<Vec<f64>>,
        total_sample_cnt: usize,
        num_data: DataSize,
    ) -> Result<Dataset> {
        ensure!(num_data > 0, dataset_error!("Cannot construct a dataset of {} rows", num_data));
        let sample = SampleValues {
            columns: sample_values,
            num_rows: total_sample_cnt,
        };
        let mappers = self.thread_pool.install(|| {
            construct_bin_mappers(
                &sample,
                self.config.max_bin,
                &BTreeSet::new(),
                &Network::single_machine(),
            )
        })?;
        let mut dataset = Dataset::new("", self.config.num_class);
        dataset.num_data = num_data;
        dataset.build_features(mappers, &[], self.config.is_enable_sparse);
        dataset
            .metadata
            .init_shape(num_data, self.config.num_class, false, false);
        Ok(dataset)
    }

    /// Reject datasets without rows or without usable features.
    pub fn check_dataset(&self, dataset: &Dataset) -> Result<()> {
        ensure!(
            dataset.num_data() > 0,
            dataset_error!("Data file {} is empty", dataset.data_filename())
        );
        ensure!(
            dataset.num_features() > 0,
            dataset_error!("No usable features in data file {}", dataset.data_filename())
        );
        Ok(())
    }

    fn selector<'a>(&self, metadata: &'a Metadata, rank: usize, num_machines: usize) -> Option<UnitSelector<'a>> {
        (num_machines > 1 && !self.config.is_pre_partition).then(|| {
            UnitSelector::new(
                self.config.data_random_seed,
                rank,
                num_machines,
                metadata.query_boundaries(),
            )
        })
    }

    fn load_text_data_to_memory(
        &self,
        reader: &TextReader,
        metadata: &Metadata,
        rank: usize,
        num_machines: usize,
    ) -> Result<(Vec<String>, LocalRows)> {
        match self.selector(metadata, rank, num_machines) {
            None => {
                let lines = reader.read_all_lines()?;
                let num_global_data = to_data_size(lines.len())?;
                Ok((
                    lines,
                    LocalRows {
                        used_indices: None,
                        num_global_data,
                    },
                ))
            }
            Some(mut selector) => {
                let FilteredLines {
                    lines,
                    used_indices,
                    total_lines,
                } = reader.read_and_filter_lines(|row| selector.select(row))?;
                log::info!(
                    "Rank {} keeps {} of {} rows",
                    rank,
                    used_indices.len(),
                    total_lines
                );
                Ok((
                    lines,
                    LocalRows {
                        used_indices: Some(used_indices),
                        num_global_data: total_lines,
                    },
                ))
            }
        }
    }

    fn sample_text_data_from_file(
        &self,
        reader: &TextReader,
        metadata: &Metadata,
        random: &mut Random,
        rank: usize,
        num_machines: usize,
    ) -> Result<(Vec<String>, LocalRows)> {
        let sample_cnt = self.config.bin_construct_sample_cnt;
        let (file_sample, partitioned) = match self.selector(metadata, rank, num_machines) {
            None => (reader.sample_from_file(random, sample_cnt)?, false),
            Some(mut selector) => (
                reader.sample_and_filter_from_file(|row| selector.select(row), random, sample_cnt)?,
                true,
            ),
        };
        let FileSample {
            sample,
            used_indices,
            total_lines,
        } = file_sample;
        if partitioned {
            log::info!("Rank {} keeps {} of {} rows", rank, used_indices.len(), total_lines);
        }
        Ok((
            sample,
            LocalRows {
                used_indices: partitioned.then_some(used_indices),
                num_global_data: total_lines,
            },
        ))
    }

    fn construct_bin_mappers_from_text_data<S: AsRef<str>>(
        &self,
        dataset: &mut Dataset,
        schema: &ColumnSchema,
        parser: &dyn Parser,
        sample: &[S],
        network: &Network,
    ) -> Result<()> {
        let mut sample_values = SampleValues::from_lines(parser, sample)?;
        sample_values.pad_to(schema.feature_names.len());
        let mappers = construct_bin_mappers(
            &sample_values,
            self.config.max_bin,
            &schema.ignore,
            network,
        )?;
        dataset.build_features(mappers, &schema.feature_names, self.config.is_enable_sparse);
        Ok(())
    }

    fn init_score_buffer(&self, dataset: &Dataset) -> Vec<Score> {
        match self.init_score_fn {
            Some(_) => vec![0.0; dataset.num_data.max(0) as usize * dataset.num_class],
            None => Vec::new(),
        }
    }

    fn extract_features_from_memory(
        &self,
        dataset: &mut Dataset,
        schema: &ColumnSchema,
        parser: &dyn Parser,
        lines: &[String],
    ) -> Result<()> {
        self.init_metadata_shape(dataset, schema);
        let mut init_score = self.init_score_buffer(dataset);
        Extractor::new(parser, schema, self.init_score_fn.as_ref()).extract(
            dataset,
            0,
            lines,
            &mut init_score,
        )?;
        if self.init_score_fn.is_some() {
            dataset.metadata.set_init_score(init_score);
        }
        Ok(())
    }

    fn extract_features_from_file(
        &self,
        dataset: &mut Dataset,
        schema: &ColumnSchema,
        parser: &dyn Parser,
        reader: &TextReader,
        used_indices: Option<&[DataSize]>,
    ) -> Result<()> {
        self.init_metadata_shape(dataset, schema);
        let mut init_score = self.init_score_buffer(dataset);
        let extractor = Extractor::new(parser, schema, self.init_score_fn.as_ref());
        let num_read = {
            let process = |start: DataSize, chunk: Vec<String>| {
                extractor.extract(&mut *dataset, start, &chunk, &mut init_score)
            };
            match used_indices {
                Some(used) => reader.read_part_and_process(used, READ_CHUNK_LINES, process)?,
                None => reader.read_all_and_process(READ_CHUNK_LINES, process)?,
            }
        };
        if num_read != dataset.num_data {
            return Err(LightGBMError::dataset(format!(
                "Read {} rows from {} but expected {}",
                num_read,
                reader.filename().display(),
                dataset.num_data
            )));
        }
        if self.init_score_fn.is_some() {
            dataset.metadata.set_init_score(init_score);
        }
        Ok(())
    }

    fn init_metadata_shape(&self, dataset: &mut Dataset, schema: &ColumnSchema) {
        let (num_data, num_class) = (dataset.num_data, dataset.num_class);
        dataset.metadata.init_shape(
            num_data,
            num_class,
            schema.weight_idx.is_some(),
            schema.group_idx.is_some(),
        );
    }
}

fn to_data_size(len: usize) -> Result<DataSize> {
    DataSize::try_from(len)
        .map_err(|_| LightGBMError::dataset(format!("{} rows exceed the supported row count", len)))
}
