//! Row-parallel extraction of quantized values and row metadata.
//!
//! Each rayon worker folds rows into its own [`WorkerState`]: one staging
//! buffer per feature column plus the per-row label, weight, group id and
//! initial scores. Nothing shared is written while rows are parsed; the
//! states are merged afterwards on the calling thread, so the result does
//! not depend on how rows were scheduled.

use crate::core::error::{LightGBMError, Result};
use crate::core::types::{DataSize, Score, SparseRow};
use crate::dataset::dataset::Dataset;
use crate::dataset::feature::{Feature, FeatureStaging};
use crate::dataset::schema::ColumnSchema;
use crate::io::parser::Parser;

use rayon::prelude::*;
use std::sync::Arc;

/// Produces `num_class` initial scores from a parsed row.
pub type InitScoreFunction = Arc<dyn Fn(&[(usize, f64)]) -> Vec<f64> + Send + Sync>;

/// Per-row values routed to the metadata.
#[derive(Debug, Clone)]
struct RowOutcome {
    row: DataSize,
    label: f64,
    weight: Option<f64>,
    query: Option<f64>,
    init_score: Option<Vec<f64>>,
}

#[derive(Debug)]
struct WorkerState {
    staging: Vec<FeatureStaging>,
    outcomes: Vec<RowOutcome>,
    parsed: SparseRow,
}

impl WorkerState {
    fn new(num_features: usize) -> Self {
        WorkerState {
            staging: vec![FeatureStaging::default(); num_features],
            outcomes: Vec::new(),
            parsed: Vec::new(),
        }
    }
}

/// Everything the extraction of one file needs besides the rows.
#[derive(Clone, Copy)]
pub struct Extractor<'a> {
    parser: &'a dyn Parser,
    schema: &'a ColumnSchema,
    init_score_fn: Option<&'a InitScoreFunction>,
}

impl std::fmt::Debug for Extractor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extractor")
            .field("dialect", &self.parser.dialect())
            .field("schema", self.schema)
            .field("has_init_score_fn", &self.init_score_fn.is_some())
            .finish()
    }
}

impl<'a> Extractor<'a> {
    /// Extractor routing parsed values according to `schema`
    pub fn new(
        parser: &'a dyn Parser,
        schema: &'a ColumnSchema,
        init_score_fn: Option<&'a InitScoreFunction>,
    ) -> Self {
        Extractor {
            parser,
            schema,
            init_score_fn,
        }
    }

    /// Parse `lines` (local rows `start_row..`) into `dataset`.
    ///
    /// Initial scores are written class-major into `init_score`, which must
    /// hold `num_class * num_data` entries when an init score function is set.
    pub fn extract<S: AsRef<str> + Sync>(
        &self,
        dataset: &mut Dataset,
        start_row: DataSize,
        lines: &[S],
        init_score: &mut [Score],
    ) -> Result<()> {
        let states = {
            let features = &dataset.features;
            let used_feature_map = &dataset.used_feature_map;
            let num_class = dataset.num_class;
            lines
                .par_iter()
                .enumerate()
                .try_fold(
                    || WorkerState::new(features.len()),
                    |mut state, (i, line)| {
                        let row = start_row + i as DataSize;
                        self.process_line(
                            &mut state,
                            features,
                            used_feature_map,
                            num_class,
                            row,
                            line.as_ref(),
                        )?;
                        Ok::<_, LightGBMError>(state)
                    },
                )
                .collect::<Result<Vec<_>>>()?
        };
        merge_states(dataset, states, init_score)
    }

    fn process_line(
        &self,
        state: &mut WorkerState,
        features: &[Feature],
        used_feature_map: &[i32],
        num_class: usize,
        row: DataSize,
        line: &str,
    ) -> Result<()> {
        state.parsed.clear();
        let label = self.parser.parse_one_line(line, &mut state.parsed)?;
        let init_score = match self.init_score_fn {
            Some(fun) => {
                let scores = fun(&state.parsed);
                if scores.len() != num_class {
                    return Err(LightGBMError::dataset(format!(
                        "Initial score function returned {} scores for {} classes",
                        scores.len(),
                        num_class
                    )));
                }
                Some(scores)
            }
            None => None,
        };
        let mut outcome = RowOutcome {
            row,
            label,
            weight: None,
            query: None,
            init_score,
        };
        for &(idx, value) in &state.parsed {
            if Some(idx) == self.schema.weight_idx {
                outcome.weight = Some(value);
            } else if Some(idx) == self.schema.group_idx {
                outcome.query = Some(value);
            } else if let Some(&inner) = used_feature_map.get(idx) {
                if inner >= 0 {
                    let inner = inner as usize;
                    features[inner].push_into(&mut state.staging[inner], row, value);
                }
            }
        }
        state.outcomes.push(outcome);
        Ok(())
    }
}

fn merge_states(dataset: &mut Dataset, states: Vec<WorkerState>, init_score: &mut [Score]) -> Result<()> {
    let num_data = dataset.num_data.max(0) as usize;
    for state in states {
        for (feature, staging) in dataset.features.iter_mut().zip(state.staging) {
            feature.absorb(staging)?;
        }
        for outcome in state.outcomes {
            let row = outcome.row as usize;
            if row >= num_data {
                return Err(LightGBMError::internal(format!(
                    "Row {} is outside the {} allocated rows",
                    row, num_data
                )));
            }
            let metadata = &mut dataset.metadata;
            metadata.set_label_at(row, outcome.label);
            if let Some(weight) = outcome.weight {
                metadata.set_weight_at(row, weight);
            }
            if let Some(query) = outcome.query {
                metadata.set_query_at(row, query);
            }
            if let Some(scores) = outcome.init_score {
                for (k, score) in scores.into_iter().enumerate() {
                    if let Some(slot) = init_score.get_mut(k * num_data + row) {
                        *slot = score as Score;
                    }
                }
            }
        }
    }
    Ok(())
}

impl Dataset {
    /// Push already parsed rows `start_row..` into the feature columns.
    ///
    /// Used with datasets built by `construct_from_sample_data`; call
    /// [`Dataset::finish_load`] once every row is pushed.
    pub fn push_rows(&mut self, start_row: DataSize, rows: &[SparseRow]) -> Result<()> {
        let stagings = {
            let features = &self.features;
            let used_feature_map = &self.used_feature_map;
            rows.par_iter()
                .enumerate()
                .fold(
                    || vec![FeatureStaging::default(); features.len()],
                    |mut staging, (i, row)| {
                        let row_idx = start_row + i as DataSize;
                        for &(idx, value) in row {
                            if let Some(&inner) = used_feature_map.get(idx) {
                                if inner >= 0 {
                                    let inner = inner as usize;
                                    features[inner].push_into(&mut staging[inner], row_idx, value);
                                }
                            }
                        }
                        staging
                    },
                )
                .collect::<Vec<_>>()
        };
        for staging in stagings {
            for (feature, values) in self.features.iter_mut().zip(staging) {
                feature.absorb(values)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::bin_mapper::BinMapper;
    use crate::dataset::metadata::Metadata;
    use crate::io::parser::DenseParser;

    fn dataset(num_data: DataSize) -> Dataset {
        let mut dataset = Dataset::new("mem", 1);
        dataset.num_data = num_data;
        let mapper = BinMapper::find_bin(&[1.0, 2.0, 3.0], 6, 255).unwrap();
        dataset.build_features(vec![Some(mapper.clone()), None, Some(mapper)], &[], false);
        dataset.metadata = Metadata::new();
        dataset.metadata.init_shape(num_data, 1, true, false);
        dataset
    }

    #[test]
    fn test_extract_routes_values() {
        let parser = DenseParser::new(',', 0);
        let schema = ColumnSchema {
            weight_idx: Some(1),
            ignore: [1].into_iter().collect(),
            ..ColumnSchema::default()
        };
        let mut data = dataset(3);
        let lines = ["1,1,0.5,3", "0,2,2,1", "1,0,3,2,9"];
        let init_fn: InitScoreFunction = Arc::new(|row: &[(usize, f64)]| vec![row.len() as f64]);
        let mut init_score = vec![0.0; 3];
        Extractor::new(&parser, &schema, Some(&init_fn))
            .extract(&mut data, 0, &lines, &mut init_score)
            .unwrap();
        data.finish_load();

        assert_eq!(data.metadata().label(), &[1.0, 0.0, 1.0]);
        assert_eq!(data.metadata().weights(), Some(&[0.5, 2.0, 3.0][..]));
        // the zero in the last row is never emitted by the parser
        assert_eq!(init_score, vec![3.0, 3.0, 3.0]);
        // the extra trailing column of the last row is ignored
        let mapper = data.feature(0).unwrap().bin_mapper().clone();
        assert_eq!(data.feature_bin(0, 1), Some(mapper.value_to_bin(2.0)));
        assert_eq!(data.feature_bin(2, 2), Some(mapper.value_to_bin(2.0)));
    }

    #[test]
    fn test_chunked_extraction_matches_single_pass() {
        let parser = DenseParser::new(',', 0);
        let schema = ColumnSchema::default();
        let lines: Vec<String> = (0..50)
            .map(|i| format!("{},{},0,{}", i % 2, i % 4, (i * 7) % 5))
            .collect();

        let mut whole = dataset(50);
        Extractor::new(&parser, &schema, None)
            .extract(&mut whole, 0, &lines, &mut [])
            .unwrap();
        whole.finish_load();

        let mut chunked = dataset(50);
        for (c, chunk) in lines.chunks(7).enumerate() {
            Extractor::new(&parser, &schema, None)
                .extract(&mut chunked, (c * 7) as DataSize, chunk, &mut [])
                .unwrap();
        }
        chunked.finish_load();

        assert_eq!(whole.features(), chunked.features());
        assert_eq!(whole.metadata(), chunked.metadata());
    }

    #[test]
    fn test_bad_init_score_length() {
        let parser = DenseParser::new(',', 0);
        let schema = ColumnSchema::default();
        let mut data = dataset(1);
        let init_fn: InitScoreFunction = Arc::new(|_: &[(usize, f64)]| vec![0.0, 1.0]);
        let mut init_score = vec![0.0; 1];
        let err = Extractor::new(&parser, &schema, Some(&init_fn))
            .extract(&mut data, 0, &["1,2"], &mut init_score)
            .unwrap_err();
        assert_eq!(err.category(), "dataset");
    }

    #[test]
    fn test_push_rows() {
        let mut data = dataset(2);
        data.push_rows(0, &[vec![(0, 3.0)], vec![(2, 1.0), (7, 4.0)]]).unwrap();
        data.finish_load();
        let mapper = data.feature(0).unwrap().bin_mapper().clone();
        assert_eq!(data.feature_bin(0, 0), Some(mapper.value_to_bin(3.0)));
        assert_eq!(data.feature_bin(2, 1), Some(mapper.value_to_bin(1.0)));
    }
}
