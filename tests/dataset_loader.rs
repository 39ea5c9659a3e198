//! Integration tests for text loading: schema resolution, two-round
//! loading, aligned loads, side files and initial scores.

mod common;

use common::*;
use lightgbm_ingest::*;
use std::sync::Arc;
use tempfile::TempDir;

fn load(config: IoConfig, data: &str) -> Result<Dataset> {
    let mut loader = DatasetLoader::new(config)?;
    loader.load_from_file(data, &Network::single_machine())
}

#[test]
fn test_label_resolved_by_header_name() {
    let dir = TempDir::new().unwrap();
    let data = write_file(
        &dir,
        "named.csv",
        "a,target,b\n1.5,1,3\n2.5,0,4\n3.5,1,3\n0.5,0,5\n",
    );
    let config = IoConfigBuilder::new()
        .has_header(true)
        .label_column("name:target")
        .build()
        .unwrap();
    let dataset = load(config, &data).unwrap();

    assert_eq!(dataset.feature_names(), &["a", "b"]);
    assert_eq!(dataset.num_features(), 2);
    assert_eq!(dataset.metadata().label(), &[1.0, 0.0, 1.0, 0.0]);
    assert_feature_map_is_consistent(&dataset);
}

#[test]
fn test_unknown_column_name_is_fatal() {
    let dir = TempDir::new().unwrap();
    let data = write_file(&dir, "named.csv", "a,b\n1,2\n");
    let config = IoConfigBuilder::new()
        .has_header(true)
        .weight_column("name:w")
        .build()
        .unwrap();
    let err = load(config, &data).unwrap_err();
    assert!(matches!(err, LightGBMError::Config { .. }));
}

#[test]
fn test_unrecognized_format_is_fatal() {
    let dir = TempDir::new().unwrap();
    let data = write_file(&dir, "spaces.txt", "1 2 3\n0 4 5\n");
    let err = load(IoConfig::default(), &data).unwrap_err();
    assert!(matches!(err, LightGBMError::Format { .. }));
}

#[test]
fn test_two_round_matches_in_memory() {
    let dir = TempDir::new().unwrap();
    let rows = create_dense_rows(300, 6, 11);
    let data = write_file(&dir, "dense.csv", &to_file_body(&rows));

    let in_memory = load(IoConfigBuilder::new().build().unwrap(), &data).unwrap();
    let two_round = load(
        IoConfigBuilder::new().use_two_round_loading(true).build().unwrap(),
        &data,
    )
    .unwrap();

    assert_eq!(in_memory.num_data(), 300);
    assert_eq!(in_memory.used_feature_map(), two_round.used_feature_map());
    // column 1 is constant
    assert_eq!(in_memory.used_feature_map()[1], -1);
    for (a, b) in in_memory.features().iter().zip(two_round.features()) {
        assert!(a.bin_mapper().check_align(b.bin_mapper()));
    }
    assert_eq!(bin_rows(&in_memory), bin_rows(&two_round));
    assert_eq!(in_memory.metadata(), two_round.metadata());
    assert_feature_map_is_consistent(&in_memory);
}

#[test]
fn test_aligned_load_reuses_bin_mappers() {
    let dir = TempDir::new().unwrap();
    let train_rows = create_dense_rows(200, 5, 1);
    let train_data = write_file(&dir, "train.csv", &to_file_body(&train_rows));
    // shifted values plus an extra trailing column
    let valid_rows: Vec<String> = create_dense_rows(40, 5, 2)
        .into_iter()
        .map(|r| format!("{},123.5", r))
        .collect();
    let valid_data = write_file(&dir, "valid.csv", &to_file_body(&valid_rows));

    let mut loader = DatasetLoader::new(IoConfig::default()).unwrap();
    let train = loader
        .load_from_file(&train_data, &Network::single_machine())
        .unwrap();
    let valid = loader
        .load_from_file_align_with_other_dataset(&valid_data, &train)
        .unwrap();

    assert_eq!(valid.num_data(), 40);
    assert_eq!(valid.used_feature_map(), train.used_feature_map());
    assert_eq!(valid.feature_names(), train.feature_names());
    for (v, t) in valid.features().iter().zip(train.features()) {
        assert_eq!(v.bin_mapper(), t.bin_mapper());
        assert_eq!(v.feature_index(), t.feature_index());
    }
}

#[test]
fn test_aligned_load_of_a_single_row() {
    let dir = TempDir::new().unwrap();
    let train_data = write_file(&dir, "train.csv", &to_file_body(&create_dense_rows(50, 3, 5)));
    let single_row = write_file(&dir, "valid.csv", "1,0,7,0\n");

    let mut loader = DatasetLoader::new(IoConfig::default()).unwrap();
    let train = loader
        .load_from_file(&train_data, &Network::single_machine())
        .unwrap();
    let valid = loader
        .load_from_file_align_with_other_dataset(&single_row, &train)
        .unwrap();
    assert_eq!(valid.num_data(), 1);
    assert_eq!(valid.num_features(), train.num_features());
}

#[test]
fn test_weight_and_group_columns() {
    let dir = TempDir::new().unwrap();
    let data = write_file(
        &dir,
        "ranked.tsv",
        "1\t0.5\t10\t3.2\n0\t1.5\t10\t1.1\n2\t2.0\t20\t0.7\n1\t1.0\t20\t5.5\n0\t1.0\t30\t2.2\n",
    );
    let config = IoConfigBuilder::new()
        .weight_column("1")
        .group_column("2")
        .build()
        .unwrap();
    let dataset = load(config, &data).unwrap();

    let metadata = dataset.metadata();
    assert_eq!(metadata.weights(), Some(&[0.5, 1.5, 2.0, 1.0, 1.0][..]));
    assert_eq!(metadata.query_boundaries(), Some(&[0, 2, 4, 5][..]));
    // weight and group never become features
    assert_eq!(dataset.used_feature_map(), &[-1, -1, 0]);
}

#[test]
fn test_side_files_are_loaded() {
    let dir = TempDir::new().unwrap();
    let rows = create_dense_rows(6, 3, 9);
    let data = write_file(&dir, "train.csv", &to_file_body(&rows));
    write_file(&dir, "train.csv.weight", "1\n2\n3\n4\n5\n6\n");
    write_file(&dir, "train.csv.query", "4\n2\n");

    let dataset = load(IoConfig::default(), &data).unwrap();
    assert_eq!(
        dataset.metadata().weights(),
        Some(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0][..])
    );
    assert_eq!(dataset.metadata().query_boundaries(), Some(&[0, 4, 6][..]));
}

#[test]
fn test_bad_query_side_file_is_fatal() {
    let dir = TempDir::new().unwrap();
    let data = write_file(&dir, "train.csv", &to_file_body(&create_dense_rows(6, 3, 9)));
    write_file(&dir, "train.csv.query", "4\n4\n");
    let err = load(IoConfig::default(), &data).unwrap_err();
    assert!(matches!(err, LightGBMError::Dataset { .. }));
}

#[test]
fn test_init_score_function_is_class_major() {
    let dir = TempDir::new().unwrap();
    let data = write_file(&dir, "multi.csv", "0,1,5\n2,2,6\n1,3,7\n");
    let config = IoConfigBuilder::new().num_class(2).build().unwrap();
    let init_fn: InitScoreFunction = Arc::new(|row: &[(usize, f64)]| {
        let first = row.iter().find(|(i, _)| *i == 0).map_or(0.0, |(_, v)| *v);
        vec![first, -first]
    });
    let mut loader = DatasetLoader::new(config).unwrap().with_init_score_fn(init_fn);
    let dataset = loader
        .load_from_file(&data, &Network::single_machine())
        .unwrap();

    assert_eq!(dataset.num_class(), 2);
    assert_eq!(
        dataset.metadata().init_score(),
        Some(&[1.0, 2.0, 3.0, -1.0, -2.0, -3.0][..])
    );
}

#[test]
fn test_libsvm_file() {
    let dir = TempDir::new().unwrap();
    let data = write_file(
        &dir,
        "sparse.svm",
        "1 0:1.5 3:2\n0 1:0.5 3:4\n1 0:2.5\n0 2:1 3:2\n",
    );
    let dataset = load(IoConfig::default(), &data).unwrap();
    assert_eq!(dataset.num_total_features(), 4);
    assert_eq!(dataset.metadata().label(), &[1.0, 0.0, 1.0, 0.0]);
    assert_feature_map_is_consistent(&dataset);
    // rows without a value sit in the zero bin
    let f0 = dataset.feature(0).unwrap();
    assert_eq!(dataset.feature_bin(0, 1), Some(f0.bin_mapper().default_bin()));
}

#[test]
fn test_config_from_args() {
    let config = IoConfig::from_args(["header=true", "label=name:y", "two_round=true", "max_bin=63"]).unwrap();
    assert!(config.has_header);
    assert!(config.use_two_round_loading);
    assert_eq!(config.max_bin, 63);
    assert_eq!(config.label_column, "name:y");
    assert!(IoConfig::from_args(["max_bin=1"]).is_err());
}
