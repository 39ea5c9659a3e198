//! Integration tests for binary snapshots: round trips, automatic reuse,
//! corrupted files and rank re-partitioning.

mod common;

use common::*;
use lightgbm_ingest::*;
use std::fs;
use tempfile::TempDir;

fn assert_same_dataset(a: &Dataset, b: &Dataset) {
    assert_eq!(a.num_data(), b.num_data());
    assert_eq!(a.num_class(), b.num_class());
    assert_eq!(a.num_total_features(), b.num_total_features());
    assert_eq!(a.feature_names(), b.feature_names());
    assert_eq!(a.used_feature_map(), b.used_feature_map());
    assert_eq!(bin_rows(a), bin_rows(b));
    assert_eq!(a.metadata(), b.metadata());
    for (fa, fb) in a.features().iter().zip(b.features()) {
        assert_eq!(fa.bin_mapper(), fb.bin_mapper());
    }
}

#[test]
fn test_saved_snapshot_replaces_text_parsing() {
    let dir = TempDir::new().unwrap();
    let rows = create_dense_rows(120, 5, 3);
    let data = write_file(&dir, "train.csv", &to_file_body(&rows));
    write_file(&dir, "train.csv.weight", &"0.5\n".repeat(120));

    let config = IoConfigBuilder::new()
        .is_save_binary_file(true)
        .build()
        .unwrap();
    let mut loader = DatasetLoader::new(config).unwrap();
    let fresh = loader.load_from_file(&data, &Network::single_machine()).unwrap();
    assert!(!fresh.is_loading_from_binfile());
    assert!(snapshot_exists(&data, "bin"));

    // garbage text would fail to parse; the snapshot wins
    fs::write(&data, "not a data file\n").unwrap();
    let reloaded = loader.load_from_file(&data, &Network::single_machine()).unwrap();
    assert!(reloaded.is_loading_from_binfile());
    assert_same_dataset(&fresh, &reloaded);
}

#[test]
fn test_grouped_round_trip() {
    let dir = TempDir::new().unwrap();
    let (rows, _) = create_grouped_rows(15, 4);
    let data = write_file(&dir, "rank.csv", &to_file_body(&rows));
    let config = IoConfigBuilder::new()
        .group_column("1")
        .bin_suffix("snap")
        .build()
        .unwrap();
    let mut loader = DatasetLoader::new(config).unwrap();
    let fresh = loader.load_from_file(&data, &Network::single_machine()).unwrap();

    let bin = format!("{}.snap", data);
    fresh.save_binary_file(Some(&bin)).unwrap();
    let reloaded = loader.load_from_bin_file(&data, &bin, 0, 1).unwrap();
    assert_same_dataset(&fresh, &reloaded);
    assert_eq!(reloaded.metadata().num_queries(), 15);
}

#[test]
fn test_truncated_used_feature_map_is_fatal() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cut.bin");

    let mut header = Vec::new();
    header.write_i32(5).unwrap();
    header.write_i32(1).unwrap();
    header.write_i32(3).unwrap();
    header.write_i32(3).unwrap();
    header.write_u64(3).unwrap();
    header.write_i32(0).unwrap();
    header.write_i32(1).unwrap();
    let mut file = Vec::new();
    file.write_u64(header.len() as u64).unwrap();
    file.write_bytes(&header).unwrap();
    fs::write(&path, file).unwrap();

    let loader = DatasetLoader::new(IoConfig::default()).unwrap();
    let err = loader
        .load_from_bin_file("cut", path.to_str().unwrap(), 0, 1)
        .unwrap_err();
    assert!(matches!(err, LightGBMError::Format { .. }));
}

#[test]
fn test_corrupted_section_size_is_fatal() {
    let dir = TempDir::new().unwrap();
    let data = write_file(&dir, "train.csv", &to_file_body(&create_dense_rows(40, 4, 8)));
    let mut loader = DatasetLoader::new(IoConfig::default()).unwrap();
    let dataset = loader.load_from_file(&data, &Network::single_machine()).unwrap();
    let bin = format!("{}.other", data);
    dataset.save_binary_file(Some(&bin)).unwrap();

    let mut bytes = fs::read(&bin).unwrap();
    // grow the declared header size by one byte
    bytes[0] = bytes[0].wrapping_add(1);
    fs::write(&bin, &bytes).unwrap();
    let err = loader.load_from_bin_file(&data, &bin, 0, 1).unwrap_err();
    assert!(matches!(err, LightGBMError::Format { .. }));
}

#[test]
fn test_snapshot_partition_by_rank() {
    let dir = TempDir::new().unwrap();
    let rows = create_dense_rows(90, 4, 21);
    let data = write_file(&dir, "train.csv", &to_file_body(&rows));
    let mut loader = DatasetLoader::new(IoConfig::default()).unwrap();
    let whole = loader.load_from_file(&data, &Network::single_machine()).unwrap();
    let bin = format!("{}.bin", data);
    whole.save_binary_file(Some(&bin)).unwrap();

    let whole_rows = bin_rows(&whole);
    let mut seen = 0;
    for rank in 0..3 {
        let part = loader.load_from_bin_file(&data, &bin, rank, 3).unwrap();
        let mut selector = UnitSelector::new(IoConfig::default().data_random_seed, rank, 3, None);
        let used = selector.select_all(90).unwrap();
        assert_eq!(part.num_data() as usize, used.len());
        let part_rows = bin_rows(&part);
        for (local, &global) in used.iter().enumerate() {
            assert_eq!(part_rows[local], whole_rows[global as usize]);
            assert_eq!(
                part.metadata().label()[local],
                whole.metadata().label()[global as usize]
            );
        }
        seen += used.len();
    }
    assert_eq!(seen, 90);
}

#[test]
fn test_snapshot_partition_keeps_groups() {
    let dir = TempDir::new().unwrap();
    let (rows, sizes) = create_grouped_rows(20, 6);
    let data = write_file(&dir, "rank.csv", &to_file_body(&rows));
    let config = IoConfigBuilder::new().group_column("1").build().unwrap();
    let mut loader = DatasetLoader::new(config).unwrap();
    let whole = loader.load_from_file(&data, &Network::single_machine()).unwrap();
    let bin = format!("{}.bin", data);
    whole.save_binary_file(Some(&bin)).unwrap();

    let mut total_rows = 0;
    let mut total_groups = 0;
    for rank in 0..2 {
        let part = loader.load_from_bin_file(&data, &bin, rank, 2).unwrap();
        let boundaries = part.metadata().query_boundaries().unwrap_or(&[0]);
        assert_eq!(*boundaries.last().unwrap(), part.num_data());
        total_rows += part.num_data() as usize;
        total_groups += part.metadata().num_queries();
    }
    assert_eq!(total_rows, sizes.iter().sum::<usize>());
    assert_eq!(total_groups, 20);
}
