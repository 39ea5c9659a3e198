//! Common test utilities for the dataset loader integration tests.

#![allow(dead_code)]

use lightgbm_ingest::*;
use rand::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Write `content` to `name` inside `dir` and return the path as a string
pub fn write_file(dir: &TempDir, name: &str, content: &str) -> String {
    let path = dir.path().join(name);
    fs::write(&path, content).expect("Failed to write test file");
    path.to_str().expect("Non UTF-8 temp path").to_string()
}

/// Random dense data: label first, then `num_features` columns.
///
/// Column 1 is constant and column 3 is mostly zero.
pub fn create_dense_rows(num_rows: usize, num_features: usize, seed: u64) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..num_rows)
        .map(|_| {
            let mut cols = vec![format!("{}", rng.gen_range(0..2))];
            for j in 0..num_features {
                let value = match j {
                    1 => 7.0,
                    3 if rng.gen_bool(0.9) => 0.0,
                    _ => (rng.gen_range(-50.0f64..50.0) * 100.0).round() / 100.0,
                };
                cols.push(format!("{}", value));
            }
            cols.join(",")
        })
        .collect()
}

/// Rows with a group id column right after the label, in `num_groups`
/// contiguous groups of random sizes. Returns the rows and the group sizes.
pub fn create_grouped_rows(num_groups: usize, seed: u64) -> (Vec<String>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut rows = Vec::new();
    let mut sizes = Vec::new();
    for g in 0..num_groups {
        let size = rng.gen_range(1..6);
        sizes.push(size);
        for _ in 0..size {
            rows.push(format!(
                "{},{},{:.3},{:.3}",
                rng.gen_range(0..3),
                g,
                rng.gen_range(0.0f64..10.0),
                rng.gen_range(-1.0f64..1.0)
            ));
        }
    }
    (rows, sizes)
}

/// Join rows into a file body
pub fn to_file_body(rows: &[String]) -> String {
    let mut body = rows.join("\n");
    body.push('\n');
    body
}

/// Every retained bin code of a dataset, row by row
pub fn bin_rows(dataset: &Dataset) -> Vec<Vec<BinIndex>> {
    dataset
        .to_bin_matrix()
        .outer_iter()
        .map(|row| row.to_vec())
        .collect()
}

/// Check the used feature map invariant
pub fn assert_feature_map_is_consistent(dataset: &Dataset) {
    let map = dataset.used_feature_map();
    assert_eq!(map.len(), dataset.num_total_features());
    let mut used: Vec<i32> = map.iter().copied().filter(|&i| i >= 0).collect();
    used.sort_unstable();
    let expected: Vec<i32> = (0..dataset.num_features() as i32).collect();
    assert_eq!(used, expected);
    for (raw, &inner) in map.iter().enumerate() {
        if inner >= 0 {
            assert_eq!(dataset.features()[inner as usize].feature_index(), raw);
        }
    }
}

/// Whether a snapshot exists next to `data`
pub fn snapshot_exists(data: &str, suffix: &str) -> bool {
    Path::new(&format!("{}.{}", data, suffix)).is_file()
}
