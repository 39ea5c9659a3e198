//! Load a data file and print a summary of the resulting dataset.
//!
//! Usage: `lgbm-dataset <data> [valid=<file>] [output=<snapshot>] [key=value ...]`
//!
//! Every other `key=value` pair is a loader parameter such as `header=true`,
//! `label=name:target` or `two_round=true`.

use anyhow::{bail, Context, Result};
use lightgbm_ingest::{Dataset, DatasetLoader, IoConfig, Network};

fn summarize(name: &str, dataset: &Dataset) {
    println!(
        "{}: {} rows, {} of {} columns used, {} classes{}",
        name,
        dataset.num_data(),
        dataset.num_features(),
        dataset.num_total_features(),
        dataset.num_class(),
        if dataset.is_loading_from_binfile() {
            " (binary snapshot)"
        } else {
            ""
        }
    );
    for feature in dataset.features() {
        println!(
            "  {:<24} {:>6} bins  {}",
            dataset.feature_names()[feature.feature_index()],
            feature.num_bin(),
            if feature.is_sparse() { "sparse" } else { "dense" }
        );
    }
    let metadata = dataset.metadata();
    if metadata.weights().is_some() {
        println!("  weighted rows");
    }
    if metadata.num_queries() > 0 {
        println!("  {} queries", metadata.num_queries());
    }
    if metadata.init_score().is_some() {
        println!("  initial scores present");
    }
}

fn main() -> Result<()> {
    lightgbm_ingest::init();

    let mut args = std::env::args().skip(1);
    let Some(data) = args.next() else {
        bail!("usage: lgbm-dataset <data> [valid=<file>] [output=<snapshot>] [key=value ...]");
    };

    let mut valid = None;
    let mut output = None;
    let mut params = Vec::new();
    for arg in args {
        match arg.split_once('=') {
            Some(("valid", path)) | Some(("valid_data", path)) => valid = Some(path.to_string()),
            Some(("output", path)) => output = Some(path.to_string()),
            _ => params.push(arg),
        }
    }

    let config = IoConfig::from_args(&params).context("invalid loader parameters")?;
    let mut loader = DatasetLoader::new(config)?;

    let train = loader
        .load_from_file(&data, &Network::single_machine())
        .with_context(|| format!("failed to load {}", data))?;
    summarize(&data, &train);

    if let Some(path) = valid {
        let dataset = loader
            .load_from_file_align_with_other_dataset(&path, &train)
            .with_context(|| format!("failed to load {}", path))?;
        summarize(&path, &dataset);
    }

    if let Some(path) = output {
        train
            .save_binary_file(Some(&path))
            .with_context(|| format!("failed to write {}", path))?;
        println!("Saved binary snapshot to {}", path);
    }
    Ok(())
}
