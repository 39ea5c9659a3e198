//! Bin mapper construction from a row sample.
//!
//! A single machine builds every column's mapper in parallel. Several
//! machines split the columns into contiguous blocks, build only their own
//! block, and exchange the fixed-size encodings in one all-gather so every
//! machine ends up with identical mappers without sharing raw values.

use crate::core::constants::SAMPLE_ZERO_THRESHOLD;
use crate::core::error::Result;
use crate::core::network::Network;
use crate::core::types::{CommSize, SparseRow};
use crate::dataset::bin_mapper::BinMapper;
use crate::io::parser::Parser;

use rayon::prelude::*;
use std::collections::BTreeSet;

/// Sampled non-zero values of every column, plus the sample size.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleValues {
    /// Non-zero values per column, post-label numbering
    pub columns: Vec<Vec<f64>>,
    /// Number of sampled rows
    pub num_rows: usize,
}

impl SampleValues {
    /// Parse sampled lines into per-column values.
    pub fn from_lines<S: AsRef<str>>(parser: &dyn Parser, lines: &[S]) -> Result<Self> {
        let mut columns: Vec<Vec<f64>> = Vec::new();
        let mut row: SparseRow = Vec::new();
        for line in lines {
            row.clear();
            parser.parse_one_line(line.as_ref(), &mut row)?;
            for &(idx, value) in &row {
                if idx >= columns.len() {
                    columns.resize_with(idx + 1, Vec::new);
                }
                if value.abs() > SAMPLE_ZERO_THRESHOLD {
                    columns[idx].push(value);
                }
            }
        }
        Ok(SampleValues {
            columns,
            num_rows: lines.len(),
        })
    }

    /// Widen to at least `num_columns` columns.
    pub fn pad_to(&mut self, num_columns: usize) {
        if self.columns.len() < num_columns {
            self.columns.resize_with(num_columns, Vec::new);
        }
    }

    /// Number of columns seen in the sample
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }
}

/// Build one mapper per column; `None` marks an ignored column.
///
/// With more than one machine this performs exactly one all-gather, so
/// every machine must call it with the same number of columns.
pub fn construct_bin_mappers(
    sample: &SampleValues,
    max_bin: usize,
    ignore: &BTreeSet<usize>,
    network: &Network,
) -> Result<Vec<Option<BinMapper>>> {
    if network.num_machines() <= 1 {
        return sample
            .columns
            .par_iter()
            .enumerate()
            .map(|(i, values)| {
                if ignore.contains(&i) {
                    Ok(None)
                } else {
                    BinMapper::find_bin(values, sample.num_rows, max_bin).map(Some)
                }
            })
            .collect();
    }

    let num_machines = network.num_machines();
    let rank = network.rank();
    let total = sample.num_columns();
    let step = total.div_ceil(num_machines).max(1);
    let type_size = BinMapper::size_for_specific_bin(max_bin);

    let mut block_start: Vec<CommSize> = Vec::with_capacity(num_machines);
    let mut block_len: Vec<CommSize> = Vec::with_capacity(num_machines);
    for i in 0..num_machines {
        let start = i.saturating_mul(step).min(total);
        let len = step.min(total - start);
        block_start.push(start * type_size);
        block_len.push(len * type_size);
    }

    let first_feature = block_start[rank] / type_size;
    let mut input = vec![0u8; block_len[rank]];
    input
        .par_chunks_mut(type_size)
        .enumerate()
        .try_for_each(|(i, buffer)| {
            let values = &sample.columns[first_feature + i];
            BinMapper::find_bin(values, sample.num_rows, max_bin)?.copy_to(buffer, max_bin)
        })?;
    log::debug!(
        "Rank {} built bin mappers for columns [{}, {})",
        rank,
        first_feature,
        first_feature + block_len[rank] / type_size
    );

    let output = network.allgather(&input, &block_start, &block_len, total * type_size)?;

    output
        .par_chunks(type_size)
        .enumerate()
        .map(|(i, buffer)| {
            if ignore.contains(&i) {
                Ok(None)
            } else {
                BinMapper::copy_from(buffer, max_bin).map(Some)
            }
        })
        .collect()
}
