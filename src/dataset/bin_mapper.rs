//! # Bin Mapper
//!
//! Quantization table of one numerical feature. Boundaries are found from a
//! value sample: when the sample has at most `max_bin` distinct values every
//! value gets its own bin (boundaries at midpoints), otherwise bins are cut
//! greedily so that each holds roughly the same number of samples.
//!
//! Two encodings exist. The fixed-size one reserves room for `max_bin`
//! boundaries so that every machine of a distributed job can exchange
//! mappers as equally sized blocks; the variable-size one is used inside
//! binary snapshots.

use crate::core::constants::EPSILON;
use crate::core::error::{LightGBMError, Result};
use crate::core::types::BinIndex;
use crate::io::binary::{BinaryWriter, ByteReader};

use std::io;

const FIXED_HEADER_SIZE: usize = 4 + 1 + 8 + 4;

/// Maps raw feature values to bin indices.
#[derive(Debug, Clone, PartialEq)]
pub struct BinMapper {
    num_bin: usize,
    bin_upper_bound: Vec<f64>,
    is_trivial: bool,
    sparse_rate: f64,
    default_bin: BinIndex,
}

impl BinMapper {
    /// A trivial single-bin mapper.
    pub fn new() -> Self {
        BinMapper {
            num_bin: 1,
            bin_upper_bound: vec![f64::INFINITY],
            is_trivial: true,
            sparse_rate: 1.0,
            default_bin: 0,
        }
    }

    /// Build a mapper from sampled values.
    ///
    /// `values` holds the non-zero sampled values of the feature; the
    /// remaining `total_sample_cnt - values.len()` samples are zeros.
    pub fn find_bin(values: &[f64], total_sample_cnt: usize, max_bin: usize) -> Result<Self> {
        if max_bin < 2 {
            return Err(LightGBMError::invalid_parameter(
                "max_bin",
                max_bin.to_string(),
                "must be at least 2",
            ));
        }

        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        sorted.sort_by(f64::total_cmp);
        let total_cnt = total_sample_cnt.max(sorted.len());
        let zero_cnt = total_cnt - sorted.len();

        let (distinct_values, counts) = distinct_with_zero(&sorted, zero_cnt);
        if distinct_values.is_empty() {
            return Ok(Self::new());
        }

        let bin_upper_bound = greedy_find_bin(&distinct_values, &counts, max_bin, total_cnt);
        let mut mapper = BinMapper {
            num_bin: bin_upper_bound.len(),
            bin_upper_bound,
            is_trivial: false,
            sparse_rate: 0.0,
            default_bin: 0,
        };
        mapper.is_trivial = mapper.num_bin <= 1;
        mapper.default_bin = mapper.value_to_bin(0.0);

        let mut cnt_in_bin = vec![0usize; mapper.num_bin];
        for (&value, &count) in distinct_values.iter().zip(&counts) {
            cnt_in_bin[mapper.value_to_bin(value) as usize] += count;
        }
        mapper.sparse_rate = if total_cnt == 0 {
            1.0
        } else {
            cnt_in_bin[mapper.default_bin as usize] as f64 / total_cnt as f64
        };

        Ok(mapper)
    }

    /// Convert a feature value to its bin; NaN falls into the zero bin.
    pub fn value_to_bin(&self, value: f64) -> BinIndex {
        if value.is_nan() {
            return self.default_bin;
        }
        let last = self.num_bin - 1;
        let bin = self.bin_upper_bound[..last].partition_point(|&upper| upper < value);
        bin as BinIndex
    }

    /// Number of bins
    pub fn num_bin(&self) -> usize {
        self.num_bin
    }

    /// Whether the feature only has one bin and carries no information
    pub fn is_trivial(&self) -> bool {
        self.is_trivial
    }

    /// Share of sampled rows that fall into the zero bin
    pub fn sparse_rate(&self) -> f64 {
        self.sparse_rate
    }

    /// Bin of the value zero
    pub fn default_bin(&self) -> BinIndex {
        self.default_bin
    }

    /// Upper bound of every bin; the last one is infinite
    pub fn bin_upper_bound(&self) -> &[f64] {
        &self.bin_upper_bound
    }

    /// Whether two mappers quantize identically
    pub fn check_align(&self, other: &BinMapper) -> bool {
        self.num_bin == other.num_bin
            && self.default_bin == other.default_bin
            && self
                .bin_upper_bound
                .iter()
                .zip(&other.bin_upper_bound)
                .all(|(a, b)| a.to_bits() == b.to_bits())
    }

    /// Size of the fixed-size encoding for mappers built with `max_bin`.
    pub fn size_for_specific_bin(max_bin: usize) -> usize {
        FIXED_HEADER_SIZE + max_bin * std::mem::size_of::<f64>()
    }

    /// Write the fixed-size encoding into `buffer`, which must be exactly
    /// `size_for_specific_bin(max_bin)` bytes long.
    pub fn copy_to(&self, buffer: &mut [u8], max_bin: usize) -> Result<()> {
        let size = Self::size_for_specific_bin(max_bin);
        if buffer.len() != size || self.num_bin > max_bin {
            return Err(LightGBMError::internal(format!(
                "Bin mapper with {} bins does not fit a {} byte slot for max_bin {}",
                self.num_bin,
                buffer.len(),
                max_bin
            )));
        }
        let mut bytes = Vec::with_capacity(size);
        self.write_fields(&mut bytes)?;
        bytes.resize(size, 0);
        buffer.copy_from_slice(&bytes);
        Ok(())
    }

    /// Decode the fixed-size encoding written by [`copy_to`](Self::copy_to).
    pub fn copy_from(buffer: &[u8], max_bin: usize) -> Result<Self> {
        let mut reader = ByteReader::new(buffer, "bin mapper block");
        let mapper = Self::read_fields(&mut reader)?;
        if mapper.num_bin > max_bin {
            return Err(LightGBMError::format(format!(
                "Bin mapper block declares {} bins, more than max_bin {}",
                mapper.num_bin, max_bin
            )));
        }
        Ok(mapper)
    }

    /// Size of the variable-size encoding
    pub fn sizes_in_byte(&self) -> usize {
        FIXED_HEADER_SIZE + self.num_bin * std::mem::size_of::<f64>()
    }

    /// Write the variable-size encoding
    pub fn save_binary<W: BinaryWriter + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        self.write_fields(writer)
    }

    /// Read the variable-size encoding
    pub fn load_binary(reader: &mut ByteReader<'_>) -> Result<Self> {
        Self::read_fields(reader)
    }

    fn write_fields<W: BinaryWriter + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u32(self.num_bin as u32)?;
        writer.write_u8(u8::from(self.is_trivial))?;
        writer.write_f64(self.sparse_rate)?;
        writer.write_u32(self.default_bin)?;
        for &bound in &self.bin_upper_bound {
            writer.write_f64(bound)?;
        }
        Ok(())
    }

    fn read_fields(reader: &mut ByteReader<'_>) -> Result<Self> {
        let num_bin = reader.read_u32()? as usize;
        let is_trivial = reader.read_u8()? != 0;
        let sparse_rate = reader.read_f64()?;
        let default_bin = reader.read_u32()?;
        if num_bin == 0 || default_bin as usize >= num_bin {
            return Err(LightGBMError::format(format!(
                "Binary file error: bin mapper has {} bins and default bin {}",
                num_bin, default_bin
            )));
        }
        if num_bin * std::mem::size_of::<f64>() > reader.remaining() {
            return Err(LightGBMError::format(format!(
                "Binary file error: bin mapper declares {} bins but only {} bytes remain",
                num_bin,
                reader.remaining()
            )));
        }
        let bin_upper_bound = (0..num_bin)
            .map(|_| reader.read_f64())
            .collect::<Result<Vec<_>>>()?;
        Ok(BinMapper {
            num_bin,
            bin_upper_bound,
            is_trivial,
            sparse_rate,
            default_bin,
        })
    }
}

impl Default for BinMapper {
    fn default() -> Self {
        Self::new()
    }
}

/// Distinct sorted values and their counts, with `zero_cnt` implied zeros merged in.
fn distinct_with_zero(sorted: &[f64], zero_cnt: usize) -> (Vec<f64>, Vec<usize>) {
    let mut distinct_values: Vec<f64> = Vec::new();
    let mut counts: Vec<usize> = Vec::new();
    let mut zero_pending = zero_cnt > 0;

    for &value in sorted {
        if zero_pending && value >= 0.0 {
            distinct_values.push(0.0);
            counts.push(zero_cnt);
            zero_pending = false;
        }
        match distinct_values.last() {
            Some(&last) if last == value => {
                if let Some(count) = counts.last_mut() {
                    *count += 1;
                }
            }
            _ => {
                distinct_values.push(value);
                counts.push(1);
            }
        }
    }
    if zero_pending {
        distinct_values.push(0.0);
        counts.push(zero_cnt);
    }
    (distinct_values, counts)
}

/// Find bin upper bounds; equal-frequency greedy cut when values outnumber bins.
pub fn greedy_find_bin(
    distinct_values: &[f64],
    counts: &[usize],
    max_bin: usize,
    total_cnt: usize,
) -> Vec<f64> {
    let num_distinct_values = distinct_values.len();
    let mut bin_upper_bound = Vec::new();

    if num_distinct_values <= max_bin {
        for i in 0..num_distinct_values.saturating_sub(1) {
            let val = (distinct_values[i] + distinct_values[i + 1]) / 2.0;
            push_bound(&mut bin_upper_bound, val);
        }
        bin_upper_bound.push(f64::INFINITY);
        return bin_upper_bound;
    }

    let mean_bin_size = total_cnt as f64 / max_bin as f64;
    let mut rest_bin_cnt = max_bin as i64;
    let mut rest_sample_cnt = total_cnt as i64;
    let mut is_big_count_value = vec![false; num_distinct_values];
    for i in 0..num_distinct_values {
        if counts[i] as f64 >= mean_bin_size {
            is_big_count_value[i] = true;
            rest_bin_cnt -= 1;
            rest_sample_cnt -= counts[i] as i64;
        }
    }
    let mut mean_bin_size = rest_sample_cnt as f64 / rest_bin_cnt as f64;
    let mut upper_bounds = vec![f64::INFINITY; max_bin];
    let mut lower_bounds = vec![f64::INFINITY; max_bin];

    let mut bin_cnt = 0;
    lower_bounds[bin_cnt] = distinct_values[0];
    let mut cur_cnt_inbin = 0usize;
    for i in 0..num_distinct_values - 1 {
        if !is_big_count_value[i] {
            rest_sample_cnt -= counts[i] as i64;
        }
        cur_cnt_inbin += counts[i];
        // need a new bin
        if is_big_count_value[i]
            || cur_cnt_inbin as f64 >= mean_bin_size
            || (is_big_count_value[i + 1] && cur_cnt_inbin as f64 >= mean_bin_size * 0.5)
        {
            upper_bounds[bin_cnt] = distinct_values[i];
            bin_cnt += 1;
            lower_bounds[bin_cnt] = distinct_values[i + 1];
            if bin_cnt >= max_bin - 1 {
                break;
            }
            cur_cnt_inbin = 0;
            if !is_big_count_value[i] {
                rest_bin_cnt -= 1;
                mean_bin_size = rest_sample_cnt as f64 / rest_bin_cnt as f64;
            }
        }
    }
    bin_cnt += 1;

    for i in 0..bin_cnt - 1 {
        let val = (upper_bounds[i] + lower_bounds[i + 1]) / 2.0;
        push_bound(&mut bin_upper_bound, val);
    }
    bin_upper_bound.push(f64::INFINITY);
    bin_upper_bound
}

fn push_bound(bounds: &mut Vec<f64>, val: f64) {
    match bounds.last() {
        Some(&last) if (last - val).abs() < EPSILON => {}
        _ => bounds.push(val),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_bin_mapper_creation() {
        let mapper = BinMapper::new();
        assert_eq!(mapper.num_bin(), 1);
        assert!(mapper.is_trivial());
        assert_eq!(mapper.value_to_bin(42.0), 0);
    }

    #[test]
    fn test_find_bin_with_implied_zeros() {
        // values {0, 3, 3}: the zero is implied by the sample size
        let mapper = BinMapper::find_bin(&[3.0, 3.0], 3, 255).unwrap();
        assert_eq!(mapper.num_bin(), 2);
        assert!(!mapper.is_trivial());
        assert_abs_diff_eq!(mapper.bin_upper_bound()[0], 1.5);
        assert_eq!(mapper.default_bin(), 0);
        assert_eq!(mapper.value_to_bin(0.0), 0);
        assert_eq!(mapper.value_to_bin(3.0), 1);
        assert_abs_diff_eq!(mapper.sparse_rate(), 1.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_constant_feature_is_trivial() {
        let mapper = BinMapper::find_bin(&[5.0, 5.0, 5.0], 3, 255).unwrap();
        assert!(mapper.is_trivial());
        assert_eq!(mapper.num_bin(), 1);

        let all_zero = BinMapper::find_bin(&[], 10, 255).unwrap();
        assert!(all_zero.is_trivial());
    }

    #[test]
    fn test_negative_values_and_zero_bin() {
        let mapper = BinMapper::find_bin(&[-2.0, -1.0, 1.0, 2.0], 6, 255).unwrap();
        assert_eq!(mapper.num_bin(), 5);
        assert_eq!(mapper.default_bin(), 2);
        assert_eq!(mapper.value_to_bin(-5.0), 0);
        assert_eq!(mapper.value_to_bin(f64::NAN), 2);
        assert_eq!(mapper.value_to_bin(100.0), 4);
    }

    #[test]
    fn test_greedy_respects_max_bin() {
        let values: Vec<f64> = (1..=1000).map(|v| v as f64).collect();
        let mapper = BinMapper::find_bin(&values, 1000, 16).unwrap();
        assert!(mapper.num_bin() <= 16);
        assert!(mapper.num_bin() > 1);
        assert_eq!(*mapper.bin_upper_bound().last().unwrap(), f64::INFINITY);
        assert!(mapper
            .bin_upper_bound()
            .windows(2)
            .all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_greedy_find_bin_big_counts() {
        let distinct_values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let counts = vec![10, 20, 30, 20, 10];
        let result = greedy_find_bin(&distinct_values, &counts, 3, 90);
        assert!(result.len() <= 3);
        assert_eq!(*result.last().unwrap(), f64::INFINITY);
    }

    #[test]
    fn test_fixed_size_encoding() {
        let mapper = BinMapper::find_bin(&[1.0, 2.0, 3.0], 5, 8).unwrap();
        let size = BinMapper::size_for_specific_bin(8);
        let mut buffer = vec![0u8; size];
        mapper.copy_to(&mut buffer, 8).unwrap();
        let decoded = BinMapper::copy_from(&buffer, 8).unwrap();
        assert_eq!(decoded, mapper);
        assert!(decoded.check_align(&mapper));

        let mut short = vec![0u8; size - 1];
        assert!(mapper.copy_to(&mut short, 8).is_err());
    }

    #[test]
    fn test_variable_size_encoding() {
        let mapper = BinMapper::find_bin(&[1.0, 2.0], 4, 255).unwrap();
        let mut bytes = Vec::new();
        mapper.save_binary(&mut bytes).unwrap();
        assert_eq!(bytes.len(), mapper.sizes_in_byte());

        let mut reader = ByteReader::new(&bytes, "mapper");
        assert_eq!(BinMapper::load_binary(&mut reader).unwrap(), mapper);

        let mut reader = ByteReader::new(&bytes[..bytes.len() - 1], "mapper");
        assert!(BinMapper::load_binary(&mut reader).is_err());
    }

    #[test]
    fn test_rejects_invalid_max_bin() {
        assert!(BinMapper::find_bin(&[1.0], 1, 1).is_err());
    }
}
