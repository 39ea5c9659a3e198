//! Quantized feature columns.
//!
//! A [`Feature`] owns its bin mapper and a dense or sparse code buffer.
//! Rows are written in two phases: workers quantize values into their own
//! [`FeatureStaging`] buffers while the column is shared read-only, then the
//! owner absorbs every staging buffer and calls [`Feature::finish_load`].
//! Only values whose bin differs from the zero bin are staged.

use crate::core::constants::SPARSE_THRESHOLD;
use crate::core::error::{LightGBMError, Result};
use crate::core::types::{BinIndex, DataSize};
use crate::dataset::bin_mapper::BinMapper;
use crate::io::binary::{BinaryWriter, ByteReader};

use std::io;

/// Writes of one worker for one feature column.
#[derive(Debug, Clone, Default)]
pub struct FeatureStaging {
    values: Vec<(DataSize, BinIndex)>,
}

impl FeatureStaging {
    /// Number of staged writes
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether nothing was staged
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
enum DenseCodes {
    Narrow(Vec<u8>),
    Wide(Vec<u16>),
}

/// Column storage of bin codes.
#[derive(Debug, Clone, PartialEq)]
pub enum BinStorage {
    /// One code per row
    Dense(DenseBin),
    /// Codes of non-default rows only
    Sparse(SparseBin),
}

/// Dense code buffer, one byte per row when the bins fit.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseBin {
    codes: DenseCodes,
}

impl DenseBin {
    fn new(num_data: usize, num_bin: usize, default_bin: BinIndex) -> Self {
        let codes = if num_bin <= 256 {
            DenseCodes::Narrow(vec![default_bin as u8; num_data])
        } else {
            DenseCodes::Wide(vec![default_bin as u16; num_data])
        };
        DenseBin { codes }
    }

    fn set(&mut self, row: usize, bin: BinIndex) {
        match &mut self.codes {
            DenseCodes::Narrow(codes) => codes[row] = bin as u8,
            DenseCodes::Wide(codes) => codes[row] = bin as u16,
        }
    }

    fn get(&self, row: usize) -> BinIndex {
        match &self.codes {
            DenseCodes::Narrow(codes) => codes[row] as BinIndex,
            DenseCodes::Wide(codes) => codes[row] as BinIndex,
        }
    }

    fn len(&self) -> usize {
        match &self.codes {
            DenseCodes::Narrow(codes) => codes.len(),
            DenseCodes::Wide(codes) => codes.len(),
        }
    }
}

/// Sorted `(row, code)` pairs; absent rows hold the default bin.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseBin {
    default_bin: BinIndex,
    rows: Vec<DataSize>,
    bins: Vec<u16>,
    pending: Vec<(DataSize, BinIndex)>,
}

impl SparseBin {
    fn new(default_bin: BinIndex) -> Self {
        SparseBin {
            default_bin,
            rows: Vec::new(),
            bins: Vec::new(),
            pending: Vec::new(),
        }
    }

    fn get(&self, row: usize) -> BinIndex {
        match self.rows.binary_search(&(row as DataSize)) {
            Ok(pos) => self.bins[pos] as BinIndex,
            Err(_) => self.default_bin,
        }
    }

    /// Number of rows that do not hold the default bin
    pub fn num_vals(&self) -> usize {
        self.rows.len()
    }

    fn finish_load(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let mut pending: Vec<(DataSize, BinIndex)> = self
            .rows
            .drain(..)
            .zip(self.bins.drain(..).map(BinIndex::from))
            .collect();
        pending.append(&mut self.pending);
        // stable: later writes to the same row stay behind earlier ones
        pending.sort_by_key(|&(row, _)| row);

        for (row, bin) in pending {
            if self.rows.last() == Some(&row) {
                if let Some(last) = self.bins.last_mut() {
                    *last = bin as u16;
                }
                continue;
            }
            self.rows.push(row);
            self.bins.push(bin as u16);
        }
        // an overwrite may have restored the default bin
        let default_bin = self.default_bin as u16;
        let mut keep = self.bins.iter().map(|&b| b != default_bin);
        self.rows.retain(|_| keep.next().unwrap_or(false));
        self.bins.retain(|&b| b != default_bin);
    }
}

/// One quantized feature column.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    feature_index: usize,
    bin_mapper: BinMapper,
    num_data: DataSize,
    storage: BinStorage,
}

impl Feature {
    /// Allocate a column for `num_data` rows; every row starts in the zero bin.
    pub fn new(
        feature_index: usize,
        bin_mapper: BinMapper,
        num_data: DataSize,
        is_enable_sparse: bool,
    ) -> Self {
        let rows = num_data.max(0) as usize;
        let is_sparse = is_enable_sparse && bin_mapper.sparse_rate() >= SPARSE_THRESHOLD;
        let storage = if is_sparse {
            BinStorage::Sparse(SparseBin::new(bin_mapper.default_bin()))
        } else {
            BinStorage::Dense(DenseBin::new(
                rows,
                bin_mapper.num_bin(),
                bin_mapper.default_bin(),
            ))
        };
        Feature {
            feature_index,
            bin_mapper,
            num_data,
            storage,
        }
    }

    /// Quantize `value` for `row` into a worker's staging buffer.
    pub fn push_into(&self, staging: &mut FeatureStaging, row: DataSize, value: f64) {
        let bin = self.bin_mapper.value_to_bin(value);
        if bin != self.bin_mapper.default_bin() {
            staging.values.push((row, bin));
        }
    }

    /// Merge one worker's staged writes.
    pub fn absorb(&mut self, staging: FeatureStaging) -> Result<()> {
        if let Some(&(row, _)) = staging
            .values
            .iter()
            .find(|&&(row, _)| row < 0 || row >= self.num_data)
        {
            return Err(LightGBMError::internal(format!(
                "Row {} is outside feature column of {} rows",
                row, self.num_data
            )));
        }
        match &mut self.storage {
            BinStorage::Dense(dense) => {
                for (row, bin) in staging.values {
                    dense.set(row as usize, bin);
                }
            }
            BinStorage::Sparse(sparse) => sparse.pending.extend(staging.values),
        }
        Ok(())
    }

    /// Compact staged writes. Must run after every worker has been absorbed.
    pub fn finish_load(&mut self) {
        if let BinStorage::Sparse(sparse) = &mut self.storage {
            sparse.finish_load();
        }
    }

    /// Bin code of `row`
    pub fn bin_at(&self, row: usize) -> BinIndex {
        match &self.storage {
            BinStorage::Dense(dense) => dense.get(row),
            BinStorage::Sparse(sparse) => sparse.get(row),
        }
    }

    /// Raw column index of this feature
    pub fn feature_index(&self) -> usize {
        self.feature_index
    }

    /// The column's bin mapper
    pub fn bin_mapper(&self) -> &BinMapper {
        &self.bin_mapper
    }

    /// Number of bins
    pub fn num_bin(&self) -> usize {
        self.bin_mapper.num_bin()
    }

    /// Number of rows
    pub fn num_data(&self) -> DataSize {
        self.num_data
    }

    /// Whether codes are stored sparsely
    pub fn is_sparse(&self) -> bool {
        matches!(self.storage, BinStorage::Sparse(_))
    }

    /// Size of the serialized column
    pub fn sizes_in_byte(&self) -> usize {
        let storage = match &self.storage {
            BinStorage::Dense(dense) => {
                let width = match dense.codes {
                    DenseCodes::Narrow(_) => 1,
                    DenseCodes::Wide(_) => 2,
                };
                1 + width * dense.len()
            }
            BinStorage::Sparse(sparse) => 8 + sparse.num_vals() * (4 + 2),
        };
        4 + 1 + self.bin_mapper.sizes_in_byte() + 4 + storage
    }

    /// Serialize the column
    pub fn save_binary<W: BinaryWriter + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u32(self.feature_index as u32)?;
        writer.write_u8(u8::from(self.is_sparse()))?;
        self.bin_mapper.save_binary(writer)?;
        writer.write_i32(self.num_data)?;
        match &self.storage {
            BinStorage::Dense(dense) => match &dense.codes {
                DenseCodes::Narrow(codes) => {
                    writer.write_u8(1)?;
                    writer.write_bytes(codes)?;
                }
                DenseCodes::Wide(codes) => {
                    writer.write_u8(2)?;
                    for &code in codes {
                        writer.write_bytes(&code.to_le_bytes())?;
                    }
                }
            },
            BinStorage::Sparse(sparse) => {
                writer.write_u64(sparse.num_vals() as u64)?;
                for &row in &sparse.rows {
                    writer.write_i32(row)?;
                }
                for &bin in &sparse.bins {
                    writer.write_bytes(&bin.to_le_bytes())?;
                }
            }
        }
        Ok(())
    }

    /// Rebuild a column from its serialized form.
    ///
    /// The payload must hold `num_global_data` rows. With a non-empty
    /// `used_indices` (ascending global rows) only those rows are kept.
    pub fn load_binary(
        buffer: &[u8],
        num_global_data: DataSize,
        used_indices: &[DataSize],
    ) -> Result<Self> {
        let mut reader = ByteReader::new(buffer, "feature");
        let feature_index = reader.read_u32()? as usize;
        let is_sparse = reader.read_u8()? != 0;
        let bin_mapper = BinMapper::load_binary(&mut reader)?;
        let stored_num_data = reader.read_i32()?;
        if stored_num_data != num_global_data {
            return Err(LightGBMError::format(format!(
                "Binary file error: feature {} holds {} rows but the header declares {}",
                feature_index, stored_num_data, num_global_data
            )));
        }
        let num_data = if used_indices.is_empty() {
            num_global_data
        } else {
            used_indices.len() as DataSize
        };
        let storage = if is_sparse {
            let num_vals = reader.read_count(4 + 2)?;
            let rows = (0..num_vals)
                .map(|_| reader.read_i32())
                .collect::<Result<Vec<_>>>()?;
            let bins = (0..num_vals)
                .map(|_| reader.read_bytes(2).map(|b| u16::from_le_bytes([b[0], b[1]])))
                .collect::<Result<Vec<_>>>()?;
            let mut sparse = SparseBin::new(bin_mapper.default_bin());
            if used_indices.is_empty() {
                sparse.rows = rows;
                sparse.bins = bins;
            } else {
                // both lists are ascending: walk them together
                let mut j = 0;
                for (local, &global) in used_indices.iter().enumerate() {
                    while j < rows.len() && rows[j] < global {
                        j += 1;
                    }
                    if j < rows.len() && rows[j] == global {
                        sparse.rows.push(local as DataSize);
                        sparse.bins.push(bins[j]);
                    }
                }
            }
            BinStorage::Sparse(sparse)
        } else {
            let width = reader.read_u8()?;
            let total = num_global_data.max(0) as usize;
            let codes = match width {
                1 => {
                    let codes = reader.read_bytes(total)?;
                    DenseCodes::Narrow(select_rows(codes, used_indices))
                }
                2 => {
                    let bytes = reader.read_bytes(total * 2)?;
                    let codes: Vec<u16> = bytes
                        .chunks_exact(2)
                        .map(|b| u16::from_le_bytes([b[0], b[1]]))
                        .collect();
                    DenseCodes::Wide(select_rows(&codes, used_indices))
                }
                other => {
                    return Err(LightGBMError::format(format!(
                        "Binary file error: feature {} has unknown code width {}",
                        feature_index, other
                    )))
                }
            };
            BinStorage::Dense(DenseBin { codes })
        };
        reader.finish()?;
        Ok(Feature {
            feature_index,
            bin_mapper,
            num_data,
            storage,
        })
    }
}

fn select_rows<T: Copy>(codes: &[T], used_indices: &[DataSize]) -> Vec<T> {
    if used_indices.is_empty() {
        codes.to_vec()
    } else {
        used_indices.iter().map(|&i| codes[i as usize]).collect()
    }
}
