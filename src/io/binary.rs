/*!
 * Copyright (c) 2022 Microsoft Corporation. All rights reserved.
 * Licensed under the MIT License. See LICENSE file in the project root for license information.
 */

//! Little-endian binary encoding helpers.
//!
//! [`BinaryWriter`] appends fixed-width fields to any `io::Write` sink.
//! [`ByteReader`] walks a byte slice, checking every read against the bytes
//! that remain and reporting a format error instead of reading past the end.

use crate::core::error::{LightGBMError, Result};
use std::io;

/// An interface for serializing binary data
pub trait BinaryWriter {
    /// Append raw bytes
    fn write_bytes(&mut self, data: &[u8]) -> io::Result<()>;

    /// Append a `u8`
    fn write_u8(&mut self, value: u8) -> io::Result<()> {
        self.write_bytes(&[value])
    }

    /// Append a little-endian `i32`
    fn write_i32(&mut self, value: i32) -> io::Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Append a little-endian `u32`
    fn write_u32(&mut self, value: u32) -> io::Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Append a little-endian `u64`
    fn write_u64(&mut self, value: u64) -> io::Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Append a little-endian `f32`
    fn write_f32(&mut self, value: f32) -> io::Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Append a little-endian `f64`
    fn write_f64(&mut self, value: f64) -> io::Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }
}

impl<W: io::Write + ?Sized> BinaryWriter for W {
    fn write_bytes(&mut self, data: &[u8]) -> io::Result<()> {
        self.write_all(data)
    }
}

/// Bounds-checked cursor over an encoded buffer.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    buffer: &'a [u8],
    position: usize,
    context: &'static str,
}

impl<'a> ByteReader<'a> {
    /// Start reading `buffer`; `context` names the segment in error messages.
    pub fn new(buffer: &'a [u8], context: &'static str) -> Self {
        ByteReader {
            buffer,
            position: 0,
            context,
        }
    }

    /// Bytes consumed so far
    pub fn position(&self) -> usize {
        self.position
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.position
    }

    /// Take the next `len` bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(LightGBMError::format(format!(
                "Binary file error: {} is truncated, needs {} bytes at offset {} but only {} remain",
                self.context,
                len,
                self.position,
                self.remaining()
            )));
        }
        let bytes = &self.buffer[self.position..self.position + len];
        self.position += len;
        Ok(bytes)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut array = [0u8; N];
        array.copy_from_slice(self.read_bytes(N)?);
        Ok(array)
    }

    /// Read a `u8`
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Read a little-endian `i32`
    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    /// Read a little-endian `u32`
    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    /// Read a little-endian `u64`
    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    /// Read a little-endian `f32`
    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.read_array()?))
    }

    /// Read a little-endian `f64`
    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.read_array()?))
    }

    /// Read a count and check that `count * element_size` bytes can follow.
    pub fn read_count(&mut self, element_size: usize) -> Result<usize> {
        let count = self.read_u64()?;
        let count = usize::try_from(count).map_err(|_| self.too_large(count))?;
        match count.checked_mul(element_size) {
            Some(bytes) if bytes <= self.remaining() => Ok(count),
            _ => Err(self.too_large(count as u64)),
        }
    }

    /// Read a non-negative `i32` used as a length or count.
    pub fn read_len_i32(&mut self) -> Result<usize> {
        let value = self.read_i32()?;
        usize::try_from(value).map_err(|_| {
            LightGBMError::format(format!(
                "Binary file error: {} holds a negative length {}",
                self.context, value
            ))
        })
    }

    /// Fail unless every byte was consumed.
    pub fn finish(&self) -> Result<()> {
        if self.remaining() != 0 {
            return Err(LightGBMError::format(format!(
                "Binary file error: {} has {} unexpected trailing bytes",
                self.context,
                self.remaining()
            )));
        }
        Ok(())
    }

    fn too_large(&self, count: u64) -> LightGBMError {
        LightGBMError::format(format!(
            "Binary file error: {} declares {} elements but only {} bytes remain",
            self.context,
            count,
            self.remaining()
        ))
    }
}
