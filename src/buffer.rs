// Copyright 2015, Paul Osborne <osbpau@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/license/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option.  This file may not be copied, modified, or distributed
// except according to those terms.

use crate::error::ValidationError;
use std::convert::TryFrom;

/// As specified in SMBus standard
pub const I2C_SMBUS_BLOCK_MAX: usize = 32;

fn to_byte<V: Into<i64>>(value: V) -> Result<u8, ValidationError> {
    let value = value.into();
    u8::try_from(value).map_err(|_| ValidationError::ByteValue(value))
}

/// Fixed length sequence of bytes used as the payload of a message
///
/// The length is chosen at construction and never changes.  For messages
/// flagged `READ` the kernel writes the received bytes straight into the
/// buffer's storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct I2CBuffer {
    bytes: Box<[u8]>,
}

impl I2CBuffer {
    /// Allocate a zeroed buffer of `length` bytes
    pub fn new(length: usize) -> I2CBuffer {
        I2CBuffer {
            bytes: vec![0; length].into_boxed_slice(),
        }
    }

    pub fn from_slice(bytes: &[u8]) -> I2CBuffer {
        I2CBuffer {
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Byte at `index`
    pub fn get(&self, index: usize) -> Result<u8, ValidationError> {
        self.bytes
            .get(index)
            .cloned()
            .ok_or(ValidationError::Index {
                index,
                length: self.len(),
            })
    }

    /// Store `value` at `index`
    ///
    /// Values outside of 0..=255 are rejected rather than truncated.
    /// Returns the buffer so that calls can be chained.
    pub fn set<V: Into<i64>>(&mut self, index: usize, value: V) -> Result<&mut I2CBuffer, ValidationError> {
        let byte = to_byte(value)?;
        let length = self.len();
        let slot = self
            .bytes
            .get_mut(index)
            .ok_or(ValidationError::Index { index, length })?;
        *slot = byte;
        Ok(self)
    }

    /// Set every byte of the buffer to `value`
    pub fn fill(&mut self, value: u8) {
        for b in self.bytes.iter_mut() {
            *b = value;
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

impl From<Vec<u8>> for I2CBuffer {
    fn from(bytes: Vec<u8>) -> I2CBuffer {
        I2CBuffer {
            bytes: bytes.into_boxed_slice(),
        }
    }
}

impl AsRef<[u8]> for I2CBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

/// Payload of an SMBus block transfer
///
/// Holds up to 32 bytes along with the number of bytes currently in use.
/// Writing past the current length grows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct I2CBlock {
    bytes: [u8; I2C_SMBUS_BLOCK_MAX],
    length: usize,
}

impl Default for I2CBlock {
    fn default() -> I2CBlock {
        I2CBlock::new()
    }
}

impl I2CBlock {
    pub fn new() -> I2CBlock {
        I2CBlock {
            bytes: [0; I2C_SMBUS_BLOCK_MAX],
            length: 0,
        }
    }

    pub fn from_slice(values: &[u8]) -> Result<I2CBlock, ValidationError> {
        if values.len() > I2C_SMBUS_BLOCK_MAX {
            return Err(ValidationError::BlockLength(values.len()));
        }
        let mut block = I2CBlock::new();
        block.bytes[..values.len()].copy_from_slice(values);
        block.length = values.len();
        Ok(block)
    }

    pub fn capacity(&self) -> usize {
        I2C_SMBUS_BLOCK_MAX
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Forget the content of the block, its length drops to 0
    pub fn clear(&mut self) {
        self.bytes = [0; I2C_SMBUS_BLOCK_MAX];
        self.length = 0;
    }

    /// Change the number of bytes in use, new bytes read as 0
    ///
    /// Growing beyond the 32 byte capacity fails like `set` past the end.
    pub fn set_len(&mut self, length: usize) -> Result<(), ValidationError> {
        if length > I2C_SMBUS_BLOCK_MAX {
            return Err(ValidationError::Capacity {
                index: length - 1,
                capacity: I2C_SMBUS_BLOCK_MAX,
            });
        }
        for b in self.bytes[length..].iter_mut() {
            *b = 0;
        }
        self.length = length;
        Ok(())
    }

    pub fn get(&self, index: usize) -> Result<u8, ValidationError> {
        if index >= self.length {
            return Err(ValidationError::Index {
                index,
                length: self.length,
            });
        }
        Ok(self.bytes[index])
    }

    /// Store `value` at `index`, growing the length up to `index + 1`
    pub fn set<V: Into<i64>>(&mut self, index: usize, value: V) -> Result<&mut I2CBlock, ValidationError> {
        let byte = to_byte(value)?;
        if index >= I2C_SMBUS_BLOCK_MAX {
            return Err(ValidationError::Capacity {
                index,
                capacity: I2C_SMBUS_BLOCK_MAX,
            });
        }
        self.bytes[index] = byte;
        if index >= self.length {
            self.length = index + 1;
        }
        Ok(self)
    }

    /// The bytes in use
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.length]
    }

    /// Replace the content with `values`, used when decoding a transfer
    pub(crate) fn load(&mut self, values: &[u8]) -> Result<(), ValidationError> {
        if values.len() > I2C_SMBUS_BLOCK_MAX {
            return Err(ValidationError::BlockLength(values.len()));
        }
        self.clear();
        self.bytes[..values.len()].copy_from_slice(values);
        self.length = values.len();
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_buffer_set_get_every_value() {
        for &n in [1usize, 2, 7, 64].iter() {
            let mut buffer = I2CBuffer::new(n);
            for i in 0..n {
                for v in 0..=255u8 {
                    buffer.set(i, v).unwrap();
                    assert_eq!(buffer.get(i), Ok(v));
                }
            }
        }
    }

    #[test]
    fn test_buffer_starts_zeroed() {
        let buffer = I2CBuffer::new(4);
        assert_eq!(buffer.as_slice(), &[0, 0, 0, 0]);
    }

    #[test]
    fn test_buffer_rejects_non_bytes() {
        let mut buffer = I2CBuffer::new(3);
        for i in 0..3 {
            assert_eq!(buffer.set(i, 256).unwrap_err(), ValidationError::ByteValue(256));
            assert_eq!(buffer.set(i, -1).unwrap_err(), ValidationError::ByteValue(-1));
        }
        // out of range values are reported even at invalid positions
        assert_eq!(buffer.set(10, 300).unwrap_err(), ValidationError::ByteValue(300));
        assert_eq!(buffer.as_slice(), &[0, 0, 0]);
    }

    #[test]
    fn test_buffer_bounds() {
        let mut buffer = I2CBuffer::new(2);
        assert_eq!(
            buffer.get(2),
            Err(ValidationError::Index { index: 2, length: 2 })
        );
        assert_eq!(
            buffer.set(5, 1).unwrap_err(),
            ValidationError::Index { index: 5, length: 2 }
        );
    }

    #[test]
    fn test_buffer_chaining() {
        let mut buffer = I2CBuffer::new(2);
        buffer.set(0, 2).unwrap().set(1, 246).unwrap();
        assert_eq!(buffer.as_slice(), &[2, 246]);
    }

    #[test]
    fn test_block_set_grows_length() {
        let mut block = I2CBlock::new();
        assert!(block.is_empty());
        block.set(3, 9).unwrap();
        assert_eq!(block.len(), 4);
        assert_eq!(block.as_slice(), &[0, 0, 0, 9]);
        block.set(1, 5).unwrap();
        assert_eq!(block.len(), 4);
    }

    #[test]
    fn test_block_capacity() {
        let mut block = I2CBlock::new();
        block.set(0, 1).unwrap();
        block.clear();
        assert_eq!(block.len(), 0);
        block.set(31, 0xAB).unwrap();
        assert_eq!(block.len(), 32);
        assert_eq!(block.get(31), Ok(0xAB));
        assert_eq!(
            block.set(32, 0xAB).unwrap_err(),
            ValidationError::Capacity { index: 32, capacity: 32 }
        );
        assert_eq!(block.len(), 32);
    }

    #[test]
    fn test_block_clear_zeroes() {
        let mut block = I2CBlock::from_slice(&[45, 46, 47, 48]).unwrap();
        block.clear();
        block.set(2, 1).unwrap();
        assert_eq!(block.as_slice(), &[0, 0, 1]);
    }

    #[test]
    fn test_block_get_past_length() {
        let block = I2CBlock::from_slice(&[1, 2]).unwrap();
        assert_eq!(
            block.get(2),
            Err(ValidationError::Index { index: 2, length: 2 })
        );
    }

    #[test]
    fn test_block_lengths() {
        assert_eq!(
            I2CBlock::from_slice(&[0; 33]).unwrap_err(),
            ValidationError::BlockLength(33)
        );
        let mut block = I2CBlock::from_slice(&[7; 10]).unwrap();
        block.set_len(2).unwrap();
        block.set_len(4).unwrap();
        assert_eq!(block.as_slice(), &[7, 7, 0, 0]);
        assert_eq!(
            block.set_len(33),
            Err(ValidationError::Capacity { index: 32, capacity: 32 })
        );
        // a failed grow leaves the block as it was
        assert_eq!(block.as_slice(), &[7, 7, 0, 0]);
    }
}
