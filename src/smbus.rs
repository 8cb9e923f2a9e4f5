// Copyright 2015, Paul Osborne <osbpau@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/license/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option.  This file may not be copied, modified, or distributed
// except according to those terms.

//! SMBus operations against the slave selected on a bus

use crate::buffer::{I2CBlock, I2C_SMBUS_BLOCK_MAX};
use crate::bus::I2CBus;
use crate::core::I2CAdapter;
use crate::error::{I2CResult, ProtocolError, ValidationError};
use crate::ffi::{i2c_smbus_data, I2CSMBusReadWrite, I2CSMBusSize};
use byteorder::{ByteOrder, NativeEndian};

/// Copy the length prefixed block the kernel left in `data` into `block`
fn decode_block(data: &i2c_smbus_data, block: &mut I2CBlock) -> I2CResult<()> {
    let count = data.block_len();
    if usize::from(count) > I2C_SMBUS_BLOCK_MAX {
        warn!("rejecting block length {}", count);
        return Err(ProtocolError::BlockLength(count).into());
    }
    block.load(&data.block[1..=usize::from(count)])?;
    Ok(())
}

impl<A: I2CAdapter> I2CBus<A> {
    fn smbus(
        &mut self,
        read_write: I2CSMBusReadWrite,
        command: u8,
        size: I2CSMBusSize,
        data: Option<&mut i2c_smbus_data>,
    ) -> I2CResult<()> {
        let slave = self.require_slave()?;
        trace!("smbus {:?} {:?} at {:#x}, command {:#x}", size, read_write, slave, command);
        self.adapter_mut().smbus_access(read_write, command, size, data)
    }

    /// This sends a single bit to the device, at the place of the Rd/Wr bit
    pub fn quick(&mut self, bit: bool) -> I2CResult<()> {
        let read_write = if bit {
            I2CSMBusReadWrite::I2C_SMBUS_READ
        } else {
            I2CSMBusReadWrite::I2C_SMBUS_WRITE
        };
        self.smbus(read_write, 0, I2CSMBusSize::I2C_SMBUS_QUICK, None)
    }

    /// Read a single byte from a device, from a designated register
    ///
    /// The register is specified through the Comm byte.
    pub fn read_byte(&mut self, command: u8) -> I2CResult<u8> {
        let mut data = i2c_smbus_data::empty();
        self.smbus(
            I2CSMBusReadWrite::I2C_SMBUS_READ,
            command,
            I2CSMBusSize::I2C_SMBUS_BYTE_DATA,
            Some(&mut data),
        )?;
        Ok(data.block[0])
    }

    /// Write a single byte to a specific register on a device
    ///
    /// The register is specified through the Comm byte.
    pub fn write_byte(&mut self, command: u8, value: u8) -> I2CResult<()> {
        let mut data = i2c_smbus_data::empty();
        data.block[0] = value;
        self.smbus(
            I2CSMBusReadWrite::I2C_SMBUS_WRITE,
            command,
            I2CSMBusSize::I2C_SMBUS_BYTE_DATA,
            Some(&mut data),
        )
    }

    /// Read 2 bytes from a given register on a device
    pub fn read_word(&mut self, command: u8) -> I2CResult<u16> {
        let mut data = i2c_smbus_data::empty();
        self.smbus(
            I2CSMBusReadWrite::I2C_SMBUS_READ,
            command,
            I2CSMBusSize::I2C_SMBUS_WORD_DATA,
            Some(&mut data),
        )?;
        Ok(NativeEndian::read_u16(&data.block[..2]))
    }

    /// Write 2 bytes to a given register on a device
    pub fn write_word(&mut self, command: u8, value: u16) -> I2CResult<()> {
        let mut data = i2c_smbus_data::empty();
        NativeEndian::write_u16(&mut data.block[..2], value);
        self.smbus(
            I2CSMBusReadWrite::I2C_SMBUS_WRITE,
            command,
            I2CSMBusSize::I2C_SMBUS_WORD_DATA,
            Some(&mut data),
        )
    }

    /// Select a register, send 16 bits of data to it, and read 16 bits of data
    pub fn process_call(&mut self, command: u8, value: u16) -> I2CResult<u16> {
        let mut data = i2c_smbus_data::empty();
        NativeEndian::write_u16(&mut data.block[..2], value);
        self.smbus(
            I2CSMBusReadWrite::I2C_SMBUS_WRITE,
            command,
            I2CSMBusSize::I2C_SMBUS_PROC_CALL,
            Some(&mut data),
        )?;
        Ok(NativeEndian::read_u16(&data.block[..2]))
    }

    /// Read a block of up to 32 bytes from a device
    ///
    /// The actual number of bytes available to read is returned in the count
    /// byte, `block` ends up holding exactly that many bytes.
    pub fn read_block(&mut self, command: u8, block: &mut I2CBlock) -> I2CResult<()> {
        let mut data = i2c_smbus_data::empty();
        self.smbus(
            I2CSMBusReadWrite::I2C_SMBUS_READ,
            command,
            I2CSMBusSize::I2C_SMBUS_BLOCK_DATA,
            Some(&mut data),
        )?;
        decode_block(&data, block)
    }

    /// Write a block of up to 32 bytes to a device
    ///
    /// The opposite of the Block Read command, this writes up to 32 bytes to
    /// a device, to a designated register that is specified through the
    /// Comm byte. The amount of data is specified in the Count byte.
    pub fn write_block(&mut self, command: u8, block: &I2CBlock) -> I2CResult<()> {
        let mut data = i2c_smbus_data::with_block(block.as_slice());
        self.smbus(
            I2CSMBusReadWrite::I2C_SMBUS_WRITE,
            command,
            I2CSMBusSize::I2C_SMBUS_BLOCK_DATA,
            Some(&mut data),
        )
    }

    /// Send the content of `block` to a register and replace it with the
    /// block the device answers with
    pub fn block_process_call(&mut self, command: u8, block: &mut I2CBlock) -> I2CResult<()> {
        let mut data = i2c_smbus_data::with_block(block.as_slice());
        self.smbus(
            I2CSMBusReadWrite::I2C_SMBUS_WRITE,
            command,
            I2CSMBusSize::I2C_SMBUS_BLOCK_PROC_CALL,
            Some(&mut data),
        )?;
        decode_block(&data, block)
    }

    /// Read `block.len()` bytes starting at a register, without the device
    /// sending a count byte
    ///
    /// Set the number of bytes wanted with `I2CBlock::set_len` beforehand.
    pub fn read_i2c_block(&mut self, command: u8, block: &mut I2CBlock) -> I2CResult<()> {
        if block.is_empty() {
            return Err(ValidationError::EmptyBlock.into());
        }
        let mut data = i2c_smbus_data::empty();
        data.block[0] = block.len() as u8;
        self.smbus(
            I2CSMBusReadWrite::I2C_SMBUS_READ,
            command,
            I2CSMBusSize::I2C_SMBUS_I2C_BLOCK_DATA,
            Some(&mut data),
        )?;
        decode_block(&data, block)
    }

    /// Write the content of `block` starting at a register
    ///
    /// Unlike `write_block` the count only travels to the kernel, the device
    /// receives the command byte followed by the data bytes.
    pub fn write_i2c_block(&mut self, command: u8, block: &I2CBlock) -> I2CResult<()> {
        let mut data = i2c_smbus_data::with_block(block.as_slice());
        self.smbus(
            I2CSMBusReadWrite::I2C_SMBUS_WRITE,
            command,
            I2CSMBusSize::I2C_SMBUS_I2C_BLOCK_DATA,
            Some(&mut data),
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::I2CError;
    use crate::mock::{I2CRegisterMap, MockI2CAdapter};
    use nix::errno::Errno;

    const ADDR: u16 = 0x50;

    fn bus() -> I2CBus<MockI2CAdapter> {
        let mut adapter = MockI2CAdapter::new();
        adapter.attach(ADDR, I2CRegisterMap::new());
        let mut bus = I2CBus::new(adapter);
        bus.select_slave(ADDR).unwrap();
        bus
    }

    #[test]
    fn test_smbus_needs_a_slave() {
        let mut bus = I2CBus::new(MockI2CAdapter::new());
        let mut block = I2CBlock::new();
        assert_eq!(bus.read_block(0, &mut block), Err(I2CError::NoSlaveSelected));
        assert_eq!(bus.quick(false), Err(I2CError::NoSlaveSelected));
    }

    #[test]
    fn test_byte_and_word() {
        let mut bus = bus();
        bus.quick(false).unwrap();
        bus.write_byte(0x01, 0xAA).unwrap();
        assert_eq!(bus.read_byte(0x01), Ok(0xAA));
        bus.write_word(0x02, 0x1234).unwrap();
        assert_eq!(bus.read_word(0x02), Ok(0x1234));
        // SMBus words travel low byte first
        assert_eq!(bus.read_byte(0x02), Ok(0x34));
        assert_eq!(bus.read_byte(0x03), Ok(0x12));
    }

    #[test]
    fn test_process_call() {
        let mut bus = bus();
        bus.write_word(0x12, 0xBEEF).unwrap();
        // the register map answers from the registers following the written word
        assert_eq!(bus.process_call(0x10, 0x0102), Ok(0xBEEF));
        assert_eq!(bus.read_word(0x10), Ok(0x0102));
    }

    #[test]
    fn test_i2c_block_round_trip() {
        let mut bus = bus();
        let written = I2CBlock::from_slice(&[45, 46, 47, 48]).unwrap();
        bus.write_i2c_block(0x20, &written).unwrap();
        assert_eq!(bus.read_byte(0x20), Ok(45));

        let mut block = I2CBlock::new();
        block.set_len(4).unwrap();
        bus.read_i2c_block(0x20, &mut block).unwrap();
        assert_eq!(block, written);
    }

    #[test]
    fn test_read_i2c_block_needs_a_length() {
        let mut bus = bus();
        let mut block = I2CBlock::new();
        assert_eq!(
            bus.read_i2c_block(0x20, &mut block),
            Err(ValidationError::EmptyBlock.into())
        );
    }

    #[test]
    fn test_block_data_carries_count() {
        let mut bus = bus();
        let block = I2CBlock::from_slice(&[7, 8, 9]).unwrap();
        bus.write_block(0x30, &block).unwrap();
        // the count byte lands in the first register
        assert_eq!(bus.read_byte(0x30), Ok(3));
        assert_eq!(bus.read_byte(0x31), Ok(7));

        let mut read = I2CBlock::new();
        bus.read_block(0x30, &mut read).unwrap();
        assert_eq!(read.as_slice(), &[7, 8, 9]);
    }

    #[test]
    fn test_oversized_block_length_is_a_protocol_error() {
        let mut bus = bus();
        bus.write_byte(0x40, 40).unwrap();
        let mut block = I2CBlock::from_slice(&[1]).unwrap();
        assert_eq!(
            bus.read_block(0x40, &mut block),
            Err(ProtocolError::BlockLength(40).into())
        );
        // block untouched
        assert_eq!(block.as_slice(), &[1]);
    }

    #[test]
    fn test_block_process_call() {
        let mut bus = bus();
        // answer (count 2, then 5 and 6) sits right after command, count and data
        bus.write_i2c_block(0x54, &I2CBlock::from_slice(&[2, 5, 6]).unwrap())
            .unwrap();
        let mut block = I2CBlock::from_slice(&[1, 2, 3]).unwrap();
        bus.block_process_call(0x50, &mut block).unwrap();
        assert_eq!(block.as_slice(), &[5, 6]);
    }

    #[test]
    fn test_smbus_errors_are_translated() {
        let mut bus = bus();
        bus.adapter_mut().fail_next(Errno::ENXIO);
        let err = bus.write_byte(0, 0).unwrap_err();
        assert_eq!(err, I2CError::os("ioctl(I2C_SMBUS)", Errno::ENXIO));
    }
}
