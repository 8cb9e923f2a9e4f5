// Copyright 2015, Paul Osborne <osbpau@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/license/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option.  This file may not be copied, modified, or distributed
// except according to those terms.

//! In-memory bus for tests and for developing without hardware
//!
//! `MockI2CAdapter` routes every transfer to the `MockSlave` attached at
//! the target address and plays the SMBus protocols as the byte sequences
//! a real adapter would put on the wire.

use crate::buffer::I2C_SMBUS_BLOCK_MAX;
use crate::core::{I2CAdapter, I2CFlags, I2CMessage};
use crate::error::{I2CError, I2CResult};
use crate::ffi::{i2c_smbus_data, I2CFunctions, I2CSMBusReadWrite, I2CSMBusSize};
use byteorder::{ByteOrder, LittleEndian, NativeEndian};
use nix::errno::Errno;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// A device sitting on the mock bus
pub trait MockSlave {
    /// The master reads `data.len()` bytes
    fn read(&mut self, data: &mut [u8]);

    /// The master writes `data`
    fn write(&mut self, data: &[u8]);
}

/// Register file addressed by the first byte of every write
///
/// A write sets the register pointer from its first byte and stores the
/// remaining bytes from there.  Reads continue from the register pointer.
pub struct I2CRegisterMap {
    registers: [u8; 0x100],
    offset: usize,
}

impl Default for I2CRegisterMap {
    fn default() -> I2CRegisterMap {
        I2CRegisterMap::new()
    }
}

impl I2CRegisterMap {
    pub fn new() -> I2CRegisterMap {
        I2CRegisterMap {
            registers: [0x00; 0x100],
            offset: 0,
        }
    }

    pub fn write_regs(&mut self, offset: usize, data: &[u8]) {
        trace!("WRITE | 0x{:X} : {:?}", offset, data);
        for (i, &b) in data.iter().enumerate() {
            self.registers[(offset + i) & 0xFF] = b;
        }
    }

    pub fn registers(&self) -> &[u8] {
        &self.registers
    }
}

impl MockSlave for I2CRegisterMap {
    fn read(&mut self, data: &mut [u8]) {
        let start = self.offset;
        for b in data.iter_mut() {
            *b = self.registers[self.offset];
            self.offset = (self.offset + 1) & 0xFF;
        }
        trace!("READ  | 0x{:X} : {:?}", start, data);
    }

    fn write(&mut self, data: &[u8]) {
        if let Some((&offset, remdata)) = data.split_first() {
            let offset = usize::from(offset);
            self.write_regs(offset, remdata);
            self.offset = (offset + remdata.len()) & 0xFF;
        }
    }
}

/// `I2CAdapter` backed by `MockSlave`s instead of the kernel
pub struct MockI2CAdapter {
    slaves: HashMap<u16, Box<dyn MockSlave>>,
    slave_address: Option<u16>,
    ten_bit: bool,
    retries: u32,
    timeout: Option<Duration>,
    pec: bool,
    functions: I2CFunctions,
    fail_next: Option<Errno>,
    read_limit: Option<usize>,
    transfers: usize,
    writes: usize,
}

impl fmt::Debug for MockI2CAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut addresses: Vec<_> = self.slaves.keys().collect();
        addresses.sort();
        f.debug_struct("MockI2CAdapter")
            .field("slaves", &addresses)
            .field("slave_address", &self.slave_address)
            .field("ten_bit", &self.ten_bit)
            .field("transfers", &self.transfers)
            .field("writes", &self.writes)
            .finish()
    }
}

impl Default for MockI2CAdapter {
    fn default() -> MockI2CAdapter {
        MockI2CAdapter::new()
    }
}

impl MockI2CAdapter {
    pub fn new() -> MockI2CAdapter {
        MockI2CAdapter {
            slaves: HashMap::new(),
            slave_address: None,
            ten_bit: false,
            retries: 0,
            timeout: None,
            pec: false,
            functions: I2CFunctions::I2C_FUNC_I2C
                | I2CFunctions::I2C_FUNC_10BIT_ADDR
                | I2CFunctions::I2C_FUNC_SMBUS_QUICK
                | I2CFunctions::I2C_FUNC_SMBUS_BYTE_DATA
                | I2CFunctions::I2C_FUNC_SMBUS_WORD_DATA
                | I2CFunctions::I2C_FUNC_SMBUS_PROC_CALL
                | I2CFunctions::I2C_FUNC_SMBUS_BLOCK_DATA
                | I2CFunctions::I2C_FUNC_SMBUS_BLOCK_PROC_CALL
                | I2CFunctions::I2C_FUNC_SMBUS_I2C_BLOCK,
            fail_next: None,
            read_limit: None,
            transfers: 0,
            writes: 0,
        }
    }

    /// Put `slave` on the bus at `address`, replacing whatever was there
    pub fn attach<S: MockSlave + 'static>(&mut self, address: u16, slave: S) {
        self.slaves.insert(address, Box::new(slave));
    }

    pub fn detach(&mut self, address: u16) {
        self.slaves.remove(&address);
    }

    /// Make the next adapter call fail with `errno`
    pub fn fail_next(&mut self, errno: Errno) {
        self.fail_next = Some(errno);
    }

    /// Make the next plain read stop after `limit` bytes
    pub fn limit_next_read(&mut self, limit: usize) {
        self.read_limit = Some(limit);
    }

    pub fn set_functionalities(&mut self, functions: I2CFunctions) {
        self.functions = functions;
    }

    pub fn slave_address(&self) -> Option<u16> {
        self.slave_address
    }

    pub fn ten_bit(&self) -> bool {
        self.ten_bit
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn pec(&self) -> bool {
        self.pec
    }

    /// Number of I2C_RDWR transfers attempted
    pub fn transfers(&self) -> usize {
        self.transfers
    }

    /// Number of plain writes attempted
    pub fn writes(&self) -> usize {
        self.writes
    }

    fn check(&mut self, operation: &'static str) -> I2CResult<()> {
        match self.fail_next.take() {
            Some(errno) => Err(I2CError::os(operation, errno)),
            None => Ok(()),
        }
    }

    fn slave(&mut self, address: u16, operation: &'static str) -> I2CResult<&mut Box<dyn MockSlave>> {
        self.slaves
            .get_mut(&address)
            .ok_or_else(|| I2CError::os(operation, Errno::ENXIO))
    }

    fn selected(&mut self, operation: &'static str) -> I2CResult<&mut Box<dyn MockSlave>> {
        let address = self
            .slave_address
            .ok_or_else(|| I2CError::os(operation, Errno::ENXIO))?;
        self.slave(address, operation)
    }
}

/// Read a count byte followed by that many bytes (at most 32) into `block`
fn read_counted(slave: &mut dyn MockSlave, block: &mut [u8]) {
    if let Some((count, data)) = block.split_first_mut() {
        slave.read(std::slice::from_mut(count));
        let count = usize::from(*count).min(I2C_SMBUS_BLOCK_MAX).min(data.len());
        slave.read(&mut data[..count]);
    }
}

/// Count byte and data of a length prefixed block, the count capped at 32
fn counted_block(block: &[u8]) -> &[u8] {
    let len = usize::from(block[0]).min(I2C_SMBUS_BLOCK_MAX);
    &block[..=len]
}

impl I2CAdapter for MockI2CAdapter {
    fn set_slave_address(&mut self, address: u16, force: bool) -> I2CResult<()> {
        self.check(if force { "ioctl(I2C_SLAVE_FORCE)" } else { "ioctl(I2C_SLAVE)" })?;
        self.slave_address = Some(address);
        Ok(())
    }

    fn set_ten_bit(&mut self, enable: bool) -> I2CResult<()> {
        self.check("ioctl(I2C_TENBIT)")?;
        self.ten_bit = enable;
        Ok(())
    }

    fn functionalities(&mut self) -> I2CResult<I2CFunctions> {
        self.check("ioctl(I2C_FUNCS)")?;
        Ok(self.functions)
    }

    fn set_retries(&mut self, retries: u32) -> I2CResult<()> {
        self.check("ioctl(I2C_RETRIES)")?;
        self.retries = retries;
        Ok(())
    }

    fn set_timeout(&mut self, timeout: Duration) -> I2CResult<()> {
        self.check("ioctl(I2C_TIMEOUT)")?;
        self.timeout = Some(timeout);
        Ok(())
    }

    fn set_pec(&mut self, enable: bool) -> I2CResult<()> {
        self.check("ioctl(I2C_PEC)")?;
        self.pec = enable;
        Ok(())
    }

    fn transfer(&mut self, messages: &mut [I2CMessage<'_>]) -> I2CResult<u32> {
        const OP: &str = "ioctl(I2C_RDWR)";
        self.transfers += 1;
        self.check(OP)?;
        // i2c-dev checks every message before starting the transfer
        for (i, msg) in messages.iter().enumerate() {
            if msg.check_receive_length(i).is_err() {
                return Err(I2CError::os(OP, Errno::EINVAL));
            }
        }
        for msg in messages.iter_mut() {
            let flags = msg.flags();
            let slave = self.slave(msg.address(), OP)?;
            let data = msg.buffer_mut().as_mut_slice();
            if flags.contains(I2CFlags::READ | I2CFlags::RECEIVE_LENGTH) {
                read_counted(&mut **slave, data);
            } else if flags.contains(I2CFlags::READ) {
                slave.read(data);
            } else {
                slave.write(data);
            }
        }
        Ok(messages.len() as u32)
    }

    fn smbus_access(
        &mut self,
        read_write: I2CSMBusReadWrite,
        command: u8,
        size: I2CSMBusSize,
        data: Option<&mut i2c_smbus_data>,
    ) -> I2CResult<()> {
        use crate::ffi::I2CSMBusReadWrite::*;
        use crate::ffi::I2CSMBusSize::*;
        const OP: &str = "ioctl(I2C_SMBUS)";

        self.check(OP)?;
        let slave = self.selected(OP)?;
        let mut empty = i2c_smbus_data::empty();
        let block = &mut data.unwrap_or(&mut empty).block;

        match (size, read_write) {
            (I2C_SMBUS_QUICK, _) => {}
            (I2C_SMBUS_BYTE, I2C_SMBUS_READ) => slave.read(&mut block[..1]),
            (I2C_SMBUS_BYTE, I2C_SMBUS_WRITE) => slave.write(&[command]),
            (I2C_SMBUS_BYTE_DATA, I2C_SMBUS_READ) => {
                slave.write(&[command]);
                slave.read(&mut block[..1]);
            }
            (I2C_SMBUS_BYTE_DATA, I2C_SMBUS_WRITE) => slave.write(&[command, block[0]]),
            (I2C_SMBUS_WORD_DATA, I2C_SMBUS_READ) => {
                let mut wire = [0u8; 2];
                slave.write(&[command]);
                slave.read(&mut wire);
                NativeEndian::write_u16(&mut block[..2], LittleEndian::read_u16(&wire));
            }
            (I2C_SMBUS_WORD_DATA, I2C_SMBUS_WRITE) => {
                let mut wire = [command, 0, 0];
                LittleEndian::write_u16(&mut wire[1..], NativeEndian::read_u16(&block[..2]));
                slave.write(&wire);
            }
            (I2C_SMBUS_PROC_CALL, _) => {
                let mut wire = [command, 0, 0];
                LittleEndian::write_u16(&mut wire[1..], NativeEndian::read_u16(&block[..2]));
                slave.write(&wire);
                slave.read(&mut wire[1..]);
                NativeEndian::write_u16(&mut block[..2], LittleEndian::read_u16(&wire[1..]));
            }
            (I2C_SMBUS_BLOCK_DATA, I2C_SMBUS_READ) => {
                slave.write(&[command]);
                read_counted(&mut **slave, block);
            }
            (I2C_SMBUS_BLOCK_DATA, I2C_SMBUS_WRITE) => {
                let mut wire = vec![command];
                wire.extend_from_slice(counted_block(&block[..]));
                slave.write(&wire);
            }
            (I2C_SMBUS_BLOCK_PROC_CALL, _) => {
                let mut wire = vec![command];
                wire.extend_from_slice(counted_block(&block[..]));
                slave.write(&wire);
                read_counted(&mut **slave, block);
            }
            (I2C_SMBUS_I2C_BLOCK_DATA, I2C_SMBUS_READ) | (I2C_SMBUS_I2C_BLOCK_BROKEN, I2C_SMBUS_READ) => {
                let len = usize::from(block[0]).min(I2C_SMBUS_BLOCK_MAX);
                slave.write(&[command]);
                slave.read(&mut block[1..=len]);
            }
            (I2C_SMBUS_I2C_BLOCK_DATA, I2C_SMBUS_WRITE) | (I2C_SMBUS_I2C_BLOCK_BROKEN, I2C_SMBUS_WRITE) => {
                let len = usize::from(block[0]).min(I2C_SMBUS_BLOCK_MAX);
                let mut wire = vec![command];
                wire.extend_from_slice(&block[1..=len]);
                slave.write(&wire);
            }
        }
        Ok(())
    }

    fn read(&mut self, data: &mut [u8]) -> I2CResult<usize> {
        self.check("read")?;
        let n = self.read_limit.take().map_or(data.len(), |l| l.min(data.len()));
        let slave = self.selected("read")?;
        slave.read(&mut data[..n]);
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> I2CResult<usize> {
        self.writes += 1;
        self.check("write")?;
        let slave = self.selected("write")?;
        slave.write(data);
        Ok(data.len())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::buffer::I2CBuffer;

    #[test]
    fn test_register_map_pointer() {
        let mut regmap = I2CRegisterMap::new();
        regmap.write(&[0x0B, 1, 2, 3]);
        assert_eq!(&regmap.registers()[0x0B..0x0E], &[1, 2, 3]);

        regmap.write(&[0x0C]);
        let mut data = [0u8; 2];
        regmap.read(&mut data);
        assert_eq!(data, [2, 3]);
    }

    #[test]
    fn test_register_map_wraps() {
        let mut regmap = I2CRegisterMap::new();
        regmap.write(&[0xFF, 1, 2]);
        assert_eq!(regmap.registers()[0xFF], 1);
        assert_eq!(regmap.registers()[0x00], 2);
    }

    #[test]
    fn test_missing_slave_nacks() {
        let mut adapter = MockI2CAdapter::new();
        adapter.attach(0x33, I2CRegisterMap::new());
        adapter.detach(0x33);
        let mut buffer = I2CBuffer::new(1);
        let mut msgs = [I2CMessage::read(0x33, &mut buffer)];
        let err = adapter.transfer(&mut msgs).unwrap_err();
        assert_eq!(err, I2CError::os("ioctl(I2C_RDWR)", Errno::ENXIO));
        assert_eq!(adapter.transfers(), 1);
    }

    #[test]
    fn test_receive_length() {
        let mut adapter = MockI2CAdapter::new();
        let mut regmap = I2CRegisterMap::new();
        regmap.write_regs(0, &[2, 0xA, 0xB, 0xC]);
        adapter.attach(0x20, regmap);

        let mut buffer = I2CBuffer::new(33);
        let mut msgs = [I2CMessage::receive_length(0x20, &mut buffer)];
        assert_eq!(adapter.transfer(&mut msgs), Ok(1));
        assert_eq!(&buffer.as_slice()[..4], &[2, 0xA, 0xB, 0]);
    }

    #[test]
    fn test_malformed_receive_length_is_rejected() {
        let mut adapter = MockI2CAdapter::new();
        adapter.attach(0x20, I2CRegisterMap::new());

        // zeroed first byte, as the kernel sees it without a prefix
        let mut buffer = I2CBuffer::new(33);
        let mut msgs = [I2CMessage::read(0x20, &mut buffer)
            .with_flags(I2CFlags::READ | I2CFlags::RECEIVE_LENGTH)];
        assert_eq!(
            adapter.transfer(&mut msgs),
            Err(I2CError::os("ioctl(I2C_RDWR)", Errno::EINVAL))
        );

        let mut written = I2CBuffer::from_slice(&[0x00, 0xAA]);
        let mut buffer = I2CBuffer::from_slice(&[1; 40]);
        let mut msgs = [
            I2CMessage::write(0x20, &mut written),
            I2CMessage::write(0x20, &mut buffer).with_flags(I2CFlags::RECEIVE_LENGTH),
        ];
        assert!(adapter.transfer(&mut msgs).is_err());
        drop(msgs);

        // nothing reached the slave
        let mut data = [0u8; 1];
        adapter.set_slave_address(0x20, false).unwrap();
        adapter.read(&mut data).unwrap();
        assert_eq!(data, [0]);
    }

    #[test]
    fn test_oversized_counts_are_capped() {
        let mut adapter = MockI2CAdapter::new();
        let mut regmap = I2CRegisterMap::new();
        regmap.write_regs(0x10, &[200]);
        adapter.attach(0x20, regmap);
        adapter.set_slave_address(0x20, false).unwrap();

        let mut data = i2c_smbus_data::empty();
        data.block[0] = 255;
        adapter
            .smbus_access(
                I2CSMBusReadWrite::I2C_SMBUS_WRITE,
                0x40,
                I2CSMBusSize::I2C_SMBUS_BLOCK_DATA,
                Some(&mut data),
            )
            .unwrap();

        let mut data = i2c_smbus_data::empty();
        adapter
            .smbus_access(
                I2CSMBusReadWrite::I2C_SMBUS_READ,
                0x10,
                I2CSMBusSize::I2C_SMBUS_BLOCK_DATA,
                Some(&mut data),
            )
            .unwrap();
        assert_eq!(data.block_len(), 200);

        let mut empty = I2CBuffer::new(0);
        let mut msgs = [I2CMessage::read(0x20, &mut empty)];
        assert_eq!(adapter.transfer(&mut msgs), Ok(1));
    }

    #[test]
    fn test_failure_is_consumed() {
        let mut adapter = MockI2CAdapter::new();
        adapter.fail_next(Errno::EIO);
        assert!(adapter.set_pec(true).is_err());
        assert!(!adapter.pec());
        adapter.set_pec(true).unwrap();
        assert!(adapter.pec());
    }
}
