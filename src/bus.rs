// Copyright 2015, Paul Osborne <osbpau@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/license/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option.  This file may not be copied, modified, or distributed
// except according to those terms.

use crate::buffer::I2CBuffer;
use crate::core::{check_address, I2CAdapter, I2CTransaction, SlaveOptions};
use crate::error::{I2CError, I2CResult, ProtocolError, ValidationError};
use crate::ffi::I2CFunctions;
use crate::linux::{bus_path, LinuxI2CAdapter};
use std::path::Path;
use std::time::Duration;

/// Struct providing access to some I2C Bus
///
/// A single bus may have multiple devices on it.  The
/// kernel exposes one device (e.g. `/dev/i2c-1`) per
/// I2C bus that the system has access (and which is
/// exposed to userspace).
///
/// The bus is the root for all operations and the device on
/// which this code is operating is the master.  A bus value is always
/// open: it is created by `open` and consumed by `close`, and the device
/// is released as well when the value is dropped.
///
/// Transactions carry their own addresses.  The direct and SMBus
/// operations talk to the slave chosen with `select_slave`.
#[derive(Debug)]
pub struct I2CBus<A: I2CAdapter> {
    adapter: A,
    slave: Option<u16>,
}

impl I2CBus<LinuxI2CAdapter> {
    /// Open `/dev/i2c-<bus>`
    pub fn open(bus: u32) -> I2CResult<I2CBus<LinuxI2CAdapter>> {
        I2CBus::open_path(bus_path(bus))
    }

    /// Open the i2c-dev device at `path`
    pub fn open_path<P: AsRef<Path>>(path: P) -> I2CResult<I2CBus<LinuxI2CAdapter>> {
        Ok(I2CBus::new(LinuxI2CAdapter::new(path)?))
    }
}

impl<A: I2CAdapter> I2CBus<A> {
    /// Drive the bus through `adapter`
    pub fn new(adapter: A) -> I2CBus<A> {
        I2CBus {
            adapter,
            slave: None,
        }
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut A {
        &mut self.adapter
    }

    /// Address recorded by the last successful `select_slave`
    pub fn selected_slave(&self) -> Option<u16> {
        self.slave
    }

    /// Select the 7-bit slave address used by direct and SMBus operations
    pub fn select_slave(&mut self, address: u16) -> I2CResult<()> {
        self.select_slave_with(address, SlaveOptions::default())
    }

    /// Select the slave address used by direct and SMBus operations
    ///
    /// On failure the previous selection is kept, although the state of
    /// the kernel's own slave register is then unknown.
    pub fn select_slave_with(&mut self, address: u16, options: SlaveOptions) -> I2CResult<()> {
        check_address(address, options.ten_bit)?;
        self.adapter.set_ten_bit(options.ten_bit)?;
        self.adapter.set_slave_address(address, options.force)?;
        debug!("selected slave {:#x} ({:?})", address, options);
        self.slave = Some(address);
        Ok(())
    }

    pub(crate) fn require_slave(&self) -> I2CResult<u16> {
        self.slave.ok_or(I2CError::NoSlaveSelected)
    }

    /// What the underlying adapter supports
    pub fn functionalities(&mut self) -> I2CResult<I2CFunctions> {
        self.adapter.functionalities()
    }

    /// Number of times a transfer is retried when the slave does not
    /// acknowledge
    pub fn set_retries(&mut self, retries: u32) -> I2CResult<()> {
        self.adapter.set_retries(retries)?;
        debug!("retries set to {}", retries);
        Ok(())
    }

    /// Timeout of a transfer, rounded up to a multiple of 10 ms
    pub fn set_timeout(&mut self, timeout: Duration) -> I2CResult<()> {
        self.adapter.set_timeout(timeout)?;
        debug!("timeout set to {:?}", timeout);
        Ok(())
    }

    /// Enable or disable packet error checking for SMBus operations
    pub fn use_pec(&mut self, enable: bool) -> I2CResult<()> {
        self.adapter.set_pec(enable)?;
        debug!("pec {}", if enable { "enabled" } else { "disabled" });
        Ok(())
    }

    /// Run every message of `transaction` without releasing the bus in
    /// between
    ///
    /// Buffers of messages flagged `READ` hold the received bytes once this
    /// returns `Ok`.  After an error their content is unspecified, the
    /// kernel does not report how many messages went through.
    pub fn do_transaction(&mut self, transaction: &mut I2CTransaction<'_>) -> I2CResult<()> {
        transaction.validate()?;
        debug!("transaction of {} messages", transaction.len());
        for msg in transaction.messages() {
            if !msg.is_read() {
                trace!("{:#x} <- {:?}", msg.address(), msg.buffer().as_slice());
            }
        }
        self.adapter.transfer(transaction.messages_mut())?;
        for msg in transaction.messages() {
            if msg.is_read() {
                trace!("{:#x} -> {:?}", msg.address(), msg.buffer().as_slice());
            }
        }
        Ok(())
    }

    /// Read a single byte from the selected slave
    pub fn read_byte_directly(&mut self) -> I2CResult<u8> {
        let mut data = [0u8; 1];
        self.read_exact(&mut data)?;
        Ok(data[0])
    }

    /// Write a single byte to the selected slave
    pub fn write_byte_directly(&mut self, value: u8) -> I2CResult<()> {
        self.write_all(&[value])
    }

    /// Fill `buffer` with bytes read from the selected slave
    ///
    /// An empty buffer is rejected with `ValidationError::EmptyTransfer`.
    pub fn read(&mut self, buffer: &mut I2CBuffer) -> I2CResult<()> {
        self.read_exact(buffer.as_mut_slice())
    }

    /// Write the whole of `buffer` to the selected slave
    pub fn write(&mut self, buffer: &I2CBuffer) -> I2CResult<()> {
        self.write_all(buffer.as_slice())
    }

    fn read_exact(&mut self, data: &mut [u8]) -> I2CResult<()> {
        if data.is_empty() {
            return Err(ValidationError::EmptyTransfer.into());
        }
        let slave = self.require_slave()?;
        let n = self.adapter.read(data)?;
        if n != data.len() {
            warn!("short read from {:#x}: {} of {} bytes", slave, n, data.len());
            return Err(ProtocolError::ShortTransfer {
                expected: data.len(),
                actual: n,
            }
            .into());
        }
        trace!("{:#x} -> {:?}", slave, data);
        Ok(())
    }

    fn write_all(&mut self, data: &[u8]) -> I2CResult<()> {
        // a zero length write would still address the slave on the wire
        if data.is_empty() {
            return Err(ValidationError::EmptyTransfer.into());
        }
        let slave = self.require_slave()?;
        trace!("{:#x} <- {:?}", slave, data);
        let n = self.adapter.write(data)?;
        if n != data.len() {
            warn!("short write to {:#x}: {} of {} bytes", slave, n, data.len());
            return Err(ProtocolError::ShortTransfer {
                expected: data.len(),
                actual: n,
            }
            .into());
        }
        Ok(())
    }

    /// Release the device, reporting what the OS says about it
    pub fn close(self) -> I2CResult<()> {
        self.adapter.close()
    }
}
