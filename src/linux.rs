// Copyright 2015, Paul Osborne <osbpau@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/license/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option.  This file may not be copied, modified, or distributed
// except according to those terms.

use crate::core::{I2CAdapter, I2CMessage};
use crate::error::{I2CError, I2CResult, OsContext};
use crate::ffi::{self, i2c_smbus_data, I2CFunctions, I2CSMBusReadWrite, I2CSMBusSize};
use nix::errno::Errno;
use std::convert::TryFrom;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::prelude::*;
use std::os::unix::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Path of the character device for bus `bus`
pub fn bus_path(bus: u32) -> PathBuf {
    PathBuf::from(format!("/dev/i2c-{}", bus))
}

/// Kernel i2c-dev character device, e.g. `/dev/i2c-1`
///
/// The device file is closed when the adapter is dropped.
#[derive(Debug)]
pub struct LinuxI2CAdapter {
    devfile: File,
}

impl AsRawFd for LinuxI2CAdapter {
    fn as_raw_fd(&self) -> RawFd {
        self.devfile.as_raw_fd()
    }
}

impl LinuxI2CAdapter {
    /// Open the i2c-dev device at `path` for reading and writing
    pub fn new<P: AsRef<Path>>(path: P) -> I2CResult<LinuxI2CAdapter> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| I2CError::open(path.to_path_buf(), &e))?;
        debug!("opened {}", path.display());
        Ok(LinuxI2CAdapter { devfile: file })
    }

    pub fn from_file(devfile: File) -> LinuxI2CAdapter {
        LinuxI2CAdapter { devfile }
    }
}

impl I2CAdapter for LinuxI2CAdapter {
    fn set_slave_address(&mut self, address: u16, force: bool) -> I2CResult<()> {
        if force {
            ffi::i2c_set_slave_address_force(self.as_raw_fd(), address).during("ioctl(I2C_SLAVE_FORCE)")
        } else {
            ffi::i2c_set_slave_address(self.as_raw_fd(), address).during("ioctl(I2C_SLAVE)")
        }
    }

    fn set_ten_bit(&mut self, enable: bool) -> I2CResult<()> {
        ffi::i2c_set_tenbit(self.as_raw_fd(), enable).during("ioctl(I2C_TENBIT)")
    }

    fn functionalities(&mut self) -> I2CResult<I2CFunctions> {
        ffi::i2c_get_functionality(self.as_raw_fd()).during("ioctl(I2C_FUNCS)")
    }

    fn set_retries(&mut self, retries: u32) -> I2CResult<()> {
        let retries = i32::try_from(retries).map_err(|_| I2CError::os("ioctl(I2C_RETRIES)", Errno::EINVAL))?;
        ffi::i2c_set_retries(self.as_raw_fd(), retries).during("ioctl(I2C_RETRIES)")
    }

    fn set_timeout(&mut self, timeout: Duration) -> I2CResult<()> {
        // the kernel counts in jiffies of 10 ms
        let ticks = (timeout.as_millis() + 9) / 10;
        let ticks = i32::try_from(ticks).map_err(|_| I2CError::os("ioctl(I2C_TIMEOUT)", Errno::EINVAL))?;
        ffi::i2c_set_timeout(self.as_raw_fd(), ticks).during("ioctl(I2C_TIMEOUT)")
    }

    fn set_pec(&mut self, enable: bool) -> I2CResult<()> {
        ffi::i2c_set_smbus_pec(self.as_raw_fd(), enable).during("ioctl(I2C_PEC)")
    }

    fn transfer(&mut self, messages: &mut [I2CMessage<'_>]) -> I2CResult<u32> {
        let mut raw = ffi::encode_messages(messages)?;
        ffi::i2c_rdwr(self.as_raw_fd(), &mut raw).during("ioctl(I2C_RDWR)")
    }

    fn smbus_access(
        &mut self,
        read_write: I2CSMBusReadWrite,
        command: u8,
        size: I2CSMBusSize,
        data: Option<&mut i2c_smbus_data>,
    ) -> I2CResult<()> {
        ffi::i2c_smbus_access(self.as_raw_fd(), read_write, command, size, data).during("ioctl(I2C_SMBUS)")
    }

    fn read(&mut self, data: &mut [u8]) -> I2CResult<usize> {
        self.devfile.read(data).during("read")
    }

    fn write(&mut self, data: &[u8]) -> I2CResult<usize> {
        self.devfile.write(data).during("write")
    }

    fn close(self) -> I2CResult<()> {
        let fd = self.devfile.into_raw_fd();
        Errno::result(unsafe { libc::close(fd) }).map(drop).during("close")?;
        debug!("closed i2c device");
        Ok(())
    }
}
