// Copyright 2015, Paul Osborne <osbpau@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/license/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option.  This file may not be copied, modified, or distributed
// except according to those terms.

//! # i2cbus
//!
//! The `i2cbus` crate drives an I2C bus through the Linux i2c-dev
//! interface:
//! https://www.kernel.org/doc/Documentation/i2c/dev-interface
//!
//! An `I2CBus` is opened on `/dev/i2c-N` and either selects a slave for
//! direct reads, writes and SMBus commands, or submits an
//! `I2CTransaction` of addressed messages that the kernel executes
//! back to back with repeated starts.
//!
//! ```no_run
//! use i2cbus::{I2CBuffer, I2CBus, I2CMessage, I2CTransaction};
//!
//! # fn main() -> Result<(), i2cbus::I2CError> {
//! let mut bus = I2CBus::open(1)?;
//! let mut register = I2CBuffer::from_slice(&[0x00]);
//! let mut reply = I2CBuffer::new(2);
//! let mut transaction = I2CTransaction::new(vec![
//!     I2CMessage::write(0x48, &mut register),
//!     I2CMessage::read(0x48, &mut reply),
//! ]);
//! bus.do_transaction(&mut transaction)?;
//! drop(transaction);
//! println!("{:?}", reply.as_slice());
//! # Ok(())
//! # }
//! ```

extern crate byteorder;
extern crate libc;
extern crate thiserror;
#[macro_use]
extern crate nix;
#[macro_use]
extern crate bitflags;
#[macro_use]
extern crate log;

mod buffer;
mod bus;
pub mod core;
mod error;
mod ffi;
pub mod linux;
pub mod mock;
mod smbus;

pub use crate::buffer::{I2CBlock, I2CBuffer, I2C_SMBUS_BLOCK_MAX};
pub use crate::bus::I2CBus;
pub use crate::core::{
    I2CAdapter, I2CFlags, I2CMessage, I2CTransaction, SlaveOptions, I2C_RDWR_IOCTL_MAX_MSGS,
};
pub use crate::error::{I2CError, I2CResult, ProtocolError, ValidationError};
pub use crate::ffi::{i2c_smbus_data, I2CFunctions, I2CSMBusReadWrite, I2CSMBusSize};
pub use crate::linux::LinuxI2CAdapter;
