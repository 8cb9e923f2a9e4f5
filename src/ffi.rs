// Copyright 2015, Paul Osborne <osbpau@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/license/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option.  This file may not be copied, modified, or distributed
// except according to those terms.

#![allow(non_camel_case_types)]

use crate::buffer::I2C_SMBUS_BLOCK_MAX;
use crate::core::I2CMessage;
use crate::error::ValidationError;
use std::convert::TryFrom;
use std::os::unix::prelude::*;
use std::ptr;

pub type I2CError = nix::Error;

/// struct i2c_msg, one segment of an I2C_RDWR transfer
#[repr(C)]
#[derive(Debug)]
pub struct i2c_msg {
    /// slave address
    pub(crate) addr: u16,
    /// serialized I2CFlags
    pub(crate) flags: u16,
    /// msg length
    pub(crate) len: u16,
    /// pointer to msg data
    pub(crate) buf: *mut u8,
}

impl<'a, 'b> TryFrom<&'a mut I2CMessage<'b>> for i2c_msg {
    type Error = ValidationError;

    /// The returned record points into the message's buffer, it must not
    /// outlive the borrow of `msg`.
    fn try_from(msg: &'a mut I2CMessage<'b>) -> Result<i2c_msg, ValidationError> {
        let length = msg.buffer().len();
        let len = u16::try_from(length).map_err(|_| ValidationError::BufferTooLong(length))?;
        Ok(i2c_msg {
            addr: msg.address(),
            flags: msg.flags().to_raw(),
            len,
            buf: msg.buffer_mut().as_mut_slice().as_mut_ptr(),
        })
    }
}

/// Lay messages out as the array of `i2c_msg` expected by I2C_RDWR
pub(crate) fn encode_messages(messages: &mut [I2CMessage<'_>]) -> Result<Vec<i2c_msg>, ValidationError> {
    messages.iter_mut().map(i2c_msg::try_from).collect()
}

bitflags! {
    /// Functionality bits reported by I2C_FUNCS
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct I2CFunctions: u32 {
        const I2C_FUNC_I2C = 0x0000_0001;
        const I2C_FUNC_10BIT_ADDR = 0x0000_0002;
        const I2C_FUNC_PROTOCOL_MANGLING = 0x0000_0004; /* I2C_M_IGNORE_NAK etc. */
        const I2C_FUNC_SMBUS_PEC = 0x0000_0008;
        const I2C_FUNC_NOSTART = 0x0000_0010; /* I2C_M_NOSTART */
        const I2C_FUNC_SLAVE = 0x0000_0020;
        const I2C_FUNC_SMBUS_BLOCK_PROC_CALL = 0x0000_8000; /* SMBus 2.0 */
        const I2C_FUNC_SMBUS_QUICK = 0x0001_0000;
        const I2C_FUNC_SMBUS_READ_BYTE = 0x0002_0000;
        const I2C_FUNC_SMBUS_WRITE_BYTE = 0x0004_0000;
        const I2C_FUNC_SMBUS_READ_BYTE_DATA = 0x0008_0000;
        const I2C_FUNC_SMBUS_WRITE_BYTE_DATA = 0x0010_0000;
        const I2C_FUNC_SMBUS_READ_WORD_DATA = 0x0020_0000;
        const I2C_FUNC_SMBUS_WRITE_WORD_DATA = 0x0040_0000;
        const I2C_FUNC_SMBUS_PROC_CALL = 0x0080_0000;
        const I2C_FUNC_SMBUS_READ_BLOCK_DATA = 0x0100_0000;
        const I2C_FUNC_SMBUS_WRITE_BLOCK_DATA  = 0x0200_0000;
        const I2C_FUNC_SMBUS_READ_I2C_BLOCK = 0x0400_0000; /* I2C-like block xfer  */
        const I2C_FUNC_SMBUS_WRITE_I2C_BLOCK = 0x0800_0000; /* w/ 1-byte reg. addr. */

        const I2C_FUNC_SMBUS_BYTE = (I2CFunctions::I2C_FUNC_SMBUS_READ_BYTE.bits() |
                                     I2CFunctions::I2C_FUNC_SMBUS_WRITE_BYTE.bits());
        const I2C_FUNC_SMBUS_BYTE_DATA = (I2CFunctions::I2C_FUNC_SMBUS_READ_BYTE_DATA.bits() |
                                          I2CFunctions::I2C_FUNC_SMBUS_WRITE_BYTE_DATA.bits());
        const I2C_FUNC_SMBUS_WORD_DATA = (I2CFunctions::I2C_FUNC_SMBUS_READ_WORD_DATA.bits() |
                                          I2CFunctions::I2C_FUNC_SMBUS_WRITE_WORD_DATA.bits());
        const I2C_FUNC_SMBUS_BLOCK_DATA = (I2CFunctions::I2C_FUNC_SMBUS_READ_BLOCK_DATA.bits() |
                                           I2CFunctions::I2C_FUNC_SMBUS_WRITE_BLOCK_DATA.bits());
        const I2C_FUNC_SMBUS_I2C_BLOCK = (I2CFunctions::I2C_FUNC_SMBUS_READ_I2C_BLOCK.bits() |
                                          I2CFunctions::I2C_FUNC_SMBUS_WRITE_I2C_BLOCK.bits());
    }
}

// In C, this is a union, but the largest item is clearly
// the largest.
//
// union i2c_smbus_data {
//     __u8 byte;
//     __u16 word;
//     __u8 block[I2C_SMBUS_BLOCK_MAX + 2]; /* block[0] is used for length */
//                            /* and one more for user-space compatibility */
// };
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct i2c_smbus_data {
    pub block: [u8; I2C_SMBUS_BLOCK_MAX + 2],
}

impl Default for i2c_smbus_data {
    fn default() -> i2c_smbus_data {
        i2c_smbus_data::empty()
    }
}

impl i2c_smbus_data {
    pub fn empty() -> i2c_smbus_data {
        i2c_smbus_data {
            block: [0; I2C_SMBUS_BLOCK_MAX + 2],
        }
    }

    /// Length prefixed block, `values` must hold at most 32 bytes
    pub fn with_block(values: &[u8]) -> i2c_smbus_data {
        let mut data = i2c_smbus_data::empty();
        let len = values.len().min(I2C_SMBUS_BLOCK_MAX);
        data.block[0] = len as u8;
        data.block[1..=len].copy_from_slice(&values[..len]);
        data
    }

    /// Length byte of a block transfer
    pub fn block_len(&self) -> u8 {
        self.block[0]
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum I2CSMBusReadWrite {
    I2C_SMBUS_READ = 1,
    I2C_SMBUS_WRITE = 0,
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum I2CSMBusSize {
    I2C_SMBUS_QUICK = 0,
    I2C_SMBUS_BYTE = 1,
    I2C_SMBUS_BYTE_DATA = 2,
    I2C_SMBUS_WORD_DATA = 3,
    I2C_SMBUS_PROC_CALL = 4,
    I2C_SMBUS_BLOCK_DATA = 5,
    I2C_SMBUS_I2C_BLOCK_BROKEN = 6,
    I2C_SMBUS_BLOCK_PROC_CALL = 7, // SMBus 2.0
    I2C_SMBUS_I2C_BLOCK_DATA = 8,
}

// from include/uapi/linux/i2c-dev.h
const I2C_RETRIES: u16 = 0x0701;
const I2C_TIMEOUT: u16 = 0x0702;
const I2C_SLAVE: u16 = 0x0703;
const I2C_SLAVE_FORCE: u16 = 0x0706;
const I2C_TENBIT: u16 = 0x0704;
const I2C_FUNCS: u16 = 0x0705;
const I2C_RDWR: u16 = 0x0707;
const I2C_PEC: u16 = 0x0708;
const I2C_SMBUS: u16 = 0x0720;

/// This is the structure as used in the I2C_SMBUS ioctl call
#[repr(C)]
pub struct i2c_smbus_ioctl_data {
    // __u8 read_write;
    read_write: u8,
    // __u8 command;
    command: u8,
    // __u32 size;
    size: u32,
    // union i2c_smbus_data __user *data;
    data: *mut i2c_smbus_data,
}

/// This is the structure as used in the I2C_RDWR ioctl call
// see linux/i2c-dev.h
#[repr(C)]
pub struct i2c_rdwr_ioctl_data {
    // struct i2c_msg __user *msgs;
    msgs: *mut i2c_msg,
    // __u32 nmsgs;
    nmsgs: u32,
}

mod ioctl {
    pub use super::i2c_rdwr_ioctl_data;
    pub use super::i2c_smbus_ioctl_data;
    use super::{
        I2C_FUNCS, I2C_PEC, I2C_RDWR, I2C_RETRIES, I2C_SLAVE, I2C_SLAVE_FORCE, I2C_SMBUS,
        I2C_TENBIT, I2C_TIMEOUT,
    };

    ioctl_write_int_bad!(set_i2c_slave_address, I2C_SLAVE);
    ioctl_write_int_bad!(set_i2c_slave_address_force, I2C_SLAVE_FORCE);
    ioctl_write_int_bad!(set_i2c_tenbit, I2C_TENBIT);
    ioctl_write_int_bad!(set_i2c_retries, I2C_RETRIES);
    ioctl_write_int_bad!(set_i2c_timeout, I2C_TIMEOUT);
    ioctl_write_int_bad!(set_smbus_pec, I2C_PEC);
    ioctl_read_bad!(get_i2c_funcs, I2C_FUNCS, libc::c_ulong);
    ioctl_write_ptr_bad!(i2c_smbus, I2C_SMBUS, i2c_smbus_ioctl_data);
    ioctl_write_ptr_bad!(i2c_rdwr, I2C_RDWR, i2c_rdwr_ioctl_data);
}

pub fn i2c_set_slave_address(fd: RawFd, slave_address: u16) -> Result<(), I2CError> {
    unsafe {
        ioctl::set_i2c_slave_address(fd, i32::from(slave_address))?;
    }
    Ok(())
}

pub fn i2c_set_slave_address_force(fd: RawFd, slave_address: u16) -> Result<(), I2CError> {
    unsafe {
        ioctl::set_i2c_slave_address_force(fd, i32::from(slave_address))?;
    }
    Ok(())
}

pub fn i2c_set_tenbit(fd: RawFd, enable: bool) -> Result<(), I2CError> {
    unsafe {
        ioctl::set_i2c_tenbit(fd, i32::from(enable))?;
    }
    Ok(())
}

pub fn i2c_set_retries(fd: RawFd, retries: i32) -> Result<(), I2CError> {
    unsafe {
        ioctl::set_i2c_retries(fd, retries)?;
    }
    Ok(())
}

/// `timeout` is in units of 10 ms
pub fn i2c_set_timeout(fd: RawFd, timeout: i32) -> Result<(), I2CError> {
    unsafe {
        ioctl::set_i2c_timeout(fd, timeout)?;
    }
    Ok(())
}

pub fn i2c_set_smbus_pec(fd: RawFd, enable: bool) -> Result<(), I2CError> {
    unsafe {
        ioctl::set_smbus_pec(fd, i32::from(enable))?;
    }
    Ok(())
}

pub fn i2c_get_functionality(fd: RawFd) -> Result<I2CFunctions, I2CError> {
    let mut funcs: libc::c_ulong = 0;
    unsafe {
        ioctl::get_i2c_funcs(fd, &mut funcs)?;
    }
    Ok(I2CFunctions::from_bits_truncate(funcs as u32))
}

pub fn i2c_smbus_access(
    fd: RawFd,
    read_write: I2CSMBusReadWrite,
    command: u8, // can be address or something else
    size: I2CSMBusSize,
    data: Option<&mut i2c_smbus_data>,
) -> Result<(), I2CError> {
    let args = i2c_smbus_ioctl_data {
        read_write: read_write as u8,
        command,
        size: size as u32,
        data: data.map_or(ptr::null_mut(), |d| d as *mut i2c_smbus_data),
    };

    // remove type information
    unsafe { ioctl::i2c_smbus(fd, &args).map(drop) }
}

/// Issue I2C_RDWR over already encoded messages
///
/// The buffers the records point to must stay borrowed until this returns,
/// the kernel writes into them for `READ` messages.
pub fn i2c_rdwr(fd: RawFd, values: &mut [i2c_msg]) -> Result<u32, I2CError> {
    let i2c_data = i2c_rdwr_ioctl_data {
        msgs: values.as_mut_ptr(),
        nmsgs: values.len() as u32,
    };

    let n;
    unsafe {
        n = ioctl::i2c_rdwr(fd, &i2c_data)?;
    }
    Ok(n as u32)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::buffer::I2CBuffer;
    use crate::core::I2CFlags;
    use std::mem;

    #[test]
    fn test_i2c_msg_layout() {
        // u16 addr, u16 flags, u16 len, then a pointer aligned field
        assert_eq!(mem::align_of::<i2c_msg>(), mem::align_of::<*mut u8>());
        assert_eq!(
            mem::size_of::<i2c_msg>(),
            if mem::size_of::<usize>() == 8 { 16 } else { 12 }
        );
        assert_eq!(mem::size_of::<i2c_smbus_data>(), 34);
    }

    #[test]
    fn test_encode_messages() {
        let mut command = I2CBuffer::from_slice(&[4]);
        let mut response = I2CBuffer::new(6);
        let command_ptr = command.as_slice().as_ptr();
        let response_ptr = response.as_slice().as_ptr();

        let mut msgs = [
            I2CMessage::write(0x42, &mut command),
            I2CMessage::read(0x42, &mut response).with_flags(I2CFlags::READ | I2CFlags::NO_START),
        ];
        let raw = encode_messages(&mut msgs).unwrap();

        assert_eq!(raw.len(), 2);
        assert_eq!(raw[0].addr, 0x42);
        assert_eq!(raw[0].flags, 0);
        assert_eq!(raw[0].len, 1);
        assert_eq!(raw[0].buf as *const u8, command_ptr);
        assert_eq!(raw[1].flags, 0x4001);
        assert_eq!(raw[1].len, 6);
        assert_eq!(raw[1].buf as *const u8, response_ptr);
    }

    #[test]
    fn test_encode_rejects_oversized_buffer() {
        let mut buffer = I2CBuffer::new(0x1_0000);
        let mut msgs = [I2CMessage::write(0x42, &mut buffer)];
        assert_eq!(
            encode_messages(&mut msgs).unwrap_err(),
            ValidationError::BufferTooLong(0x1_0000)
        );
    }

    #[test]
    fn test_smbus_block_data() {
        let data = i2c_smbus_data::with_block(&[45, 46, 47]);
        assert_eq!(data.block_len(), 3);
        assert_eq!(&data.block[..5], &[3, 45, 46, 47, 0]);
    }
}
