// Copyright 2015, Paul Osborne <osbpau@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/license/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option.  This file may not be copied, modified, or distributed
// except according to those terms.

use crate::buffer::{I2CBuffer, I2C_SMBUS_BLOCK_MAX};
use crate::error::{I2CResult, ValidationError};
use crate::ffi::{i2c_smbus_data, I2CFunctions, I2CSMBusReadWrite, I2CSMBusSize};
use std::iter::FromIterator;
use std::time::Duration;

/// Most messages the kernel accepts in a single I2C_RDWR call
pub const I2C_RDWR_IOCTL_MAX_MSGS: usize = 42;

bitflags! {
    /// Transfer modifiers of one message, bit for bit the kernel's
    /// `i2c_msg.flags`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct I2CFlags: u16 {
        /// read data, from slave to master
        const READ = 0x0001;
        /// this is a ten bit chip address
        const TEN_BIT_ADDRESS = 0x0010;
        /// length will be first received byte
        const RECEIVE_LENGTH = 0x0400;
        /// if I2C_FUNC_PROTOCOL_MANGLING
        const NO_READ_ACK = 0x0800;
        /// if I2C_FUNC_PROTOCOL_MANGLING
        const IGNORE_NO_ACK = 0x1000;
        /// if I2C_FUNC_PROTOCOL_MANGLING
        const REVISE_RW_BIT = 0x2000;
        /// if I2C_FUNC_NOSTART
        const NO_START = 0x4000;
        /// if I2C_FUNC_PROTOCOL_MANGLING
        const STOP = 0x8000;
    }
}

impl I2CFlags {
    /// Parse the kernel representation, unknown bits are rejected
    pub fn from_raw(bits: u16) -> Option<I2CFlags> {
        I2CFlags::from_bits(bits)
    }

    pub fn to_raw(self) -> u16 {
        self.bits()
    }
}

/// Check that `address` fits the addressing mode
pub(crate) fn check_address(address: u16, ten_bit: bool) -> Result<(), ValidationError> {
    let (max, width) = if ten_bit { (0x3FF, 10) } else { (0x7F, 7) };
    if address > max {
        return Err(ValidationError::Address { address, width });
    }
    Ok(())
}

/// One segment of an I2C transaction
///
/// The message borrows its buffer mutably for as long as it lives, so the
/// buffer cannot be touched while a transfer may be writing into it.  Once
/// the message (or the transaction holding it) goes away the buffer is free
/// to be read or attached to another message.
#[derive(Debug)]
pub struct I2CMessage<'a> {
    address: u16,
    flags: I2CFlags,
    buffer: &'a mut I2CBuffer,
}

impl<'a> I2CMessage<'a> {
    /// Write the content of `buffer` to the slave at `address`
    pub fn write(address: u16, buffer: &'a mut I2CBuffer) -> I2CMessage<'a> {
        I2CMessage {
            address,
            flags: I2CFlags::default(),
            buffer,
        }
    }

    /// Fill `buffer` with bytes read from the slave at `address`
    pub fn read(address: u16, buffer: &'a mut I2CBuffer) -> I2CMessage<'a> {
        I2CMessage {
            address,
            flags: I2CFlags::READ,
            buffer,
        }
    }

    /// Read an SMBus style block whose length is the first byte the slave
    /// sends
    ///
    /// The first byte of `buffer` is set to 1 so that the kernel expects
    /// just the count byte ahead of the block.  After the transfer it holds
    /// the count, followed by the data bytes.
    pub fn receive_length(address: u16, buffer: &'a mut I2CBuffer) -> I2CMessage<'a> {
        if let Some(first) = buffer.as_mut_slice().first_mut() {
            *first = 1;
        }
        I2CMessage {
            address,
            flags: I2CFlags::READ | I2CFlags::RECEIVE_LENGTH,
            buffer,
        }
    }

    pub fn with_address(mut self, address: u16) -> I2CMessage<'a> {
        self.address = address;
        self
    }

    /// Replace all flags of the message
    pub fn with_flags(mut self, flags: I2CFlags) -> I2CMessage<'a> {
        self.flags = flags;
        self
    }

    pub fn address(&self) -> u16 {
        self.address
    }

    pub fn set_address(&mut self, address: u16) {
        self.address = address;
    }

    pub fn flags(&self) -> I2CFlags {
        self.flags
    }

    pub fn flags_mut(&mut self) -> &mut I2CFlags {
        &mut self.flags
    }

    pub fn is_read(&self) -> bool {
        self.flags.contains(I2CFlags::READ)
    }

    pub fn buffer(&self) -> &I2CBuffer {
        &*self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut I2CBuffer {
        &mut *self.buffer
    }

    fn validate(&self, index: usize) -> Result<(), ValidationError> {
        check_address(self.address, self.flags.contains(I2CFlags::TEN_BIT_ADDRESS))?;
        let length = self.buffer.len();
        if length == 0 {
            return Err(ValidationError::EmptyBuffer(index));
        }
        if length > usize::from(u16::max_value()) {
            return Err(ValidationError::BufferTooLong(length));
        }
        self.check_receive_length(index)
    }

    /// Rules i2c-dev applies to a message flagged `RECEIVE_LENGTH`
    ///
    /// The first byte of the buffer announces how many bytes precede the
    /// block (1 for the count byte, 2 with PEC), and the buffer must have
    /// room for those plus a full block.
    pub(crate) fn check_receive_length(&self, index: usize) -> Result<(), ValidationError> {
        if !self.flags.contains(I2CFlags::RECEIVE_LENGTH) {
            return Ok(());
        }
        if !self.is_read() {
            return Err(ValidationError::ReceiveLengthWrite(index));
        }
        let prefix = match self.buffer.as_slice().first() {
            Some(&b) if b >= 1 => usize::from(b),
            _ => return Err(ValidationError::ReceiveLengthPrefix(index)),
        };
        let length = self.buffer.len();
        let required = prefix + I2C_SMBUS_BLOCK_MAX;
        if length < required {
            return Err(ValidationError::ReceiveLengthBuffer {
                index,
                length,
                required,
            });
        }
        Ok(())
    }
}

/// Ordered messages executed back to back without releasing the bus
#[derive(Debug, Default)]
pub struct I2CTransaction<'a> {
    messages: Vec<I2CMessage<'a>>,
}

impl<'a> I2CTransaction<'a> {
    pub fn new(messages: Vec<I2CMessage<'a>>) -> I2CTransaction<'a> {
        I2CTransaction { messages }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn message(&self, index: usize) -> Option<&I2CMessage<'a>> {
        self.messages.get(index)
    }

    pub fn message_mut(&mut self, index: usize) -> Option<&mut I2CMessage<'a>> {
        self.messages.get_mut(index)
    }

    pub fn messages(&self) -> &[I2CMessage<'a>] {
        &self.messages
    }

    pub fn messages_mut(&mut self) -> &mut [I2CMessage<'a>] {
        &mut self.messages
    }

    /// Check everything the kernel would otherwise reject
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.messages.is_empty() {
            return Err(ValidationError::EmptyTransaction);
        }
        if self.messages.len() > I2C_RDWR_IOCTL_MAX_MSGS {
            return Err(ValidationError::TooManyMessages(self.messages.len()));
        }
        for (i, msg) in self.messages.iter().enumerate() {
            msg.validate(i)?;
        }
        Ok(())
    }
}

impl<'a> From<Vec<I2CMessage<'a>>> for I2CTransaction<'a> {
    fn from(messages: Vec<I2CMessage<'a>>) -> I2CTransaction<'a> {
        I2CTransaction::new(messages)
    }
}

impl<'a> FromIterator<I2CMessage<'a>> for I2CTransaction<'a> {
    fn from_iter<I: IntoIterator<Item = I2CMessage<'a>>>(iter: I) -> I2CTransaction<'a> {
        I2CTransaction::new(iter.into_iter().collect())
    }
}

/// How a slave address gets selected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SlaveOptions {
    /// Select the address even if a kernel driver already claimed it
    pub force: bool,
    /// The address is 10 bits wide
    pub ten_bit: bool,
}

/// Raw syscall surface of an I2C bus
///
/// `LinuxI2CAdapter` talks to the kernel, `MockI2CAdapter` emulates a bus
/// in memory.  Arguments arrive already validated by `I2CBus`; errors must
/// be reported as `I2CError::Os` tagged with the name of the operation.
pub trait I2CAdapter {
    /// Address used by `read`, `write` and `smbus_access` (I2C_SLAVE)
    fn set_slave_address(&mut self, address: u16, force: bool) -> I2CResult<()>;

    /// Switch between 7 and 10 bit slave addresses (I2C_TENBIT)
    fn set_ten_bit(&mut self, enable: bool) -> I2CResult<()>;

    /// What the adapter is able to do (I2C_FUNCS)
    fn functionalities(&mut self) -> I2CResult<I2CFunctions>;

    /// Retries when the slave does not acknowledge (I2C_RETRIES)
    fn set_retries(&mut self, retries: u32) -> I2CResult<()>;

    /// Transfer timeout (I2C_TIMEOUT)
    fn set_timeout(&mut self, timeout: Duration) -> I2CResult<()>;

    /// Packet error checking for SMBus transfers (I2C_PEC)
    fn set_pec(&mut self, enable: bool) -> I2CResult<()>;

    /// Run all messages as one combined transfer (I2C_RDWR)
    ///
    /// Returns the number of messages processed.
    fn transfer(&mut self, messages: &mut [I2CMessage<'_>]) -> I2CResult<u32>;

    /// One SMBus transfer (I2C_SMBUS)
    fn smbus_access(
        &mut self,
        read_write: I2CSMBusReadWrite,
        command: u8,
        size: I2CSMBusSize,
        data: Option<&mut i2c_smbus_data>,
    ) -> I2CResult<()>;

    /// Plain read from the selected slave
    fn read(&mut self, data: &mut [u8]) -> I2CResult<usize>;

    /// Plain write to the selected slave
    fn write(&mut self, data: &[u8]) -> I2CResult<usize>;

    /// Release the underlying resource
    fn close(self) -> I2CResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const ALL: [I2CFlags; 8] = [
        I2CFlags::READ,
        I2CFlags::TEN_BIT_ADDRESS,
        I2CFlags::RECEIVE_LENGTH,
        I2CFlags::NO_READ_ACK,
        I2CFlags::IGNORE_NO_ACK,
        I2CFlags::REVISE_RW_BIT,
        I2CFlags::NO_START,
        I2CFlags::STOP,
    ];

    #[test]
    fn test_flag_bits_match_kernel() {
        assert_eq!(I2CFlags::default().to_raw(), 0);
        assert_eq!(I2CFlags::READ.to_raw(), 1 << 0);
        assert_eq!(I2CFlags::TEN_BIT_ADDRESS.to_raw(), 1 << 4);
        assert_eq!(I2CFlags::IGNORE_NO_ACK.to_raw(), 1 << 12);
        assert_eq!(I2CFlags::NO_START.to_raw(), 1 << 14);
        assert_eq!(I2CFlags::STOP.to_raw(), 1 << 15);
    }

    #[test]
    fn test_flags_round_trip() {
        for mask in 0u32..(1 << ALL.len()) {
            let mut flags = I2CFlags::default();
            for (i, flag) in ALL.iter().enumerate() {
                if mask & (1 << i) != 0 {
                    flags.insert(*flag);
                }
            }
            assert_eq!(I2CFlags::from_raw(flags.to_raw()), Some(flags));
        }
        assert_eq!(I2CFlags::from_raw(0x0002), None);
    }

    #[test]
    fn test_flags_set_clear_idempotent() {
        let mut flags = I2CFlags::default();
        flags.insert(I2CFlags::READ);
        flags.insert(I2CFlags::READ);
        assert_eq!(flags, I2CFlags::READ);
        flags.remove(I2CFlags::READ);
        flags.remove(I2CFlags::READ);
        assert!(flags.is_empty());
    }

    #[test]
    fn test_message_builders() {
        let mut buffer = I2CBuffer::new(1);
        let msg = I2CMessage::read(0x42, &mut buffer);
        assert!(msg.is_read());
        let msg = msg.with_flags(I2CFlags::IGNORE_NO_ACK).with_address(0x10);
        assert!(!msg.is_read());
        assert_eq!(msg.address(), 0x10);
    }

    #[test]
    fn test_empty_transaction() {
        let trx = I2CTransaction::default();
        assert_eq!(trx.validate(), Err(ValidationError::EmptyTransaction));
    }

    #[test]
    fn test_empty_buffer() {
        let mut ok = I2CBuffer::new(1);
        let mut empty = I2CBuffer::new(0);
        let trx = I2CTransaction::new(vec![
            I2CMessage::write(0x42, &mut ok),
            I2CMessage::read(0x42, &mut empty),
        ]);
        assert_eq!(trx.validate(), Err(ValidationError::EmptyBuffer(1)));
    }

    #[test]
    fn test_message_addresses() {
        let mut buffer = I2CBuffer::new(1);
        let trx: I2CTransaction = vec![I2CMessage::write(0x80, &mut buffer)].into();
        assert_eq!(
            trx.validate(),
            Err(ValidationError::Address { address: 0x80, width: 7 })
        );

        let mut buffer = I2CBuffer::new(1);
        let trx: I2CTransaction =
            vec![I2CMessage::write(0x3FF, &mut buffer).with_flags(I2CFlags::TEN_BIT_ADDRESS)].into();
        assert_eq!(trx.validate(), Ok(()));
    }

    #[test]
    fn test_too_many_messages() {
        let mut buffers: Vec<I2CBuffer> = (0..43).map(|_| I2CBuffer::new(1)).collect();
        let trx: I2CTransaction = buffers
            .iter_mut()
            .map(|b| I2CMessage::write(0x42, b))
            .collect();
        assert_eq!(trx.validate(), Err(ValidationError::TooManyMessages(43)));
    }

    #[test]
    fn test_receive_length_needs_room() {
        let mut small = I2CBuffer::new(8);
        let trx: I2CTransaction = vec![I2CMessage::receive_length(0x42, &mut small)].into();
        assert_eq!(
            trx.validate(),
            Err(ValidationError::ReceiveLengthBuffer { index: 0, length: 8, required: 33 })
        );

        // two bytes ahead of the block when PEC is in use
        let mut pec = I2CBuffer::new(33);
        let mut msg = I2CMessage::receive_length(0x42, &mut pec);
        msg.buffer_mut().set(0, 2).unwrap();
        let trx: I2CTransaction = vec![msg].into();
        assert_eq!(
            trx.validate(),
            Err(ValidationError::ReceiveLengthBuffer { index: 0, length: 33, required: 34 })
        );
    }

    #[test]
    fn test_receive_length_needs_a_prefix() {
        // a zeroed buffer announces nothing ahead of the block
        let mut zeroed = I2CBuffer::new(33);
        let trx: I2CTransaction = vec![I2CMessage::read(0x42, &mut zeroed)
            .with_flags(I2CFlags::READ | I2CFlags::RECEIVE_LENGTH)]
        .into();
        assert_eq!(trx.validate(), Err(ValidationError::ReceiveLengthPrefix(0)));

        let mut seeded = I2CBuffer::new(33);
        let trx: I2CTransaction = vec![I2CMessage::receive_length(0x42, &mut seeded)].into();
        assert_eq!(trx.validate(), Ok(()));
        drop(trx);
        assert_eq!(seeded.get(0), Ok(1));
    }

    #[test]
    fn test_receive_length_needs_read() {
        let mut ok = I2CBuffer::new(1);
        let mut buffer = I2CBuffer::from_slice(&[1; 40]);
        let trx: I2CTransaction = vec![
            I2CMessage::write(0x42, &mut ok),
            I2CMessage::write(0x42, &mut buffer).with_flags(I2CFlags::RECEIVE_LENGTH),
        ]
        .into();
        assert_eq!(trx.validate(), Err(ValidationError::ReceiveLengthWrite(1)));
    }
}
