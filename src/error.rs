// Copyright 2015, Paul Osborne <osbpau@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/license/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option.  This file may not be copied, modified, or distributed
// except according to those terms.

use nix::errno::Errno;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Malformed input, caught before anything is handed to the kernel
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("index {index} is out of bounds for length {length}")]
    Index { index: usize, length: usize },

    #[error("value {0} is not a byte (0..=255)")]
    ByteValue(i64),

    #[error("index {index} exceeds the block capacity of {capacity} bytes")]
    Capacity { index: usize, capacity: usize },

    #[error("address {address:#x} does not fit in {width} bits")]
    Address { address: u16, width: u8 },

    #[error("transaction contains no messages")]
    EmptyTransaction,

    #[error("transaction contains {0} messages, the kernel accepts at most 42")]
    TooManyMessages(usize),

    #[error("message {0} has an empty buffer")]
    EmptyBuffer(usize),

    #[error("buffer of {0} bytes does not fit in one i2c message")]
    BufferTooLong(usize),

    #[error("block length {0} exceeds the SMBus maximum of 32 bytes")]
    BlockLength(usize),

    #[error("block is empty, set its length to the number of bytes to read")]
    EmptyBlock,

    #[error("direct transfer of an empty buffer")]
    EmptyTransfer,

    #[error("message {0} receives its length but is not a read")]
    ReceiveLengthWrite(usize),

    #[error("message {0} receives its length but its first byte announces no bytes before the block")]
    ReceiveLengthPrefix(usize),

    #[error("message {index} receives its length but its buffer holds only {length} of {required} bytes")]
    ReceiveLengthBuffer {
        index: usize,
        length: usize,
        required: usize,
    },
}

/// The device answered with something the SMBus protocol does not allow
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("device reported a block length of {0}, at most 32 is allowed")]
    BlockLength(u8),

    #[error("transferred {actual} of {expected} bytes")]
    ShortTransfer { expected: usize, actual: usize },
}

/// Error that occurred while performing an I2C operation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum I2CError {
    #[error("unable to open {path}: {errno}", path = .path.display())]
    Open { path: PathBuf, errno: Errno },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("no slave address has been selected")]
    NoSlaveSelected,

    #[error("{operation} failed: {errno}")]
    Os {
        operation: &'static str,
        errno: Errno,
    },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Result of an I2C operation
pub type I2CResult<T> = Result<T, I2CError>;

impl I2CError {
    /// Wrap an OS error code raised by `operation`
    pub fn os(operation: &'static str, errno: Errno) -> I2CError {
        I2CError::Os { operation, errno }
    }

    /// The OS error code behind this error, if a syscall failed
    pub fn errno(&self) -> Option<Errno> {
        match *self {
            I2CError::Open { errno, .. } | I2CError::Os { errno, .. } => Some(errno),
            _ => None,
        }
    }

    /// Name of the failed syscall, if a syscall failed
    pub fn operation(&self) -> Option<&'static str> {
        match *self {
            I2CError::Open { .. } => Some("open"),
            I2CError::Os { operation, .. } => Some(operation),
            _ => None,
        }
    }
}

fn io_errno(e: &io::Error) -> Errno {
    Errno::from_i32(e.raw_os_error().unwrap_or(0))
}

impl I2CError {
    pub(crate) fn open(path: PathBuf, e: &io::Error) -> I2CError {
        I2CError::Open {
            path,
            errno: io_errno(e),
        }
    }
}

/// Tags a failed syscall with the name of the operation that issued it
pub(crate) trait OsContext<T> {
    fn during(self, operation: &'static str) -> I2CResult<T>;
}

impl<T> OsContext<T> for Result<T, Errno> {
    fn during(self, operation: &'static str) -> I2CResult<T> {
        self.map_err(|errno| I2CError::os(operation, errno))
    }
}

impl<T> OsContext<T> for Result<T, io::Error> {
    fn during(self, operation: &'static str) -> I2CResult<T> {
        self.map_err(|e| I2CError::os(operation, io_errno(&e)))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_errno_survives_translation() {
        let codes = [
            Errno::ENXIO,
            Errno::EACCES,
            Errno::EIO,
            Errno::EINVAL,
            Errno::EREMOTEIO,
        ];
        for &code in codes.iter() {
            let res: Result<(), Errno> = Err(code);
            let err = res.during("ioctl(I2C_RDWR)").unwrap_err();
            assert_eq!(err.errno(), Some(code));
            assert_eq!(err.operation(), Some("ioctl(I2C_RDWR)"));
        }
    }

    #[test]
    fn test_io_error_translation() {
        let res: Result<usize, io::Error> = Err(io::Error::from_raw_os_error(libc::EREMOTEIO));
        let err = res.during("read").unwrap_err();
        assert_eq!(err, I2CError::os("read", Errno::EREMOTEIO));
        assert_eq!(err.errno().map(|e| e as i32), Some(libc::EREMOTEIO));
    }

    #[test]
    fn test_open_error() {
        let e = io::Error::from_raw_os_error(libc::ENOENT);
        let err = I2CError::open(PathBuf::from("/dev/i2c-9"), &e);
        assert_eq!(err.operation(), Some("open"));
        assert_eq!(err.errno(), Some(Errno::ENOENT));
        assert!(err.to_string().contains("/dev/i2c-9"));
    }

    #[test]
    fn test_non_os_errors_carry_no_errno() {
        assert_eq!(I2CError::NoSlaveSelected.errno(), None);
        let err = I2CError::from(ValidationError::EmptyTransaction);
        assert_eq!(err.operation(), None);
        assert_eq!(err.to_string(), "transaction contains no messages");
    }
}
