// Copyright 2015, Paul Osborne <osbpau@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/license/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option.  This file may not be copied, modified, or distributed
// except according to those terms.

extern crate docopt;
extern crate env_logger;
extern crate i2cbus;
#[macro_use]
extern crate log;

use docopt::{ArgvMap, Docopt};
use i2cbus::{I2CBlock, I2CBuffer, I2CBus, I2CMessage, I2CResult, LinuxI2CAdapter};
use std::env::args;
use std::process;
use std::str::FromStr;
use std::thread;
use std::time::Duration;

const USAGE: &str = "
Exercises the bus against a microcontroller running the io tester firmware.

The firmware answers at address 0x42 and understands five commands sent as
the first byte of a write: 0 reset (reads return 42), 1 single read,
2 single write, 3 multi read, 4 multi write.

Usage:
  io_tester [--bus <n>] [--wait <ms>]
  io_tester (-h | --help)
  io_tester --version

Options:
  -h --help    Show this help text.
  --version    Show version.
  --bus <n>    Number of the bus, /dev/i2c-<n> [default: 1].
  --wait <ms>  Pause between operations so the firmware can log over serial [default: 100].
";

const ADDRESS: u16 = 0x42;

const COMMAND_RESET: u8 = 0;
const COMMAND_SINGLE_READ: u8 = 1;
const COMMAND_SINGLE_WRITE: u8 = 2;
const COMMAND_MULTI_READ: u8 = 3;
const COMMAND_MULTI_WRITE: u8 = 4;

struct Tester {
    bus: u32,
    wait: Duration,
}

impl Tester {
    fn pause(&self) {
        thread::sleep(self.wait);
    }

    fn reset(&self) -> I2CResult<I2CBus<LinuxI2CAdapter>> {
        let mut bus = I2CBus::open(self.bus)?;
        bus.select_slave(ADDRESS)?;
        self.pause();
        bus.write_byte_directly(COMMAND_RESET)?;
        self.pause();
        Ok(bus)
    }

    fn transaction_direct_read(&self) -> I2CResult<bool> {
        let mut bus = self.reset()?;
        let mut buffer = I2CBuffer::new(1);
        bus.do_transaction(&mut vec![I2CMessage::read(ADDRESS, &mut buffer)].into())?;
        bus.close()?;
        Ok(buffer.as_slice() == [42])
    }

    fn transaction_single(&self) -> I2CResult<bool> {
        let mut bus = self.reset()?;
        let mut write = I2CBuffer::from_slice(&[COMMAND_SINGLE_WRITE, 246]);
        bus.do_transaction(&mut vec![I2CMessage::write(ADDRESS, &mut write)].into())?;
        self.pause();

        let mut request = I2CBuffer::from_slice(&[COMMAND_SINGLE_READ]);
        bus.do_transaction(&mut vec![I2CMessage::write(ADDRESS, &mut request)].into())?;
        self.pause();

        let mut read = I2CBuffer::new(1);
        bus.do_transaction(&mut vec![I2CMessage::read(ADDRESS, &mut read)].into())?;
        bus.close()?;
        Ok(read.as_slice() == [246])
    }

    fn transaction_multi(&self) -> I2CResult<bool> {
        let mut bus = self.reset()?;
        let mut write = I2CBuffer::from_slice(&[COMMAND_MULTI_WRITE, 1, 2, 3, 4, 5, 6]);
        bus.do_transaction(&mut vec![I2CMessage::write(ADDRESS, &mut write)].into())?;
        self.pause();

        bus.write_byte_directly(COMMAND_MULTI_READ)?;
        self.pause();

        let mut read = I2CBuffer::new(6);
        bus.do_transaction(&mut vec![I2CMessage::read(ADDRESS, &mut read)].into())?;
        bus.close()?;
        Ok(read.as_slice() == [1, 2, 3, 4, 5, 6])
    }

    fn smbus(&self) -> I2CResult<bool> {
        let mut bus = self.reset()?;
        let direct = bus.read_byte_directly()?;
        self.pause();

        let mut block = I2CBlock::new();
        block.set(0, 246)?;
        bus.write_i2c_block(COMMAND_SINGLE_WRITE, &block)?;
        self.pause();
        bus.write_byte_directly(COMMAND_SINGLE_READ)?;
        self.pause();
        let single = bus.read_byte_directly()?;

        let block = I2CBlock::from_slice(&[45, 46, 47, 48])?;
        self.pause();
        bus.write_i2c_block(COMMAND_MULTI_WRITE, &block)?;
        self.pause();
        bus.write_byte_directly(COMMAND_MULTI_READ)?;
        self.pause();
        let mut buffer = I2CBuffer::new(block.len());
        bus.read(&mut buffer)?;
        bus.close()?;

        Ok(direct == 42 && single == 246 && buffer.as_slice() == block.as_slice())
    }
}

fn number<T: FromStr>(args: &ArgvMap, flag: &str) -> T {
    args.get_str(flag).parse().unwrap_or_else(|_| {
        println!("{} expects a number, got {:?}", flag, args.get_str(flag));
        process::exit(2);
    })
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn main() {}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn main() {
    env_logger::init();

    let args = Docopt::new(USAGE)
        .and_then(|d| d.argv(args()).parse())
        .unwrap_or_else(|e| e.exit());
    let tester = Tester {
        bus: number(&args, "--bus"),
        wait: Duration::from_millis(number(&args, "--wait")),
    };

    let scenarios: [(&str, fn(&Tester) -> I2CResult<bool>); 4] = [
        ("direct read using a transaction", Tester::transaction_direct_read),
        ("single write and read using transactions", Tester::transaction_single),
        ("multi write and read using transactions", Tester::transaction_multi),
        ("smbus operations", Tester::smbus),
    ];

    let mut failures = 0;
    for (name, scenario) in scenarios.iter() {
        match scenario(&tester) {
            Ok(true) => println!("ok      {}", name),
            Ok(false) => {
                failures += 1;
                println!("FAILED  {}: unexpected bytes", name);
            }
            Err(e) => {
                failures += 1;
                error!("{} failed: {}", name, e);
                println!("FAILED  {}: {}", name, e);
            }
        }
    }
    if failures > 0 {
        process::exit(1);
    }
}
