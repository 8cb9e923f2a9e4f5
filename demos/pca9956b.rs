// Copyright 2018, Piers Finlayson <piers@piersandkatie.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/license/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option.  This file may not be copied, modified, or distributed
// except according to those terms.

extern crate docopt;
extern crate i2cbus;

#[cfg(any(target_os = "linux", target_os = "android"))]
use i2cbus::{I2CBuffer, I2CBus, I2CMessage, I2CTransaction};

use docopt::Docopt;
use std::env::args;

const USAGE: &str = "
Reads registers from a PCA9956B IC via Linux i2cdev.

Assumes the PCA9956B is using address 0x20.

Usage:
  pca9956b <device>
  pca9956b (-h | --help)
  pca9956b --version

Options:
  -h --help    Show this help text.
  --version    Show version.
";

const ADDR: u16 = 0x20;

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn main() {}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn main() {
    let args = Docopt::new(USAGE)
        .and_then(|d| d.argv(args()).parse())
        .unwrap_or_else(|e| e.exit());
    let path = args.get_str("<device>");
    let mut bus = match I2CBus::open_path(path) {
        Ok(bus) => bus,
        Err(e) => {
            println!("Error opening I2C Bus {}", e);
            return;
        }
    };
    println!("Opened I2C Bus OK: {}", path);

    // Build two I2C messages:
    // 1) Write the MODE1 register address, with top bit indicating auto-
    //    increment should be enabled
    // 2) Read 10 bytes from the current register onwards
    let mut register = I2CBuffer::from_slice(&[0b1000_0000]);
    let mut data = I2CBuffer::new(10);
    let mut trx = I2CTransaction::new(vec![
        I2CMessage::write(ADDR, &mut register),
        I2CMessage::read(ADDR, &mut data),
    ]);

    // Both messages go to the kernel in one I2C_RDWR call
    match bus.do_transaction(&mut trx) {
        Ok(()) => println!("Successful transfer call: {} messages processed", trx.len()),
        Err(e) => {
            println!("Error reading/writing {}", e);
            return;
        }
    }
    drop(trx);

    // Print the data read from the device.  A recently reset PCA9956B should
    // return:
    // 0x8005000000000000ff00
    let mut output = "Result: 0x".to_string();
    for byte in data.as_slice() {
        output = format!("{}{:02x}", output, byte);
    }
    println!("{}", output);

    if let Err(e) = bus.close() {
        println!("Error closing I2C Bus {}", e);
    }
}
