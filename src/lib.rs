//! STK500 programmer for AVR targets.
//!
//! Reads an Intel HEX image from a byte source, assembles it into 128-byte
//! flash pages and writes them to a second microcontroller running an
//! STK500-compatible bootloader over a serial link.
#![cfg_attr(not(test), no_std)]
#![cfg_attr(target_arch = "avr", feature(abi_avr_interrupt))]

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod hex;
pub mod page;
pub mod programmer;
pub mod resource;
pub mod stk500;
pub mod transport;

#[cfg(target_arch = "avr")]
pub mod hal;

pub use error::Error;
pub use programmer::{AvrProgrammer, ProgramError, ProgramSummary, Stage};
pub use stk500::{AvrMem, Stk500};
pub use transport::{FirmwareSource, SerialTransport, SliceSource, Transport, TransportError};
