//! STK500 (AVR061) wire protocol subset used to program flash
//!
//! Every command frame is an opcode, its parameters and the `CrcEop`
//! terminator. The target answers `InSync`, any result bytes, then `Ok`.

pub mod engine;

pub use engine::Stk500;

use crate::config::PAGE_SIZE;

/// Terminator of every command frame. Not an actual CRC.
pub const CRC_EOP: u8 = Special::CrcEop as u8;

/// Memory type byte of `ProgramPage`; EEPROM is not supported.
pub const MEM_TYPE_FLASH: u8 = b'F';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    Ok = 0x10,
    Failed = 0x11,
    Unknown = 0x12,
    NoDevice = 0x13,
    InSync = 0x14,
    NoSync = 0x15,
    AdcChannelError = 0x16,
    AdcMeasureOk = 0x17,
    PwmChannelError = 0x18,
    PwmAdjustOk = 0x19,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Special {
    CrcEop = 0x20,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    GetSync = 0x30,
    GetSignOn = 0x31,
    SetParameter = 0x40,
    GetParameter = 0x41,
    SetDevice = 0x42,
    SetDeviceExt = 0x45,
    EnterProgramMode = 0x50,
    LeaveProgramMode = 0x51,
    ChipErase = 0x52,
    CheckAutoInc = 0x53,
    LoadAddress = 0x55,
    Universal = 0x56,
    UniversalMulti = 0x57,
    ProgramFlash = 0x60,
    ProgramData = 0x61,
    ProgramFuse = 0x62,
    ProgramLock = 0x63,
    ProgramPage = 0x64,
    ProgramFuseExt = 0x65,
    ReadFlash = 0x70,
    ReadData = 0x71,
    ReadFuse = 0x72,
    ReadLock = 0x73,
    ReadPage = 0x74,
    ReadSign = 0x75,
    ReadOscCal = 0x76,
    ReadFuseExt = 0x77,
    ReadOscCalExt = 0x78,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parameter {
    HardwareVersion = 0x80,
    SoftwareMajor = 0x81,
    SoftwareMinor = 0x82,
    Leds = 0x83,
    VTarget = 0x84,
    VAdjust = 0x85,
    OscPScale = 0x86,
    OscCMatch = 0x87,
    ResetDuration = 0x88,
    SckDuration = 0x89,
    BuffSizeL = 0x90,
    BuffSizeH = 0x91,
    Device = 0x92,
    ProgramMode = 0x93,
    ParameterMode = 0x94,
    Polling = 0x95,
    SelfTimed = 0x96,
    TopCardDetect = 0x98,
}

/// Bits of the programmer status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusBit {
    InSync = 0x01,
    ProgramMode = 0x02,
    Standalone = 0x04,
    /// Reset button, 1 == pushed
    Reset = 0x08,
    /// Program button, 1 == pushed
    Program = 0x10,
    LedG = 0x20,
    LedR = 0x40,
    LedBlink = 0x80,
}

impl StatusBit {
    pub fn is_set(self, status: u8) -> bool {
        status & self as u8 != 0
    }
}

/// One flash page on its way to the target.
///
/// Lives for exactly one page-write cycle and is then refilled in place.
#[derive(Debug, Clone)]
pub struct AvrMem {
    /// Byte address of the first record in the page
    pub page_addr: u16,
    /// Bytes actually taken from the image, at most `PAGE_SIZE`
    pub size: usize,
    pub buf: [u8; PAGE_SIZE],
}

impl AvrMem {
    pub const fn new() -> Self {
        Self {
            page_addr: 0,
            size: 0,
            buf: [0xFF; PAGE_SIZE],
        }
    }

    /// Reset to an empty page of erased flash.
    pub fn clear(&mut self) {
        self.page_addr = 0;
        self.size = 0;
        self.buf = [0xFF; PAGE_SIZE];
    }

    pub fn data(&self) -> &[u8] {
        &self.buf[..self.size]
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Word address loaded before the page write.
    pub fn word_addr(&self) -> u16 {
        self.page_addr >> 1
    }
}

impl Default for AvrMem {
    fn default() -> Self {
        Self::new()
    }
}
