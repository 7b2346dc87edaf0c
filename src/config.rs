//! Configuration constants for the STK500 programmer

/// CPU frequency of the programmer board in Hz
pub const CPU_FREQ_HZ: u32 = 16_000_000;

/// Baud rate of the link to the target bootloader
pub const TARGET_BAUD: u32 = 57_600;

/// Baud rate of the diagnostic console
pub const DIAG_BAUD: u32 = 9600;

/// Reset line held high before the bootloader pulse, in milliseconds
pub const RESET_HOLD_MS: u16 = 100;

/// Width of the low reset pulse in microseconds
pub const RESET_PULSE_US: u16 = 1000;

/// Pause around the reset pulses while the bootloader starts, in milliseconds
pub const BOOT_SETTLE_MS: u16 = 10;

/// Flash page size of the target in bytes
pub const PAGE_SIZE: usize = 128;

/// Maximum data bytes in one HEX record
pub const RECORD_DATA_MAX: usize = 16;

/// HEX records gathered into one page
pub const RECORDS_PER_PAGE: usize = PAGE_SIZE / RECORD_DATA_MAX;

/// `NoSync` responses tolerated per operation before giving up
pub const MAX_SYNC_ATTEMPTS: u8 = 33;

/// Reset timing used by the programmer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub reset_hold_ms: u16,
    pub reset_pulse_us: u16,
    pub boot_settle_ms: u16,
}

impl Timing {
    /// Timing with every delay set to zero, for simulated targets.
    pub const fn immediate() -> Self {
        Self {
            reset_hold_ms: 0,
            reset_pulse_us: 0,
            boot_settle_ms: 0,
        }
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            reset_hold_ms: RESET_HOLD_MS,
            reset_pulse_us: RESET_PULSE_US,
            boot_settle_ms: BOOT_SETTLE_MS,
        }
    }
}
