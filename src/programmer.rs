//! Programming run: reset the target into its bootloader, stream the image
//! page by page and boot the result.

use core::fmt;

use embedded_hal::blocking::delay::{DelayMs, DelayUs};
use embedded_hal::digital::v2::OutputPin;

use crate::config::Timing;
use crate::diagnostics::{Diagnostics, NoDiagnostics};
use crate::error::Error;
use crate::hex::HexError;
use crate::page::PageAssembler;
use crate::stk500::{AvrMem, Parameter, Stk500};
use crate::transport::{FirmwareSource, Transport};

/// Step of the programming sequence that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Sync,
    ProgramEnable,
    LoadAddress,
    PagedWrite,
    DisableDevice,
    GetParameter,
}

impl Stage {
    pub fn message(self) -> &'static str {
        match self {
            Stage::Sync => "Problem getting in sync.",
            Stage::ProgramEnable => "Problem entering program mode.",
            Stage::LoadAddress => "Problem while loading page address.",
            Stage::PagedWrite => "Problem while writing page.",
            Stage::DisableDevice => "Problem disabling device.",
            Stage::GetParameter => "Problem reading parameter.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramError {
    Stk500 { stage: Stage, error: Error },
    Hex(HexError),
    /// Driving the reset line failed
    ResetLine,
}

impl ProgramError {
    pub fn code(&self) -> i8 {
        match self {
            ProgramError::Stk500 { error, .. } => error.code(),
            ProgramError::Hex(_) => -10,
            ProgramError::ResetLine => Error::Generic.code(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        match self {
            ProgramError::Stk500 { error, .. } => error.is_fatal(),
            _ => false,
        }
    }
}

impl fmt::Display for ProgramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgramError::Stk500 { stage, error } => write!(f, "{} {}", stage.message(), error),
            ProgramError::Hex(err) => write!(f, "Bad firmware image: {}", err),
            ProgramError::ResetLine => f.write_str("Reset line failure"),
        }
    }
}

impl From<HexError> for ProgramError {
    fn from(err: HexError) -> Self {
        ProgramError::Hex(err)
    }
}

/// What a successful run wrote.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProgramSummary {
    pub pages: u16,
    pub bytes: u32,
}

pub struct AvrProgrammer<T, RST, D, R = NoDiagnostics> {
    engine: Stk500<T>,
    reset: RST,
    delay: D,
    diag: R,
    timing: Timing,
    mem: AvrMem,
}

impl<T, RST, D> AvrProgrammer<T, RST, D, NoDiagnostics>
where
    T: Transport,
    RST: OutputPin,
    D: DelayMs<u16> + DelayUs<u16>,
{
    pub fn new(transport: T, reset: RST, delay: D) -> Self {
        Self {
            engine: Stk500::new(transport),
            reset,
            delay,
            diag: NoDiagnostics,
            timing: Timing::default(),
            mem: AvrMem::new(),
        }
    }
}

impl<T, RST, D, R> AvrProgrammer<T, RST, D, R>
where
    T: Transport,
    RST: OutputPin,
    D: DelayMs<u16> + DelayUs<u16>,
    R: Diagnostics,
{
    pub fn with_diagnostics<R2: Diagnostics>(self, diag: R2) -> AvrProgrammer<T, RST, D, R2> {
        AvrProgrammer {
            engine: self.engine,
            reset: self.reset,
            delay: self.delay,
            diag,
            timing: self.timing,
            mem: self.mem,
        }
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    /// Park the reset line high so the target keeps running.
    pub fn init(&mut self) -> Result<(), ProgramError> {
        self.reset.set_high().map_err(|_| ProgramError::ResetLine)
    }

    /// Flash `source` into the target.
    ///
    /// Fails fast: the first failing step ends the run. The source is closed
    /// on every exit path.
    pub fn program<S: FirmwareSource>(
        &mut self,
        mut source: S,
    ) -> Result<ProgramSummary, ProgramError> {
        let outcome = self.run(&mut source);
        source.close();
        outcome
    }

    /// Reset the target and read its bootloader's software version.
    pub fn bootloader_version(&mut self) -> Result<(u8, u8), ProgramError> {
        self.enter_bootloader()?;
        let result = self.engine.get_sync();
        self.check(Stage::Sync, result)?;

        let major = self.engine.get_parameter(Parameter::SoftwareMajor);
        let major = self.check(Stage::GetParameter, major)?;
        let minor = self.engine.get_parameter(Parameter::SoftwareMinor);
        let minor = self.check(Stage::GetParameter, minor)?;
        Ok((major, minor))
    }

    pub fn diagnostics(&mut self) -> &mut R {
        &mut self.diag
    }

    pub fn release(self) -> (T, RST, D, R) {
        (self.engine.release(), self.reset, self.delay, self.diag)
    }

    fn run<S: FirmwareSource>(&mut self, source: &mut S) -> Result<ProgramSummary, ProgramError> {
        self.enter_bootloader()?;

        let result = self.engine.get_sync();
        self.check(Stage::Sync, result)?;
        let result = self.engine.program_enable();
        self.check(Stage::ProgramEnable, result)?;
        self.diag.info("Entered program mode.");

        let mut pages = PageAssembler::new();
        let mut summary = ProgramSummary::default();
        loop {
            let len = match pages.assemble(source, &mut self.mem) {
                Ok(len) => len,
                Err(err) => {
                    self.diag.warning(ProgramError::Hex(err).code(), err.message());
                    return Err(err.into());
                }
            };
            if len == 0 {
                break;
            }

            let result = self.engine.load_addr(self.mem.word_addr());
            self.check(Stage::LoadAddress, result)?;
            let result = self.engine.paged_write(&self.mem);
            self.check(Stage::PagedWrite, result)?;

            summary.pages += 1;
            summary.bytes += len as u32;
        }
        self.diag.info("Finished programming.");

        let result = self.engine.disable_device();
        self.check(Stage::DisableDevice, result)?;
        self.delay.delay_ms(self.timing.boot_settle_ms);
        self.toggle_reset()?;
        self.diag.info("Done.");

        Ok(summary)
    }

    fn enter_bootloader(&mut self) -> Result<(), ProgramError> {
        self.reset.set_high().map_err(|_| ProgramError::ResetLine)?;
        self.delay.delay_ms(self.timing.reset_hold_ms);
        self.toggle_reset()?;
        self.delay.delay_ms(self.timing.boot_settle_ms);
        Ok(())
    }

    fn toggle_reset(&mut self) -> Result<(), ProgramError> {
        self.reset.set_low().map_err(|_| ProgramError::ResetLine)?;
        self.delay.delay_us(self.timing.reset_pulse_us);
        self.reset.set_high().map_err(|_| ProgramError::ResetLine)
    }

    fn check<V>(&mut self, stage: Stage, result: Result<V, Error>) -> Result<V, ProgramError> {
        result.map_err(|error| {
            if error.is_fatal() {
                self.diag.error(error.code(), error.message());
            } else {
                self.diag.warning(error.code(), stage.message());
            }
            ProgramError::Stk500 { stage, error }
        })
    }
}
