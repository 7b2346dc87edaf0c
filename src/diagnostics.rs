//! Operator-facing reporting on a secondary channel

use ufmt::{uWrite, uwriteln};

/// Sink for progress and failure reports of a programming run.
///
/// Reporting never changes control flow: the programmer still returns the
/// error, and the caller decides whether to halt, retry or carry on.
pub trait Diagnostics {
    fn info(&mut self, msg: &str);

    /// Recoverable failure; the next programming attempt may succeed.
    fn warning(&mut self, code: i8, msg: &str);

    /// The link to the target is broken.
    fn error(&mut self, code: i8, msg: &str);
}

impl<D: Diagnostics + ?Sized> Diagnostics for &mut D {
    fn info(&mut self, msg: &str) {
        (**self).info(msg)
    }

    fn warning(&mut self, code: i8, msg: &str) {
        (**self).warning(code, msg)
    }

    fn error(&mut self, code: i8, msg: &str) {
        (**self).error(code, msg)
    }
}

/// Discards every report.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDiagnostics;

impl Diagnostics for NoDiagnostics {
    fn info(&mut self, _msg: &str) {}

    fn warning(&mut self, _code: i8, _msg: &str) {}

    fn error(&mut self, _code: i8, _msg: &str) {}
}

/// Line-oriented text console, e.g. a spare UART.
pub struct Console<W> {
    out: W,
}

impl<W: uWrite> Console<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn writer(&mut self) -> &mut W {
        &mut self.out
    }

    pub fn release(self) -> W {
        self.out
    }
}

// A console that cannot write has nowhere to report that either.
impl<W: uWrite> Diagnostics for Console<W> {
    fn info(&mut self, msg: &str) {
        uwriteln!(self.out, "{}", msg).ok();
    }

    fn warning(&mut self, code: i8, msg: &str) {
        uwriteln!(self.out, "Warning: {} Code: {}.", msg, code).ok();
    }

    fn error(&mut self, code: i8, msg: &str) {
        uwriteln!(self.out, "Error: {} Code: {}.", msg, code).ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use std::string::String;

    struct Buffer(String);

    impl uWrite for Buffer {
        type Error = Infallible;

        fn write_str(&mut self, s: &str) -> Result<(), Infallible> {
            self.0.push_str(s);
            Ok(())
        }
    }

    #[test]
    fn warning_and_error_lines() {
        let mut console = Console::new(Buffer(String::new()));
        console.warning(-5, "Problem getting in sync.");
        console.error(-1, "Unrecoverable #2");
        console.info("Done.");

        assert_eq!(
            console.release().0,
            "Warning: Problem getting in sync. Code: -5.\n\
             Error: Unrecoverable #2 Code: -1.\n\
             Done.\n"
        );
    }
}
