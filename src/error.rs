//! Outcome taxonomy of STK500 operations

use core::fmt;

/// Transport reads that must succeed once the target answered `InSync`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unrecoverable {
    /// Status byte following a command frame
    Status = 1,
    /// Result byte following `InSync`
    Result = 2,
    /// Trailing status byte of a parameter read
    Trailer = 3,
}

impl Unrecoverable {
    pub fn message(self) -> &'static str {
        match self {
            Unrecoverable::Status => "Unrecoverable #1",
            Unrecoverable::Result => "Unrecoverable #2",
            Unrecoverable::Trailer => "Unrecoverable #3",
        }
    }
}

/// Failure of an STK500 operation. Success is `Ok(..)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    Generic,
    UnknownResponse,
    NoDevice,
    /// Status byte was neither `InSync` nor `NoSync`
    ProtocolSync,
    /// Retry budget spent while the target kept reporting `NoSync`
    NoSync,
    NoProgramMode,
    /// Programmer not responding
    NoProgrammer,
    NotOk,
    ParameterFailed,
    /// The transport died after the target had already answered
    Unrecoverable(Unrecoverable),
}

impl Error {
    /// Numeric code reported on the diagnostic console.
    pub fn code(self) -> i8 {
        match self {
            Error::Generic | Error::Unrecoverable(_) => -1,
            Error::UnknownResponse => -2,
            Error::NoDevice => -3,
            Error::ProtocolSync => -4,
            Error::NoSync => -5,
            Error::NoProgramMode => -6,
            Error::NoProgrammer => -7,
            Error::NotOk => -8,
            Error::ParameterFailed => -9,
        }
    }

    /// Fatal errors mean the link itself is broken; retrying cannot help.
    pub fn is_fatal(self) -> bool {
        matches!(self, Error::Unrecoverable(_))
    }

    pub fn message(self) -> &'static str {
        match self {
            Error::Generic => "transport failure",
            Error::UnknownResponse => "unknown response",
            Error::NoDevice => "no device",
            Error::ProtocolSync => "protocol error, not in sync",
            Error::NoSync => "can't get in sync",
            Error::NoProgramMode => "failed to enter programming mode",
            Error::NoProgrammer => "programmer not responding",
            Error::NotOk => "response not ok",
            Error::ParameterFailed => "get parameter failed",
            Error::Unrecoverable(stage) => stage.message(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message(), self.code())
    }
}

impl ufmt::uDisplay for Error {
    fn fmt<W>(&self, f: &mut ufmt::Formatter<'_, W>) -> core::result::Result<(), W::Error>
    where
        W: ufmt::uWrite + ?Sized,
    {
        ufmt::uwrite!(f, "{} (code {})", self.message(), self.code())
    }
}

pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use std::string::{String, ToString};

    struct Line(String);

    impl ufmt::uWrite for Line {
        type Error = Infallible;

        fn write_str(&mut self, s: &str) -> core::result::Result<(), Infallible> {
            self.0.push_str(s);
            Ok(())
        }
    }

    #[test]
    fn codes_match_wire_taxonomy() {
        assert_eq!(Error::Generic.code(), -1);
        assert_eq!(Error::ProtocolSync.code(), -4);
        assert_eq!(Error::NoSync.code(), -5);
        assert_eq!(Error::ParameterFailed.code(), -9);
        assert_eq!(Error::Unrecoverable(Unrecoverable::Trailer).code(), -1);
    }

    #[test]
    fn only_unrecoverable_reads_are_fatal() {
        assert!(Error::Unrecoverable(Unrecoverable::Status).is_fatal());
        assert!(!Error::NoSync.is_fatal());
        assert!(!Error::Generic.is_fatal());
    }

    #[test]
    fn console_and_core_formatting_agree() {
        for err in [Error::NoSync, Error::Unrecoverable(Unrecoverable::Result)] {
            let mut line = Line(String::new());
            ufmt::uwrite!(line, "{}", err).unwrap();
            assert_eq!(line.0, err.to_string());
        }
        assert_eq!(Error::NotOk.to_string(), "response not ok (code -8)");
    }
}
