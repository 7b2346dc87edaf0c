//! Byte transports: the serial link to the target and the firmware source

use embedded_hal::serial;

/// Failure of the underlying link, as opposed to a protocol-level rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// Nothing arrived within the transport's own deadline
    Timeout,
    /// The port reported an error
    Io,
}

/// Duplex byte channel to the target bootloader.
///
/// Reads block until the requested bytes arrive or the transport itself
/// gives up; the protocol layer adds no timeout of its own.
pub trait Transport {
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Fill `buffer` completely.
    fn recv(&mut self, buffer: &mut [u8]) -> Result<(), TransportError>;

    /// Discard whatever is already waiting in the receive path.
    fn drain(&mut self);
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        (**self).send(bytes)
    }

    fn recv(&mut self, buffer: &mut [u8]) -> Result<(), TransportError> {
        (**self).recv(buffer)
    }

    fn drain(&mut self) {
        (**self).drain()
    }
}

/// [`Transport`] over any embedded-hal serial port.
pub struct SerialTransport<S> {
    serial: S,
    read_budget: Option<u32>,
}

impl<S> SerialTransport<S>
where
    S: serial::Read<u8> + serial::Write<u8>,
{
    pub fn new(serial: S) -> Self {
        Self {
            serial,
            read_budget: None,
        }
    }

    /// Give up on a read after `polls` consecutive empty polls.
    pub fn with_read_budget(mut self, polls: u32) -> Self {
        self.read_budget = Some(polls);
        self
    }

    pub fn release(self) -> S {
        self.serial
    }

    fn read_byte(&mut self) -> Result<u8, TransportError> {
        let mut polls: u32 = 0;
        loop {
            match self.serial.read() {
                Ok(byte) => return Ok(byte),
                Err(nb::Error::WouldBlock) => {
                    if let Some(budget) = self.read_budget {
                        polls += 1;
                        if polls > budget {
                            return Err(TransportError::Timeout);
                        }
                    }
                }
                Err(nb::Error::Other(_)) => return Err(TransportError::Io),
            }
        }
    }
}

impl<S> Transport for SerialTransport<S>
where
    S: serial::Read<u8> + serial::Write<u8>,
{
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        for &byte in bytes {
            nb::block!(self.serial.write(byte)).map_err(|_| TransportError::Io)?;
        }
        Ok(())
    }

    fn recv(&mut self, buffer: &mut [u8]) -> Result<(), TransportError> {
        for slot in buffer.iter_mut() {
            *slot = self.read_byte()?;
        }
        Ok(())
    }

    fn drain(&mut self) {
        while self.serial.read().is_ok() {}
    }
}

/// File-like stream the firmware image is read from.
pub trait FirmwareSource {
    /// Next byte, or `None` once the source is exhausted.
    fn read_byte(&mut self) -> Option<u8>;

    fn peek_byte(&mut self) -> Option<u8>;

    /// Release the underlying storage handle.
    fn close(&mut self) {}
}

impl<F: FirmwareSource + ?Sized> FirmwareSource for &mut F {
    fn read_byte(&mut self) -> Option<u8> {
        (**self).read_byte()
    }

    fn peek_byte(&mut self) -> Option<u8> {
        (**self).peek_byte()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Firmware image held in memory, e.g. linked into program flash.
#[derive(Debug, Clone)]
pub struct SliceSource<'a> {
    data: &'a [u8],
    pos: usize,
    closed: bool,
}

impl<'a> SliceSource<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            closed: false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

impl FirmwareSource for SliceSource<'_> {
    fn read_byte(&mut self) -> Option<u8> {
        let byte = self.peek_byte()?;
        self.pos += 1;
        Some(byte)
    }

    fn peek_byte(&mut self) -> Option<u8> {
        if self.closed {
            return None;
        }
        self.data.get(self.pos).copied()
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
