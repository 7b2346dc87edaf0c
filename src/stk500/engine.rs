//! STK500 protocol engine
//!
//! Sync, program-enable, load-address, get-parameter and disable share one
//! shape: send the frame, read a status byte, and on `NoSync` run the sync
//! handshake and send the frame again, at most `MAX_SYNC_ATTEMPTS` times.
//! Paged writes are never re-sent; a failed page is reported as-is.

use super::{AvrMem, Command, Parameter, Response, CRC_EOP, MEM_TYPE_FLASH};
use crate::config::{MAX_SYNC_ATTEMPTS, PAGE_SIZE};
use crate::error::{Error, Result, Unrecoverable};
use crate::transport::{Transport, TransportError};

const MSG_SIZE: usize = 8;

const IN_SYNC: u8 = Response::InSync as u8;
const NO_SYNC: u8 = Response::NoSync as u8;
const OK: u8 = Response::Ok as u8;
const FAILED: u8 = Response::Failed as u8;
const NO_DEVICE: u8 = Response::NoDevice as u8;

const SYNC_FRAME: [u8; 2] = [Command::GetSync as u8, CRC_EOP];

/// Drives one target over a [`Transport`].
///
/// The message and response buffers belong to the engine and are reused by
/// each operation in turn; operations never overlap.
pub struct Stk500<T> {
    transport: T,
    msg: [u8; MSG_SIZE],
    resp: [u8; MSG_SIZE],
}

impl<T: Transport> Stk500<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            msg: [0; MSG_SIZE],
            resp: [0; MSG_SIZE],
        }
    }

    pub fn release(self) -> T {
        self.transport
    }

    /// Bring the target in sync, retrying while it answers `NoSync`.
    pub fn get_sync(&mut self) -> Result<()> {
        let mut tries: u8 = 0;
        loop {
            tries += 1;
            match self.handshake() {
                Err(Error::NoSync) if tries < MAX_SYNC_ATTEMPTS => continue,
                outcome => return outcome,
            }
        }
    }

    /// Read one programmer parameter.
    pub fn get_parameter(&mut self, param: Parameter) -> Result<u8> {
        self.msg[0] = Command::GetParameter as u8;
        self.msg[1] = param as u8;
        self.msg[2] = CRC_EOP;
        self.command(3)?;

        let value = self.read_resp(Unrecoverable::Result)?;
        match self.read_resp(Unrecoverable::Trailer)? {
            OK => Ok(value),
            FAILED => Err(Error::ParameterFailed),
            _ => Err(Error::NotOk),
        }
    }

    /// Load a flash word address, sent low byte first.
    pub fn load_addr(&mut self, addr: u16) -> Result<()> {
        let [lo, hi] = addr.to_le_bytes();
        self.msg[0] = Command::LoadAddress as u8;
        self.msg[1] = lo;
        self.msg[2] = hi;
        self.msg[3] = CRC_EOP;
        self.command(4)?;

        match self.read_resp(Unrecoverable::Result)? {
            OK => Ok(()),
            _ => Err(Error::NotOk),
        }
    }

    /// Write one full flash page at the previously loaded address.
    ///
    /// Header, page and terminator go out as three separate writes. A
    /// `NoSync` answer is returned, not retried: the address would have to
    /// be loaded again first.
    pub fn paged_write(&mut self, mem: &AvrMem) -> Result<()> {
        let [size_hi, size_lo] = (PAGE_SIZE as u16).to_be_bytes();
        self.msg[0] = Command::ProgramPage as u8;
        self.msg[1] = size_hi;
        self.msg[2] = size_lo;
        self.msg[3] = MEM_TYPE_FLASH;
        self.send_msg(4)?;
        self.transport.send(&mem.buf).map_err(|_| Error::Generic)?;
        self.msg[0] = CRC_EOP;
        self.send_msg(1)?;

        match self.read_resp(Unrecoverable::Status)? {
            IN_SYNC => {}
            NO_SYNC => return Err(Error::NoSync),
            _ => return Err(Error::ProtocolSync),
        }
        match self.read_resp(Unrecoverable::Result)? {
            OK => Ok(()),
            _ => Err(Error::NotOk),
        }
    }

    pub fn program_enable(&mut self) -> Result<()> {
        self.msg[0] = Command::EnterProgramMode as u8;
        self.msg[1] = CRC_EOP;
        self.command(2)?;

        match self.read_resp(Unrecoverable::Result)? {
            OK => Ok(()),
            NO_DEVICE => Err(Error::NoDevice),
            FAILED => Err(Error::NoProgramMode),
            _ => Err(Error::UnknownResponse),
        }
    }

    pub fn disable_device(&mut self) -> Result<()> {
        self.msg[0] = Command::LeaveProgramMode as u8;
        self.msg[1] = CRC_EOP;
        self.command(2)?;

        match self.read_resp(Unrecoverable::Result)? {
            OK => Ok(()),
            NO_DEVICE => Err(Error::NoDevice),
            _ => Err(Error::UnknownResponse),
        }
    }

    /// Single sync handshake: two flushing syncs, then one that must be
    /// answered `InSync`, `Ok`.
    fn handshake(&mut self) -> Result<()> {
        self.send(&SYNC_FRAME)?;
        self.transport.drain();
        self.send(&SYNC_FRAME)?;
        self.transport.drain();
        self.send(&SYNC_FRAME)?;

        match self.read_sync_byte()? {
            IN_SYNC => {}
            NO_SYNC => {
                self.transport.drain();
                return Err(Error::NoSync);
            }
            _ => {
                self.transport.drain();
                return Err(Error::ProtocolSync);
            }
        }
        match self.read_sync_byte()? {
            OK => Ok(()),
            _ => Err(Error::NotOk),
        }
    }

    /// Send the first `len` bytes of the message buffer until the target
    /// answers `InSync`.
    fn command(&mut self, len: usize) -> Result<()> {
        let mut tries: u8 = 0;
        loop {
            tries += 1;
            self.send_msg(len)?;

            match self.read_resp(Unrecoverable::Status)? {
                IN_SYNC => return Ok(()),
                NO_SYNC => {
                    if tries >= MAX_SYNC_ATTEMPTS {
                        return Err(Error::NoSync);
                    }
                    // the handshake leaves `msg` untouched
                    self.handshake()?;
                }
                _ => return Err(Error::ProtocolSync),
            }
        }
    }

    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.transport.send(bytes).map_err(|_| Error::Generic)
    }

    fn send_msg(&mut self, len: usize) -> Result<()> {
        self.transport
            .send(&self.msg[..len])
            .map_err(|_| Error::Generic)
    }

    fn read_resp(&mut self, stage: Unrecoverable) -> Result<u8> {
        self.transport
            .recv(&mut self.resp[..1])
            .map_err(|_| Error::Unrecoverable(stage))?;
        Ok(self.resp[0])
    }

    fn read_sync_byte(&mut self) -> Result<u8> {
        self.transport
            .recv(&mut self.resp[..1])
            .map_err(|err| match err {
                TransportError::Timeout => Error::NoProgrammer,
                TransportError::Io => Error::Generic,
            })?;
        Ok(self.resp[0])
    }
}
