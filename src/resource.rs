//! Resource provider: serves files over the serial link while no
//! programming run is in progress.
//!
//! One control byte selects the request:
//! - `0x55` stops serving
//! - `'F'` then a name terminated by `\n` streams that file's bytes back
//! - `'L'` streams all entry names back to back, without separators
//!
//! Unknown control bytes are ignored. A missing file, or a name longer than
//! [`MAX_NAME`], yields an empty stream.

use crate::transport::{FirmwareSource, Transport, TransportError};

pub const CMD_STOP: u8 = 0x55;
pub const CMD_FILE: u8 = b'F';
pub const CMD_LIST: u8 = b'L';

pub const MAX_NAME: usize = 32;

const CHUNK: usize = 32;

/// Storage the provider serves from, e.g. an SD card volume.
pub trait ResourceStore {
    type File: FirmwareSource;

    fn open(&mut self, name: &str) -> Option<Self::File>;

    fn for_each_entry(&mut self, visit: &mut dyn FnMut(&str));
}

pub struct ResourceProvider<T, S> {
    transport: T,
    store: S,
    name: [u8; MAX_NAME],
}

impl<T: Transport, S: ResourceStore> ResourceProvider<T, S> {
    pub fn new(transport: T, store: S) -> Self {
        Self {
            transport,
            store,
            name: [0; MAX_NAME],
        }
    }

    pub fn release(self) -> (T, S) {
        (self.transport, self.store)
    }

    /// Serve requests until the stop byte arrives.
    pub fn provide(&mut self) -> Result<(), TransportError> {
        loop {
            let mut cmd = [0u8; 1];
            self.transport.recv(&mut cmd)?;
            match cmd[0] {
                CMD_STOP => return Ok(()),
                CMD_FILE => self.send_file()?,
                CMD_LIST => self.send_listing()?,
                _ => {}
            }
        }
    }

    fn send_file(&mut self) -> Result<(), TransportError> {
        let len = match self.read_name()? {
            Some(len) => len,
            None => return Ok(()),
        };
        let name = match core::str::from_utf8(&self.name[..len]) {
            Ok(name) => name,
            Err(_) => return Ok(()),
        };
        let mut file = match self.store.open(name) {
            Some(file) => file,
            None => return Ok(()),
        };

        let outcome = stream(&mut self.transport, &mut file);
        file.close();
        outcome
    }

    fn send_listing(&mut self) -> Result<(), TransportError> {
        let transport = &mut self.transport;
        let mut outcome = Ok(());
        self.store.for_each_entry(&mut |name| {
            if outcome.is_ok() {
                outcome = transport.send(name.as_bytes());
            }
        });
        outcome
    }

    /// Read a `\n`-terminated name; `None` when it does not fit.
    fn read_name(&mut self) -> Result<Option<usize>, TransportError> {
        let mut len = 0;
        let mut overflow = false;
        loop {
            let mut byte = [0u8; 1];
            self.transport.recv(&mut byte)?;
            match byte[0] {
                b'\n' => break,
                _ if len == MAX_NAME => overflow = true,
                c => {
                    self.name[len] = c;
                    len += 1;
                }
            }
        }
        Ok(if overflow { None } else { Some(len) })
    }
}

fn stream<T: Transport, F: FirmwareSource>(transport: &mut T, file: &mut F) -> Result<(), TransportError> {
    let mut chunk = [0u8; CHUNK];
    loop {
        let mut filled = 0;
        while filled < CHUNK {
            match file.read_byte() {
                Some(byte) => {
                    chunk[filled] = byte;
                    filled += 1;
                }
                None => break,
            }
        }
        if filled == 0 {
            return Ok(());
        }
        transport.send(&chunk[..filled])?;
        if filled < CHUNK {
            return Ok(());
        }
    }
}
