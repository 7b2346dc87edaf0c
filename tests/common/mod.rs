#![allow(dead_code)]

use std::collections::VecDeque;

use migs_programmer::diagnostics::Diagnostics;
use migs_programmer::hex::byte_to_hex;
use migs_programmer::{Transport, TransportError};

pub const IN_SYNC: u8 = 0x14;
pub const NO_SYNC: u8 = 0x15;
pub const OK: u8 = 0x10;
pub const FAILED: u8 = 0x11;
pub const NO_DEVICE: u8 = 0x13;
pub const SYNC: [u8; 2] = [0x30, 0x20];

/// Replays canned bytes and records every write call as one frame.
///
/// Draining never discards the script: the scripted bytes stand for what
/// the target sends after the drain.
pub struct ScriptedLink {
    replies: VecDeque<u8>,
    pub frames: Vec<Vec<u8>>,
    pub drains: usize,
}

impl ScriptedLink {
    pub fn new(replies: &[u8]) -> Self {
        Self {
            replies: replies.iter().copied().collect(),
            frames: Vec::new(),
            drains: 0,
        }
    }

    pub fn remaining(&self) -> usize {
        self.replies.len()
    }

    pub fn sent(&self) -> Vec<u8> {
        self.frames.concat()
    }

    pub fn count_frames(&self, frame: &[u8]) -> usize {
        self.frames.iter().filter(|f| f.as_slice() == frame).count()
    }
}

impl Transport for ScriptedLink {
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.frames.push(bytes.to_vec());
        Ok(())
    }

    fn recv(&mut self, buffer: &mut [u8]) -> Result<(), TransportError> {
        for slot in buffer.iter_mut() {
            *slot = self.replies.pop_front().ok_or(TransportError::Timeout)?;
        }
        Ok(())
    }

    fn drain(&mut self) {
        self.drains += 1;
    }
}

/// Optiboot-like target: answers complete command frames and keeps a flash
/// image. Replies not yet read are lost on drain, as on a real wire.
pub struct SimTarget {
    pub flash: Vec<u8>,
    pub loads: Vec<u16>,
    pub pages_written: usize,
    pub sync_frames: usize,
    pub commands: Vec<u8>,
    pub program_mode: bool,
    /// Answer the next N non-sync commands with `NoSync`
    pub desync: usize,
    /// Status byte answered to EnterProgramMode
    pub enable_status: u8,
    /// Link dies after this many received bytes
    pub cut_after: Option<usize>,
    address: u16,
    received: usize,
    rx: Vec<u8>,
    tx: VecDeque<u8>,
}

impl SimTarget {
    pub fn new() -> Self {
        Self {
            flash: vec![0xFF; 0x8000],
            loads: Vec::new(),
            pages_written: 0,
            sync_frames: 0,
            commands: Vec::new(),
            program_mode: false,
            desync: 0,
            enable_status: OK,
            cut_after: None,
            address: 0,
            received: 0,
            rx: Vec::new(),
            tx: VecDeque::new(),
        }
    }

    fn frame_len(&self) -> Option<usize> {
        let len = match *self.rx.first()? {
            0x30 | 0x50 | 0x51 => 2,
            0x41 => 3,
            0x55 => 4,
            0x64 => {
                if self.rx.len() < 3 {
                    return None;
                }
                4 + u16::from_be_bytes([self.rx[1], self.rx[2]]) as usize + 1
            }
            _ => 1,
        };
        (self.rx.len() >= len).then_some(len)
    }

    fn process(&mut self) {
        while let Some(len) = self.frame_len() {
            let frame: Vec<u8> = self.rx.drain(..len).collect();
            let opcode = frame[0];
            if *frame.last().unwrap() != 0x20 {
                self.tx.push_back(NO_SYNC);
                continue;
            }
            if opcode == 0x30 {
                self.sync_frames += 1;
                self.tx.extend([IN_SYNC, OK]);
                continue;
            }

            self.commands.push(opcode);
            if self.desync > 0 {
                self.desync -= 1;
                self.tx.push_back(NO_SYNC);
                continue;
            }

            self.tx.push_back(IN_SYNC);
            match opcode {
                0x41 => {
                    let value = match frame[1] {
                        0x81 => 8,
                        0x82 => 3,
                        _ => 0,
                    };
                    self.tx.extend([value, OK]);
                }
                0x50 => {
                    self.program_mode = self.enable_status == OK;
                    self.tx.push_back(self.enable_status);
                }
                0x51 => {
                    self.program_mode = false;
                    self.tx.push_back(OK);
                }
                0x55 => {
                    self.address = u16::from_le_bytes([frame[1], frame[2]]);
                    self.loads.push(self.address);
                    self.tx.push_back(OK);
                }
                0x64 => {
                    assert_eq!(frame[3], b'F');
                    let start = self.address as usize * 2;
                    let data = &frame[4..frame.len() - 1];
                    self.flash[start..start + data.len()].copy_from_slice(data);
                    self.pages_written += 1;
                    self.tx.push_back(OK);
                }
                _ => self.tx.push_back(FAILED),
            }
        }
    }
}

impl Transport for SimTarget {
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.received += bytes.len();
        self.rx.extend_from_slice(bytes);
        self.process();
        Ok(())
    }

    fn recv(&mut self, buffer: &mut [u8]) -> Result<(), TransportError> {
        if let Some(limit) = self.cut_after {
            if self.received > limit {
                return Err(TransportError::Io);
            }
        }
        for slot in buffer.iter_mut() {
            *slot = self.tx.pop_front().ok_or(TransportError::Timeout)?;
        }
        Ok(())
    }

    fn drain(&mut self) {
        self.tx.clear();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    Info(String),
    Warning(i8, String),
    Error(i8, String),
}

#[derive(Default)]
pub struct Recorder {
    pub reports: Vec<Report>,
}

impl Diagnostics for Recorder {
    fn info(&mut self, msg: &str) {
        self.reports.push(Report::Info(msg.to_string()));
    }

    fn warning(&mut self, code: i8, msg: &str) {
        self.reports.push(Report::Warning(code, msg.to_string()));
    }

    fn error(&mut self, code: i8, msg: &str) {
        self.reports.push(Report::Error(code, msg.to_string()));
    }
}

/// One CR/LF-terminated Intel HEX record with a valid checksum.
pub fn record(address: u16, kind: u8, data: &[u8]) -> String {
    let mut bytes = vec![data.len() as u8, (address >> 8) as u8, address as u8, kind];
    bytes.extend_from_slice(data);
    let sum = bytes.iter().fold(0u8, |s, &b| s.wrapping_add(b));
    bytes.push(sum.wrapping_neg());

    let mut line = String::from(":");
    for b in bytes {
        line.extend(byte_to_hex(b).iter().map(|&c| c as char));
    }
    line.push_str("\r\n");
    line
}

/// Contiguous data records starting at `base`, plus the flat image.
pub fn image(base: u16, lens: &[usize]) -> (String, Vec<u8>) {
    let mut text = String::new();
    let mut flat = Vec::new();
    let mut addr = base;
    for &len in lens {
        let data: Vec<u8> = (0..len).map(|i| (addr as usize + i).wrapping_mul(7) as u8).collect();
        text.push_str(&record(addr, 0, &data));
        flat.extend_from_slice(&data);
        addr += len as u16;
    }
    (text, flat)
}

/// Data bytes of every data record in a HEX text, keyed by address.
pub fn flatten(text: &str) -> Vec<(u16, Vec<u8>)> {
    text.lines()
        .filter(|l| l.starts_with(':'))
        .filter_map(|l| {
            let rec = migs_programmer::hex::parse_record(l.trim_end().as_bytes()).ok()?;
            (rec.kind == migs_programmer::hex::RecordKind::Data).then(|| (rec.address, rec.data().to_vec()))
        })
        .collect()
}
