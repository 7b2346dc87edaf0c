//! Intel HEX record decoding
//!
//! A record is one ASCII line `:LLAAAATT[DD...]CC` terminated by CR, LF or
//! CR/LF. Only the fields the programmer needs are kept: byte count, 16-bit
//! load address, record type and data.

use core::fmt;

use crate::config::RECORD_DATA_MAX;
use crate::transport::FirmwareSource;

/// Longest accepted line without its terminator: colon, count, address,
/// type, 16 data bytes and checksum.
pub const MAX_LINE: usize = 1 + 2 * (1 + 2 + 1 + RECORD_DATA_MAX + 1);

const HEX_CHARS: [u8; 16] = *b"0123456789ABCDEF";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HexError {
    /// Line does not follow the record layout or holds a non-hex digit
    MalformedRecord,
    /// Byte sum of the record does not cancel out
    Checksum { expected: u8, found: u8 },
    /// More data bytes than fit one record slot of a page
    RecordTooLong,
    /// Record type the programmer cannot honour (extended addressing)
    UnsupportedRecord(u8),
    /// Record does not continue where the page left off
    NonContiguous { expected: u16, found: u16 },
    /// Page would start off a flash page boundary
    MisalignedPage { address: u16 },
}

impl HexError {
    pub fn message(&self) -> &'static str {
        match self {
            HexError::MalformedRecord => "malformed record",
            HexError::Checksum { .. } => "record checksum mismatch",
            HexError::RecordTooLong => "record too long",
            HexError::UnsupportedRecord(_) => "unsupported record type",
            HexError::NonContiguous { .. } => "record not contiguous with page",
            HexError::MisalignedPage { .. } => "page not aligned to flash page",
        }
    }
}

impl fmt::Display for HexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HexError::Checksum { expected, found } => write!(
                f,
                "{}: expected 0x{:02X}, found 0x{:02X}",
                self.message(),
                expected,
                found
            ),
            HexError::UnsupportedRecord(kind) => write!(f, "{} 0x{:02X}", self.message(), kind),
            HexError::NonContiguous { expected, found } => write!(
                f,
                "{}: expected 0x{:04X}, found 0x{:04X}",
                self.message(),
                expected,
                found
            ),
            HexError::MisalignedPage { address } => {
                write!(f, "{} at 0x{:04X}", self.message(), address)
            }
            _ => f.write_str(self.message()),
        }
    }
}

impl ufmt::uDisplay for HexError {
    fn fmt<W>(&self, f: &mut ufmt::Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: ufmt::uWrite + ?Sized,
    {
        f.write_str(self.message())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Data,
    EndOfFile,
    ExtendedSegmentAddress,
    StartSegmentAddress,
    ExtendedLinearAddress,
    StartLinearAddress,
}

impl RecordKind {
    pub fn from_byte(byte: u8) -> Result<Self, HexError> {
        match byte {
            0x00 => Ok(RecordKind::Data),
            0x01 => Ok(RecordKind::EndOfFile),
            0x02 => Ok(RecordKind::ExtendedSegmentAddress),
            0x03 => Ok(RecordKind::StartSegmentAddress),
            0x04 => Ok(RecordKind::ExtendedLinearAddress),
            0x05 => Ok(RecordKind::StartLinearAddress),
            other => Err(HexError::UnsupportedRecord(other)),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            RecordKind::Data => 0x00,
            RecordKind::EndOfFile => 0x01,
            RecordKind::ExtendedSegmentAddress => 0x02,
            RecordKind::StartSegmentAddress => 0x03,
            RecordKind::ExtendedLinearAddress => 0x04,
            RecordKind::StartLinearAddress => 0x05,
        }
    }
}

/// One decoded record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HexRecord {
    pub kind: RecordKind,
    pub address: u16,
    len: u8,
    data: [u8; RECORD_DATA_MAX],
}

impl HexRecord {
    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn data(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }
}

/// Value of one ASCII hex digit, either case.
pub fn hex_digit(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'A'..=b'F' => Some(c - b'A' + 10),
        b'a'..=b'f' => Some(c - b'a' + 10),
        _ => None,
    }
}

/// Decode an ASCII hex pair into one byte.
pub fn hex_to_byte(code: [u8; 2]) -> Result<u8, HexError> {
    let hi = hex_digit(code[0]).ok_or(HexError::MalformedRecord)?;
    let lo = hex_digit(code[1]).ok_or(HexError::MalformedRecord)?;
    Ok((hi << 4) | lo)
}

/// Encode one byte as an uppercase ASCII hex pair.
pub fn byte_to_hex(val: u8) -> [u8; 2] {
    [HEX_CHARS[(val >> 4) as usize], HEX_CHARS[(val & 0xF) as usize]]
}

/// Decode one record line (terminator already stripped).
pub fn parse_record(line: &[u8]) -> Result<HexRecord, HexError> {
    let (colon, digits) = line.split_first().ok_or(HexError::MalformedRecord)?;
    if *colon != b':' || digits.len() % 2 != 0 {
        return Err(HexError::MalformedRecord);
    }
    if digits.len() > MAX_LINE - 1 {
        return Err(HexError::RecordTooLong);
    }

    let mut raw = [0u8; (MAX_LINE - 1) / 2];
    let count = digits.len() / 2;
    for (slot, pair) in raw.iter_mut().zip(digits.chunks_exact(2)) {
        *slot = hex_to_byte([pair[0], pair[1]])?;
    }
    let raw = &raw[..count];

    // count, address hi/lo, type, checksum
    if raw.len() < 5 {
        return Err(HexError::MalformedRecord);
    }
    let len = raw[0] as usize;
    if len > RECORD_DATA_MAX {
        return Err(HexError::RecordTooLong);
    }
    if raw.len() != len + 5 {
        return Err(HexError::MalformedRecord);
    }

    let (body, checksum) = raw.split_at(raw.len() - 1);
    let expected = body
        .iter()
        .fold(0u8, |sum, &b| sum.wrapping_add(b))
        .wrapping_neg();
    if expected != checksum[0] {
        return Err(HexError::Checksum {
            expected,
            found: checksum[0],
        });
    }

    let mut data = [0u8; RECORD_DATA_MAX];
    data[..len].copy_from_slice(&body[4..4 + len]);

    Ok(HexRecord {
        kind: RecordKind::from_byte(body[3])?,
        address: u16::from_be_bytes([body[1], body[2]]),
        len: len as u8,
        data,
    })
}

/// Read the next record from `source`.
///
/// Returns `Ok(None)` once the source is exhausted. A last line without
/// terminator still counts when it holds a whole record; a truncated one is
/// end of input.
pub fn read_record<S: FirmwareSource + ?Sized>(
    source: &mut S,
    line: &mut [u8; MAX_LINE],
) -> Result<Option<HexRecord>, HexError> {
    let mut len = 0;
    loop {
        let c = match source.read_byte() {
            Some(c) => c,
            None if len == 0 => return Ok(None),
            None => {
                return match parse_record(&line[..len]) {
                    Err(HexError::MalformedRecord) => Ok(None),
                    outcome => outcome.map(Some),
                };
            }
        };
        if c == b'\n' || c == b'\r' {
            if len == 0 {
                continue;
            }
            break;
        }
        if len == line.len() {
            return Err(HexError::RecordTooLong);
        }
        line[len] = c;
        len += 1;
    }

    if source.peek_byte() == Some(b'\n') {
        source.read_byte();
    }

    parse_record(&line[..len]).map(Some)
}
