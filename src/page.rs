//! Flash page assembly from a stream of HEX records

use crate::config::{PAGE_SIZE, RECORDS_PER_PAGE};
use crate::hex::{read_record, HexError, RecordKind, MAX_LINE};
use crate::stk500::AvrMem;
use crate::transport::FirmwareSource;

/// Gathers up to eight consecutive 16-byte data records into one page.
///
/// The first record of a batch fixes the page address and must sit on a
/// flash page boundary; every following record must continue exactly where
/// the page left off.
pub struct PageAssembler {
    line: [u8; MAX_LINE],
    finished: bool,
}

impl PageAssembler {
    pub const fn new() -> Self {
        Self {
            line: [0; MAX_LINE],
            finished: false,
        }
    }

    /// True once the image is exhausted or its end-of-file record was seen.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Fill `mem` with the next page and return its length.
    ///
    /// A length of zero means end of input. The bytes past the returned
    /// length read as erased flash (0xFF).
    pub fn assemble<S: FirmwareSource + ?Sized>(
        &mut self,
        source: &mut S,
        mem: &mut AvrMem,
    ) -> Result<usize, HexError> {
        mem.clear();
        if self.finished {
            return Ok(0);
        }

        let mut records = 0;
        while records < RECORDS_PER_PAGE {
            let record = match read_record(source, &mut self.line)? {
                Some(record) => record,
                None => {
                    self.finished = true;
                    break;
                }
            };

            match record.kind {
                RecordKind::Data => {}
                RecordKind::EndOfFile => {
                    self.finished = true;
                    break;
                }
                // entry point is irrelevant to flash contents
                RecordKind::StartSegmentAddress | RecordKind::StartLinearAddress => continue,
                RecordKind::ExtendedSegmentAddress | RecordKind::ExtendedLinearAddress => {
                    return Err(HexError::UnsupportedRecord(record.kind.code()));
                }
            }

            if records == 0 {
                if record.address as usize % PAGE_SIZE != 0 {
                    return Err(HexError::MisalignedPage {
                        address: record.address,
                    });
                }
                mem.page_addr = record.address;
            } else {
                let expected = mem.page_addr.wrapping_add(mem.size as u16);
                if record.address != expected {
                    return Err(HexError::NonContiguous {
                        expected,
                        found: record.address,
                    });
                }
            }

            mem.buf[mem.size..mem.size + record.len()].copy_from_slice(record.data());
            mem.size += record.len();
            records += 1;
        }

        Ok(mem.size)
    }
}

impl Default for PageAssembler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hex::byte_to_hex;
    use crate::transport::SliceSource;
    use std::string::String;

    fn record(address: u16, kind: u8, data: &[u8]) -> String {
        let mut bytes = std::vec![data.len() as u8, (address >> 8) as u8, address as u8, kind];
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

    fn image(base: u16, lens: &[usize]) -> (String, std::vec::Vec<u8>) {
        let mut text = String::new();
        let mut flat = std::vec::Vec::new();
        let mut addr = base;
        for &len in lens {
            let data: std::vec::Vec<u8> = (0..len).map(|i| (addr as usize + i) as u8).collect();
            text.push_str(&record(addr, 0, &data));
            flat.extend_from_slice(&data);
            addr += len as u16;
        }
        (text, flat)
    }

    #[test]
    fn full_batch_fills_one_page() {
        let (text, flat) = image(0x0200, &[16; 8]);
        let mut source = SliceSource::new(text.as_bytes());
        let mut mem = AvrMem::new();
        let mut pages = PageAssembler::new();

        assert_eq!(pages.assemble(&mut source, &mut mem), Ok(128));
        assert_eq!(mem.page_addr, 0x0200);
        assert_eq!(&mem.buf[..], &flat[..]);
        assert_eq!(pages.assemble(&mut source, &mut mem), Ok(0));
    }

    #[test]
    fn short_tail_page_then_end() {
        let (text, flat) = image(0x0000, &[16; 11]);
        let mut source = SliceSource::new(text.as_bytes());
        let mut mem = AvrMem::new();
        let mut pages = PageAssembler::new();

        assert_eq!(pages.assemble(&mut source, &mut mem), Ok(128));
        assert_eq!(pages.assemble(&mut source, &mut mem), Ok(48));
        assert_eq!(mem.page_addr, 0x0080);
        assert_eq!(mem.data(), &flat[128..]);
        assert!(mem.buf[48..].iter().all(|&b| b == 0xFF));
        assert_eq!(pages.assemble(&mut source, &mut mem), Ok(0));
        assert!(pages.is_finished());
    }

    #[test]
    fn end_of_file_record_stops_assembly() {
        let (mut text, _) = image(0x0100, &[16, 16]);
        text.push_str(&record(0, 1, &[]));
        text.push_str(&record(0x0120, 0, &[0xAA; 16]));
        let mut source = SliceSource::new(text.as_bytes());
        let mut mem = AvrMem::new();
        let mut pages = PageAssembler::new();

        assert_eq!(pages.assemble(&mut source, &mut mem), Ok(32));
        assert_eq!(pages.assemble(&mut source, &mut mem), Ok(0));
    }

    #[test]
    fn gap_between_records_is_rejected() {
        let mut text = record(0x0000, 0, &[0; 16]);
        text.push_str(&record(0x0020, 0, &[0; 16]));
        let mut source = SliceSource::new(text.as_bytes());
        let mut mem = AvrMem::new();

        assert_eq!(
            PageAssembler::new().assemble(&mut source, &mut mem),
            Err(HexError::NonContiguous {
                expected: 0x0010,
                found: 0x0020
            })
        );
    }

    #[test]
    fn short_record_pushes_next_page_off_boundary() {
        let mut lens = [16; 10];
        lens[7] = 10;
        let (text, _) = image(0x0000, &lens);
        let mut source = SliceSource::new(text.as_bytes());
        let mut mem = AvrMem::new();
        let mut pages = PageAssembler::new();

        assert_eq!(pages.assemble(&mut source, &mut mem), Ok(122));
        assert_eq!(
            pages.assemble(&mut source, &mut mem),
            Err(HexError::MisalignedPage { address: 0x007A })
        );
    }

    #[test]
    fn image_starting_mid_page_is_rejected() {
        let (text, _) = image(0x0010, &[16; 2]);
        let mut source = SliceSource::new(text.as_bytes());
        let mut mem = AvrMem::new();

        assert_eq!(
            PageAssembler::new().assemble(&mut source, &mut mem),
            Err(HexError::MisalignedPage { address: 0x0010 })
        );
    }

    #[test]
    fn extended_address_is_unsupported() {
        let text = record(0x0000, 4, &[0x00, 0x01]);
        let mut source = SliceSource::new(text.as_bytes());
        let mut mem = AvrMem::new();

        assert_eq!(
            PageAssembler::new().assemble(&mut source, &mut mem),
            Err(HexError::UnsupportedRecord(0x04))
        );
    }

    #[test]
    fn start_address_record_is_skipped() {
        let mut text = record(0x0000, 3, &[0, 0, 0, 0]);
        text.push_str(&record(0x0000, 0, &[0x0C, 0x94]));
        let mut source = SliceSource::new(text.as_bytes());
        let mut mem = AvrMem::new();

        assert_eq!(PageAssembler::new().assemble(&mut source, &mut mem), Ok(2));
        assert_eq!(mem.data(), &[0x0C, 0x94]);
    }
}
