#![allow(clippy::missing_safety_doc)]

use core::cell::RefCell;
use core::convert::Infallible;
use core::marker::PhantomData;

use avr_device::atmega128a::{USART0, USART1};
use avr_device::interrupt::Mutex;
use embedded_hal::serial;

use crate::config::CPU_FREQ_HZ;

// Buffer size must be power of 2 for efficient masking
const BUFFER_SIZE: usize = 32;
const BUFFER_MASK: usize = BUFFER_SIZE - 1;

// UCSRnA
const RXC: u8 = 1 << 7;
const UDRE: u8 = 1 << 5;
const U2X: u8 = 1 << 1;
// UCSRnB
const RXCIE: u8 = 1 << 7;
const RXEN: u8 = 1 << 4;
const TXEN: u8 = 1 << 3;
// UCSRnC: 8 data bits, no parity, 1 stop bit
const FRAME_8N1: u8 = 0x06;

pub struct Buffer {
    data: [u8; BUFFER_SIZE],
    write_idx: usize,
    read_idx: usize,
}

impl Buffer {
    const fn new() -> Self {
        Self {
            data: [0; BUFFER_SIZE],
            write_idx: 0,
            read_idx: 0,
        }
    }

    fn write(&mut self, byte: u8) -> bool {
        let next_write = (self.write_idx + 1) & BUFFER_MASK;
        if next_write != self.read_idx {
            self.data[self.write_idx] = byte;
            self.write_idx = next_write;
            true
        } else {
            false
        }
    }

    fn read(&mut self) -> Option<u8> {
        if self.read_idx != self.write_idx {
            let byte = self.data[self.read_idx];
            self.read_idx = (self.read_idx + 1) & BUFFER_MASK;
            Some(byte)
        } else {
            None
        }
    }
}

// Filled by the USART0 receive interrupt
static RX_BUFFER: Mutex<RefCell<Buffer>> = Mutex::new(RefCell::new(Buffer::new()));

/// Register access of one USART.
pub trait UsartInstance {
    /// Receive interrupt enabled
    const BUFFERED: bool;

    /// Double-speed mode, 8N1, receiver and transmitter on.
    fn configure(ubrr: u16);

    fn write_ready() -> bool;

    fn write_data(byte: u8);

    fn read_pending() -> Option<u8>;
}

macro_rules! impl_usart {
    ($USART:ident, $udr:ident, $ucsra:ident, $ucsrb:ident, $ucsrc:ident, $ubrrh:ident, $ubrrl:ident, buffered: $buffered:expr) => {
        impl UsartInstance for $USART {
            const BUFFERED: bool = $buffered;

            fn configure(ubrr: u16) {
                let mut ucsrb = RXEN | TXEN;
                if Self::BUFFERED {
                    ucsrb |= RXCIE;
                }
                unsafe {
                    let p = $USART::ptr();
                    (*p).$ubrrh.write(|w| w.bits((ubrr >> 8) as u8));
                    (*p).$ubrrl.write(|w| w.bits(ubrr as u8));
                    (*p).$ucsra.write(|w| w.bits(U2X));
                    (*p).$ucsrc.write(|w| w.bits(FRAME_8N1));
                    (*p).$ucsrb.modify(|r, w| w.bits(r.bits() | ucsrb));
                }
            }

            fn write_ready() -> bool {
                unsafe { (*$USART::ptr()).$ucsra.read().bits() & UDRE != 0 }
            }

            fn write_data(byte: u8) {
                unsafe { (*$USART::ptr()).$udr.write(|w| w.bits(byte)) }
            }

            fn read_pending() -> Option<u8> {
                if Self::BUFFERED {
                    return avr_device::interrupt::free(|cs| RX_BUFFER.borrow(cs).borrow_mut().read());
                }
                unsafe {
                    let p = $USART::ptr();
                    if (*p).$ucsra.read().bits() & RXC != 0 {
                        Some((*p).$udr.read().bits())
                    } else {
                        None
                    }
                }
            }
        }
    };
}

// Link to the target bootloader, receive side interrupt driven
impl_usart!(USART0, udr0, ucsr0a, ucsr0b, ucsr0c, ubrr0h, ubrr0l, buffered: true);
// Diagnostic console, polled
impl_usart!(USART1, udr1, ucsr1a, ucsr1b, ucsr1c, ubrr1h, ubrr1l, buffered: false);

pub struct Uart<USART> {
    usart: PhantomData<USART>,
}

impl<USART: UsartInstance> Uart<USART> {
    /// Double-speed mode, 8N1.
    pub fn new(baud: u32) -> Self {
        USART::configure((CPU_FREQ_HZ / (8 * baud) - 1) as u16);
        Self {
            usart: PhantomData,
        }
    }

    pub fn write_byte(&mut self, byte: u8) {
        while !USART::write_ready() {}
        USART::write_data(byte);
    }

    pub fn read_byte(&mut self) -> Option<u8> {
        USART::read_pending()
    }

    pub fn write_str(&mut self, s: &str) {
        for byte in s.bytes() {
            self.write_byte(byte);
        }
    }
}

impl<USART: UsartInstance> serial::Read<u8> for Uart<USART> {
    type Error = Infallible;

    fn read(&mut self) -> nb::Result<u8, Infallible> {
        self.read_byte().ok_or(nb::Error::WouldBlock)
    }
}

impl<USART: UsartInstance> serial::Write<u8> for Uart<USART> {
    type Error = Infallible;

    fn write(&mut self, byte: u8) -> nb::Result<(), Infallible> {
        if !USART::write_ready() {
            return Err(nb::Error::WouldBlock);
        }
        USART::write_data(byte);
        Ok(())
    }

    fn flush(&mut self) -> nb::Result<(), Infallible> {
        if !USART::write_ready() {
            return Err(nb::Error::WouldBlock);
        }
        Ok(())
    }
}

impl<USART: UsartInstance> ufmt::uWrite for Uart<USART> {
    type Error = Infallible;

    fn write_str(&mut self, s: &str) -> Result<(), Infallible> {
        Uart::write_str(self, s);
        Ok(())
    }
}

#[avr_device::interrupt(atmega128a)]
fn USART0_RX() {
    let byte = unsafe { (*USART0::ptr()).udr0.read().bits() };
    avr_device::interrupt::free(|cs| {
        // overrun drops the byte; the protocol resyncs
        RX_BUFFER.borrow(cs).borrow_mut().write(byte);
    });
}
