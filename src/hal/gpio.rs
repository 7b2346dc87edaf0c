use core::convert::Infallible;
use core::marker::PhantomData;

use avr_device::atmega128a::{PORTA, PORTB, PORTC, PORTD, PORTE, PORTF};
use embedded_hal::digital::v2::{InputPin, OutputPin};

pub trait PinMode {}
pub struct Input;
pub struct Output;
impl PinMode for Input {}
impl PinMode for Output {}

/// Bit-level access to one I/O port's PIN, DDR and PORT registers.
pub trait Port {
    fn set_direction(mask: u8, output: bool);
    fn set_level(mask: u8, high: bool);
    fn read_pins() -> u8;
}

#[derive(Debug)]
pub struct Pin<PORT, const P: u8, MODE> {
    _port: PhantomData<PORT>,
    _mode: PhantomData<MODE>,
}

macro_rules! impl_port {
    ($PORT:ident, $pin:ident, $ddr:ident, $port:ident) => {
        impl Port for $PORT {
            fn set_direction(mask: u8, output: bool) {
                unsafe {
                    (*$PORT::ptr()).$ddr.modify(|r, w| {
                        w.bits(if output { r.bits() | mask } else { r.bits() & !mask })
                    });
                }
            }

            fn set_level(mask: u8, high: bool) {
                unsafe {
                    (*$PORT::ptr()).$port.modify(|r, w| {
                        w.bits(if high { r.bits() | mask } else { r.bits() & !mask })
                    });
                }
            }

            fn read_pins() -> u8 {
                unsafe { (*$PORT::ptr()).$pin.read().bits() }
            }
        }
    };
}

impl_port!(PORTA, pina, ddra, porta);
impl_port!(PORTB, pinb, ddrb, portb);
impl_port!(PORTC, pinc, ddrc, portc);
impl_port!(PORTD, pind, ddrd, portd);
impl_port!(PORTE, pine, ddre, porte);
impl_port!(PORTF, pinf, ddrf, portf);

impl<PORT: Port, const P: u8, MODE: PinMode> Pin<PORT, P, MODE> {
    /// Take the pin; the caller guarantees nothing else drives it.
    pub const fn new() -> Self {
        Pin {
            _port: PhantomData,
            _mode: PhantomData,
        }
    }

    pub fn into_output(self) -> Pin<PORT, P, Output> {
        PORT::set_direction(1 << P, true);
        Pin::new()
    }

    pub fn into_input(self) -> Pin<PORT, P, Input> {
        // Clear DDRx bit and disable pull-up
        PORT::set_direction(1 << P, false);
        PORT::set_level(1 << P, false);
        Pin::new()
    }
}

impl<PORT: Port, const P: u8> OutputPin for Pin<PORT, P, Output> {
    type Error = Infallible;

    #[inline]
    fn set_high(&mut self) -> Result<(), Infallible> {
        PORT::set_level(1 << P, true);
        Ok(())
    }

    #[inline]
    fn set_low(&mut self) -> Result<(), Infallible> {
        PORT::set_level(1 << P, false);
        Ok(())
    }
}

impl<PORT: Port, const P: u8> InputPin for Pin<PORT, P, Input> {
    type Error = Infallible;

    #[inline]
    fn is_high(&self) -> Result<bool, Infallible> {
        Ok(PORT::read_pins() & (1 << P) != 0)
    }

    #[inline]
    fn is_low(&self) -> Result<bool, Infallible> {
        self.is_high().map(|high| !high)
    }
}

// Programmer board pin assignment
pub mod board {
    use super::*;

    /// Drives RESET of the target through its auto-reset capacitor
    pub type TargetReset = Pin<PORTB, 4, Output>;

    /// Status LED, lit while a programming run is active
    pub type StatusLed = Pin<PORTA, 0, Output>;

    pub fn target_reset() -> TargetReset {
        Pin::<PORTB, 4, Input>::new().into_output()
    }

    pub fn status_led() -> StatusLed {
        Pin::<PORTA, 0, Input>::new().into_output()
    }
}
