use avr_device::atmega128a::TC0;
use embedded_hal::blocking::delay::{DelayMs, DelayUs};

const PRESCALER_MASK: u8 = 0x07;

// 16 MHz / 64 = 250 kHz, one tick every 4 us
const TICKS_PER_MS: u32 = 250;
const US_PER_TICK: u32 = 4;

/// Timer0 clock select. Timer0 on the ATmega128 has its own prescaler table.
#[derive(Clone, Copy)]
pub enum Prescaler {
    Stop = 0,
    Direct = 1,
    Div8 = 2,
    Div32 = 3,
    Div64 = 4,
    Div128 = 5,
    Div256 = 6,
    Div1024 = 7,
}

/// Busy-wait delay on Timer0.
pub struct Delay {
    _private: (),
}

impl Delay {
    pub fn new() -> Self {
        // Initialize timer in normal mode
        unsafe {
            let p = TC0::ptr();
            (*p).tccr0.write(|w| w.bits(0));
            (*p).tcnt0.write(|w| w.bits(0));
        }
        Self { _private: () }
    }

    fn start(&mut self, prescaler: Prescaler) {
        unsafe {
            (*TC0::ptr()).tccr0.modify(|r, w| {
                w.bits((r.bits() & !PRESCALER_MASK) | (prescaler as u8 & PRESCALER_MASK))
            });
        }
    }

    fn stop(&mut self) {
        unsafe {
            (*TC0::ptr()).tccr0.modify(|r, w| w.bits(r.bits() & !PRESCALER_MASK));
        }
    }

    fn set_counter(&mut self, value: u8) {
        unsafe { (*TC0::ptr()).tcnt0.write(|w| w.bits(value)) }
    }

    fn counter(&self) -> u8 {
        unsafe { (*TC0::ptr()).tcnt0.read().bits() }
    }

    fn wait_ticks(&mut self, mut ticks: u32) {
        self.start(Prescaler::Div64);
        while ticks > 0 {
            let step = ticks.min(TICKS_PER_MS) as u8;
            self.set_counter(0);
            while self.counter() < step {}
            ticks -= step as u32;
        }
        self.stop();
    }
}

impl Default for Delay {
    fn default() -> Self {
        Self::new()
    }
}

impl DelayMs<u16> for Delay {
    fn delay_ms(&mut self, ms: u16) {
        self.wait_ticks(ms as u32 * TICKS_PER_MS);
    }
}

impl DelayUs<u16> for Delay {
    fn delay_us(&mut self, us: u16) {
        self.wait_ticks((us as u32 + US_PER_TICK - 1) / US_PER_TICK);
    }
}
