//! ATmega128 peripherals used by the programmer board

pub mod gpio;
pub mod timer;
pub mod uart;

pub use gpio::{board, Input, Output, Pin};
pub use timer::{Delay, Prescaler};
pub use uart::Uart;
