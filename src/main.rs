#![no_std]
#![no_main]

use panic_halt as _;

use embedded_hal::digital::v2::OutputPin;
use migs_programmer::config::{DIAG_BAUD, TARGET_BAUD};
use migs_programmer::diagnostics::{Console, Diagnostics};
use avr_device::atmega128a::{USART0, USART1};
use migs_programmer::hal::{board, Delay, Uart};
use migs_programmer::resource::{ResourceProvider, ResourceStore};
use migs_programmer::{AvrProgrammer, ProgramError, SerialTransport, SliceSource};

const FIRMWARE_NAME: &str = "blink.hex";
static FIRMWARE: &[u8] = include_bytes!("../firmware/blink.hex");

const MAX_ATTEMPTS: u8 = 3;

/// Images linked into the programmer's own flash.
struct BuiltinStore;

impl ResourceStore for BuiltinStore {
    type File = SliceSource<'static>;

    fn open(&mut self, name: &str) -> Option<Self::File> {
        (name == FIRMWARE_NAME).then(|| SliceSource::new(FIRMWARE))
    }

    fn for_each_entry(&mut self, visit: &mut dyn FnMut(&str)) {
        visit(FIRMWARE_NAME);
    }
}

#[avr_device::entry]
fn main() -> ! {
    let link = Uart::<USART0>::new(TARGET_BAUD);
    let mut console = Console::new(Uart::<USART1>::new(DIAG_BAUD));
    let reset = board::target_reset();
    let mut led = board::status_led();

    // Enable interrupts globally
    unsafe { avr_device::interrupt::enable() };

    console.info("MigsProgrammer v0.1.0");

    let mut programmer =
        AvrProgrammer::new(SerialTransport::new(link), reset, Delay::new()).with_diagnostics(console);
    if programmer.init().is_err() {
        halt();
    }

    #[cfg(feature = "debug")]
    if let Ok((major, minor)) = programmer.bootloader_version() {
        ufmt::uwriteln!(programmer.diagnostics().writer(), "Bootloader {}.{}", major, minor).ok();
    }

    let mut attempts = 0;
    loop {
        attempts += 1;
        led.set_high().ok();
        let outcome = programmer.program(SliceSource::new(FIRMWARE));
        led.set_low().ok();

        match outcome {
            Ok(_) => break,
            Err(err) if err.is_fatal() => halt(),
            Err(ProgramError::Hex(_)) => break,
            Err(_) if attempts >= MAX_ATTEMPTS => break,
            Err(_) => continue,
        }
    }

    // Serial stays usable as long as the target is not reset again
    let (transport, _, _, mut console) = programmer.release();
    let mut provider = ResourceProvider::new(transport, BuiltinStore);
    if provider.provide().is_err() {
        console.error(-1, "Resource link lost.");
    }
    console.info("Stopped.");

    halt()
}

/// Operator has to power-cycle the board.
fn halt() -> ! {
    #[allow(clippy::empty_loop)]
    loop {}
}
