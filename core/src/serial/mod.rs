//! Interrupt-driven serial transports
//!
//! - **`uart`**: asynchronous serial port with RX/TX ring buffers
//! - **`spi`**: SPI bus master with buffered and unbuffered send paths
//!
//! Each transport borrows a `*Shared` block that also lives in the board's
//! interrupt handlers. Boards keep that block in a `static` and call its
//! `on_*` methods from the matching vectors.

pub mod spi;
pub mod uart;

pub use doorbell_hal::Transport;
pub use spi::{SpiBuffering, SpiParameters, SpiShared, SpiTransport};
pub use uart::{baud_divisor, SerialParameters, TxDrive, UartShared, UartTransport};

/// Placeholder for "no transport attached"
///
/// Uninhabited, so an `Option<NoTransport>` is always `None`.
#[derive(Debug)]
pub enum NoTransport {}

impl Transport for NoTransport {
    fn send(&mut self, _byte: u8) {
        match *self {}
    }

    fn is_read_data_available(&self) -> usize {
        match *self {}
    }

    fn read_byte(&mut self) -> Option<u8> {
        match *self {}
    }
}
