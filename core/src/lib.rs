//! Platform-agnostic driver stack for the doorbell firmware
//!
//! Interrupt-driven UART and SPI transports built on a fixed-size ring
//! buffer, and a W5500 TCP/IP offload driver with a BSD-style socket layer
//! on top. Hardware is reached only through the `doorbell-hal` traits, so
//! everything here builds and tests on the host.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]
#![deny(warnings)]

#[macro_use]
mod fmt;

pub mod ring_buffer;
pub mod serial;
pub mod socket;
pub mod w5500;

#[cfg(test)]
mod testing;

pub use ring_buffer::{RingBuffer, SharedRingBuffer};
pub use serial::{NoTransport, SpiTransport, Transport, UartTransport};
pub use socket::{InitFailed, SocketError, SocketLayer};
pub use w5500::{InitError, NetworkIdentity, W5500};
