//! Hardware abstraction traits for the doorbell driver stack
//!
//! This crate defines the boundary between the platform-agnostic drivers in
//! `doorbell-core` and a concrete board. BSPs implement the register traits
//! for their UART and SPI peripherals and the `ChipBus` callbacks for the
//! network chip; drivers only ever see these traits.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]
#![deny(warnings)]

pub mod chip;
pub mod spi;
pub mod transport;
pub mod uart;

pub use chip::ChipBus;
pub use spi::{
    BitOrder, ClockDivider, ClockPhase, ClockPolarity, SpiControl, SpiRegisters, SpiRole, SpiStatus,
};
pub use transport::Transport;
pub use uart::{
    AsynchronousMode, Baudrate, CommunicationMode, DataBits, FrameFormat, Parity, StopBits,
    UartControl, UartRegisters,
};
