//! SPI bus master transport
//!
//! Every byte clocked out clocks one byte in; received bytes land in an RX
//! ring that `read_byte` drains. Two send paths are supported:
//!
//! - **Unbuffered**: one slave-select assertion per byte, completion polled
//!   straight from the status register with the interrupt left off.
//! - **Buffered**: bytes are queued in a TX ring and drained under a single
//!   assertion; the transfer-complete interrupt sets a done flag the driver
//!   waits on between bytes.
//!
//! A write collision costs the colliding byte's receive slot only. The
//! transfer is counted as complete and the send keeps going.

use core::convert::Infallible;
use core::sync::atomic::{AtomicBool, Ordering};

use doorbell_hal::{
    BitOrder, ClockDivider, ClockPhase, ClockPolarity, SpiControl, SpiRegisters, SpiRole, Transport,
};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::ring_buffer::{RingBuffer, SharedRingBuffer};

/// Send path selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpiBuffering {
    Unbuffered,
    Buffered,
}

/// SPI bus configuration, consumed once at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpiParameters {
    pub role: SpiRole,
    pub bit_order: BitOrder,
    pub polarity: ClockPolarity,
    pub phase: ClockPhase,
    pub divider: ClockDivider,
    pub buffering: SpiBuffering,
    /// Delay after asserting and after releasing slave select
    pub select_settle_us: u32,
}

impl Default for SpiParameters {
    fn default() -> Self {
        Self {
            role: SpiRole::Master,
            bit_order: BitOrder::MsbFirst,
            polarity: ClockPolarity::IdleLow,
            phase: ClockPhase::Leading,
            divider: ClockDivider::Div4,
            buffering: SpiBuffering::Buffered,
            select_settle_us: 100,
        }
    }
}

/// State shared between the SPI driver and its transfer-complete interrupt
pub struct SpiShared<const N: usize> {
    rx: SharedRingBuffer<N>,
    transfer_done: AtomicBool,
}

impl<const N: usize> SpiShared<N> {
    pub const fn new() -> Self {
        Self::with_capacity(N)
    }

    pub const fn with_capacity(rx_capacity: usize) -> Self {
        Self {
            rx: SharedRingBuffer::with_capacity(rx_capacity),
            transfer_done: AtomicBool::new(false),
        }
    }

    /// Transfer-complete interrupt
    ///
    /// Reading status then data clears the hardware flags. On a write
    /// collision the data register holds nothing worth keeping.
    pub fn on_transfer_complete<R: SpiRegisters + ?Sized>(&self, regs: &R) {
        let status = regs.status();
        let byte = regs.read_data();
        if status.write_collision {
            trace!("SPI write collision, byte slot discarded");
        } else if !self.rx.push(byte) {
            trace!("SPI RX overflow, byte dropped");
        }
        self.transfer_done.store(true, Ordering::Release);
    }
}

impl<const N: usize> Default for SpiShared<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// SPI master transport with a software-driven slave-select line
///
/// `slave_select` is optional: with `None` the line belongs to someone else
/// (typically the network chip's select callbacks, which must hold CS across
/// a whole register frame).
pub struct SpiTransport<'a, R, SS, D, const N: usize> {
    regs: R,
    shared: &'a SpiShared<N>,
    tx: RingBuffer<N>,
    slave_select: Option<SS>,
    delay: D,
    role: SpiRole,
    buffering: SpiBuffering,
    select_settle_us: u32,
}

impl<'a, R, SS, D, const N: usize> SpiTransport<'a, R, SS, D, N>
where
    R: SpiRegisters,
    SS: OutputPin,
    D: DelayNs,
{
    /// Configure bus pins and the control register, then enable the peripheral
    ///
    /// The completion interrupt is only enabled for `SpiBuffering::Buffered`.
    pub fn new(
        regs: R,
        shared: &'a SpiShared<N>,
        parameters: &SpiParameters,
        slave_select: Option<SS>,
        delay: D,
    ) -> Self {
        critical_section::with(|_| {
            shared.rx.clear();
            shared.transfer_done.store(false, Ordering::Release);

            regs.configure_pins(parameters.role);
            regs.configure(SpiControl {
                role: parameters.role,
                bit_order: parameters.bit_order,
                polarity: parameters.polarity,
                phase: parameters.phase,
                divider: parameters.divider,
                interrupt: parameters.buffering == SpiBuffering::Buffered,
            });
        });

        debug!("SPI configured: divider /{}", parameters.divider.divisor());

        let mut spi = Self {
            regs,
            shared,
            tx: RingBuffer::new(),
            slave_select: None,
            delay,
            role: parameters.role,
            buffering: parameters.buffering,
            select_settle_us: parameters.select_settle_us,
        };
        spi.set_slave_select(slave_select);
        spi
    }

    /// Switch to another slave-select line, returning the previous one
    ///
    /// The new line is driven inactive (high) straight away.
    pub fn set_slave_select(&mut self, slave_select: Option<SS>) -> Option<SS> {
        let previous = core::mem::replace(&mut self.slave_select, slave_select);
        if let Some(pin) = self.slave_select.as_mut() {
            pin.set_high().ok();
        }
        previous
    }

    fn select(&mut self) {
        if self.role != SpiRole::Master {
            return;
        }
        if let Some(pin) = self.slave_select.as_mut() {
            pin.set_low().ok();
            if self.select_settle_us > 0 {
                self.delay.delay_us(self.select_settle_us);
            }
        }
    }

    fn deselect(&mut self) {
        if self.role != SpiRole::Master {
            return;
        }
        if let Some(pin) = self.slave_select.as_mut() {
            pin.set_high().ok();
            if self.select_settle_us > 0 {
                self.delay.delay_us(self.select_settle_us);
            }
        }
    }

    /// Clock one byte out and wait for the exchange to finish
    fn transfer(&mut self, byte: u8) {
        self.shared.transfer_done.store(false, Ordering::Release);
        self.regs.write_data(byte);
        match self.buffering {
            SpiBuffering::Unbuffered => {
                loop {
                    let status = self.regs.status();
                    if status.transfer_complete || status.write_collision {
                        break;
                    }
                    core::hint::spin_loop();
                }
                self.shared.on_transfer_complete(&self.regs);
            }
            SpiBuffering::Buffered => {
                while !self.shared.transfer_done.load(Ordering::Acquire) {
                    core::hint::spin_loop();
                }
            }
        }
    }

    /// Send everything in the TX ring under one slave-select assertion
    fn drain_tx(&mut self) {
        if self.tx.is_empty() {
            return;
        }
        self.select();
        while let Some(byte) = self.tx.pop() {
            self.transfer(byte);
        }
        self.deselect();
    }
}

impl<R, SS, D, const N: usize> Transport for SpiTransport<'_, R, SS, D, N>
where
    R: SpiRegisters,
    SS: OutputPin,
    D: DelayNs,
{
    fn send(&mut self, byte: u8) {
        self.send_bytes(&[byte]);
    }

    fn send_bytes(&mut self, bytes: &[u8]) {
        match self.buffering {
            SpiBuffering::Unbuffered => {
                for &byte in bytes {
                    self.select();
                    self.transfer(byte);
                    self.deselect();
                }
            }
            SpiBuffering::Buffered => {
                for &byte in bytes {
                    if !self.tx.push(byte) {
                        self.drain_tx();
                        self.tx.push(byte);
                    }
                }
                self.drain_tx();
            }
        }
    }

    fn is_read_data_available(&self) -> usize {
        self.shared.rx.used_entries()
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.shared.rx.pop()
    }
}

impl<R, SS, D, const N: usize> embedded_io::ErrorType for SpiTransport<'_, R, SS, D, N> {
    type Error = Infallible;
}

impl<R, SS, D, const N: usize> embedded_io::Write for SpiTransport<'_, R, SS, D, N>
where
    R: SpiRegisters,
    SS: OutputPin,
    D: DelayNs,
{
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.send_bytes(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        // send_bytes only returns once the queue is on the wire
        Ok(())
    }
}

impl<R, SS, D, const N: usize> embedded_io::ReadReady for SpiTransport<'_, R, SS, D, N>
where
    R: SpiRegisters,
    SS: OutputPin,
    D: DelayNs,
{
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(self.is_read_data_available() > 0)
    }
}

impl<R, SS, D, const N: usize> embedded_io::Read for SpiTransport<'_, R, SS, D, N>
where
    R: SpiRegisters,
    SS: OutputPin,
    D: DelayNs,
{
    /// Waits for at least one received byte, then returns whatever else is
    /// queued. As master nothing arrives unless something was sent first.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        buf[0] = loop {
            if let Some(byte) = self.read_byte() {
                break byte;
            }
            core::hint::spin_loop();
        };
        let mut n = 1;
        while n < buf.len() {
            match self.read_byte() {
                Some(byte) => {
                    buf[n] = byte;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }
}
