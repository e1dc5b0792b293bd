//! Asynchronous serial transport
//!
//! RX is always interrupt driven: the receive-complete handler pushes every
//! byte into the RX ring and drops it when the ring is full. TX supports the
//! two ways the peripheral can signal progress, see [`TxDrive`].

use core::convert::Infallible;
use core::sync::atomic::{AtomicBool, Ordering};

use doorbell_hal::{
    AsynchronousMode, Baudrate, CommunicationMode, DataBits, FrameFormat, Parity, StopBits,
    Transport, UartControl, UartRegisters,
};

use crate::ring_buffer::SharedRingBuffer;

/// How the transmitter reports progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxDrive {
    /// TX-complete interrupt clears a busy flag; `send*` blocks per byte
    /// until the whole queue is on the wire
    CompletionFlag,
    /// Data-register-empty interrupt pops and writes the next byte itself;
    /// `send*` returns as soon as the bytes are queued
    DataRegisterEmpty,
}

/// Serial port configuration, consumed once at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SerialParameters {
    pub communication_mode: CommunicationMode,
    pub asynchronous_mode: AsynchronousMode,
    pub baudrate: Baudrate,
    pub stop_bits: StopBits,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub tx_drive: TxDrive,
}

impl SerialParameters {
    pub const fn frame_format(&self) -> FrameFormat {
        FrameFormat {
            mode: self.communication_mode,
            data_bits: self.data_bits,
            parity: self.parity,
            stop_bits: self.stop_bits,
        }
    }
}

impl Default for SerialParameters {
    fn default() -> Self {
        Self {
            communication_mode: CommunicationMode::Asynchronous,
            asynchronous_mode: AsynchronousMode::Normal,
            baudrate: Baudrate::Baud9600,
            stop_bits: StopBits::One,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            tx_drive: TxDrive::CompletionFlag,
        }
    }
}

/// Baud rate register value: `clock / (samples * baud) - 1`, truncated
///
/// Saturates at zero when the clock is too slow for the requested rate.
pub const fn baud_divisor(clock_hz: u32, baudrate: Baudrate, mode: AsynchronousMode) -> u16 {
    let divisor = (clock_hz / (mode.samples_per_bit() * baudrate.bits_per_second())).saturating_sub(1);
    if divisor > u16::MAX as u32 {
        u16::MAX
    } else {
        divisor as u16
    }
}

/// State shared between the UART driver and its interrupt handlers
pub struct UartShared<const N: usize> {
    rx: SharedRingBuffer<N>,
    tx: SharedRingBuffer<N>,
    tx_busy: AtomicBool,
}

impl<const N: usize> UartShared<N> {
    pub const fn new() -> Self {
        Self::with_capacity(N, N)
    }

    pub const fn with_capacity(rx_capacity: usize, tx_capacity: usize) -> Self {
        Self {
            rx: SharedRingBuffer::with_capacity(rx_capacity),
            tx: SharedRingBuffer::with_capacity(tx_capacity),
            tx_busy: AtomicBool::new(false),
        }
    }

    /// Receive-complete interrupt
    ///
    /// A full RX ring drops the new byte; nothing blocks in interrupt context.
    pub fn on_receive<R: UartRegisters + ?Sized>(&self, regs: &R) {
        let byte = regs.read_data();
        if !self.rx.push(byte) {
            trace!("UART RX overflow, byte dropped");
        }
    }

    /// Transmit-complete interrupt (`TxDrive::CompletionFlag`)
    pub fn on_transmit_complete(&self) {
        self.tx_busy.store(false, Ordering::Release);
    }

    /// Data-register-empty interrupt (`TxDrive::DataRegisterEmpty`)
    pub fn on_data_register_empty<R: UartRegisters + ?Sized>(&self, regs: &R) {
        match self.tx.pop() {
            Some(byte) => regs.write_data(byte),
            None => {
                regs.set_data_register_empty_interrupt(false);
                self.tx_busy.store(false, Ordering::Release);
            }
        }
    }

    fn is_busy(&self) -> bool {
        self.tx_busy.load(Ordering::Acquire)
    }
}

impl<const N: usize> Default for UartShared<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Interrupt-driven UART transport
pub struct UartTransport<'a, R, const N: usize> {
    regs: R,
    shared: &'a UartShared<N>,
    tx_drive: TxDrive,
}

impl<'a, R: UartRegisters, const N: usize> UartTransport<'a, R, N> {
    /// Program the peripheral and enable it with interrupts
    ///
    /// Register setup runs with interrupts masked so a stale RX interrupt
    /// can't fire against a half-configured port.
    pub fn new(regs: R, shared: &'a UartShared<N>, parameters: &SerialParameters, clock_hz: u32) -> Self {
        let divisor = baud_divisor(clock_hz, parameters.baudrate, parameters.asynchronous_mode);

        critical_section::with(|_| {
            shared.rx.clear();
            shared.tx.clear();
            shared.tx_busy.store(false, Ordering::Release);

            regs.set_baud_divisor(divisor);
            regs.set_double_speed(parameters.asynchronous_mode == AsynchronousMode::DoubleSpeed);
            regs.set_frame_format(parameters.frame_format());
            regs.enable(UartControl {
                receiver: true,
                transmitter: true,
                rx_complete_interrupt: true,
                tx_complete_interrupt: parameters.tx_drive == TxDrive::CompletionFlag,
            });
        });

        info!(
            "UART configured: {} baud, divisor {}",
            parameters.baudrate.bits_per_second(),
            divisor
        );

        Self {
            regs,
            shared,
            tx_drive: parameters.tx_drive,
        }
    }

    /// Block until everything queued has been handed to the shift register
    pub fn flush_tx(&mut self) {
        match self.tx_drive {
            TxDrive::CompletionFlag => {
                self.drain_blocking();
                while self.shared.is_busy() {
                    core::hint::spin_loop();
                }
            }
            TxDrive::DataRegisterEmpty => {
                while !self.shared.tx.is_empty() || self.shared.is_busy() {
                    core::hint::spin_loop();
                }
            }
        }
    }

    /// Write queued bytes one by one, waiting for TX-complete between them
    fn drain_blocking(&mut self) {
        while let Some(byte) = self.shared.tx.pop() {
            while self.shared.is_busy() {
                core::hint::spin_loop();
            }
            critical_section::with(|_| {
                self.shared.tx_busy.store(true, Ordering::Release);
                self.regs.write_data(byte);
            });
        }
    }

    /// Hand the queue to the data-register-empty interrupt
    fn start_interrupt_drain(&mut self) {
        critical_section::with(|_| {
            self.shared.tx_busy.store(true, Ordering::Release);
            self.regs.set_data_register_empty_interrupt(true);
        });
    }
}

impl<R: UartRegisters, const N: usize> Transport for UartTransport<'_, R, N> {
    fn send(&mut self, byte: u8) {
        self.send_bytes(&[byte]);
    }

    fn send_bytes(&mut self, bytes: &[u8]) {
        match self.tx_drive {
            TxDrive::CompletionFlag => {
                for &byte in bytes {
                    if !self.shared.tx.push(byte) {
                        self.drain_blocking();
                        self.shared.tx.push(byte);
                    }
                }
                self.drain_blocking();
            }
            TxDrive::DataRegisterEmpty => {
                for &byte in bytes {
                    while !self.shared.tx.push(byte) {
                        self.start_interrupt_drain();
                        core::hint::spin_loop();
                    }
                }
                if !self.shared.tx.is_empty() {
                    self.start_interrupt_drain();
                }
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

impl<R, const N: usize> embedded_io::ErrorType for UartTransport<'_, R, N> {
    type Error = Infallible;
}

impl<R: UartRegisters, const N: usize> embedded_io::Write for UartTransport<'_, R, N> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.send_bytes(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.flush_tx();
        Ok(())
    }
}

impl<R: UartRegisters, const N: usize> embedded_io::ReadReady for UartTransport<'_, R, N> {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(self.is_read_data_available() > 0)
    }
}

impl<R: UartRegisters, const N: usize> embedded_io::Read for UartTransport<'_, R, N> {
    /// Waits for at least one byte, then returns whatever else is queued
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
