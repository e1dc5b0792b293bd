//! Callback contract of the network offload chip
//!
//! The chip driver never touches pins or the SPI peripheral itself. Every
//! transaction goes through a `ChipBus` supplied by the application, which
//! owns the transport and the pin-control logic.

/// Chip select, reset and raw byte I/O used by the chip driver
pub trait ChipBus {
    /// Assert chip select (drive CS low)
    fn chip_select(&mut self);

    /// Release chip select (drive CS high)
    fn chip_deselect(&mut self);

    /// Pulse the external reset line: 1 ms asserted, then 10 ms to settle
    ///
    /// Boards without a reset line keep the default no-op.
    fn hard_reset(&mut self) {}

    /// Clock one byte in from the chip
    fn spi_read(&mut self) -> u8;

    /// Clock one byte out to the chip
    fn spi_write(&mut self, byte: u8);

    fn spi_read_burst(&mut self, buf: &mut [u8]) {
        for byte in buf.iter_mut() {
            *byte = self.spi_read();
        }
    }

    fn spi_write_burst(&mut self, buf: &[u8]) {
        for &byte in buf {
            self.spi_write(byte);
        }
    }
}
