use doorbell_hal::{ChipBus, Transport};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

/// Reset line held low
const RESET_ASSERT_MS: u32 = 1;
/// Wait after releasing reset before the first frame
const RESET_RELEASE_MS: u32 = 10;

/// `ChipBus` over a full-duplex byte transport
///
/// Every byte clocked out produces one received byte. Writes throw the echo
/// away; reads clock out `0x00` and return what came back.
pub struct TransportBus<T, CS, RST, D> {
    transport: T,
    cs: CS,
    reset: RST,
    delay: D,
}

impl<T, CS, RST, D> TransportBus<T, CS, RST, D>
where
    T: Transport,
    CS: OutputPin,
    RST: OutputPin,
    D: DelayNs,
{
    pub fn new(transport: T, mut cs: CS, mut reset: RST, delay: D) -> Self {
        cs.set_high().ok();
        reset.set_high().ok();
        Self {
            transport,
            cs,
            reset,
            delay,
        }
    }

    pub fn release(self) -> (T, CS, RST, D) {
        (self.transport, self.cs, self.reset, self.delay)
    }

    fn discard_received(&mut self) {
        while self.transport.read_byte().is_some() {}
    }
}

impl<T, CS, RST, D> ChipBus for TransportBus<T, CS, RST, D>
where
    T: Transport,
    CS: OutputPin,
    RST: OutputPin,
    D: DelayNs,
{
    fn chip_select(&mut self) {
        self.discard_received();
        self.cs.set_low().ok();
    }

    fn chip_deselect(&mut self) {
        self.cs.set_high().ok();
    }

    fn hard_reset(&mut self) {
        self.reset.set_low().ok();
        self.delay.delay_ms(RESET_ASSERT_MS);
        self.reset.set_high().ok();
        self.delay.delay_ms(RESET_RELEASE_MS);
    }

    fn spi_read(&mut self) -> u8 {
        self.transport.send(0x00);
        self.transport.read_byte().unwrap_or(0)
    }

    fn spi_write(&mut self, byte: u8) {
        self.transport.send(byte);
        self.transport.read_byte();
    }

    fn spi_write_burst(&mut self, buf: &[u8]) {
        self.transport.send_bytes(buf);
        self.discard_received();
    }
}
