//! WIZnet W5500 TCP/IP offload chip
//!
//! The driver speaks the chip's SPI frame format over a [`ChipBus`] and owns
//! nothing else: the bus implementation decides how chip select and reset are
//! wired. One `W5500` value exists per chip; boards that need to reach it from
//! several places keep it behind their own `critical_section::Mutex`.
//!
//! Frame layout, one chip-select assertion per frame:
//!
//! ```text
//! | addr[15:8] | addr[7:0] | BSB[4:0] RWB OM[1:0] | data ... |
//! ```

mod bus;
pub mod config;
pub mod registers;

use core::fmt::Write as _;
use core::net::Ipv4Addr;

use doorbell_hal::{ChipBus, Transport};
use embedded_hal::delay::DelayNs;

use crate::serial::NoTransport;

pub use bus::TransportBus;
pub use config::{MacAddress, NetworkIdentity, IDENTITY_FRAME_LEN, RX_MEMORY_KB, TX_MEMORY_KB};
pub use registers::Block;

use config::memory_table_fits;
use registers::{common, socket};

/// Number of hardware sockets
pub const SOCKET_COUNT: u8 = 8;

/// Settle time after a mode-register reset
pub const SOFT_RESET_SETTLE_MS: u32 = 100;

/// Longest line written to the diagnostic sink
const LOG_LINE_LEN: usize = 96;

/// Why `init` gave up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InitError {
    /// Version register did not read `0x04`; chip missing or bus miswired
    UnexpectedVersion(u8),
    /// Socket buffer table exceeds the chip's 16 KiB per direction
    MemoryOverflow,
}

impl core::fmt::Display for InitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::UnexpectedVersion(v) => write!(f, "unexpected chip version 0x{v:02X}"),
            Self::MemoryOverflow => write!(f, "socket memory table exceeds 16 KiB"),
        }
    }
}

impl core::error::Error for InitError {}

/// W5500 register-level driver
pub struct W5500<B, D, L = NoTransport> {
    bus: B,
    delay: D,
    log: Option<L>,
    initialized: bool,
}

impl<B: ChipBus, D: DelayNs> W5500<B, D> {
    pub fn new(bus: B, delay: D) -> Self {
        Self {
            bus,
            delay,
            log: None,
            initialized: false,
        }
    }
}

impl<B: ChipBus, D: DelayNs, L: Transport> W5500<B, D, L> {
    /// Driver that also reports initialization problems as text on `log`
    pub fn with_log(bus: B, delay: D, log: L) -> Self {
        Self {
            bus,
            delay,
            log: Some(log),
            initialized: false,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Reset the chip and program the socket memory tables
    ///
    /// Calling again after a successful run does nothing. On failure the
    /// driver stays uninitialized and the caller may retry.
    pub fn init(&mut self) -> Result<(), InitError> {
        if self.initialized {
            return Ok(());
        }

        self.soft_reset();

        let version = self.version();
        if version != common::CHIP_VERSION {
            error!("W5500 not responding, VERSIONR={=u8:#x}", version);
            self.log_line(format_args!("W5500: unexpected version 0x{version:02X}"));
            return Err(InitError::UnexpectedVersion(version));
        }

        if !memory_table_fits(&TX_MEMORY_KB) || !memory_table_fits(&RX_MEMORY_KB) {
            error!("W5500 socket memory table exceeds budget");
            self.log_line(format_args!("W5500: socket memory table exceeds 16 KiB"));
            return Err(InitError::MemoryOverflow);
        }

        for sn in 0..SOCKET_COUNT {
            self.write_u8(Block::Socket(sn), socket::TXBUF_SIZE, TX_MEMORY_KB[sn as usize]);
            self.write_u8(Block::Socket(sn), socket::RXBUF_SIZE, RX_MEMORY_KB[sn as usize]);
        }

        self.initialized = true;
        info!("W5500 initialized");
        self.log_line(format_args!("W5500: initialized"));
        Ok(())
    }

    /// Set the mode-register reset bit and wait for the chip to come back
    pub fn soft_reset(&mut self) {
        self.write_u8(Block::Common, common::MR, common::MR_RST);
        self.delay.delay_ms(SOFT_RESET_SETTLE_MS);
        debug!("W5500 soft reset");
    }

    /// Run the full `init` sequence even if the driver is already initialized
    ///
    /// Use after a [`hard_reset`](Self::hard_reset), which returns the chip
    /// registers to power-on values without touching the driver state.
    pub fn reinit(&mut self) -> Result<(), InitError> {
        self.initialized = false;
        self.init()
    }

    /// Pulse the external reset line through the bus
    pub fn hard_reset(&mut self) {
        self.bus.hard_reset();
        debug!("W5500 hard reset");
    }

    pub fn version(&mut self) -> u8 {
        self.read_u8(Block::Common, common::VERSIONR)
    }

    pub fn link_up(&mut self) -> bool {
        self.read_u8(Block::Common, common::PHYCFGR) & common::PHYCFGR_LNK != 0
    }

    pub fn network_config(&mut self) -> NetworkIdentity {
        let mut frame = [0u8; IDENTITY_FRAME_LEN];
        self.read(Block::Common, common::GAR, &mut frame);
        NetworkIdentity::from_frame(&frame)
    }

    pub fn set_network_config(&mut self, identity: &NetworkIdentity) {
        self.write(Block::Common, common::GAR, &identity.to_frame());
        info!("W5500 identity updated");
    }

    fn update_identity(&mut self, change: impl FnOnce(&mut NetworkIdentity)) {
        let mut identity = self.network_config();
        change(&mut identity);
        self.set_network_config(&identity);
    }

    pub fn mac(&mut self) -> MacAddress {
        self.network_config().mac
    }

    pub fn set_mac(&mut self, mac: MacAddress) {
        self.update_identity(|id| id.mac = mac);
    }

    pub fn ip(&mut self) -> Ipv4Addr {
        self.network_config().ip
    }

    pub fn set_ip(&mut self, ip: Ipv4Addr) {
        self.update_identity(|id| id.ip = ip);
    }

    pub fn subnet(&mut self) -> Ipv4Addr {
        self.network_config().subnet
    }

    pub fn set_subnet(&mut self, subnet: Ipv4Addr) {
        self.update_identity(|id| id.subnet = subnet);
    }

    pub fn gateway(&mut self) -> Ipv4Addr {
        self.network_config().gateway
    }

    pub fn set_gateway(&mut self, gateway: Ipv4Addr) {
        self.update_identity(|id| id.gateway = gateway);
    }

    /// Read `buf.len()` bytes starting at `addr` in one frame
    pub fn read(&mut self, block: Block, addr: u16, buf: &mut [u8]) {
        let [hi, lo] = addr.to_be_bytes();
        self.bus.chip_select();
        self.bus.spi_write_burst(&[hi, lo, block.control(false)]);
        self.bus.spi_read_burst(buf);
        self.bus.chip_deselect();
    }

    /// Write `data` starting at `addr` in one frame
    pub fn write(&mut self, block: Block, addr: u16, data: &[u8]) {
        let [hi, lo] = addr.to_be_bytes();
        self.bus.chip_select();
        self.bus.spi_write_burst(&[hi, lo, block.control(true)]);
        self.bus.spi_write_burst(data);
        self.bus.chip_deselect();
    }

    pub fn read_u8(&mut self, block: Block, addr: u16) -> u8 {
        let mut buf = [0u8; 1];
        self.read(block, addr, &mut buf);
        buf[0]
    }

    pub fn write_u8(&mut self, block: Block, addr: u16, value: u8) {
        self.write(block, addr, &[value]);
    }

    pub fn read_u16(&mut self, block: Block, addr: u16) -> u16 {
        let mut buf = [0u8; 2];
        self.read(block, addr, &mut buf);
        u16::from_be_bytes(buf)
    }

    pub fn write_u16(&mut self, block: Block, addr: u16, value: u16) {
        self.write(block, addr, &value.to_be_bytes());
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Take back the bus, delay and diagnostic sink
    pub fn release(self) -> (B, D, Option<L>) {
        (self.bus, self.delay, self.log)
    }

    fn log_line(&mut self, args: core::fmt::Arguments<'_>) {
        let Some(log) = self.log.as_mut() else {
            return;
        };
        let mut line: heapless::String<LOG_LINE_LEN> = heapless::String::new();
        // A truncated line is still worth sending
        let _ = line.write_fmt(args);
        log.send_string(&line);
        log.send_bytes(b"\r\n");
    }
}
