//! W5500 register map
//!
//! Addresses are offsets inside a block; the block is chosen by the SPI
//! control byte.

/// Address block selected by bits 7..3 of the control byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Block {
    Common,
    Socket(u8),
    TxBuffer(u8),
    RxBuffer(u8),
}

impl Block {
    pub const fn bsb(self) -> u8 {
        match self {
            Self::Common => 0,
            Self::Socket(n) => 4 * n + 1,
            Self::TxBuffer(n) => 4 * n + 2,
            Self::RxBuffer(n) => 4 * n + 3,
        }
    }

    /// Control byte for a variable-length frame
    pub const fn control(self, write: bool) -> u8 {
        (self.bsb() << 3) | if write { RW_WRITE } else { 0 }
    }
}

const RW_WRITE: u8 = 1 << 2;

pub mod common {
    pub const MR: u16 = 0x0000;
    pub const GAR: u16 = 0x0001;
    pub const SIPR: u16 = 0x000F;
    pub const IR: u16 = 0x0015;
    pub const IMR: u16 = 0x0016;
    pub const PHYCFGR: u16 = 0x002E;
    pub const VERSIONR: u16 = 0x0039;

    pub const MR_RST: u8 = 0x80;
    pub const PHYCFGR_LNK: u8 = 0x01;
    pub const CHIP_VERSION: u8 = 0x04;
}

pub mod socket {
    pub const MR: u16 = 0x0000;
    pub const CR: u16 = 0x0001;
    pub const IR: u16 = 0x0002;
    pub const SR: u16 = 0x0003;
    pub const PORT: u16 = 0x0004;
    pub const DIPR: u16 = 0x000C;
    pub const DPORT: u16 = 0x0010;
    pub const MSSR: u16 = 0x0012;
    pub const TOS: u16 = 0x0015;
    pub const TTL: u16 = 0x0016;
    pub const RXBUF_SIZE: u16 = 0x001E;
    pub const TXBUF_SIZE: u16 = 0x001F;
    pub const TX_FSR: u16 = 0x0020;
    pub const TX_WR: u16 = 0x0024;
    pub const RX_RSR: u16 = 0x0026;
    pub const RX_RD: u16 = 0x0028;
    pub const IMR: u16 = 0x002C;
    pub const KPALVTR: u16 = 0x002F;

    /// Sn_CR commands
    pub mod cmd {
        pub const OPEN: u8 = 0x01;
        pub const LISTEN: u8 = 0x02;
        pub const CONNECT: u8 = 0x04;
        pub const DISCON: u8 = 0x08;
        pub const CLOSE: u8 = 0x10;
        pub const SEND: u8 = 0x20;
        pub const SEND_KEEP: u8 = 0x22;
        pub const RECV: u8 = 0x40;
    }

    /// Sn_IR bits
    pub mod irq {
        pub const RECV: u8 = 0x04;
        pub const TIMEOUT: u8 = 0x08;
        pub const SEND_OK: u8 = 0x10;
        pub const ALL: u8 = 0x1F;
    }

    /// Sn_SR values
    pub mod status {
        pub const CLOSED: u8 = 0x00;
        pub const INIT: u8 = 0x13;
        pub const LISTEN: u8 = 0x14;
        pub const SYNSENT: u8 = 0x15;
        pub const SYNRECV: u8 = 0x16;
        pub const ESTABLISHED: u8 = 0x17;
        pub const FIN_WAIT: u8 = 0x18;
        pub const CLOSING: u8 = 0x1A;
        pub const TIME_WAIT: u8 = 0x1B;
        pub const CLOSE_WAIT: u8 = 0x1C;
        pub const LAST_ACK: u8 = 0x1D;
        pub const UDP: u8 = 0x22;
        pub const MACRAW: u8 = 0x42;
    }

    /// Sn_MR protocol field (low nibble)
    pub mod mode {
        pub const CLOSED: u8 = 0x00;
        pub const TCP: u8 = 0x01;
        pub const UDP: u8 = 0x02;
        pub const MACRAW: u8 = 0x04;
        pub const PROTOCOL_MASK: u8 = 0x0F;
    }
}
