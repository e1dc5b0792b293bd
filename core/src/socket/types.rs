use core::ops::BitOr;

use crate::w5500::registers::socket::{mode, status};

/// Socket protocol, as programmed into the mode register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Protocol {
    #[default]
    Closed,
    Tcp,
    Udp,
    /// Raw Ethernet frames, socket 0 only
    MacRaw,
}

impl Protocol {
    pub const fn mode_bits(self) -> u8 {
        match self {
            Self::Closed => mode::CLOSED,
            Self::Tcp => mode::TCP,
            Self::Udp => mode::UDP,
            Self::MacRaw => mode::MACRAW,
        }
    }

    pub const fn from_mode_bits(bits: u8) -> Self {
        match bits & mode::PROTOCOL_MASK {
            mode::TCP => Self::Tcp,
            mode::UDP => Self::Udp,
            mode::MACRAW => Self::MacRaw,
            _ => Self::Closed,
        }
    }
}

/// Socket state as reported by the status register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SocketState {
    #[default]
    Closed,
    Init,
    Listen,
    SynSent,
    SynRecv,
    Established,
    FinWait,
    Closing,
    TimeWait,
    CloseWait,
    LastAck,
    Udp,
    MacRaw,
    /// Value the chip reported that has no name here
    Unknown(u8),
}

impl SocketState {
    pub const fn from_code(code: u8) -> Self {
        match code {
            status::CLOSED => Self::Closed,
            status::INIT => Self::Init,
            status::LISTEN => Self::Listen,
            status::SYNSENT => Self::SynSent,
            status::SYNRECV => Self::SynRecv,
            status::ESTABLISHED => Self::Established,
            status::FIN_WAIT => Self::FinWait,
            status::CLOSING => Self::Closing,
            status::TIME_WAIT => Self::TimeWait,
            status::CLOSE_WAIT => Self::CloseWait,
            status::LAST_ACK => Self::LastAck,
            status::UDP => Self::Udp,
            status::MACRAW => Self::MacRaw,
            other => Self::Unknown(other),
        }
    }

    pub const fn code(self) -> u8 {
        match self {
            Self::Closed => status::CLOSED,
            Self::Init => status::INIT,
            Self::Listen => status::LISTEN,
            Self::SynSent => status::SYNSENT,
            Self::SynRecv => status::SYNRECV,
            Self::Established => status::ESTABLISHED,
            Self::FinWait => status::FIN_WAIT,
            Self::Closing => status::CLOSING,
            Self::TimeWait => status::TIME_WAIT,
            Self::CloseWait => status::CLOSE_WAIT,
            Self::LastAck => status::LAST_ACK,
            Self::Udp => status::UDP,
            Self::MacRaw => status::MACRAW,
            Self::Unknown(code) => code,
        }
    }
}

/// Mode-register flag bits (upper nibble)
///
/// Bit meanings depend on the protocol: `MULTICAST` is multicast enable for
/// UDP and MAC filter for MACRAW, `NO_DELAY` is delayed-ACK off for TCP,
/// IGMPv1 for UDP multicast and multicast block for MACRAW.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SocketFlags(u8);

impl SocketFlags {
    pub const NONE: Self = Self(0);
    pub const MULTICAST: Self = Self(0x80);
    pub const BROADCAST_BLOCK: Self = Self(0x40);
    pub const NO_DELAY: Self = Self(0x20);
    pub const UNICAST_BLOCK: Self = Self(0x10);
    /// IPv6 block for MACRAW shares the unicast-block bit
    pub const IPV6_BLOCK: Self = Self(0x10);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for SocketFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// How `connect`, `send` and `recv` wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IoMode {
    /// Poll the chip until the operation can complete
    Blocking,
    /// Return `Ok(0)` when the operation would have to wait
    #[default]
    NonBlocking,
}

/// Locally cached view of one hardware socket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SocketStatus {
    /// Hardware socket index, `0..8`; `u8::MAX` in the invalid record
    pub socket: u8,
    pub protocol: Protocol,
    pub port: u16,
    pub state: SocketState,
    pub flags: SocketFlags,
}

impl SocketStatus {
    /// Record returned for indices outside the socket table
    pub const INVALID: Self = Self {
        socket: u8::MAX,
        protocol: Protocol::Closed,
        port: 0,
        state: SocketState::Closed,
        flags: SocketFlags::NONE,
    };

    pub const fn closed(socket: u8) -> Self {
        Self {
            socket,
            protocol: Protocol::Closed,
            port: 0,
            state: SocketState::Closed,
            flags: SocketFlags::NONE,
        }
    }

    /// Request for `open_socket`
    pub const fn new(socket: u8, protocol: Protocol, port: u16, flags: SocketFlags) -> Self {
        Self {
            socket,
            protocol,
            port,
            state: SocketState::Closed,
            flags,
        }
    }

    pub const fn is_valid(&self) -> bool {
        self.socket != u8::MAX
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_codes() {
        assert_eq!(SocketState::from_code(0x17), SocketState::Established);
        assert_eq!(SocketState::from_code(0x1C), SocketState::CloseWait);
        assert_eq!(SocketState::from_code(0x22), SocketState::Udp);
        assert_eq!(SocketState::from_code(0x99), SocketState::Unknown(0x99));
        assert_eq!(SocketState::Unknown(0x99).code(), 0x99);
        assert_eq!(SocketState::Listen.code(), 0x14);
    }

    #[test]
    fn test_flags() {
        let flags = SocketFlags::MULTICAST | SocketFlags::NO_DELAY;
        assert_eq!(flags.bits(), 0xA0);
        assert!(flags.contains(SocketFlags::NO_DELAY));
        assert!(!flags.contains(SocketFlags::BROADCAST_BLOCK));
    }

    #[test]
    fn test_invalid_sentinel() {
        assert!(!SocketStatus::INVALID.is_valid());
        assert!(SocketStatus::closed(7).is_valid());
    }

    #[test]
    fn test_protocol_mode_bits() {
        assert_eq!(Protocol::from_mode_bits(0x21), Protocol::Tcp);
        assert_eq!(Protocol::from_mode_bits(Protocol::MacRaw.mode_bits()), Protocol::MacRaw);
    }
}
