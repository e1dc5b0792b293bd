//! Typed arguments for `ctlsocket`, `setsockopt` and `getsockopt`

use core::net::Ipv4Addr;

use super::types::{IoMode, SocketFlags, SocketState};

/// Per-socket control request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SocketControl {
    SetIoMode(IoMode),
    GetIoMode,
    /// TX buffer size in bytes
    GetMaxTxBuffer,
    /// RX buffer size in bytes
    GetMaxRxBuffer,
    /// Write-1-to-clear interrupt bits, at most `0x1F`
    ClearInterrupt(u8),
    GetInterrupt,
    /// Interrupt mask, at most `0x1F`
    SetInterruptMask(u8),
    GetInterruptMask,
}

/// Option written by `setsockopt`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketOption {
    Ttl(u8),
    Tos(u8),
    Mss(u16),
    DestinationIp(Ipv4Addr),
    DestinationPort(u16),
    /// Send one keep-alive packet now (TCP, auto keep-alive off)
    SendKeepAlive,
    /// Automatic keep-alive period in units of 5 s, 0 disables (TCP)
    KeepAliveInterval(u8),
}

/// Option read by `getsockopt`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SocketOptionKind {
    Flags,
    Ttl,
    Tos,
    Mss,
    DestinationIp,
    DestinationPort,
    KeepAliveInterval,
    /// Free space in the TX buffer
    TxFreeSize,
    /// Bytes waiting in the RX buffer
    RxReceivedSize,
    Status,
    /// Bytes left of the datagram being read (TCP: RX received size)
    RemainingSize,
    /// Progress of the datagram being read (not TCP)
    PacketInfo,
}

/// Value returned by `ctlsocket` and `getsockopt`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionValue {
    /// Setter completed
    Done,
    IoMode(IoMode),
    Byte(u8),
    Size(u16),
    Flags(SocketFlags),
    Ip(Ipv4Addr),
    Port(u16),
    State(SocketState),
    PacketInfo(PacketInfo),
}

/// Where `recvfrom` is inside the current datagram
///
/// `FIRST` is set when a call consumed a datagram header, `REMAINED` while
/// part of the datagram is still unread; both clear once it has been read
/// out completely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PacketInfo(u8);

impl PacketInfo {
    pub const COMPLETED: Self = Self(0x00);
    pub const FIRST: Self = Self(0x80);
    pub const REMAINED: Self = Self(0x01);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_first(self) -> bool {
        self.0 & Self::FIRST.0 != 0
    }

    pub const fn has_remainder(self) -> bool {
        self.0 & Self::REMAINED.0 != 0
    }

    pub(crate) const fn with_remainder(self) -> Self {
        Self(self.0 | Self::REMAINED.0)
    }
}
