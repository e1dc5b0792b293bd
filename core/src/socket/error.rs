//! Socket operation errors

/// Socket operation errors
///
/// Each variant carries the numeric code the W5500 socket library uses for
/// the same condition, see [`SocketError::code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SocketError {
    /// Socket index out of range or not valid for the protocol
    InvalidSocket,
    /// Option or control request not applicable
    InvalidOption,
    /// Source IP not configured, or driver not initialized
    NotInitialized,
    /// Socket closed by the chip during the operation
    SocketClosed,
    /// Operation not allowed in the socket's protocol mode
    InvalidMode,
    /// Flag combination rejected
    InvalidFlag,
    /// Socket state does not allow the operation; after a peer close this
    /// is what `recv_socket` reports
    InvalidStatus,
    /// Argument out of range
    InvalidArgument,
    /// Port 0 given where a real port is needed
    PortZero,
    /// Unspecified or broadcast address given where a host is needed
    InvalidIp,
    /// ARP or TCP retransmission timed out
    Timeout,
    /// Zero-length transfer requested
    DataLength,
    /// Datagram did not fit the caller's buffer
    Buffer,
    /// Chip reported something impossible; the socket has been closed
    Fatal,
}

impl SocketError {
    /// Numeric code of the W5500 socket library
    pub const fn code(self) -> i16 {
        match self {
            Self::InvalidSocket => -1,
            Self::InvalidOption => -2,
            Self::NotInitialized => -3,
            Self::SocketClosed => -4,
            Self::InvalidMode => -5,
            Self::InvalidFlag => -6,
            Self::InvalidStatus => -7,
            Self::InvalidArgument => -10,
            Self::PortZero => -11,
            Self::InvalidIp => -12,
            Self::Timeout => -13,
            Self::DataLength => -14,
            Self::Buffer => -15,
            Self::Fatal => -1000,
        }
    }

    /// The TCP connection is gone and the socket has to be reopened
    ///
    /// `Timeout` from a UDP/MACRAW `sendto` or a keep-alive send leaves the
    /// socket open even though this returns true.
    pub const fn is_connection_closed(self) -> bool {
        matches!(self, Self::SocketClosed | Self::InvalidStatus | Self::Timeout)
    }
}

impl core::fmt::Display for SocketError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidSocket => write!(f, "Invalid socket number"),
            Self::InvalidOption => write!(f, "Invalid socket option"),
            Self::NotInitialized => write!(f, "Socket not initialized"),
            Self::SocketClosed => write!(f, "Socket closed"),
            Self::InvalidMode => write!(f, "Invalid socket mode"),
            Self::InvalidFlag => write!(f, "Invalid socket flag"),
            Self::InvalidStatus => write!(f, "Invalid socket status"),
            Self::InvalidArgument => write!(f, "Invalid argument"),
            Self::PortZero => write!(f, "Port is zero"),
            Self::InvalidIp => write!(f, "Invalid IP address"),
            Self::Timeout => write!(f, "Socket timeout"),
            Self::DataLength => write!(f, "Invalid data length"),
            Self::Buffer => write!(f, "Buffer too small"),
            Self::Fatal => write!(f, "Fatal socket error"),
        }
    }
}

// Implement core::error::Error for no_std compatibility
impl core::error::Error for SocketError {}

impl embedded_io::Error for SocketError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            Self::SocketClosed | Self::InvalidStatus => embedded_io::ErrorKind::ConnectionReset,
            Self::Timeout => embedded_io::ErrorKind::TimedOut,
            Self::InvalidArgument | Self::DataLength | Self::PortZero | Self::InvalidIp => {
                embedded_io::ErrorKind::InvalidInput
            }
            _ => embedded_io::ErrorKind::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_library() {
        assert_eq!(SocketError::InvalidSocket.code(), -1);
        assert_eq!(SocketError::InvalidStatus.code(), -7);
        assert_eq!(SocketError::PortZero.code(), -11);
        assert_eq!(SocketError::Buffer.code(), -15);
        assert_eq!(SocketError::Fatal.code(), -1000);
    }

    #[test]
    fn test_connection_closed_classification() {
        assert!(SocketError::InvalidStatus.is_connection_closed());
        assert!(SocketError::SocketClosed.is_connection_closed());
        assert!(!SocketError::DataLength.is_connection_closed());
        assert!(!SocketError::InvalidFlag.is_connection_closed());
    }
}
