//! BSD-style socket API over the W5500's eight hardware sockets
//!
//! The chip runs TCP/UDP itself; this layer issues socket commands, moves
//! payload through the socket buffers and keeps a cached [`SocketStatus`]
//! per slot. Cached state is refreshed from the status register after every
//! operation that can change it, never assumed.
//!
//! Results follow one convention: `Ok(n)` is a byte count where `Ok(0)`
//! means "nothing happened, poll again". On TCP operations an error whose
//! [`SocketError::is_connection_closed`] is true means the slot has been
//! closed and must be reopened by the caller. A `Timeout` from `sendto` or
//! `SocketOption::SendKeepAlive` only reports the failed send; the slot
//! stays open.

mod error;
mod options;
mod types;

use core::net::{Ipv4Addr, SocketAddrV4};

use doorbell_hal::{ChipBus, Transport};
use embedded_hal::delay::DelayNs;

use crate::serial::NoTransport;
use crate::w5500::registers::{common, socket as sreg};
use crate::w5500::{Block, InitError, SOCKET_COUNT, W5500};

pub use error::SocketError;
pub use options::{OptionValue, PacketInfo, SocketControl, SocketOption, SocketOptionKind};
pub use types::{IoMode, Protocol, SocketFlags, SocketState, SocketStatus};

use sreg::{cmd, irq, status};

/// First port handed out when `open_socket` is asked for port 0
pub const EPHEMERAL_PORT_START: u16 = 0xC000;
/// Ephemeral ports wrap back to the start before reaching this value
const EPHEMERAL_PORT_END: u16 = 0xFFF0;

/// Largest Ethernet frame a MACRAW read accepts
const MACRAW_MAX_FRAME: u16 = 1514;

const UDP_HEADER_LEN: usize = 8;
const MACRAW_HEADER_LEN: usize = 2;

type Result<T> = core::result::Result<T, SocketError>;

/// Per-slot bookkeeping the chip does not hold for us
#[derive(Debug, Clone, Copy, Default)]
struct SocketRuntime {
    io_mode: IoMode,
    is_sending: bool,
    remained_size: u16,
    pack_info: PacketInfo,
    remote: Option<SocketAddrV4>,
}

/// `SocketLayer::new` could not initialize the chip
///
/// Carries the driver back so the caller can retry with the same bus, pins
/// and delay.
pub struct InitFailed<B, D, L = NoTransport> {
    error: InitError,
    chip: W5500<B, D, L>,
}

impl<B, D, L> InitFailed<B, D, L> {
    pub fn error(&self) -> InitError {
        self.error
    }

    pub fn into_inner(self) -> W5500<B, D, L> {
        self.chip
    }
}

impl<B, D, L> core::fmt::Debug for InitFailed<B, D, L> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InitFailed")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<B, D, L> core::fmt::Display for InitFailed<B, D, L> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "socket layer init failed: {}", self.error)
    }
}

/// Socket table bound to one initialized W5500
pub struct SocketLayer<B, D, L = NoTransport> {
    chip: W5500<B, D, L>,
    table: [SocketStatus; SOCKET_COUNT as usize],
    runtime: [SocketRuntime; SOCKET_COUNT as usize],
    next_port: u16,
}

impl<B, D, L> SocketLayer<B, D, L>
where
    B: ChipBus,
    D: DelayNs,
    L: Transport,
{
    /// Take ownership of the driver, initializing it if needed
    ///
    /// On failure the driver comes back inside the error, still
    /// uninitialized.
    pub fn new(mut chip: W5500<B, D, L>) -> core::result::Result<Self, InitFailed<B, D, L>> {
        if let Err(error) = chip.init() {
            return Err(InitFailed { error, chip });
        }
        Ok(Self {
            chip,
            table: core::array::from_fn(|sn| SocketStatus::closed(sn as u8)),
            runtime: [SocketRuntime::default(); SOCKET_COUNT as usize],
            next_port: EPHEMERAL_PORT_START,
        })
    }

    pub fn chip(&self) -> &W5500<B, D, L> {
        &self.chip
    }

    pub fn chip_mut(&mut self) -> &mut W5500<B, D, L> {
        &mut self.chip
    }

    pub fn into_inner(self) -> W5500<B, D, L> {
        self.chip
    }

    /// Cached status of `sn`; `SocketStatus::INVALID` for indices past the table
    pub fn get_socket_status(&self, sn: u8) -> SocketStatus {
        self.table
            .get(usize::from(sn))
            .copied()
            .unwrap_or(SocketStatus::INVALID)
    }

    /// Read the live status register into the cache
    pub fn refresh_status(&mut self, sn: u8) -> Result<SocketState> {
        check_socket(sn)?;
        Ok(self.sync_state(sn))
    }

    /// Bind slot `request.socket` to a protocol and port and open it
    ///
    /// Port 0 picks the next ephemeral port. On success the cache holds the
    /// state the chip reports right after OPEN and the port actually bound;
    /// on failure the cached state is `Closed`.
    pub fn open_socket(&mut self, request: SocketStatus) -> Result<()> {
        let sn = request.socket;
        check_socket(sn)?;
        self.table[usize::from(sn)] = request;

        match self.open(sn, request.protocol, request.port, request.flags) {
            Ok(port) => {
                let entry = &mut self.table[usize::from(sn)];
                entry.port = port;
                let state = self.sync_state(sn);
                info!("socket {} opened on port {}, state {:#x}", sn, port, state.code());
                Ok(())
            }
            Err(e) => {
                self.table[usize::from(sn)].state = SocketState::Closed;
                warn!("socket {} open failed: {}", sn, e.code());
                Err(e)
            }
        }
    }

    fn open(&mut self, sn: u8, protocol: Protocol, port: u16, flags: SocketFlags) -> Result<u16> {
        match protocol {
            Protocol::Tcp => {
                let mut sipr = [0u8; 4];
                self.chip.read(Block::Common, common::SIPR, &mut sipr);
                if Ipv4Addr::from(sipr).is_unspecified() {
                    return Err(SocketError::NotInitialized);
                }
            }
            Protocol::Udp => {}
            Protocol::MacRaw => {
                if sn != 0 {
                    return Err(SocketError::InvalidSocket);
                }
            }
            Protocol::Closed => return Err(SocketError::InvalidMode),
        }

        let bits = flags.bits();
        if bits & 0x0F != 0 {
            return Err(SocketError::InvalidFlag);
        }
        if !flags.is_empty() {
            match protocol {
                Protocol::Tcp if !flags.contains(SocketFlags::NO_DELAY) => {
                    return Err(SocketError::InvalidFlag);
                }
                Protocol::Udp
                    if (flags.contains(SocketFlags::NO_DELAY)
                        || flags.contains(SocketFlags::UNICAST_BLOCK))
                        && !flags.contains(SocketFlags::MULTICAST) =>
                {
                    return Err(SocketError::InvalidFlag);
                }
                _ => {}
            }
        }

        self.close(sn);
        self.write_u8(sn, sreg::MR, protocol.mode_bits() | bits);

        let port = if port == 0 { self.ephemeral_port() } else { port };
        self.write_u16(sn, sreg::PORT, port);
        self.command(sn, cmd::OPEN);

        self.runtime[usize::from(sn)] = SocketRuntime::default();
        while self.read_u8(sn, sreg::SR) == status::CLOSED {
            core::hint::spin_loop();
        }
        Ok(port)
    }

    fn ephemeral_port(&mut self) -> u16 {
        let port = self.next_port;
        self.next_port += 1;
        if self.next_port == EPHEMERAL_PORT_END {
            self.next_port = EPHEMERAL_PORT_START;
        }
        port
    }

    /// Put an opened TCP socket into LISTEN
    pub fn listen_socket(&mut self, sn: u8) -> Result<()> {
        check_socket(sn)?;
        self.check_mode(sn, Protocol::Tcp)?;
        if self.read_u8(sn, sreg::SR) != status::INIT {
            return Err(SocketError::NotInitialized);
        }

        self.command(sn, cmd::LISTEN);
        if self.sync_state(sn) != SocketState::Listen {
            self.close(sn);
            self.sync_state(sn);
            return Err(SocketError::SocketClosed);
        }
        info!("socket {} listening", sn);
        Ok(())
    }

    /// Start a TCP connection to `remote`
    ///
    /// Non-blocking sockets return once CONNECT has been issued; poll
    /// `refresh_status` for `Established`. Blocking sockets wait for the
    /// handshake, a timeout or the chip closing the socket.
    pub fn connect_socket(&mut self, sn: u8, remote: SocketAddrV4) -> Result<()> {
        check_socket(sn)?;
        self.check_mode(sn, Protocol::Tcp)?;
        if self.read_u8(sn, sreg::SR) != status::INIT {
            return Err(SocketError::NotInitialized);
        }
        check_host(remote.ip())?;
        if remote.port() == 0 {
            return Err(SocketError::PortZero);
        }

        self.set_destination(sn, remote);
        self.command(sn, cmd::CONNECT);
        self.runtime[usize::from(sn)].remote = Some(remote);

        if self.io_mode(sn) == IoMode::NonBlocking {
            self.sync_state(sn);
            return Ok(());
        }

        while self.read_u8(sn, sreg::SR) != status::ESTABLISHED {
            if self.read_u8(sn, sreg::IR) & irq::TIMEOUT != 0 {
                self.write_u8(sn, sreg::IR, irq::TIMEOUT);
                self.sync_state(sn);
                return Err(SocketError::Timeout);
            }
            if self.read_u8(sn, sreg::SR) == status::CLOSED {
                self.sync_state(sn);
                return Err(SocketError::SocketClosed);
            }
        }
        self.sync_state(sn);
        info!("socket {} connected", sn);
        Ok(())
    }

    /// Send FIN to the peer
    pub fn disconnect_socket(&mut self, sn: u8) -> Result<()> {
        check_socket(sn)?;
        self.check_mode(sn, Protocol::Tcp)?;

        self.command(sn, cmd::DISCON);
        self.runtime[usize::from(sn)].is_sending = false;

        if self.io_mode(sn) == IoMode::Blocking {
            while self.read_u8(sn, sreg::SR) != status::CLOSED {
                if self.read_u8(sn, sreg::IR) & irq::TIMEOUT != 0 {
                    self.close(sn);
                    self.sync_state(sn);
                    return Err(SocketError::Timeout);
                }
            }
        }
        self.sync_state(sn);
        Ok(())
    }

    /// Close the slot and forget its runtime state
    pub fn close_socket(&mut self, sn: u8) -> Result<()> {
        check_socket(sn)?;
        self.close(sn);
        self.sync_state(sn);
        debug!("socket {} closed", sn);
        Ok(())
    }

    fn close(&mut self, sn: u8) {
        self.command(sn, cmd::CLOSE);
        self.write_u8(sn, sreg::IR, 0xFF);
        self.runtime[usize::from(sn)] = SocketRuntime::default();
        while self.read_u8(sn, sreg::SR) != status::CLOSED {
            core::hint::spin_loop();
        }
    }

    /// Queue `buf` on an established TCP connection
    ///
    /// Returns the number of bytes handed to the chip, clamped to the
    /// socket's TX buffer size, or `Ok(0)` while the previous send is still
    /// in flight (or, non-blocking, the buffer lacks room).
    pub fn send_socket(&mut self, sn: u8, buf: &[u8]) -> Result<usize> {
        check_socket(sn)?;
        let result = self.send(sn, buf);
        self.after_transfer(sn, &result);
        result
    }

    fn send(&mut self, sn: u8, buf: &[u8]) -> Result<usize> {
        self.check_mode(sn, Protocol::Tcp)?;
        if buf.is_empty() {
            return Err(SocketError::DataLength);
        }
        if !is_connected(self.read_u8(sn, sreg::SR)) {
            return Err(SocketError::InvalidStatus);
        }
        if !self.complete_previous_send(sn)? {
            return Ok(0);
        }

        let len = clamp_len(buf.len()).min(self.tx_max(sn));
        loop {
            let free = self.tx_free_size(sn);
            if !is_connected(self.read_u8(sn, sreg::SR)) {
                self.close(sn);
                return Err(SocketError::InvalidStatus);
            }
            if len <= free {
                break;
            }
            if self.io_mode(sn) == IoMode::NonBlocking {
                return Ok(0);
            }
        }

        self.send_data(sn, &buf[..usize::from(len)]);
        self.command(sn, cmd::SEND);
        self.runtime[usize::from(sn)].is_sending = true;
        Ok(usize::from(len))
    }

    /// `Ok(true)` once the chip acknowledged the last SEND
    fn complete_previous_send(&mut self, sn: u8) -> Result<bool> {
        if !self.runtime[usize::from(sn)].is_sending {
            return Ok(true);
        }
        let ir = self.read_u8(sn, sreg::IR);
        if ir & irq::SEND_OK != 0 {
            self.write_u8(sn, sreg::IR, irq::SEND_OK);
            self.runtime[usize::from(sn)].is_sending = false;
            Ok(true)
        } else if ir & irq::TIMEOUT != 0 {
            self.close(sn);
            Err(SocketError::Timeout)
        } else {
            Ok(false)
        }
    }

    /// Read whatever the peer has sent, up to `buf.len()` bytes
    ///
    /// Once the peer has closed and all data has been read (and our own TX
    /// queue is empty) the socket is closed and `InvalidStatus` returned.
    pub fn recv_socket(&mut self, sn: u8, buf: &mut [u8]) -> Result<usize> {
        check_socket(sn)?;
        let result = self.recv(sn, buf);
        self.after_transfer(sn, &result);
        result
    }

    fn recv(&mut self, sn: u8, buf: &mut [u8]) -> Result<usize> {
        self.check_mode(sn, Protocol::Tcp)?;
        if buf.is_empty() {
            return Err(SocketError::DataLength);
        }

        let len = clamp_len(buf.len()).min(self.rx_max(sn));
        let available = loop {
            let available = self.rx_received_size(sn);
            match self.read_u8(sn, sreg::SR) {
                status::ESTABLISHED => {}
                status::CLOSE_WAIT => {
                    if available != 0 {
                        break available;
                    }
                    if self.tx_free_size(sn) == self.tx_max(sn) {
                        self.close(sn);
                        return Err(SocketError::InvalidStatus);
                    }
                }
                _ => {
                    self.close(sn);
                    return Err(SocketError::InvalidStatus);
                }
            }
            if available != 0 {
                break available;
            }
            if self.io_mode(sn) == IoMode::NonBlocking {
                return Ok(0);
            }
        };

        let len = len.min(available);
        self.recv_data(sn, &mut buf[..usize::from(len)]);
        self.command(sn, cmd::RECV);
        Ok(usize::from(len))
    }

    /// Send one datagram (UDP) or frame (MACRAW)
    ///
    /// `remote` is ignored for MACRAW sockets.
    pub fn sendto(&mut self, sn: u8, buf: &[u8], remote: SocketAddrV4) -> Result<usize> {
        check_socket(sn)?;
        let protocol = self.protocol(sn);
        match protocol {
            Protocol::Udp => {
                check_destination(remote.ip())?;
                if remote.port() == 0 {
                    return Err(SocketError::PortZero);
                }
            }
            Protocol::MacRaw => {}
            _ => return Err(SocketError::InvalidMode),
        }
        if buf.is_empty() {
            return Err(SocketError::DataLength);
        }
        let state = self.read_u8(sn, sreg::SR);
        if state != status::UDP && state != status::MACRAW {
            return Err(SocketError::InvalidStatus);
        }

        if protocol == Protocol::Udp {
            self.set_destination(sn, remote);
        }

        let len = clamp_len(buf.len()).min(self.tx_max(sn));
        loop {
            let free = self.tx_free_size(sn);
            if self.read_u8(sn, sreg::SR) == status::CLOSED {
                self.sync_state(sn);
                return Err(SocketError::SocketClosed);
            }
            if len <= free {
                break;
            }
            if self.io_mode(sn) == IoMode::NonBlocking {
                return Ok(0);
            }
        }

        self.send_data(sn, &buf[..usize::from(len)]);
        self.command(sn, cmd::SEND);

        loop {
            let ir = self.read_u8(sn, sreg::IR);
            if ir & irq::SEND_OK != 0 {
                self.write_u8(sn, sreg::IR, irq::SEND_OK);
                break;
            }
            if ir & irq::TIMEOUT != 0 {
                self.write_u8(sn, sreg::IR, irq::TIMEOUT);
                return Err(SocketError::Timeout);
            }
        }
        Ok(usize::from(len))
    }

    /// Read (part of) the next datagram
    ///
    /// A datagram larger than `buf` is handed out over several calls; each
    /// call returns the sender's address. MACRAW sockets return `None` as the
    /// address.
    pub fn recvfrom(&mut self, sn: u8, buf: &mut [u8]) -> Result<(usize, Option<SocketAddrV4>)> {
        check_socket(sn)?;
        let protocol = self.protocol(sn);
        if !matches!(protocol, Protocol::Udp | Protocol::MacRaw) {
            return Err(SocketError::InvalidMode);
        }
        if buf.is_empty() {
            return Err(SocketError::DataLength);
        }

        let idx = usize::from(sn);
        if self.runtime[idx].remained_size == 0 {
            loop {
                let available = self.rx_received_size(sn);
                if self.read_u8(sn, sreg::SR) == status::CLOSED {
                    self.sync_state(sn);
                    return Err(SocketError::SocketClosed);
                }
                if available != 0 {
                    break;
                }
                if self.io_mode(sn) == IoMode::NonBlocking {
                    return Ok((0, None));
                }
            }

            if protocol == Protocol::Udp {
                let mut head = [0u8; UDP_HEADER_LEN];
                self.recv_data(sn, &mut head);
                self.command(sn, cmd::RECV);
                let ip = Ipv4Addr::new(head[0], head[1], head[2], head[3]);
                let port = u16::from_be_bytes([head[4], head[5]]);
                self.runtime[idx].remote = Some(SocketAddrV4::new(ip, port));
                self.runtime[idx].remained_size = u16::from_be_bytes([head[6], head[7]]);
            } else {
                let mut head = [0u8; MACRAW_HEADER_LEN];
                self.recv_data(sn, &mut head);
                self.command(sn, cmd::RECV);
                let remained = u16::from_be_bytes(head).wrapping_sub(MACRAW_HEADER_LEN as u16);
                if remained > MACRAW_MAX_FRAME {
                    error!("socket {} MACRAW frame length {} out of range", sn, remained);
                    self.close(sn);
                    self.sync_state(sn);
                    return Err(SocketError::Fatal);
                }
                self.runtime[idx].remote = None;
                self.runtime[idx].remained_size = remained;
            }
            self.runtime[idx].pack_info = PacketInfo::FIRST;
        }

        let len = clamp_len(buf.len()).min(self.runtime[idx].remained_size);
        self.recv_data(sn, &mut buf[..usize::from(len)]);
        self.command(sn, cmd::RECV);

        let rt = &mut self.runtime[idx];
        rt.remained_size -= len;
        rt.pack_info = if rt.remained_size != 0 {
            rt.pack_info.with_remainder()
        } else {
            PacketInfo::COMPLETED
        };
        let remote = if protocol == Protocol::Udp { rt.remote } else { None };
        Ok((usize::from(len), remote))
    }

    /// Socket control requests; setters return `OptionValue::Done`
    pub fn ctlsocket(&mut self, sn: u8, request: SocketControl) -> Result<OptionValue> {
        check_socket(sn)?;
        let value = match request {
            SocketControl::SetIoMode(mode) => {
                self.runtime[usize::from(sn)].io_mode = mode;
                OptionValue::Done
            }
            SocketControl::GetIoMode => OptionValue::IoMode(self.io_mode(sn)),
            SocketControl::GetMaxTxBuffer => OptionValue::Size(self.tx_max(sn)),
            SocketControl::GetMaxRxBuffer => OptionValue::Size(self.rx_max(sn)),
            SocketControl::ClearInterrupt(bits) => {
                if bits > irq::ALL {
                    return Err(SocketError::InvalidArgument);
                }
                self.write_u8(sn, sreg::IR, bits);
                OptionValue::Done
            }
            SocketControl::GetInterrupt => OptionValue::Byte(self.read_u8(sn, sreg::IR)),
            SocketControl::SetInterruptMask(bits) => {
                if bits > irq::ALL {
                    return Err(SocketError::InvalidArgument);
                }
                self.write_u8(sn, sreg::IMR, bits);
                OptionValue::Done
            }
            SocketControl::GetInterruptMask => OptionValue::Byte(self.read_u8(sn, sreg::IMR)),
        };
        Ok(value)
    }

    pub fn setsockopt(&mut self, sn: u8, option: SocketOption) -> Result<()> {
        check_socket(sn)?;
        match option {
            SocketOption::Ttl(ttl) => self.write_u8(sn, sreg::TTL, ttl),
            SocketOption::Tos(tos) => self.write_u8(sn, sreg::TOS, tos),
            SocketOption::Mss(mss) => self.write_u16(sn, sreg::MSSR, mss),
            SocketOption::DestinationIp(ip) => {
                self.chip.write(Block::Socket(sn), sreg::DIPR, &ip.octets());
            }
            SocketOption::DestinationPort(port) => self.write_u16(sn, sreg::DPORT, port),
            SocketOption::SendKeepAlive => {
                self.check_mode(sn, Protocol::Tcp)?;
                if self.read_u8(sn, sreg::KPALVTR) != 0 {
                    return Err(SocketError::InvalidOption);
                }
                self.command(sn, cmd::SEND_KEEP);
                if self.read_u8(sn, sreg::IR) & irq::TIMEOUT != 0 {
                    self.write_u8(sn, sreg::IR, irq::TIMEOUT);
                    return Err(SocketError::Timeout);
                }
            }
            SocketOption::KeepAliveInterval(interval) => {
                self.check_mode(sn, Protocol::Tcp)?;
                self.write_u8(sn, sreg::KPALVTR, interval);
            }
        }
        Ok(())
    }

    pub fn getsockopt(&mut self, sn: u8, kind: SocketOptionKind) -> Result<OptionValue> {
        check_socket(sn)?;
        let value = match kind {
            SocketOptionKind::Flags => {
                OptionValue::Flags(SocketFlags::from_bits(self.read_u8(sn, sreg::MR) & 0xF0))
            }
            SocketOptionKind::Ttl => OptionValue::Byte(self.read_u8(sn, sreg::TTL)),
            SocketOptionKind::Tos => OptionValue::Byte(self.read_u8(sn, sreg::TOS)),
            SocketOptionKind::Mss => OptionValue::Size(self.read_u16(sn, sreg::MSSR)),
            SocketOptionKind::DestinationIp => {
                let mut dipr = [0u8; 4];
                self.chip.read(Block::Socket(sn), sreg::DIPR, &mut dipr);
                OptionValue::Ip(Ipv4Addr::from(dipr))
            }
            SocketOptionKind::DestinationPort => OptionValue::Port(self.read_u16(sn, sreg::DPORT)),
            SocketOptionKind::KeepAliveInterval => {
                self.check_mode(sn, Protocol::Tcp)?;
                OptionValue::Byte(self.read_u8(sn, sreg::KPALVTR))
            }
            SocketOptionKind::TxFreeSize => OptionValue::Size(self.tx_free_size(sn)),
            SocketOptionKind::RxReceivedSize => OptionValue::Size(self.rx_received_size(sn)),
            SocketOptionKind::Status => {
                OptionValue::State(SocketState::from_code(self.read_u8(sn, sreg::SR)))
            }
            SocketOptionKind::RemainingSize => {
                if self.protocol(sn) == Protocol::Tcp {
                    OptionValue::Size(self.rx_received_size(sn))
                } else {
                    OptionValue::Size(self.runtime[usize::from(sn)].remained_size)
                }
            }
            SocketOptionKind::PacketInfo => {
                if self.protocol(sn) == Protocol::Tcp {
                    return Err(SocketError::InvalidMode);
                }
                OptionValue::PacketInfo(self.runtime[usize::from(sn)].pack_info)
            }
        };
        Ok(value)
    }

    fn after_transfer(&mut self, sn: u8, result: &Result<usize>) {
        if let Err(e) = result {
            if e.is_connection_closed() {
                warn!("socket {} lost its connection, close and reopen", sn);
                self.sync_state(sn);
            }
        }
    }

    fn sync_state(&mut self, sn: u8) -> SocketState {
        let state = SocketState::from_code(self.read_u8(sn, sreg::SR));
        self.table[usize::from(sn)].state = state;
        state
    }

    fn io_mode(&self, sn: u8) -> IoMode {
        self.runtime[usize::from(sn)].io_mode
    }

    fn protocol(&mut self, sn: u8) -> Protocol {
        Protocol::from_mode_bits(self.read_u8(sn, sreg::MR))
    }

    fn check_mode(&mut self, sn: u8, expected: Protocol) -> Result<()> {
        if self.protocol(sn) == expected {
            Ok(())
        } else {
            Err(SocketError::InvalidMode)
        }
    }

    /// Issue a command and wait for the chip to accept it
    fn command(&mut self, sn: u8, command: u8) {
        self.write_u8(sn, sreg::CR, command);
        while self.read_u8(sn, sreg::CR) != 0 {
            core::hint::spin_loop();
        }
    }

    fn set_destination(&mut self, sn: u8, remote: SocketAddrV4) {
        self.chip.write(Block::Socket(sn), sreg::DIPR, &remote.ip().octets());
        self.write_u16(sn, sreg::DPORT, remote.port());
    }

    fn tx_max(&mut self, sn: u8) -> u16 {
        u16::from(self.read_u8(sn, sreg::TXBUF_SIZE)) << 10
    }

    fn rx_max(&mut self, sn: u8) -> u16 {
        u16::from(self.read_u8(sn, sreg::RXBUF_SIZE)) << 10
    }

    /// 16-bit counters the chip updates between byte reads; take a value
    /// only once two reads in a row agree
    fn read_stable_u16(&mut self, sn: u8, addr: u16) -> u16 {
        let mut previous = self.read_u16(sn, addr);
        loop {
            let current = self.read_u16(sn, addr);
            if current == previous {
                return current;
            }
            previous = current;
        }
    }

    fn tx_free_size(&mut self, sn: u8) -> u16 {
        self.read_stable_u16(sn, sreg::TX_FSR)
    }

    fn rx_received_size(&mut self, sn: u8) -> u16 {
        self.read_stable_u16(sn, sreg::RX_RSR)
    }

    fn send_data(&mut self, sn: u8, data: &[u8]) {
        let ptr = self.read_u16(sn, sreg::TX_WR);
        self.chip.write(Block::TxBuffer(sn), ptr, data);
        self.write_u16(sn, sreg::TX_WR, ptr.wrapping_add(clamp_len(data.len())));
    }

    fn recv_data(&mut self, sn: u8, buf: &mut [u8]) {
        let ptr = self.read_u16(sn, sreg::RX_RD);
        self.chip.read(Block::RxBuffer(sn), ptr, buf);
        self.write_u16(sn, sreg::RX_RD, ptr.wrapping_add(clamp_len(buf.len())));
    }

    fn read_u8(&mut self, sn: u8, addr: u16) -> u8 {
        self.chip.read_u8(Block::Socket(sn), addr)
    }

    fn write_u8(&mut self, sn: u8, addr: u16, value: u8) {
        self.chip.write_u8(Block::Socket(sn), addr, value);
    }

    fn read_u16(&mut self, sn: u8, addr: u16) -> u16 {
        self.chip.read_u16(Block::Socket(sn), addr)
    }

    fn write_u16(&mut self, sn: u8, addr: u16, value: u16) {
        self.chip.write_u16(Block::Socket(sn), addr, value);
    }
}

fn check_socket(sn: u8) -> Result<()> {
    if sn < SOCKET_COUNT {
        Ok(())
    } else {
        Err(SocketError::InvalidSocket)
    }
}

/// Connect target: a real host, neither 0.0.0.0 nor 255.255.255.255
fn check_host(ip: &Ipv4Addr) -> Result<()> {
    if ip.is_unspecified() || ip.is_broadcast() {
        Err(SocketError::InvalidIp)
    } else {
        Ok(())
    }
}

/// Datagram target: anything but 0.0.0.0, broadcast allowed
fn check_destination(ip: &Ipv4Addr) -> Result<()> {
    if ip.is_unspecified() {
        Err(SocketError::InvalidIp)
    } else {
        Ok(())
    }
}

fn is_connected(state: u8) -> bool {
    state == status::ESTABLISHED || state == status::CLOSE_WAIT
}

fn clamp_len(len: usize) -> u16 {
    u16::try_from(len).unwrap_or(u16::MAX)
}
