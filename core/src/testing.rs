//! Host-side W5500 model behind `ChipBus`
//!
//! Decodes SPI frames into register and buffer accesses and runs socket
//! commands the way the chip would, minus the network. The test plays the
//! remote peer through the `peer_*` helpers.

use std::cell::RefCell;
use std::net::SocketAddrV4;
use std::rc::Rc;
use std::vec::Vec;

use doorbell_hal::ChipBus;

use crate::w5500::registers::common;
use crate::w5500::registers::socket::{self as sreg, cmd, irq, mode, status};

// Registers only the chip itself moves
const RTR: u16 = 0x0019;
const RCR: u16 = 0x001B;
const SN_DHAR: u16 = 0x0006;
const SN_TX_RD: u16 = 0x0022;
const SN_RX_WR: u16 = 0x002A;
const SN_IR_CON: u8 = 0x01;
const SN_IR_DISCON: u8 = 0x02;

const COMMON_LEN: usize = 0x40;
const SOCKET_REG_LEN: usize = 0x30;
const BUFFER_LEN: usize = 16 * 1024;

struct Frame {
    bsb: u8,
    start: u16,
    addr: u16,
    write: bool,
    written: usize,
}

struct SocketModel {
    regs: [u8; SOCKET_REG_LEN],
    tx: Vec<u8>,
    rx: Vec<u8>,
    sent: Vec<u8>,
    hold_send_ok: bool,
    connect_timeout: bool,
    send_timeout: bool,
    keepalives: usize,
}

impl SocketModel {
    fn new() -> Self {
        let mut socket = Self {
            regs: [0; SOCKET_REG_LEN],
            tx: vec![0; BUFFER_LEN],
            rx: vec![0; BUFFER_LEN],
            sent: Vec::new(),
            hold_send_ok: false,
            connect_timeout: false,
            send_timeout: false,
            keepalives: 0,
        };
        socket.reset();
        socket
    }

    fn reset(&mut self) {
        self.regs = [0; SOCKET_REG_LEN];
        self.regs[SN_DHAR as usize..SN_DHAR as usize + 6].fill(0xFF);
        self.regs[sreg::TTL as usize] = 0x80;
        self.regs[sreg::RXBUF_SIZE as usize] = 2;
        self.regs[sreg::TXBUF_SIZE as usize] = 2;
        self.regs[sreg::IMR as usize] = 0xFF;
    }

    fn get16(&self, addr: u16) -> u16 {
        let a = addr as usize;
        u16::from_be_bytes([self.regs[a], self.regs[a + 1]])
    }

    fn set16(&mut self, addr: u16, value: u16) {
        let a = addr as usize;
        self.regs[a..a + 2].copy_from_slice(&value.to_be_bytes());
    }

    fn tx_size(&self) -> u16 {
        (u16::from(self.regs[sreg::TXBUF_SIZE as usize]) << 10).max(1)
    }

    fn rx_size(&self) -> u16 {
        (u16::from(self.regs[sreg::RXBUF_SIZE as usize]) << 10).max(1)
    }

    fn state(&self) -> u8 {
        self.regs[sreg::SR as usize]
    }

    fn set_state(&mut self, state: u8) {
        self.regs[sreg::SR as usize] = state;
    }

    fn raise(&mut self, bits: u8) {
        self.regs[sreg::IR as usize] |= bits;
    }

    fn read_reg(&self, addr: u16) -> u8 {
        let tx_used = self.get16(sreg::TX_WR).wrapping_sub(self.get16(SN_TX_RD));
        let free = self.tx_size().wrapping_sub(tx_used).to_be_bytes();
        let received = self.get16(SN_RX_WR).wrapping_sub(self.get16(sreg::RX_RD)).to_be_bytes();
        match addr {
            a if a == sreg::TX_FSR => free[0],
            a if a == sreg::TX_FSR + 1 => free[1],
            a if a == sreg::RX_RSR => received[0],
            a if a == sreg::RX_RSR + 1 => received[1],
            a if (a as usize) < SOCKET_REG_LEN => self.regs[a as usize],
            _ => 0,
        }
    }

    fn write_reg(&mut self, sn: u8, addr: u16, value: u8) {
        match addr {
            a if a == sreg::CR => self.execute(sn, value),
            a if a == sreg::IR => self.regs[sreg::IR as usize] &= !value,
            a if a == sreg::SR
                || (sreg::TX_FSR..sreg::TX_FSR + 2).contains(&a)
                || (SN_TX_RD..SN_TX_RD + 2).contains(&a)
                || (sreg::RX_RSR..sreg::RX_RSR + 2).contains(&a)
                || (SN_RX_WR..SN_RX_WR + 2).contains(&a) => {}
            a if (a as usize) < SOCKET_REG_LEN => self.regs[a as usize] = value,
            _ => {}
        }
    }

    fn execute(&mut self, sn: u8, command: u8) {
        match command {
            cmd::OPEN => {
                for reg in [SN_TX_RD, sreg::TX_WR, sreg::RX_RD, SN_RX_WR] {
                    self.set16(reg, 0);
                }
                let next = match self.regs[sreg::MR as usize] & mode::PROTOCOL_MASK {
                    mode::TCP => status::INIT,
                    mode::UDP => status::UDP,
                    mode::MACRAW if sn == 0 => status::MACRAW,
                    _ => status::CLOSED,
                };
                self.set_state(next);
            }
            cmd::LISTEN => {
                if self.state() == status::INIT {
                    self.set_state(status::LISTEN);
                }
            }
            cmd::CONNECT => {
                if self.state() == status::INIT {
                    if self.connect_timeout {
                        self.set_state(status::CLOSED);
                        self.raise(irq::TIMEOUT);
                    } else {
                        self.set_state(status::ESTABLISHED);
                        self.raise(SN_IR_CON);
                    }
                }
            }
            cmd::DISCON => {
                self.set_state(status::CLOSED);
                self.raise(SN_IR_DISCON);
            }
            cmd::CLOSE => self.set_state(status::CLOSED),
            cmd::SEND => {
                let mask = self.tx_size() - 1;
                let mut ptr = self.get16(SN_TX_RD);
                let end = self.get16(sreg::TX_WR);
                while ptr != end {
                    self.sent.push(self.tx[usize::from(ptr & mask)]);
                    ptr = ptr.wrapping_add(1);
                }
                self.set16(SN_TX_RD, end);
                if self.send_timeout {
                    self.raise(irq::TIMEOUT);
                } else if !self.hold_send_ok {
                    self.raise(irq::SEND_OK);
                }
            }
            cmd::SEND_KEEP => self.keepalives += 1,
            _ => {}
        }
        self.regs[sreg::CR as usize] = 0;
    }

    fn push_rx(&mut self, bytes: &[u8]) {
        let mask = self.rx_size() - 1;
        let mut ptr = self.get16(SN_RX_WR);
        for &byte in bytes {
            self.rx[usize::from(ptr & mask)] = byte;
            ptr = ptr.wrapping_add(1);
        }
        self.set16(SN_RX_WR, ptr);
        self.raise(irq::RECV);
    }
}

struct ChipModel {
    present: bool,
    link: bool,
    common: [u8; COMMON_LEN],
    sockets: Vec<SocketModel>,
    header: Vec<u8>,
    frame: Option<Frame>,
    frames: usize,
    soft_resets: usize,
    hard_resets: usize,
    write_log: Vec<(u8, u16, usize)>,
}

impl ChipModel {
    fn new(present: bool) -> Self {
        let mut chip = Self {
            present,
            link: false,
            common: [0; COMMON_LEN],
            sockets: (0..8).map(|_| SocketModel::new()).collect(),
            header: Vec::new(),
            frame: None,
            frames: 0,
            soft_resets: 0,
            hard_resets: 0,
            write_log: Vec::new(),
        };
        chip.reset();
        chip
    }

    fn reset(&mut self) {
        self.common = [0; COMMON_LEN];
        self.common[RTR as usize] = 0x07;
        self.common[RTR as usize + 1] = 0xD0;
        self.common[RCR as usize] = 0x08;
        self.common[common::VERSIONR as usize] = common::CHIP_VERSION;
        for socket in &mut self.sockets {
            socket.reset();
        }
    }

    fn read(&mut self, bsb: u8, addr: u16) -> u8 {
        if bsb == 0 {
            return match addr {
                a if a == common::PHYCFGR => 0xB8 | u8::from(self.link),
                a if (a as usize) < COMMON_LEN => self.common[a as usize],
                _ => 0,
            };
        }
        let sn = usize::from((bsb - 1) / 4);
        let socket = &self.sockets[sn];
        match (bsb - 1) % 4 {
            0 => socket.read_reg(addr),
            2 => socket.rx[usize::from(addr & (socket.rx_size() - 1))],
            _ => 0,
        }
    }

    fn write(&mut self, bsb: u8, addr: u16, value: u8) {
        if bsb == 0 {
            if addr == common::MR && value & common::MR_RST != 0 {
                self.soft_resets += 1;
                self.reset();
            } else if (addr as usize) < COMMON_LEN {
                self.common[addr as usize] = value;
            }
            return;
        }
        let sn = (bsb - 1) / 4;
        let socket = &mut self.sockets[usize::from(sn)];
        match (bsb - 1) % 4 {
            0 => socket.write_reg(sn, addr, value),
            1 => {
                let mask = socket.tx_size() - 1;
                socket.tx[usize::from(addr & mask)] = value;
            }
            _ => {}
        }
    }
}

/// Cloneable handle; clones share one chip
#[derive(Clone)]
pub struct FakeW5500 {
    inner: Rc<RefCell<ChipModel>>,
}

impl FakeW5500 {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(ChipModel::new(true))),
        }
    }

    /// Nothing on the bus: every read returns 0x00
    pub fn absent() -> Self {
        Self {
            inner: Rc::new(RefCell::new(ChipModel::new(false))),
        }
    }

    /// Plug the chip in or pull it off the bus
    pub fn set_present(&self, present: bool) {
        self.inner.borrow_mut().present = present;
    }

    pub fn frames(&self) -> usize {
        self.inner.borrow().frames
    }

    pub fn soft_resets(&self) -> usize {
        self.inner.borrow().soft_resets
    }

    pub fn hard_resets(&self) -> usize {
        self.inner.borrow().hard_resets
    }

    /// `(block select, start address, length)` of each write frame
    pub fn write_log(&self) -> Vec<(u8, u16, usize)> {
        self.inner.borrow().write_log.clone()
    }

    pub fn clear_write_log(&self) {
        self.inner.borrow_mut().write_log.clear();
    }

    pub fn set_link(&self, up: bool) {
        self.inner.borrow_mut().link = up;
    }

    pub fn socket_reg(&self, sn: u8, addr: u16) -> u8 {
        self.inner.borrow().sockets[usize::from(sn)].read_reg(addr)
    }

    pub fn state(&self, sn: u8) -> u8 {
        self.inner.borrow().sockets[usize::from(sn)].state()
    }

    /// Bytes the chip put on the wire for `sn` since the last call
    pub fn take_sent(&self, sn: u8) -> Vec<u8> {
        std::mem::take(&mut self.inner.borrow_mut().sockets[usize::from(sn)].sent)
    }

    pub fn keepalives(&self, sn: u8) -> usize {
        self.inner.borrow().sockets[usize::from(sn)].keepalives
    }

    /// Keep SEND_OK low after SEND until `ack_send`
    pub fn hold_send_ok(&self, sn: u8, hold: bool) {
        self.inner.borrow_mut().sockets[usize::from(sn)].hold_send_ok = hold;
    }

    pub fn ack_send(&self, sn: u8) {
        self.inner.borrow_mut().sockets[usize::from(sn)].raise(irq::SEND_OK);
    }

    /// Make CONNECT end in an ARP/TCP timeout
    pub fn fail_connect(&self, sn: u8) {
        self.inner.borrow_mut().sockets[usize::from(sn)].connect_timeout = true;
    }

    /// Make SEND end in a timeout, as an unanswered ARP request does
    pub fn fail_send(&self, sn: u8) {
        self.inner.borrow_mut().sockets[usize::from(sn)].send_timeout = true;
    }

    /// Remote host completes the handshake with a listening socket
    pub fn peer_connect(&self, sn: u8, from: SocketAddrV4) {
        let mut chip = self.inner.borrow_mut();
        let socket = &mut chip.sockets[usize::from(sn)];
        assert_eq!(socket.state(), status::LISTEN, "peer_connect needs LISTEN");
        let dipr = sreg::DIPR as usize;
        socket.regs[dipr..dipr + 4].copy_from_slice(&from.ip().octets());
        socket.set16(sreg::DPORT, from.port());
        socket.set_state(status::ESTABLISHED);
        socket.raise(SN_IR_CON);
    }

    /// Remote host sends stream data
    pub fn peer_send(&self, sn: u8, data: &[u8]) {
        self.inner.borrow_mut().sockets[usize::from(sn)].push_rx(data);
    }

    /// Remote host sends FIN
    pub fn peer_close(&self, sn: u8) {
        let mut chip = self.inner.borrow_mut();
        let socket = &mut chip.sockets[usize::from(sn)];
        socket.set_state(status::CLOSE_WAIT);
        socket.raise(SN_IR_DISCON);
    }

    /// UDP datagram arrives, framed with the chip's 8-byte header
    pub fn peer_datagram(&self, sn: u8, from: SocketAddrV4, payload: &[u8]) {
        let mut framed = Vec::with_capacity(8 + payload.len());
        framed.extend_from_slice(&from.ip().octets());
        framed.extend_from_slice(&from.port().to_be_bytes());
        framed.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        framed.extend_from_slice(payload);
        self.peer_send(sn, &framed);
    }

    /// Raw frame arrives on the MACRAW socket with the given length header
    pub fn peer_frame(&self, sn: u8, length_header: u16, payload: &[u8]) {
        let mut framed = Vec::with_capacity(2 + payload.len());
        framed.extend_from_slice(&length_header.to_be_bytes());
        framed.extend_from_slice(payload);
        self.peer_send(sn, &framed);
    }
}

impl ChipBus for FakeW5500 {
    fn chip_select(&mut self) {
        let mut chip = self.inner.borrow_mut();
        chip.frames += 1;
        chip.header.clear();
        chip.frame = None;
    }

    fn chip_deselect(&mut self) {
        let mut chip = self.inner.borrow_mut();
        if let Some(frame) = chip.frame.take() {
            if frame.write && frame.written > 0 {
                chip.write_log.push((frame.bsb, frame.start, frame.written));
            }
        }
    }

    fn hard_reset(&mut self) {
        let mut chip = self.inner.borrow_mut();
        chip.hard_resets += 1;
        chip.reset();
    }

    fn spi_read(&mut self) -> u8 {
        let mut chip = self.inner.borrow_mut();
        if !chip.present {
            return 0;
        }
        let Some((bsb, addr)) = chip
            .frame
            .as_mut()
            .filter(|frame| !frame.write)
            .map(|frame| {
                let at = (frame.bsb, frame.addr);
                frame.addr = frame.addr.wrapping_add(1);
                at
            })
        else {
            return 0;
        };
        chip.read(bsb, addr)
    }

    fn spi_write(&mut self, byte: u8) {
        let mut guard = self.inner.borrow_mut();
        let chip = &mut *guard;
        if !chip.present {
            return;
        }
        match chip.frame.as_mut() {
            None => {
                chip.header.push(byte);
                if chip.header.len() == 3 {
                    let addr = u16::from_be_bytes([chip.header[0], chip.header[1]]);
                    let control = chip.header[2];
                    chip.frame = Some(Frame {
                        bsb: control >> 3,
                        start: addr,
                        addr,
                        write: control & 0x04 != 0,
                        written: 0,
                    });
                }
            }
            Some(frame) if frame.write => {
                let (bsb, addr) = (frame.bsb, frame.addr);
                frame.addr = frame.addr.wrapping_add(1);
                frame.written += 1;
                chip.write(bsb, addr, byte);
            }
            Some(_) => {}
        }
    }
}
