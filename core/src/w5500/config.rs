//! Network identity record and socket memory policy

use core::net::Ipv4Addr;

/// Socket buffer sizes in KiB, socket 0 first
pub const TX_MEMORY_KB: [u8; 8] = [4, 1, 1, 1, 1, 1, 1, 1];
pub const RX_MEMORY_KB: [u8; 8] = [4, 1, 1, 1, 1, 1, 1, 1];

/// Buffer memory the chip has per direction
pub const MEMORY_BUDGET_KB: u16 = 16;

/// Gateway, subnet, MAC and source IP as laid out from GAR onwards
pub const IDENTITY_FRAME_LEN: usize = 18;

/// Ethernet hardware address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MacAddress(pub [u8; 6]);

impl core::fmt::Display for MacAddress {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

/// Addressing the chip presents on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkIdentity {
    pub mac: MacAddress,
    pub ip: Ipv4Addr,
    pub subnet: Ipv4Addr,
    pub gateway: Ipv4Addr,
}

impl Default for NetworkIdentity {
    fn default() -> Self {
        Self {
            mac: MacAddress::default(),
            ip: Ipv4Addr::UNSPECIFIED,
            subnet: Ipv4Addr::UNSPECIFIED,
            gateway: Ipv4Addr::UNSPECIFIED,
        }
    }
}

impl NetworkIdentity {
    pub(crate) fn from_frame(frame: &[u8; IDENTITY_FRAME_LEN]) -> Self {
        let ip4 = |at: usize| Ipv4Addr::new(frame[at], frame[at + 1], frame[at + 2], frame[at + 3]);
        let mut mac = [0u8; 6];
        mac.copy_from_slice(&frame[8..14]);
        Self {
            gateway: ip4(0),
            subnet: ip4(4),
            mac: MacAddress(mac),
            ip: ip4(14),
        }
    }

    pub(crate) fn to_frame(&self) -> [u8; IDENTITY_FRAME_LEN] {
        let mut frame = [0u8; IDENTITY_FRAME_LEN];
        frame[0..4].copy_from_slice(&self.gateway.octets());
        frame[4..8].copy_from_slice(&self.subnet.octets());
        frame[8..14].copy_from_slice(&self.mac.0);
        frame[14..18].copy_from_slice(&self.ip.octets());
        frame
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for NetworkIdentity {
    fn format(&self, f: defmt::Formatter) {
        let ip = self.ip.octets();
        let mask = self.subnet.octets();
        let gw = self.gateway.octets();
        defmt::write!(
            f,
            "mac={} ip={}.{}.{}.{} mask={}.{}.{}.{} gw={}.{}.{}.{}",
            self.mac.0,
            ip[0],
            ip[1],
            ip[2],
            ip[3],
            mask[0],
            mask[1],
            mask[2],
            mask[3],
            gw[0],
            gw[1],
            gw[2],
            gw[3]
        )
    }
}

/// Check a per-socket size table against the chip's memory
///
/// Each entry must be 0, 1, 2, 4, 8 or 16 KiB.
pub fn memory_table_fits(table: &[u8; 8]) -> bool {
    let valid_sizes = table.iter().all(|&kb| matches!(kb, 0 | 1 | 2 | 4 | 8 | 16));
    let total: u16 = table.iter().map(|&kb| u16::from(kb)).sum();
    valid_sizes && total <= MEMORY_BUDGET_KB
}
