//! Bluetooth Low Energy subsystem.
//!
//! This module drives the radio stack in **Central** role against up to
//! [`MAX_PEERS`](crate::config::MAX_PEERS) peripherals at once:
//!
//! 1. **Scanner** - filters advertisements by the target service UUID and
//!    requests connections while the peer table has room.
//! 2. **Discovery** - per-peer service search, characteristic lookup and
//!    notification enable, driven by GATT client events.
//! 3. **Peer table** - fixed slots correlating events to peers by address,
//!    connection id or characteristic handle.
//! 4. **Client** - the two event entry points the radio stack calls into.
//!
//! The radio stack itself sits behind [`transport::BleTransport`].

pub mod adv_parser;
pub mod client;
pub mod discovery;
pub mod event;
pub mod peer_table;
pub mod scanner;
pub mod sink;
pub mod transport;

use core::fmt;

use crate::config;

/// Connection id assigned by the stack. Unique among live links only.
pub type ConnId = u16;

/// Attribute handle on the remote GATT server.
pub type Handle = u16;

/// 128-bit UUID in over-the-air (little-endian) byte order.
pub type Uuid128 = [u8; 16];

/// UUID as handed to the GATT client requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BleUuid {
    Uuid16(u16),
    Uuid128(Uuid128),
}

/// Bluetooth device address, most significant byte first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BdAddr(pub [u8; 6]);

impl BdAddr {
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    pub const fn bytes(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for BdAddr {
    fn format(&self, f: defmt::Formatter) {
        let b = &self.0;
        defmt::write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0],
            b[1],
            b[2],
            b[3],
            b[4],
            b[5]
        )
    }
}

/// Address type, as reported in scan results and used for our own address.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressType {
    #[default]
    Public,
    Random,
    RpaPublic,
    RpaRandom,
}

/// Attribute handle span occupied by a service on the peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HandleRange {
    pub start: Handle,
    pub end: Handle,
}

impl HandleRange {
    pub const fn new(start: Handle, end: Handle) -> Self {
        Self { start, end }
    }

    /// Smallest range covering both `self` and `other`.
    pub fn merge(self, other: HandleRange) -> HandleRange {
        HandleRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn contains(&self, handle: Handle) -> bool {
        (self.start..=self.end).contains(&handle)
    }
}

/// The service and characteristic this client subscribes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TargetIdentity {
    pub service: Uuid128,
    pub characteristic: Uuid128,
}

impl TargetIdentity {
    pub const fn new(service: Uuid128, characteristic: Uuid128) -> Self {
        Self {
            service,
            characteristic,
        }
    }
}

impl Default for TargetIdentity {
    fn default() -> Self {
        Self::new(config::SERVICE_UUID, config::CHARACTERISTIC_UUID)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScanType {
    Passive,
    /// Requests scan responses, which usually carry the full UUID list.
    Active,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScanFilterPolicy {
    AllowAll,
    OnlyWhitelist,
    UndirectedRpa,
    WhitelistAndRpa,
}

/// GAP scan parameters handed to the stack after client registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScanParams {
    pub scan_type: ScanType,
    pub own_addr_type: AddressType,
    pub filter_policy: ScanFilterPolicy,
    /// In 0.625 ms units.
    pub interval: u16,
    /// In 0.625 ms units, must not exceed `interval`.
    pub window: u16,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            scan_type: ScanType::Active,
            own_addr_type: AddressType::Public,
            filter_policy: ScanFilterPolicy::AllowAll,
            interval: config::SCAN_INTERVAL,
            window: config::SCAN_WINDOW,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_range_merge_is_union() {
        let merged = HandleRange::new(10, 20).merge(HandleRange::new(25, 30));
        assert_eq!(merged, HandleRange::new(10, 30));
        assert!(merged.contains(27));
        assert!(!merged.contains(31));
    }

    #[test]
    fn bd_addr_display() {
        let addr = BdAddr::new([0xaa, 0xbb, 0xcc, 0x01, 0x02, 0x03]);
        let mut s: heapless::String<17> = heapless::String::new();
        core::fmt::write(&mut s, format_args!("{}", addr)).unwrap();
        assert_eq!(s.as_str(), "aa:bb:cc:01:02:03");
    }

    #[test]
    fn default_scan_params_match_config() {
        let p = ScanParams::default();
        assert_eq!(p.scan_type, ScanType::Active);
        assert_eq!(p.interval, 0x50);
        assert_eq!(p.window, 0x30);
        assert!(p.window <= p.interval);
    }
}
