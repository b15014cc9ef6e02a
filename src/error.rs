//! Unified error type for ble-multi-client.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` for efficient on-target logging.

use core::fmt;

/// Top-level error type used across the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The BLE transport refused or failed a request.
    Ble(BleError),

    /// Every peer slot is occupied.
    TableFull,

    /// The connection id or address is already tracked by a live slot.
    DuplicatePeer,

    /// Slot index outside the table.
    InvalidSlot,
}

/// Transport-level errors (keeps the enum `Copy`-friendly).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BleError {
    /// Raw status code from the radio stack.
    Raw(i32),
    /// Scan parameters were rejected or the scan could not start.
    ScanFailed,
    /// Open or close request failed.
    ConnectFailed,
    /// Service, characteristic or descriptor discovery failed.
    DiscoveryFailed,
    /// Notification registration or descriptor write failed.
    NotifyFailed,
    /// The GATT client has not been registered with the stack yet.
    NotRegistered,
}

// Convenience conversions

impl From<BleError> for Error {
    fn from(e: BleError) -> Self {
        Error::Ble(e)
    }
}

impl fmt::Display for BleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BleError::Raw(code) => write!(f, "stack error 0x{:x}", code),
            BleError::ScanFailed => f.write_str("scan failed"),
            BleError::ConnectFailed => f.write_str("connect failed"),
            BleError::DiscoveryFailed => f.write_str("discovery failed"),
            BleError::NotifyFailed => f.write_str("notify setup failed"),
            BleError::NotRegistered => f.write_str("gatt client not registered"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Ble(e) => write!(f, "ble: {}", e),
            Error::TableFull => f.write_str("peer table full"),
            Error::DuplicatePeer => f.write_str("peer already tracked"),
            Error::InvalidSlot => f.write_str("invalid slot index"),
        }
    }
}
