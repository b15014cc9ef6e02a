//! Application-wide constants and compile-time configuration.
//!
//! Target identity, scan timing and protocol constants live here so they
//! can be tuned in one place. `ClientConfig::default()` is built from them.

use crate::ble::Uuid128;

// Peers

/// Maximum number of peripherals tracked at the same time.
pub const MAX_PEERS: usize = 5;

// Target identity
//
// Stored in the little-endian order the radio stack reports 128-bit UUIDs
// in advertisements, so they compare byte-for-byte against AD payloads.

/// Service every accepted peripheral must advertise.
pub const SERVICE_UUID: Uuid128 = [
    0xab, 0x00, 0xcb, 0x0c, 0xcd, 0x00, 0xc0, 0xbc, 0x0a, 0xca, 0xad, 0x00, 0xa1, 0xbb, 0x00, 0x01,
];

/// Characteristic we subscribe to inside [`SERVICE_UUID`].
pub const CHARACTERISTIC_UUID: Uuid128 = [
    0xab, 0x10, 0xcb, 0x0c, 0xcd, 0x00, 0xc0, 0xbc, 0x0a, 0xca, 0xad, 0x00, 0xa1, 0xbb, 0x00, 0x02,
];

/// Client Characteristic Configuration Descriptor.
pub const CCCD_UUID16: u16 = 0x2902;

/// Payload written to the notification configuration descriptor once the
/// stack has registered for notifications. The peers' firmware expects this
/// exact byte string, trailing NUL included.
pub const NOTIFY_ENABLE_PAYLOAD: &[u8] = b"HELLO SERVER\0";

// Scanning

/// Scan interval (in 0.625 ms units). 0x50 = 50 ms.
pub const SCAN_INTERVAL: u16 = 0x50;

/// Scan window (in 0.625 ms units). 0x30 = 30 ms.
pub const SCAN_WINDOW: u16 = 0x30;

/// Scan duration handed to the stack. 0 scans until stopped.
pub const SCAN_DURATION_SECS: u32 = 0;

// Timeouts

/// A peer that makes no discovery progress for this long is disconnected.
pub const DISCOVERY_TIMEOUT_MS: u64 = 10_000;

/// An open request with no connect event after this long is forgotten.
pub const CONNECT_TIMEOUT_MS: u64 = 5_000;

// Notifications

/// Largest notification value kept (247-byte ATT MTU minus 3-byte header).
pub const NOTIFY_MAX_LEN: usize = 244;

/// Depth of the notification channel between the BLE callbacks and the
/// consumer task.
pub const NOTIFY_CHANNEL_DEPTH: usize = 16;
