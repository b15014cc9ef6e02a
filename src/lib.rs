//! BLE central client for several peripherals at once.
//!
//! Scans for peripherals advertising the target service, connects to up to
//! [`config::MAX_PEERS`] of them, discovers the target characteristic on each
//! and forwards its notifications to a [`ble::sink::NotificationSink`].
//!
//! The radio stack is abstracted behind [`ble::transport::BleTransport`]; the
//! stack's GAP and GATT client callbacks are fed into [`BleClient`].
//!
//! Usage: `cargo test` runs everything on the host (the `log` feature is
//! switched on for tests). Firmware builds enable `defmt` instead.

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod ble;
pub mod config;
pub mod error;

pub use ble::client::{BleClient, ClientConfig};
pub use ble::event::{GapEvent, GattcEvent, ScanReport};
pub use ble::peer_table::{DiscoveryStage, PeerSlot, PeerTable};
pub use ble::sink::{LogSink, Notification, NotificationChannel, NotificationSink};
pub use ble::transport::{AuthReq, BleTransport, Request, WriteType};
pub use error::{BleError, Error};

// Init logger for tests
#[cfg(test)]
#[ctor::ctor]
fn init_log() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init();
}
