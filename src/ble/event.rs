//! Events delivered by the radio stack.
//!
//! Payloads borrow from the stack's callback buffers and are only valid for
//! the duration of the callback.

use super::{AddressType, BdAddr, ConnId, Handle, HandleRange};

/// One advertising report.
#[derive(Clone, Copy, Debug)]
pub struct ScanReport<'a> {
    pub address: BdAddr,
    pub addr_type: AddressType,
    pub adv_data: &'a [u8],
    /// Scan response data, empty for passive scans.
    pub scan_rsp: &'a [u8],
    pub rssi: i8,
}

/// GAP events.
#[derive(Clone, Copy, Debug)]
pub enum GapEvent<'a> {
    ScanParamsSetComplete,
    ScanStartComplete { success: bool },
    ScanResult(ScanReport<'a>),
    ScanStopped,
}

/// GATT client events.
#[derive(Clone, Copy, Debug)]
pub enum GattcEvent<'a> {
    /// The GATT client application was registered with the stack.
    Registered { client_id: u8 },
    Connected { conn_id: ConnId, address: BdAddr },
    /// An open request ended without a connection.
    OpenFailed { address: BdAddr },
    /// One service matched the search. Can fire several times per search.
    SearchResult { conn_id: ConnId, range: HandleRange },
    SearchComplete { conn_id: ConnId },
    /// The stack only reports the characteristic handle here.
    RegisterForNotifyComplete { char_handle: Handle },
    Notify { conn_id: ConnId, value: &'a [u8] },
    Disconnected { conn_id: ConnId },
}
