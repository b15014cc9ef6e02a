//! BLE GAP scanner - turns matching advertisements into connection requests.
//!
//! Advertisements are filtered by the target service UUID. A peer is only
//! asked to connect while the table has room left after counting the
//! requests still in flight, and never twice for the same address.

use heapless::{String, Vec};

use super::adv_parser::{contains_service_uuid, local_name, unknown_name};
use super::event::ScanReport;
use super::peer_table::PeerTable;
use super::transport::Request;
use super::{BdAddr, ScanParams, TargetIdentity};

/// An open request still waiting for its connect event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingConnection {
    pub address: BdAddr,
    stale_since: Option<u64>,
}

/// Addresses we asked the stack to connect to.
pub struct PendingConnections<const N: usize> {
    entries: Vec<PendingConnection, N>,
}

impl<const N: usize> Default for PendingConnections<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> PendingConnections<N> {
    pub const fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, address: &BdAddr) -> bool {
        self.entries.iter().any(|p| p.address == *address)
    }

    /// Returns `false` when the list is full or already holds `address`.
    pub fn insert(&mut self, address: BdAddr) -> bool {
        if self.contains(&address) {
            return false;
        }
        self.entries
            .push(PendingConnection {
                address,
                stale_since: None,
            })
            .is_ok()
    }

    pub fn remove(&mut self, address: &BdAddr) -> bool {
        match self.entries.iter().position(|p| p.address == *address) {
            Some(i) => {
                self.entries.swap_remove(i);
                true
            }
            None => false,
        }
    }

    /// Drops entries that have been pending for `timeout_ms`, returning them.
    pub fn expire(&mut self, now_ms: u64, timeout_ms: u64) -> Vec<BdAddr, N> {
        let mut expired = Vec::new();
        let mut i = 0;
        while i < self.entries.len() {
            let entry = &mut self.entries[i];
            let since = *entry.stale_since.get_or_insert(now_ms);
            if now_ms.saturating_sub(since) >= timeout_ms {
                let _ = expired.push(entry.address);
                self.entries.swap_remove(i);
            } else {
                i += 1;
            }
        }
        expired
    }
}

/// Scan filter decision for one advertisement.
pub fn matches_target(report: &ScanReport<'_>, target: &TargetIdentity) -> bool {
    contains_service_uuid(report.adv_data, &target.service)
        || contains_service_uuid(report.scan_rsp, &target.service)
}

/// Peer name for logs. Active scans usually carry it in the scan response.
pub fn device_name(report: &ScanReport<'_>) -> String<32> {
    local_name(report.adv_data)
        .or_else(|| local_name(report.scan_rsp))
        .unwrap_or_else(unknown_name)
}

/// Client registered with the stack: configure scanning.
pub fn on_registered(params: &ScanParams) -> Request {
    Request::SetScanParams(*params)
}

/// Scan parameters accepted: start scanning.
pub fn on_scan_params_set(duration_secs: u32) -> Request {
    info!("Scanning...");
    Request::StartScan { duration_secs }
}

/// Decide whether an advertisement should trigger a connection attempt.
pub fn on_scan_result<const N: usize>(
    peers: &PeerTable<N>,
    pending: &mut PendingConnections<N>,
    target: &TargetIdentity,
    report: &ScanReport<'_>,
) -> Option<Request> {
    if !matches_target(report, target) {
        return None;
    }

    if peers.find_by_address(&report.address).is_some() {
        trace!("{} already connected", report.address);
        return None;
    }

    if pending.contains(&report.address) {
        trace!("{} connection already requested", report.address);
        return None;
    }

    // Max reached once in-flight requests are counted.
    if peers.free_count() <= pending.len() {
        debug!("No free peer slot for {}", report.address);
        return None;
    }

    if !pending.insert(report.address) {
        return None;
    }

    let name = device_name(report);
    info!(
        "Server found: {} ({}, RSSI {}) - connecting",
        name.as_str(),
        report.address,
        report.rssi
    );

    Some(Request::Open {
        address: report.address,
        addr_type: report.addr_type,
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════
