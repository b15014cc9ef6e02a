//! Multi-peer BLE central client.
//!
//! [`BleClient`] owns the peer table and exposes the two entry points the
//! radio stack calls from its callback contexts: [`BleClient::handle_gap_event`]
//! and [`BleClient::handle_gattc_event`]. Both may run concurrently.
//!
//! All shared state sits behind one critical-section mutex. A handler takes
//! the lock once for its read-modify-write, decides on a [`Request`], drops
//! the lock and only then calls the transport. Stacks that invoke callbacks
//! from inside a request therefore never re-enter a held lock.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use heapless::Vec;

use super::discovery;
use super::event::{GapEvent, GattcEvent};
use super::peer_table::{PeerSlot, PeerTable};
use super::scanner::{self, PendingConnections};
use super::sink::NotificationSink;
use super::transport::{AuthReq, BleTransport, Request, WriteType};
use super::{BleUuid, ScanParams, TargetIdentity};
use crate::config;
use crate::error::{BleError, Error};

/// Runtime configuration, defaults come from [`crate::config`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    pub target: TargetIdentity,
    pub scan: ScanParams,
    pub scan_duration_secs: u32,
    /// Written to the notification configuration descriptor.
    pub notify_enable_payload: &'static [u8],
    /// `None` leaves stalled peers connected forever.
    pub discovery_timeout_ms: Option<u64>,
    /// `None` keeps unanswered open requests pending forever.
    pub connect_timeout_ms: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            target: TargetIdentity::default(),
            scan: ScanParams::default(),
            scan_duration_secs: config::SCAN_DURATION_SECS,
            notify_enable_payload: config::NOTIFY_ENABLE_PAYLOAD,
            discovery_timeout_ms: Some(config::DISCOVERY_TIMEOUT_MS),
            connect_timeout_ms: Some(config::CONNECT_TIMEOUT_MS),
        }
    }
}

struct ClientState<const N: usize> {
    client_id: Option<u8>,
    peers: PeerTable<N>,
    pending: PendingConnections<N>,
}

pub struct BleClient<T, S, const N: usize = { config::MAX_PEERS }> {
    transport: T,
    sink: S,
    config: ClientConfig,
    state: Mutex<CriticalSectionRawMutex, RefCell<ClientState<N>>>,
}

impl<T: BleTransport, S: NotificationSink, const N: usize> BleClient<T, S, N> {
    pub const fn new(transport: T, sink: S, config: ClientConfig) -> Self {
        Self {
            transport,
            sink,
            config,
            state: Mutex::new(RefCell::new(ClientState {
                client_id: None,
                peers: PeerTable::new(),
                pending: PendingConnections::new(),
            })),
        }
    }

    /// GAP callback entry point.
    pub fn handle_gap_event(&self, event: &GapEvent<'_>) {
        let request = match event {
            GapEvent::ScanParamsSetComplete => {
                Some(scanner::on_scan_params_set(self.config.scan_duration_secs))
            }
            GapEvent::ScanStartComplete { success } => {
                if !success {
                    error!("Scan start failed");
                }
                None
            }
            GapEvent::ScanResult(report) => self.with_state(|s| {
                // Target identity is latched at registration.
                s.client_id?;
                scanner::on_scan_result(&s.peers, &mut s.pending, &self.config.target, report)
            }),
            GapEvent::ScanStopped => {
                info!("Scan stopped");
                None
            }
        };
        if let Some(request) = request {
            self.issue(request);
        }
    }

    /// GATT client callback entry point.
    pub fn handle_gattc_event(&self, event: &GattcEvent<'_>) {
        let target = &self.config.target;
        let request = match *event {
            GattcEvent::Registered { client_id } => {
                info!("GATT client registered, id {}", client_id);
                self.with_state(|s| s.client_id = Some(client_id));
                Some(scanner::on_registered(&self.config.scan))
            }
            GattcEvent::Connected { conn_id, address } => self.with_state(|s| {
                s.pending.remove(&address);
                discovery::on_connect(&mut s.peers, conn_id, address, target)
            }),
            GattcEvent::OpenFailed { address } => {
                warn!("Connection to {} failed", address);
                self.with_state(|s| s.pending.remove(&address));
                None
            }
            GattcEvent::SearchResult { conn_id, range } => {
                self.with_state(|s| discovery::on_search_result(&mut s.peers, conn_id, range));
                None
            }
            GattcEvent::SearchComplete { conn_id } => {
                self.with_state(|s| discovery::on_search_complete(&mut s.peers, conn_id, target))
            }
            GattcEvent::RegisterForNotifyComplete { char_handle } => self.with_state(|s| {
                discovery::on_register_for_notify_complete(&mut s.peers, char_handle)
            }),
            GattcEvent::Notify { conn_id, value } => {
                // Unmatched: the peer left between emission and delivery.
                if let Some(slot) = self.with_state(|s| discovery::on_notify(&s.peers, conn_id)) {
                    self.sink.on_notification(slot, value);
                }
                None
            }
            GattcEvent::Disconnected { conn_id } => {
                self.with_state(|s| discovery::on_disconnect(&mut s.peers, conn_id));
                None
            }
        };
        if let Some(request) = request {
            self.issue(request);
        }
    }

    /// Enforces the discovery and connect timeouts. Call periodically with a
    /// monotonic millisecond clock.
    pub fn poll_timeouts(&self, now_ms: u64) {
        let closes: Vec<Request, N> = self.with_state(|s| {
            if let Some(timeout) = self.config.connect_timeout_ms {
                for address in s.pending.expire(now_ms, timeout) {
                    warn!("No connect event from {}, giving up", address);
                }
            }
            match self.config.discovery_timeout_ms {
                Some(timeout) => discovery::expire_stalled(&mut s.peers, now_ms, timeout),
                None => Vec::new(),
            }
        });
        for request in closes {
            self.issue(request);
        }
    }

    /// Restarts scanning, e.g. after the stack stopped a bounded scan.
    pub fn start_scanning(&self) -> Result<(), Error> {
        if !self.is_registered() {
            return Err(BleError::NotRegistered.into());
        }
        self.transport.start_scan(self.config.scan_duration_secs)?;
        Ok(())
    }

    pub fn is_registered(&self) -> bool {
        self.client_id().is_some()
    }

    pub fn client_id(&self) -> Option<u8> {
        self.with_state(|s| s.client_id)
    }

    /// Snapshot of one slot.
    pub fn peer(&self, slot: usize) -> Option<PeerSlot> {
        self.with_state(|s| s.peers.get(slot).copied())
    }

    /// Snapshot of every occupied slot.
    pub fn peers(&self) -> Vec<(usize, PeerSlot), N> {
        self.with_state(|s| s.peers.iter().map(|(i, p)| (i, *p)).collect())
    }

    pub fn connected_count(&self) -> usize {
        self.with_state(|s| s.peers.occupied_count())
    }

    pub fn pending_count(&self) -> usize {
        self.with_state(|s| s.pending.len())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut ClientState<N>) -> R) -> R {
        self.state.lock(|cell| f(&mut *cell.borrow_mut()))
    }

    /// Issues `request` and whatever its synchronous answer leads to.
    /// Failures are logged and dropped, discovery does not retry.
    fn issue(&self, request: Request) {
        let mut next = Some(request);
        while let Some(request) = next.take() {
            trace!("-> {:?}", request);
            match self.perform(request) {
                Ok(follow_up) => next = follow_up,
                Err(e) => warn!("Request {:?} failed: {}", request, e),
            }
        }
    }

    fn perform(&self, request: Request) -> Result<Option<Request>, BleError> {
        let t = &self.transport;
        match request {
            Request::SetScanParams(params) => t.set_scan_params(&params)?,
            Request::StartScan { duration_secs } => t.start_scan(duration_secs)?,
            Request::Open { address, addr_type } => {
                if let Err(e) = t.open(address, addr_type) {
                    // No event will follow, free the pending entry now.
                    self.with_state(|s| s.pending.remove(&address));
                    return Err(e);
                }
            }
            Request::Close { conn_id } => t.close(conn_id)?,
            Request::SearchService { conn_id, service } => t.search_service(conn_id, &service)?,
            Request::LookupCharacteristic {
                conn_id,
                range,
                characteristic,
            } => {
                let found = t
                    .characteristic_by_uuid(conn_id, range, &characteristic)
                    .unwrap_or_else(|e| {
                        warn!("Characteristic lookup on conn {} failed: {}", conn_id, e);
                        None
                    });
                return Ok(self.with_state(|s| {
                    discovery::on_characteristic_lookup(&mut s.peers, conn_id, found)
                }));
            }
            Request::RegisterForNotify {
                address,
                char_handle,
            } => t.register_for_notify(address, char_handle)?,
            Request::EnableNotify {
                conn_id,
                char_handle,
            } => {
                let cccd = BleUuid::Uuid16(config::CCCD_UUID16);
                let descr = match t.descriptor_by_uuid(conn_id, char_handle, &cccd) {
                    Ok(Some(handle)) => handle,
                    Ok(None) => char_handle.wrapping_add(1),
                    Err(e) => {
                        debug!(
                            "CCCD lookup on conn {} failed ({}), assuming adjacent",
                            conn_id, e
                        );
                        char_handle.wrapping_add(1)
                    }
                };
                t.write_descriptor(
                    conn_id,
                    descr,
                    self.config.notify_enable_payload,
                    WriteType::WithResponse,
                    AuthReq::None,
                )?;
            }
        }
        Ok(None)
    }
}
