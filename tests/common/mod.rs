#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use ble_multi_client::ble::{AddressType, BdAddr, BleUuid, ConnId, Handle, HandleRange, ScanParams};
use ble_multi_client::config::SERVICE_UUID;
use ble_multi_client::{AuthReq, BleError, BleTransport, NotificationSink, WriteType};

// Init logger for tests
#[ctor::ctor]
fn init_log() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init();
}

/// Every call the client made into the transport, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    SetScanParams(ScanParams),
    StartScan(u32),
    Open(BdAddr, AddressType),
    Close(ConnId),
    SearchService(ConnId, BleUuid),
    CharacteristicByUuid(ConnId, HandleRange),
    DescriptorByUuid(ConnId, Handle),
    RegisterForNotify(BdAddr, Handle),
    WriteDescriptor(ConnId, Handle, Vec<u8>),
}

/// Transport that records calls and answers lookups from canned tables.
#[derive(Default)]
pub struct FakeTransport {
    calls: Mutex<Vec<Call>>,
    /// conn id -> characteristic handle returned by the lookup
    characteristics: Mutex<HashMap<ConnId, Handle>>,
    /// conn id -> CCCD handle returned by the descriptor lookup
    descriptors: Mutex<HashMap<ConnId, Handle>>,
    fail_open: Mutex<bool>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_characteristic(self, conn_id: ConnId, handle: Handle) -> Self {
        self.characteristics.lock().unwrap().insert(conn_id, handle);
        self
    }

    pub fn with_cccd(self, conn_id: ConnId, handle: Handle) -> Self {
        self.descriptors.lock().unwrap().insert(conn_id, handle);
        self
    }

    pub fn fail_open(&self, fail: bool) {
        *self.fail_open.lock().unwrap() = fail;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn take_calls(&self) -> Vec<Call> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl BleTransport for FakeTransport {
    fn set_scan_params(&self, params: &ScanParams) -> Result<(), BleError> {
        self.record(Call::SetScanParams(*params));
        Ok(())
    }

    fn start_scan(&self, duration_secs: u32) -> Result<(), BleError> {
        self.record(Call::StartScan(duration_secs));
        Ok(())
    }

    fn open(&self, address: BdAddr, addr_type: AddressType) -> Result<(), BleError> {
        self.record(Call::Open(address, addr_type));
        if *self.fail_open.lock().unwrap() {
            return Err(BleError::ConnectFailed);
        }
        Ok(())
    }

    fn close(&self, conn_id: ConnId) -> Result<(), BleError> {
        self.record(Call::Close(conn_id));
        Ok(())
    }

    fn search_service(&self, conn_id: ConnId, service: &BleUuid) -> Result<(), BleError> {
        self.record(Call::SearchService(conn_id, *service));
        Ok(())
    }

    fn characteristic_by_uuid(
        &self,
        conn_id: ConnId,
        range: HandleRange,
        _uuid: &BleUuid,
    ) -> Result<Option<Handle>, BleError> {
        self.record(Call::CharacteristicByUuid(conn_id, range));
        Ok(self.characteristics.lock().unwrap().get(&conn_id).copied())
    }

    fn descriptor_by_uuid(
        &self,
        conn_id: ConnId,
        char_handle: Handle,
        _uuid: &BleUuid,
    ) -> Result<Option<Handle>, BleError> {
        self.record(Call::DescriptorByUuid(conn_id, char_handle));
        Ok(self.descriptors.lock().unwrap().get(&conn_id).copied())
    }

    fn register_for_notify(&self, address: BdAddr, char_handle: Handle) -> Result<(), BleError> {
        self.record(Call::RegisterForNotify(address, char_handle));
        Ok(())
    }

    fn write_descriptor(
        &self,
        conn_id: ConnId,
        handle: Handle,
        value: &[u8],
        _write_type: WriteType,
        _auth: AuthReq,
    ) -> Result<(), BleError> {
        self.record(Call::WriteDescriptor(conn_id, handle, value.to_vec()));
        Ok(())
    }
}

/// Sink that keeps every delivered notification.
#[derive(Default)]
pub struct RecordingSink {
    pub received: Mutex<Vec<(usize, Vec<u8>)>>,
}

impl RecordingSink {
    pub fn received(&self) -> Vec<(usize, Vec<u8>)> {
        self.received.lock().unwrap().clone()
    }
}

impl NotificationSink for RecordingSink {
    fn on_notification(&self, slot: usize, value: &[u8]) {
        self.received.lock().unwrap().push((slot, value.to_vec()));
    }
}

pub fn addr(n: u8) -> BdAddr {
    BdAddr::new([0x30, 0xae, 0xa4, 0x00, 0x00, n])
}

/// Advertisement listing the target service in a complete 128-bit UUID list.
pub fn target_adv() -> Vec<u8> {
    let mut ad = vec![0x02, 0x01, 0x06, 17, 0x07];
    ad.extend_from_slice(&SERVICE_UUID);
    ad
}

pub fn other_adv() -> Vec<u8> {
    let mut ad = vec![17, 0x07];
    ad.extend_from_slice(&[0x42; 16]);
    ad
}
