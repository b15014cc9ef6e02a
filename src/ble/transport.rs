//! Boundary to the radio stack.
//!
//! The core never talks to the stack directly. State transitions produce a
//! [`Request`], and the client hands it to a [`BleTransport`] once the peer
//! table lock has been released. Completions come back later as events.

use super::{AddressType, BdAddr, BleUuid, ConnId, Handle, HandleRange, ScanParams};
use crate::error::BleError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WriteType {
    NoResponse,
    WithResponse,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AuthReq {
    None,
    NoMitm,
    Mitm,
}

/// Outbound calls into the radio stack.
///
/// Every method is fire-and-forget except the two attribute-cache lookups,
/// which the stack answers synchronously. Methods take `&self` because the
/// stack is called from several callback contexts at once.
pub trait BleTransport {
    fn set_scan_params(&self, params: &ScanParams) -> Result<(), BleError>;

    /// Starts scanning. A duration of 0 scans until stopped.
    fn start_scan(&self, duration_secs: u32) -> Result<(), BleError>;

    /// Opens a direct connection to an advertising peer.
    fn open(&self, address: BdAddr, addr_type: AddressType) -> Result<(), BleError>;

    fn close(&self, conn_id: ConnId) -> Result<(), BleError>;

    fn search_service(&self, conn_id: ConnId, service: &BleUuid) -> Result<(), BleError>;

    /// First characteristic matching `uuid` inside `range`, if any.
    fn characteristic_by_uuid(
        &self,
        conn_id: ConnId,
        range: HandleRange,
        uuid: &BleUuid,
    ) -> Result<Option<Handle>, BleError>;

    /// Descriptor of `char_handle` matching `uuid`, if the stack can tell.
    ///
    /// Stacks without a descriptor cache keep the default, which makes the
    /// caller assume the descriptor directly follows the value handle.
    fn descriptor_by_uuid(
        &self,
        conn_id: ConnId,
        char_handle: Handle,
        uuid: &BleUuid,
    ) -> Result<Option<Handle>, BleError> {
        let _ = (conn_id, char_handle, uuid);
        Ok(None)
    }

    fn register_for_notify(&self, address: BdAddr, char_handle: Handle) -> Result<(), BleError>;

    fn write_descriptor(
        &self,
        conn_id: ConnId,
        handle: Handle,
        value: &[u8],
        write_type: WriteType,
        auth: AuthReq,
    ) -> Result<(), BleError>;
}

impl<T: BleTransport + ?Sized> BleTransport for &T {
    fn set_scan_params(&self, params: &ScanParams) -> Result<(), BleError> {
        (**self).set_scan_params(params)
    }

    fn start_scan(&self, duration_secs: u32) -> Result<(), BleError> {
        (**self).start_scan(duration_secs)
    }

    fn open(&self, address: BdAddr, addr_type: AddressType) -> Result<(), BleError> {
        (**self).open(address, addr_type)
    }

    fn close(&self, conn_id: ConnId) -> Result<(), BleError> {
        (**self).close(conn_id)
    }

    fn search_service(&self, conn_id: ConnId, service: &BleUuid) -> Result<(), BleError> {
        (**self).search_service(conn_id, service)
    }

    fn characteristic_by_uuid(
        &self,
        conn_id: ConnId,
        range: HandleRange,
        uuid: &BleUuid,
    ) -> Result<Option<Handle>, BleError> {
        (**self).characteristic_by_uuid(conn_id, range, uuid)
    }

    fn descriptor_by_uuid(
        &self,
        conn_id: ConnId,
        char_handle: Handle,
        uuid: &BleUuid,
    ) -> Result<Option<Handle>, BleError> {
        (**self).descriptor_by_uuid(conn_id, char_handle, uuid)
    }

    fn register_for_notify(&self, address: BdAddr, char_handle: Handle) -> Result<(), BleError> {
        (**self).register_for_notify(address, char_handle)
    }

    fn write_descriptor(
        &self,
        conn_id: ConnId,
        handle: Handle,
        value: &[u8],
        write_type: WriteType,
        auth: AuthReq,
    ) -> Result<(), BleError> {
        (**self).write_descriptor(conn_id, handle, value, write_type, auth)
    }
}

/// A transport call decided on by a state transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Request {
    SetScanParams(ScanParams),
    StartScan {
        duration_secs: u32,
    },
    Open {
        address: BdAddr,
        addr_type: AddressType,
    },
    Close {
        conn_id: ConnId,
    },
    SearchService {
        conn_id: ConnId,
        service: BleUuid,
    },
    /// Answered synchronously, the result feeds the next transition.
    LookupCharacteristic {
        conn_id: ConnId,
        range: HandleRange,
        characteristic: BleUuid,
    },
    RegisterForNotify {
        address: BdAddr,
        char_handle: Handle,
    },
    /// Resolve the CCCD of `char_handle` and write the enable payload to it.
    EnableNotify {
        conn_id: ConnId,
        char_handle: Handle,
    },
}
