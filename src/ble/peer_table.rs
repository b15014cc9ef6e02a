//! Fixed-capacity peer table.
//!
//! One slot per connected peripheral. Slots are found by address,
//! connection id or characteristic handle, since each kind of stack event
//! only carries one of them. Linear scans are fine at this table size.

use super::{BdAddr, ConnId, Handle, HandleRange};
use crate::error::Error;

/// Discovery progress of an occupied slot.
///
/// Unoccupied slots are `None` in the table; connections still being
/// opened live in [`PendingConnections`](super::scanner::PendingConnections).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiscoveryStage {
    Connected,
    ServiceSearching,
    ServiceFound,
    CharacteristicFound,
    NotifyRegistered,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PeerSlot {
    pub address: BdAddr,
    pub conn_id: ConnId,
    pub service_range: Option<HandleRange>,
    pub char_handle: Option<Handle>,
    pub stage: DiscoveryStage,
    /// Poll time at which the current stage was first seen, for timeouts.
    stale_since: Option<u64>,
}

impl PeerSlot {
    fn new(address: BdAddr, conn_id: ConnId) -> Self {
        Self {
            address,
            conn_id,
            service_range: None,
            char_handle: None,
            stage: DiscoveryStage::Connected,
            stale_since: None,
        }
    }

    pub(crate) fn advance(&mut self, stage: DiscoveryStage) {
        self.stage = stage;
        self.stale_since = None;
    }

    pub(crate) fn merge_service_range(&mut self, range: HandleRange) {
        self.service_range = Some(match self.service_range {
            Some(existing) => existing.merge(range),
            None => range,
        });
    }

    /// Records the characteristic handle. Refused until a service range exists.
    pub(crate) fn set_characteristic(&mut self, handle: Handle) -> bool {
        if self.service_range.is_none() {
            return false;
        }
        self.char_handle = Some(handle);
        self.advance(DiscoveryStage::CharacteristicFound);
        true
    }

    /// Returns `true` once the stage has been unchanged for `timeout_ms`.
    /// The first call after a stage change only starts the clock.
    pub(crate) fn stalled(&mut self, now_ms: u64, timeout_ms: u64) -> bool {
        match self.stale_since {
            None => {
                self.stale_since = Some(now_ms);
                false
            }
            Some(since) => now_ms.saturating_sub(since) >= timeout_ms,
        }
    }

    pub(crate) fn restart_stall_clock(&mut self, now_ms: u64) {
        self.stale_since = Some(now_ms);
    }
}

pub struct PeerTable<const N: usize> {
    slots: [Option<PeerSlot>; N],
}

impl<const N: usize> Default for PeerTable<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> PeerTable<N> {
    pub const fn new() -> Self {
        Self { slots: [None; N] }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Claims a free slot for a freshly connected peer.
    ///
    /// Fails with [`Error::TableFull`] or [`Error::DuplicatePeer`] without
    /// touching any slot.
    pub fn allocate(&mut self, conn_id: ConnId, address: BdAddr) -> Result<usize, Error> {
        if self.find_by_connection_id(conn_id).is_some()
            || self.find_by_address(&address).is_some()
        {
            return Err(Error::DuplicatePeer);
        }
        let slot = self
            .slots
            .iter()
            .position(|s| s.is_none())
            .ok_or(Error::TableFull)?;
        self.slots[slot] = Some(PeerSlot::new(address, conn_id));
        Ok(slot)
    }

    /// Frees a slot. Releasing a free or out-of-range slot does nothing.
    pub fn release(&mut self, slot: usize) {
        if let Some(s) = self.slots.get_mut(slot) {
            *s = None;
        }
    }

    pub fn find_by_connection_id(&self, conn_id: ConnId) -> Option<usize> {
        self.position(|p| p.conn_id == conn_id)
    }

    pub fn find_by_address(&self, address: &BdAddr) -> Option<usize> {
        self.position(|p| p.address == *address)
    }

    pub fn find_by_characteristic_handle(&self, handle: Handle) -> Option<usize> {
        self.position(|p| p.char_handle == Some(handle))
    }

    /// Slot whose notification registration for `handle` is outstanding.
    ///
    /// Peers running the same firmware share characteristic handles, so the
    /// slot still waiting in `CharacteristicFound` wins over one that is
    /// already subscribed.
    pub fn find_awaiting_registration(&self, handle: Handle) -> Option<usize> {
        self.position(|p| {
            p.char_handle == Some(handle) && p.stage == DiscoveryStage::CharacteristicFound
        })
        .or_else(|| self.find_by_characteristic_handle(handle))
    }

    pub fn get(&self, slot: usize) -> Option<&PeerSlot> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    pub(crate) fn get_mut(&mut self, slot: usize) -> Option<&mut PeerSlot> {
        self.slots.get_mut(slot).and_then(Option::as_mut)
    }

    /// Occupied slots with their indices.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &PeerSlot)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|p| (i, p)))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut PeerSlot)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, s)| s.as_mut().map(|p| (i, p)))
    }

    pub fn occupied_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn free_count(&self) -> usize {
        N - self.occupied_count()
    }

    pub fn is_full(&self) -> bool {
        self.free_count() == 0
    }

    fn position(&self, pred: impl Fn(&PeerSlot) -> bool) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.as_ref().is_some_and(&pred))
    }
}
