//! Per-peer discovery protocol.
//!
//! Each GATT client event advances exactly one slot:
//!
//! ```text
//! connect ─► ServiceSearching ─(search complete)─► ServiceFound
//!        ─(characteristic lookup)─► CharacteristicFound
//!        ─(register-for-notify complete)─► NotifyRegistered
//! ```
//!
//! Transitions run under the peer table lock and only return the transport
//! [`Request`] to issue next; they never call the transport themselves.
//! An event whose key matches no slot is a stale or duplicate callback and
//! is ignored.

use heapless::Vec;

use super::peer_table::{DiscoveryStage, PeerTable};
use super::transport::Request;
use super::{BdAddr, BleUuid, ConnId, Handle, HandleRange, TargetIdentity};

/// New link: track it and search for the target service, or reject it.
///
/// A repeated connect for a link already tracked under the same address is
/// a duplicate callback and yields nothing.
pub fn on_connect<const N: usize>(
    peers: &mut PeerTable<N>,
    conn_id: ConnId,
    address: BdAddr,
    target: &TargetIdentity,
) -> Option<Request> {
    if let Some(slot) = peers.find_by_connection_id(conn_id) {
        if peers.get(slot).is_some_and(|p| p.address == address) {
            debug!("Duplicate connect for peer {} (conn {})", slot, conn_id);
            return None;
        }
    }
    match peers.allocate(conn_id, address) {
        Ok(slot) => {
            info!("Connected peer {} ({}, conn {})", slot, address, conn_id);
            if let Some(peer) = peers.get_mut(slot) {
                peer.advance(DiscoveryStage::ServiceSearching);
            }
            Some(Request::SearchService {
                conn_id,
                service: BleUuid::Uuid128(target.service),
            })
        }
        Err(e) => {
            warn!("Rejecting connection {} from {}: {}", conn_id, address, e);
            Some(Request::Close { conn_id })
        }
    }
}

/// One matching service reported. Only widens the recorded handle range.
pub fn on_search_result<const N: usize>(
    peers: &mut PeerTable<N>,
    conn_id: ConnId,
    range: HandleRange,
) {
    let Some(slot) = peers.find_by_connection_id(conn_id) else {
        debug!("Search result for unknown conn {}", conn_id);
        return;
    };
    if let Some(peer) = peers.get_mut(slot) {
        peer.merge_service_range(range);
        debug!("Peer {} service handles {}..{}", slot, range.start, range.end);
    }
}

/// Service search finished: look up the characteristic if the service was seen.
pub fn on_search_complete<const N: usize>(
    peers: &mut PeerTable<N>,
    conn_id: ConnId,
    target: &TargetIdentity,
) -> Option<Request> {
    let slot = peers.find_by_connection_id(conn_id)?;
    let peer = peers.get_mut(slot)?;
    let Some(range) = peer.service_range else {
        warn!("Peer {} does not expose the target service", slot);
        return None;
    };
    peer.advance(DiscoveryStage::ServiceFound);
    Some(Request::LookupCharacteristic {
        conn_id,
        range,
        characteristic: BleUuid::Uuid128(target.characteristic),
    })
}

/// Characteristic lookup answered: register for notifications on a hit.
pub fn on_characteristic_lookup<const N: usize>(
    peers: &mut PeerTable<N>,
    conn_id: ConnId,
    found: Option<Handle>,
) -> Option<Request> {
    let slot = peers.find_by_connection_id(conn_id)?;
    let peer = peers.get_mut(slot)?;
    if peer.stage != DiscoveryStage::ServiceFound {
        return None;
    }
    let Some(char_handle) = found else {
        warn!("Peer {} has no target characteristic", slot);
        return None;
    };
    if !peer.set_characteristic(char_handle) {
        return None;
    }
    debug!("Peer {} characteristic handle {}", slot, char_handle);
    Some(Request::RegisterForNotify {
        address: peer.address,
        char_handle,
    })
}

/// The stack registered for notifications: enable them on the peer.
pub fn on_register_for_notify_complete<const N: usize>(
    peers: &mut PeerTable<N>,
    char_handle: Handle,
) -> Option<Request> {
    let slot = peers.find_awaiting_registration(char_handle)?;
    let peer = peers.get_mut(slot)?;
    peer.advance(DiscoveryStage::NotifyRegistered);
    info!("Notifications enabled for peer {}", slot);
    Some(Request::EnableNotify {
        conn_id: peer.conn_id,
        char_handle,
    })
}

/// Slot a notification belongs to, if the peer is still tracked.
pub fn on_notify<const N: usize>(peers: &PeerTable<N>, conn_id: ConnId) -> Option<usize> {
    peers.find_by_connection_id(conn_id)
}

/// Link lost: free the slot whatever stage it reached.
pub fn on_disconnect<const N: usize>(peers: &mut PeerTable<N>, conn_id: ConnId) -> Option<usize> {
    let slot = peers.find_by_connection_id(conn_id)?;
    peers.release(slot);
    info!("Peer {} disconnected", slot);
    Some(slot)
}

/// Close every peer stuck short of `NotifyRegistered` for `timeout_ms`.
///
/// The slot stays occupied until the stack reports the disconnect; if that
/// never comes, the close is retried after another timeout period.
pub fn expire_stalled<const N: usize>(
    peers: &mut PeerTable<N>,
    now_ms: u64,
    timeout_ms: u64,
) -> Vec<Request, N> {
    let mut closes = Vec::new();
    for (slot, peer) in peers.iter_mut() {
        if peer.stage == DiscoveryStage::NotifyRegistered {
            continue;
        }
        if peer.stalled(now_ms, timeout_ms) {
            warn!("Peer {} stuck in {:?}, disconnecting", slot, peer.stage);
            peer.restart_stall_clock(now_ms);
            let _ = closes.push(Request::Close {
                conn_id: peer.conn_id,
            });
        }
    }
    closes
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    const CONN: ConnId = 3;

    fn addr(n: u8) -> BdAddr {
        BdAddr::new([0x24, 0x6f, 0x28, 0x00, 0x00, n])
    }

    fn target() -> TargetIdentity {
        TargetIdentity::default()
    }

    fn connected(peers: &mut PeerTable<5>) -> usize {
        on_connect(peers, CONN, addr(1), &target());
        peers.find_by_connection_id(CONN).unwrap()
    }

    /// Drives one peer to `stage` and returns its slot.
    fn drive_to(peers: &mut PeerTable<5>, stage: DiscoveryStage) -> usize {
        let slot = connected(peers);
        if stage == DiscoveryStage::Connected {
            peers.get_mut(slot).unwrap().advance(DiscoveryStage::Connected);
            return slot;
        }
        if stage == DiscoveryStage::ServiceSearching {
            return slot;
        }
        on_search_result(peers, CONN, HandleRange::new(10, 30));
        on_search_complete(peers, CONN, &target());
        if stage == DiscoveryStage::ServiceFound {
            return slot;
        }
        on_characteristic_lookup(peers, CONN, Some(27));
        if stage == DiscoveryStage::CharacteristicFound {
            return slot;
        }
        on_register_for_notify_complete(peers, 27);
        slot
    }

    #[test]
    fn connect_allocates_and_searches_target_service() {
        let mut peers: PeerTable<5> = PeerTable::new();
        let req = on_connect(&mut peers, CONN, addr(1), &target());

        assert_eq!(
            req,
            Some(Request::SearchService {
                conn_id: CONN,
                service: BleUuid::Uuid128(target().service)
            })
        );
        let slot = peers.find_by_address(&addr(1)).unwrap();
        let peer = peers.get(slot).unwrap();
        assert_eq!(peer.conn_id, CONN);
        assert_eq!(peer.stage, DiscoveryStage::ServiceSearching);
        assert_eq!(peer.service_range, None);
    }

    #[test]
    fn connect_with_full_table_is_rejected() {
        let mut peers: PeerTable<5> = PeerTable::new();
        for i in 0..5u8 {
            on_connect(&mut peers, i as ConnId, addr(i), &target());
        }

        let req = on_connect(&mut peers, 9, addr(9), &target());
        assert_eq!(req, Some(Request::Close { conn_id: 9 }));
        assert_eq!(peers.occupied_count(), 5);
        assert_eq!(peers.find_by_connection_id(9), None);
    }

    #[test]
    fn repeated_connect_keeps_live_peer() {
        let mut peers: PeerTable<5> = PeerTable::new();
        let slot = drive_to(&mut peers, DiscoveryStage::NotifyRegistered);
        let before = *peers.get(slot).unwrap();

        assert_eq!(on_connect(&mut peers, CONN, addr(1), &target()), None);
        assert_eq!(peers.get(slot), Some(&before));
        assert_eq!(peers.occupied_count(), 1);
    }

    #[test]
    fn known_address_on_new_link_is_rejected() {
        let mut peers: PeerTable<5> = PeerTable::new();
        let slot = connected(&mut peers);

        let req = on_connect(&mut peers, CONN + 1, addr(1), &target());
        assert_eq!(req, Some(Request::Close { conn_id: CONN + 1 }));
        assert_eq!(peers.get(slot).unwrap().conn_id, CONN);

        let req = on_connect(&mut peers, CONN, addr(2), &target());
        assert_eq!(req, Some(Request::Close { conn_id: CONN }));
        assert_eq!(peers.get(slot).unwrap().address, addr(1));
    }

    #[test]
    fn search_results_merge_into_one_range() {
        let mut peers: PeerTable<5> = PeerTable::new();
        let slot = connected(&mut peers);
        on_search_result(&mut peers, CONN, HandleRange::new(10, 20));
        on_search_result(&mut peers, CONN, HandleRange::new(25, 30));

        let peer = peers.get(slot).unwrap();
        assert_eq!(peer.service_range, Some(HandleRange::new(10, 30)));
        assert_eq!(peer.stage, DiscoveryStage::ServiceSearching);
    }

    #[test]
    fn search_complete_without_range_issues_no_lookup() {
        let mut peers: PeerTable<5> = PeerTable::new();
        let slot = connected(&mut peers);

        assert_eq!(on_search_complete(&mut peers, CONN, &target()), None);
        assert_eq!(
            peers.get(slot).unwrap().stage,
            DiscoveryStage::ServiceSearching,
        );
    }

    #[test]
    fn search_complete_with_range_requests_lookup() {
        let mut peers: PeerTable<5> = PeerTable::new();
        let slot = connected(&mut peers);
        on_search_result(&mut peers, CONN, HandleRange::new(10, 20));

        let req = on_search_complete(&mut peers, CONN, &target());
        assert_eq!(
            req,
            Some(Request::LookupCharacteristic {
                conn_id: CONN,
                range: HandleRange::new(10, 20),
                characteristic: BleUuid::Uuid128(target().characteristic),
            })
        );
        assert_eq!(peers.get(slot).unwrap().stage, DiscoveryStage::ServiceFound);
    }

    #[test]
    fn single_lookup_hit_registers_for_notify() {
        let mut peers: PeerTable<5> = PeerTable::new();
        let slot = drive_to(&mut peers, DiscoveryStage::ServiceFound);

        let req = on_characteristic_lookup(&mut peers, CONN, Some(27));
        assert_eq!(
            req,
            Some(Request::RegisterForNotify {
                address: addr(1),
                char_handle: 27
            })
        );
        let peer = peers.get(slot).unwrap();
        assert_eq!(peer.stage, DiscoveryStage::CharacteristicFound);
        assert_eq!(peer.char_handle, Some(27));
    }

    #[test]
    fn lookup_miss_halts_at_service_found() {
        let mut peers: PeerTable<5> = PeerTable::new();
        let slot = drive_to(&mut peers, DiscoveryStage::ServiceFound);

        assert_eq!(on_characteristic_lookup(&mut peers, CONN, None), None);
        let peer = peers.get(slot).unwrap();
        assert_eq!(peer.stage, DiscoveryStage::ServiceFound);
        assert_eq!(peer.char_handle, None);
    }

    #[test]
    fn late_lookup_result_is_ignored() {
        let mut peers: PeerTable<5> = PeerTable::new();
        drive_to(&mut peers, DiscoveryStage::NotifyRegistered);
        assert_eq!(on_characteristic_lookup(&mut peers, CONN, Some(99)), None);
        assert_eq!(peers.find_by_characteristic_handle(27), Some(0));
    }

    #[test]
    fn registration_complete_enables_notify() {
        let mut peers: PeerTable<5> = PeerTable::new();
        let slot = drive_to(&mut peers, DiscoveryStage::CharacteristicFound);

        let req = on_register_for_notify_complete(&mut peers, 27);
        assert_eq!(
            req,
            Some(Request::EnableNotify {
                conn_id: CONN,
                char_handle: 27
            })
        );
        assert_eq!(
            peers.get(slot).unwrap().stage,
            DiscoveryStage::NotifyRegistered,
        );
    }

    #[test]
    fn registration_for_unknown_handle_is_ignored() {
        let mut peers: PeerTable<5> = PeerTable::new();
        drive_to(&mut peers, DiscoveryStage::CharacteristicFound);
        assert_eq!(on_register_for_notify_complete(&mut peers, 99), None);
    }

    #[test]
    fn events_for_unknown_connection_are_ignored() {
        let mut peers: PeerTable<5> = PeerTable::new();
        on_search_result(&mut peers, 7, HandleRange::new(1, 2));
        assert_eq!(on_search_complete(&mut peers, 7, &target()), None);
        assert_eq!(on_characteristic_lookup(&mut peers, 7, Some(1)), None);
        assert_eq!(on_notify(&peers, 7), None);
        assert_eq!(on_disconnect(&mut peers, 7), None);
        assert_eq!(peers.occupied_count(), 0);
    }

    #[test]
    fn disconnect_frees_slot_from_every_stage() {
        for stage in [
            DiscoveryStage::Connected,
            DiscoveryStage::ServiceSearching,
            DiscoveryStage::ServiceFound,
            DiscoveryStage::CharacteristicFound,
            DiscoveryStage::NotifyRegistered,
        ] {
            let mut peers: PeerTable<5> = PeerTable::new();
            let slot = drive_to(&mut peers, stage);
            assert_eq!(peers.get(slot).unwrap().stage, stage);

            assert_eq!(on_disconnect(&mut peers, CONN), Some(slot));
            assert!(peers.get(slot).is_none());
            assert_eq!(peers.occupied_count(), 0);
        }
    }

    #[test]
    fn stalled_peers_are_closed_subscribed_ones_kept() {
        let mut peers: PeerTable<5> = PeerTable::new();
        drive_to(&mut peers, DiscoveryStage::NotifyRegistered);
        on_connect(&mut peers, 8, addr(8), &target());

        assert!(expire_stalled(&mut peers, 0, 10_000).is_empty());
        assert!(expire_stalled(&mut peers, 9_999, 10_000).is_empty());
        let closes = expire_stalled(&mut peers, 10_000, 10_000);
        assert_eq!(closes.as_slice(), &[Request::Close { conn_id: 8 }]);

        // Retried only after another full period.
        assert!(expire_stalled(&mut peers, 15_000, 10_000).is_empty());
        assert_eq!(expire_stalled(&mut peers, 20_000, 10_000).len(), 1);
    }
}
