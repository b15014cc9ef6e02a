//! Advertisement data parsing.
//!
//! Walks the length-type-value AD structures of a raw advertisement or
//! scan response. Malformed length bytes end the walk instead of panicking.

use heapless::String;

use super::Uuid128;

const AD_TYPE_INCOMPLETE_UUID128: u8 = 0x06;
const AD_TYPE_COMPLETE_UUID128: u8 = 0x07;
const AD_TYPE_SHORT_NAME: u8 = 0x08;
const AD_TYPE_COMPLETE_NAME: u8 = 0x09;

/// Iterator over `(ad_type, payload)` pairs.
pub struct AdStructures<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> AdStructures<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }
}

impl<'a> Iterator for AdStructures<'a> {
    type Item = (u8, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let i = self.pos;
        let len = *self.data.get(i)? as usize;
        if len == 0 || i + len >= self.data.len() {
            self.pos = self.data.len();
            return None;
        }
        self.pos = i + len + 1;
        Some((self.data[i + 1], &self.data[i + 2..i + 1 + len]))
    }
}

/// All 128-bit service UUIDs listed in `data`, complete or incomplete lists.
pub fn service_uuids128(data: &[u8]) -> impl Iterator<Item = &Uuid128> + '_ {
    AdStructures::new(data)
        .filter(|(ad_type, _)| {
            *ad_type == AD_TYPE_COMPLETE_UUID128 || *ad_type == AD_TYPE_INCOMPLETE_UUID128
        })
        .flat_map(|(_, payload)| payload.chunks_exact(16))
        .filter_map(|chunk| <&Uuid128>::try_from(chunk).ok())
}

/// Check if raw advertisement data lists `uuid` as a 128-bit service UUID.
pub fn contains_service_uuid(data: &[u8], uuid: &Uuid128) -> bool {
    service_uuids128(data).any(|u| u == uuid)
}

/// Complete or shortened local name, if `data` carries one.
pub fn local_name(data: &[u8]) -> Option<String<32>> {
    let (_, name_bytes) = AdStructures::new(data)
        .find(|(ad_type, _)| *ad_type == AD_TYPE_SHORT_NAME || *ad_type == AD_TYPE_COMPLETE_NAME)?;
    let mut name = String::new();
    for &b in name_bytes {
        if name.push(b as char).is_err() {
            break;
        }
    }
    Some(name)
}

/// Placeholder for peers that advertise no name.
pub(crate) fn unknown_name() -> String<32> {
    let mut name = String::new();
    let _ = name.push_str("Unknown");
    name
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests (run on host, not embedded)
// ═══════════════════════════════════════════════════════════════════════════
