//! Heuristic module scan.
//!
//! Last-resort decoder for payloads whose structured shape has drifted.
//! Scans for little-endian config ids in the module range, then collects
//! nearby attribute-id/value pairs. Synthetic uuids come from a monotonic
//! counter, so records stay distinct but are NOT stable across captures -
//! structured decoding must always be preferred.

use smallvec::SmallVec;
use tracing::debug;

use crate::module::{ModuleInfo, ModulePart};

/// Config ids of module items live in this range.
const CONFIG_ID_RANGE: std::ops::RangeInclusive<u32> = 5_500_000..=5_600_000;

/// Attribute ids live in this range.
const ATTR_ID_RANGE: std::ops::RangeInclusive<u32> = 1100..=2500;

/// Attribute values are small.
const VALUE_RANGE: std::ops::RangeInclusive<u8> = 1..=10;

/// How far past a config-id hit attribute pairs are searched.
const SCAN_WINDOW: usize = 64;

/// Most parts a synthetic module will carry.
const MAX_PARTS: usize = 4;

fn read_le_u32(buf: &[u8], at: usize) -> Option<u32> {
    buf.get(at..at + 4)
        .map(|b| u32::from_le_bytes(b.try_into().unwrap()))
}

/// Scan a payload for synthetic module records.
///
/// `next_uuid` is the caller's monotonic counter; it advances once per
/// constructed record.
pub fn scan_modules(payload: &[u8], next_uuid: &mut u64) -> Vec<ModuleInfo> {
    let mut modules = Vec::new();
    let mut offset = 0;

    while offset + 4 <= payload.len() {
        let config_id = match read_le_u32(payload, offset) {
            Some(v) if CONFIG_ID_RANGE.contains(&v) => v,
            _ => {
                offset += 1;
                continue;
            }
        };

        let mut parts: SmallVec<[ModulePart; 4]> = SmallVec::new();
        let window_end = (offset + 4 + SCAN_WINDOW).min(payload.len());
        let mut cursor = offset + 4;
        while cursor + 5 <= window_end && parts.len() < MAX_PARTS {
            let attr_id = match read_le_u32(payload, cursor) {
                Some(v) if ATTR_ID_RANGE.contains(&v) => v,
                _ => {
                    cursor += 1;
                    continue;
                }
            };
            let value = payload[cursor + 4];
            if !VALUE_RANGE.contains(&value) {
                cursor += 1;
                continue;
            }
            parts.push(ModulePart::new(attr_id, value));
            cursor += 5;
        }

        if parts.is_empty() {
            offset += 1;
            continue;
        }

        // Ad hoc quality guess; real captures never rely on this path.
        let quality = (config_id % 10).clamp(3, 5) as u8;
        *next_uuid += 1;
        debug!(config_id, uuid = *next_uuid, parts = parts.len(), "heuristic module hit");
        modules.push(ModuleInfo::new(config_id, *next_uuid, quality, parts));
        offset = cursor;
    }
    modules
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Lay out config id + attr pairs the way the scanner expects.
    fn synthetic_payload(config_id: u32, pairs: &[(u32, u8)]) -> Vec<u8> {
        let mut buf = vec![0xAA; 3]; // unaligned noise prefix
        buf.extend_from_slice(&config_id.to_le_bytes());
        for &(attr, value) in pairs {
            buf.extend_from_slice(&attr.to_le_bytes());
            buf.push(value);
        }
        buf.extend_from_slice(&[0xBB; 5]);
        buf
    }

    #[test]
    fn test_scan_finds_module() {
        let payload = synthetic_payload(5_500_103, &[(1110, 8), (1113, 4)]);
        let mut uuid = 0;
        let modules = scan_modules(&payload, &mut uuid);
        assert_eq!(modules.len(), 1);
        let m = &modules[0];
        assert_eq!(m.config_id, 5_500_103);
        assert_eq!(m.uuid, 1);
        assert_eq!(m.parts.len(), 2);
        assert_eq!(m.parts[0].attr_name, "Strength Boost");
        assert_eq!(m.parts[1].value, 4);
    }

    #[test]
    fn test_quality_guess_clamped() {
        let mut uuid = 0;
        // 5_500_103 % 10 = 3
        let m = &scan_modules(&synthetic_payload(5_500_103, &[(1110, 1)]), &mut uuid)[0];
        assert_eq!(m.quality, 3);
        // 5_500_109 % 10 = 9, clamped to 5
        let m = &scan_modules(&synthetic_payload(5_500_109, &[(1110, 1)]), &mut uuid)[0];
        assert_eq!(m.quality, 5);
        // 5_500_101 % 10 = 1, clamped to 3
        let m = &scan_modules(&synthetic_payload(5_500_101, &[(1110, 1)]), &mut uuid)[0];
        assert_eq!(m.quality, 3);
    }

    #[test]
    fn test_uuid_counter_monotonic() {
        let mut payload = synthetic_payload(5_500_103, &[(1110, 1)]);
        payload.extend_from_slice(&synthetic_payload(5_500_104, &[(1111, 2)]));
        let mut uuid = 10;
        let modules = scan_modules(&payload, &mut uuid);
        assert_eq!(modules.len(), 2);
        assert_eq!(modules[0].uuid, 11);
        assert_eq!(modules[1].uuid, 12);
        assert_eq!(uuid, 12);
    }

    #[test]
    fn test_out_of_range_values_ignored() {
        // Value 0 and 11 are outside the accepted range
        let payload = synthetic_payload(5_500_103, &[(1110, 0), (1113, 11)]);
        let mut uuid = 0;
        assert!(scan_modules(&payload, &mut uuid).is_empty());
    }

    #[test]
    fn test_config_id_without_attrs_ignored() {
        let payload = synthetic_payload(5_500_103, &[]);
        let mut uuid = 0;
        assert!(scan_modules(&payload, &mut uuid).is_empty());
    }

    #[test]
    fn test_empty_and_noise_payloads() {
        let mut uuid = 0;
        assert!(scan_modules(&[], &mut uuid).is_empty());
        assert!(scan_modules(&[0u8; 256], &mut uuid).is_empty());
    }
}
