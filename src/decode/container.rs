//! Character-snapshot container decoding.
//!
//! ## Schema (minimum decoded shape)
//!
//! ```text
//! ContainerSync   { 1: CharSerialize char_data }
//! CharSerialize   { 1: repeated PackageEntry item_packages
//!                   2: ModContainer mod_container }
//! PackageEntry    { 1: varint package_tag, 2: Package }
//! Package         { 1: repeated ItemEntry items }
//! ItemEntry       { 1: string item_key, 2: Item }
//! Item            { 1: varint config_id, 2: varint uuid,
//!                   3: varint quality, 4: ModNewAttr mod_new_attr }
//! ModNewAttr      { 1: repeated varint mod_parts }
//! ModContainer    { 1: repeated ModInfoEntry mod_infos }
//! ModInfoEntry    { 1: string key, 2: ModInfo }
//! ModInfo         { 1: repeated varint init_link_nums }
//! ```
//!
//! Repeated scalars are normalized to sequences; a single-element repeated
//! field never collapses to a scalar.

use std::collections::HashMap;

use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::error::DecodeError;
use crate::module::{ModuleInfo, ModulePart};

use super::heuristic::scan_modules;
use super::wire::WireReader;

/// Field numbers of the container schema.
mod field {
    pub const SYNC_CHAR_DATA: u32 = 1;

    pub const CHAR_ITEM_PACKAGES: u32 = 1;
    pub const CHAR_MOD_CONTAINER: u32 = 2;

    pub const ENTRY_KEY: u32 = 1;
    pub const ENTRY_VALUE: u32 = 2;

    pub const PACKAGE_ITEMS: u32 = 1;

    pub const ITEM_CONFIG_ID: u32 = 1;
    pub const ITEM_UUID: u32 = 2;
    pub const ITEM_QUALITY: u32 = 3;
    pub const ITEM_MOD_NEW_ATTR: u32 = 4;

    pub const MOD_NEW_ATTR_PARTS: u32 = 1;

    pub const MOD_CONTAINER_INFOS: u32 = 1;

    pub const MOD_INFO_LINK_NUMS: u32 = 1;
}

/// One raw item before pairing with its mod info.
#[derive(Debug, Default)]
struct RawItem {
    key: String,
    config_id: u32,
    uuid: u64,
    quality: u8,
    mod_parts: Vec<u64>,
}

/// Decodes container payloads into module records.
///
/// Owns the monotonic uuid counter handed to the heuristic fallback so
/// synthetic records stay unique across captures.
#[derive(Debug, Default)]
pub struct ContainerDecoder {
    synthetic_uuid: u64,
}

impl ContainerDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one container payload.
    ///
    /// Tries the structured shapes first and only falls back to the
    /// heuristic scan when none of them yields modules.
    pub fn decode(&mut self, payload: &[u8]) -> Result<Vec<ModuleInfo>, DecodeError> {
        // (a) outer container wrapper
        if let Ok(modules) = parse_sync(payload) {
            if !modules.is_empty() {
                return Ok(modules);
            }
        }

        // (b) character data directly
        if let Ok(modules) = parse_char_serialize(payload) {
            if !modules.is_empty() {
                debug!("container decoded as bare char data");
                return Ok(modules);
            }
        }

        // (c) a 4-byte length prefix sometimes precedes the wrapper
        if let Some(inner) = strip_length_prefix(payload) {
            if let Ok(modules) = parse_sync(inner) {
                if !modules.is_empty() {
                    debug!("container decoded past a length prefix");
                    return Ok(modules);
                }
            }
        }

        // (d) heuristic byte scan
        let modules = scan_modules(payload, &mut self.synthetic_uuid);
        if modules.is_empty() {
            return Err(DecodeError::NoModules);
        }
        warn!(count = modules.len(), "structured decode failed, using heuristic scan");
        Ok(modules)
    }
}

/// Does the payload start with a big-endian length covering the rest?
fn strip_length_prefix(payload: &[u8]) -> Option<&[u8]> {
    if payload.len() < 4 {
        return None;
    }
    let declared = u32::from_be_bytes(payload[..4].try_into().unwrap()) as usize;
    let rest = &payload[4..];
    (declared == rest.len() || (declared > 0 && declared <= rest.len())).then_some(rest)
}

/// Parse the `ContainerSync` wrapper.
fn parse_sync(payload: &[u8]) -> Result<Vec<ModuleInfo>, DecodeError> {
    let mut reader = WireReader::new(payload);
    let mut modules = Vec::new();
    while let Some(f) = reader.next_field()? {
        if f.number == field::SYNC_CHAR_DATA {
            if let Some(bytes) = f.value.as_bytes() {
                modules.extend(parse_char_serialize(bytes)?);
            }
        }
    }
    Ok(modules)
}

/// Parse `CharSerialize` and extract paired module records.
fn parse_char_serialize(payload: &[u8]) -> Result<Vec<ModuleInfo>, DecodeError> {
    let mut reader = WireReader::new(payload);
    let mut items: Vec<RawItem> = Vec::new();
    let mut mod_infos: HashMap<String, Vec<u64>> = HashMap::new();

    while let Some(f) = reader.next_field()? {
        match f.number {
            field::CHAR_ITEM_PACKAGES => {
                if let Some(bytes) = f.value.as_bytes() {
                    parse_package_entry(bytes, &mut items)?;
                }
            }
            field::CHAR_MOD_CONTAINER => {
                if let Some(bytes) = f.value.as_bytes() {
                    parse_mod_container(bytes, &mut mod_infos)?;
                }
            }
            _ => {}
        }
    }

    Ok(pair_items(items, &mod_infos))
}

/// Parse one `PackageEntry` (map entry: tag -> Package).
fn parse_package_entry(payload: &[u8], items: &mut Vec<RawItem>) -> Result<(), DecodeError> {
    let mut reader = WireReader::new(payload);
    while let Some(f) = reader.next_field()? {
        if f.number == field::ENTRY_VALUE {
            if let Some(bytes) = f.value.as_bytes() {
                parse_package(bytes, items)?;
            }
        }
    }
    Ok(())
}

/// Parse one `Package`.
fn parse_package(payload: &[u8], items: &mut Vec<RawItem>) -> Result<(), DecodeError> {
    let mut reader = WireReader::new(payload);
    while let Some(f) = reader.next_field()? {
        if f.number == field::PACKAGE_ITEMS {
            if let Some(bytes) = f.value.as_bytes() {
                if let Some(item) = parse_item_entry(bytes)? {
                    items.push(item);
                }
            }
        }
    }
    Ok(())
}

/// Parse one `ItemEntry` (map entry: key -> Item).
fn parse_item_entry(payload: &[u8]) -> Result<Option<RawItem>, DecodeError> {
    let mut reader = WireReader::new(payload);
    let mut key = String::new();
    let mut item: Option<RawItem> = None;

    while let Some(f) = reader.next_field()? {
        match f.number {
            field::ENTRY_KEY => {
                if let Some(s) = f.value.as_str() {
                    key = s.to_string();
                }
            }
            field::ENTRY_VALUE => {
                if let Some(bytes) = f.value.as_bytes() {
                    item = Some(parse_item(bytes)?);
                }
            }
            _ => {}
        }
    }

    Ok(item.map(|mut item| {
        item.key = key;
        item
    }))
}

/// Parse one `Item`.
fn parse_item(payload: &[u8]) -> Result<RawItem, DecodeError> {
    let mut reader = WireReader::new(payload);
    let mut item = RawItem::default();

    while let Some(f) = reader.next_field()? {
        match f.number {
            field::ITEM_CONFIG_ID => item.config_id = f.value.as_u32().unwrap_or(0),
            field::ITEM_UUID => item.uuid = f.value.as_u64().unwrap_or(0),
            field::ITEM_QUALITY => item.quality = f.value.as_u64().unwrap_or(0) as u8,
            field::ITEM_MOD_NEW_ATTR => {
                if let Some(bytes) = f.value.as_bytes() {
                    let mut attr_reader = WireReader::new(bytes);
                    while let Some(af) = attr_reader.next_field()? {
                        if af.number == field::MOD_NEW_ATTR_PARTS {
                            item.mod_parts.extend(af.value.varint_sequence());
                        }
                    }
                }
            }
            _ => {}
        }
    }
    Ok(item)
}

/// Parse `ModContainer` into key -> init_link_nums.
fn parse_mod_container(
    payload: &[u8],
    mod_infos: &mut HashMap<String, Vec<u64>>,
) -> Result<(), DecodeError> {
    let mut reader = WireReader::new(payload);
    while let Some(f) = reader.next_field()? {
        if f.number != field::MOD_CONTAINER_INFOS {
            continue;
        }
        let Some(bytes) = f.value.as_bytes() else { continue };

        let mut entry_reader = WireReader::new(bytes);
        let mut key = String::new();
        let mut link_nums = Vec::new();
        while let Some(ef) = entry_reader.next_field()? {
            match ef.number {
                field::ENTRY_KEY => {
                    if let Some(s) = ef.value.as_str() {
                        key = s.to_string();
                    }
                }
                field::ENTRY_VALUE => {
                    if let Some(info_bytes) = ef.value.as_bytes() {
                        let mut info_reader = WireReader::new(info_bytes);
                        while let Some(inf) = info_reader.next_field()? {
                            if inf.number == field::MOD_INFO_LINK_NUMS {
                                link_nums.extend(inf.value.varint_sequence());
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        if !key.is_empty() {
            mod_infos.insert(key, link_nums);
        }
    }
    Ok(())
}

/// Pair items with their mod infos and build module records.
///
/// An item needs non-empty `mod_parts` and a matching mod-info entry, by
/// item key first and stringified uuid second. Link numbers shorter than
/// the part list pad with value 1.
fn pair_items(items: Vec<RawItem>, mod_infos: &HashMap<String, Vec<u64>>) -> Vec<ModuleInfo> {
    let mut modules = Vec::new();
    for item in items {
        if item.mod_parts.is_empty() {
            continue;
        }
        let link_nums = match mod_infos
            .get(&item.key)
            .or_else(|| mod_infos.get(&item.uuid.to_string()))
        {
            Some(nums) => nums,
            None => continue,
        };

        let parts: SmallVec<[ModulePart; 4]> = item
            .mod_parts
            .iter()
            .enumerate()
            .map(|(i, &attr_id)| {
                // Only a missing entry defaults to 1; a present value,
                // including 0, passes through as-is
                let value = link_nums.get(i).copied().unwrap_or(1).min(u8::MAX as u64);
                ModulePart::new(attr_id as u32, value as u8)
            })
            .collect();
        modules.push(ModuleInfo::new(item.config_id, item.uuid, item.quality, parts));
    }
    modules
}

/// Fixture builders shared by the unit and integration test suites.
pub mod fixture {
    use super::super::wire::encode::{field_bytes, field_varint};

    /// One synthetic inventory module.
    #[derive(Debug, Clone)]
    pub struct FixtureModule {
        pub item_key: String,
        pub config_id: u32,
        pub uuid: u64,
        pub quality: u8,
        pub mod_parts: Vec<u32>,
        pub init_link_nums: Vec<u8>,
    }

    /// Encode a `CharSerialize` message holding the given modules.
    pub fn char_serialize(modules: &[FixtureModule]) -> Vec<u8> {
        let mut package = Vec::new();
        for m in modules {
            let mut mod_new_attr = Vec::new();
            for &part in &m.mod_parts {
                field_varint(&mut mod_new_attr, 1, part as u64);
            }

            let mut item = Vec::new();
            field_varint(&mut item, 1, m.config_id as u64);
            field_varint(&mut item, 2, m.uuid);
            field_varint(&mut item, 3, m.quality as u64);
            field_bytes(&mut item, 4, &mod_new_attr);

            let mut item_entry = Vec::new();
            field_bytes(&mut item_entry, 1, m.item_key.as_bytes());
            field_bytes(&mut item_entry, 2, &item);

            field_bytes(&mut package, 1, &item_entry);
        }

        let mut package_entry = Vec::new();
        field_varint(&mut package_entry, 1, 1); // package tag
        field_bytes(&mut package_entry, 2, &package);

        let mut mod_container = Vec::new();
        for m in modules {
            let mut mod_info = Vec::new();
            for &n in &m.init_link_nums {
                field_varint(&mut mod_info, 1, n as u64);
            }
            let mut info_entry = Vec::new();
            field_bytes(&mut info_entry, 1, m.item_key.as_bytes());
            field_bytes(&mut info_entry, 2, &mod_info);
            field_bytes(&mut mod_container, 1, &info_entry);
        }

        let mut char_data = Vec::new();
        field_bytes(&mut char_data, 1, &package_entry);
        field_bytes(&mut char_data, 2, &mod_container);
        char_data
    }

    /// Encode the `ContainerSync` wrapper around a `CharSerialize`.
    pub fn container_sync(modules: &[FixtureModule]) -> Vec<u8> {
        let char_data = char_serialize(modules);
        let mut sync = Vec::new();
        field_bytes(&mut sync, 1, &char_data);
        sync
    }
}
