//! Outer/inner frame parsing.

use tracing::{debug, warn};

use crate::error::ProtocolError;

use super::compress::decompress_bounded;

/// Service uuid of the game's sync service.
pub const GAME_SERVICE_UUID: u64 = 0x0000_0000_6333_5342;

/// Method id of the inventory container sync call.
pub const SYNC_CONTAINER_METHOD_ID: u32 = 21;

/// Outer frame size bounds. The size field covers itself, the type tag,
/// and the body.
const MIN_OUTER_SIZE: u32 = 6;
const MAX_OUTER_SIZE: u32 = 0x0F_FFFF;

/// Message kinds carried by the inner type tag.
const KIND_NOTIFY: u16 = 2;
const KIND_FRAME_DOWN: u16 = 6;

/// Type tag bit carrying the compression flag.
const COMPRESSED_FLAG: u16 = 0x8000;

/// Bound on FrameDown self-nesting.
const MAX_NESTING_DEPTH: usize = 8;

/// Demux counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameStats {
    pub outer_packets: u64,
    pub notify_messages: u64,
    pub frame_down_messages: u64,
    pub skipped_kinds: u64,
    pub containers: u64,
    pub dropped_messages: u64,
}

/// Incremental parser over the reassembled byte queue.
///
/// [`FrameDemux::drain`] consumes as many complete outer packets as the
/// queue holds, leaving a trailing partial packet for the next call. A
/// malformed size field surfaces as a [`ProtocolError`]; the caller resets
/// the flow.
#[derive(Debug, Default)]
pub struct FrameDemux {
    stats: FrameStats,
}

impl FrameDemux {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Parse complete outer packets from `buf`.
    ///
    /// Returns `(bytes_consumed, container_payloads)`. Container payloads
    /// are the bodies of `Notify` calls on the sync service with the
    /// container method id, decompressed when flagged, in arrival order.
    pub fn drain(&mut self, buf: &[u8]) -> Result<(usize, Vec<Vec<u8>>), ProtocolError> {
        let mut containers = Vec::new();
        let mut offset = 0;

        while buf.len() - offset >= 4 {
            let size = u32::from_be_bytes([
                buf[offset],
                buf[offset + 1],
                buf[offset + 2],
                buf[offset + 3],
            ]);
            if size < MIN_OUTER_SIZE {
                return Err(ProtocolError::RuntPacket { size });
            }
            if size > MAX_OUTER_SIZE {
                return Err(ProtocolError::OversizedPacket {
                    size,
                    max: MAX_OUTER_SIZE,
                });
            }
            let size = size as usize;
            if buf.len() - offset < size {
                // Partial packet: wait for more bytes
                break;
            }

            self.stats.outer_packets += 1;
            self.parse_inner(&buf[offset + 4..offset + size], 0, &mut containers);
            offset += size;
        }

        Ok((offset, containers))
    }

    /// Feed a complete nested buffer (from a FrameDown) through the outer
    /// loop. Nested buffers cannot grow, so partial or malformed trailing
    /// bytes drop only this message.
    fn drain_nested(&mut self, buf: &[u8], depth: usize, containers: &mut Vec<Vec<u8>>) {
        let mut offset = 0;
        while buf.len() - offset >= 4 {
            let size = u32::from_be_bytes([
                buf[offset],
                buf[offset + 1],
                buf[offset + 2],
                buf[offset + 3],
            ]) as usize;
            if !(MIN_OUTER_SIZE as usize..=MAX_OUTER_SIZE as usize).contains(&size)
                || buf.len() - offset < size
            {
                warn!(offset, size, "malformed nested frame, dropping remainder");
                self.stats.dropped_messages += 1;
                return;
            }
            self.stats.outer_packets += 1;
            self.parse_inner(&buf[offset + 4..offset + size], depth, containers);
            offset += size;
        }
    }

    /// Parse one inner message: type tag, then the kind-specific body.
    fn parse_inner(&mut self, frame: &[u8], depth: usize, containers: &mut Vec<Vec<u8>>) {
        if frame.len() < 2 {
            self.stats.dropped_messages += 1;
            return;
        }
        let tag = u16::from_be_bytes([frame[0], frame[1]]);
        let compressed = tag & COMPRESSED_FLAG != 0;
        let kind = tag & !COMPRESSED_FLAG;
        let body = &frame[2..];

        match kind {
            KIND_NOTIFY => {
                self.stats.notify_messages += 1;
                self.parse_notify(body, compressed, containers);
            }
            KIND_FRAME_DOWN => {
                self.stats.frame_down_messages += 1;
                self.parse_frame_down(body, compressed, depth, containers);
            }
            other => {
                debug!(kind = other, "skipping unknown message kind");
                self.stats.skipped_kinds += 1;
            }
        }
    }

    /// Notify body: `u64 serviceUuid || u32 stubId || u32 methodId || payload`.
    fn parse_notify(&mut self, body: &[u8], compressed: bool, containers: &mut Vec<Vec<u8>>) {
        if body.len() < 16 {
            self.stats.dropped_messages += 1;
            return;
        }
        let service_uuid = u64::from_be_bytes(body[0..8].try_into().unwrap());
        let method_id = u32::from_be_bytes(body[12..16].try_into().unwrap());
        if service_uuid != GAME_SERVICE_UUID {
            return;
        }

        let payload = if compressed {
            match decompress_bounded(&body[16..]) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(error = %e, "notify payload failed to decompress, dropping");
                    self.stats.dropped_messages += 1;
                    return;
                }
            }
        } else {
            body[16..].to_vec()
        };

        if method_id == SYNC_CONTAINER_METHOD_ID {
            self.stats.containers += 1;
            containers.push(payload);
        }
    }

    /// FrameDown body: `u32 sequenceId || nestedPacket`.
    fn parse_frame_down(
        &mut self,
        body: &[u8],
        compressed: bool,
        depth: usize,
        containers: &mut Vec<Vec<u8>>,
    ) {
        if body.len() < 4 {
            self.stats.dropped_messages += 1;
            return;
        }
        if depth >= MAX_NESTING_DEPTH {
            warn!(depth, "frame nesting too deep, dropping");
            self.stats.dropped_messages += 1;
            return;
        }

        let nested = if compressed {
            match decompress_bounded(&body[4..]) {
                Ok(nested) => nested,
                Err(e) => {
                    warn!(error = %e, "nested frame failed to decompress, dropping");
                    self.stats.dropped_messages += 1;
                    return;
                }
            }
        } else {
            body[4..].to_vec()
        };

        self.drain_nested(&nested, depth + 1, containers);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build one outer packet: size(4) + tag(2) + body.
    pub fn outer(kind: u16, compressed: bool, body: &[u8]) -> Vec<u8> {
        let size = (4 + 2 + body.len()) as u32;
        let tag = if compressed { kind | COMPRESSED_FLAG } else { kind };
        let mut frame = Vec::with_capacity(size as usize);
        frame.extend_from_slice(&size.to_be_bytes());
        frame.extend_from_slice(&tag.to_be_bytes());
        frame.extend_from_slice(body);
        frame
    }

    pub fn notify_body(service_uuid: u64, method_id: u32, payload: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&service_uuid.to_be_bytes());
        body.extend_from_slice(&0u32.to_be_bytes()); // stub id, ignored
        body.extend_from_slice(&method_id.to_be_bytes());
        body.extend_from_slice(payload);
        body
    }

    #[test]
    fn test_single_container_notify() {
        let mut demux = FrameDemux::new();
        let frame = outer(
            KIND_NOTIFY,
            false,
            &notify_body(GAME_SERVICE_UUID, SYNC_CONTAINER_METHOD_ID, b"inventory"),
        );
        let (consumed, containers) = demux.drain(&frame).unwrap();
        assert_eq!(consumed, frame.len());
        assert_eq!(containers, vec![b"inventory".to_vec()]);
    }

    #[test]
    fn test_partial_packet_retained() {
        let mut demux = FrameDemux::new();
        let frame = outer(
            KIND_NOTIFY,
            false,
            &notify_body(GAME_SERVICE_UUID, SYNC_CONTAINER_METHOD_ID, b"abc"),
        );
        let (consumed, containers) = demux.drain(&frame[..frame.len() - 1]).unwrap();
        assert_eq!(consumed, 0);
        assert!(containers.is_empty());

        // Full frame plus a 3-byte tail of the next one
        let mut buf = frame.clone();
        buf.extend_from_slice(&frame[..3]);
        let (consumed, containers) = demux.drain(&buf).unwrap();
        assert_eq!(consumed, frame.len());
        assert_eq!(containers.len(), 1);
    }

    #[test]
    fn test_multiple_packets_one_drain() {
        let mut demux = FrameDemux::new();
        let mut buf = outer(
            KIND_NOTIFY,
            false,
            &notify_body(GAME_SERVICE_UUID, SYNC_CONTAINER_METHOD_ID, b"one"),
        );
        buf.extend_from_slice(&outer(99, false, b"skipped kind"));
        buf.extend_from_slice(&outer(
            KIND_NOTIFY,
            false,
            &notify_body(GAME_SERVICE_UUID, SYNC_CONTAINER_METHOD_ID, b"two"),
        ));
        let (consumed, containers) = demux.drain(&buf).unwrap();
        assert_eq!(consumed, buf.len());
        assert_eq!(containers, vec![b"one".to_vec(), b"two".to_vec()]);
        assert_eq!(demux.stats().skipped_kinds, 1);
    }

    #[test]
    fn test_runt_size_is_protocol_error() {
        let mut demux = FrameDemux::new();
        let err = demux.drain(&[0, 0, 0, 5, 0, 2]).unwrap_err();
        assert!(matches!(err, ProtocolError::RuntPacket { size: 5 }));
    }

    #[test]
    fn test_oversize_is_protocol_error() {
        let mut demux = FrameDemux::new();
        let err = demux.drain(&[0x01, 0, 0, 0, 0, 2]).unwrap_err();
        assert!(matches!(err, ProtocolError::OversizedPacket { .. }));
    }

    #[test]
    fn test_wrong_service_uuid_discarded() {
        let mut demux = FrameDemux::new();
        let frame = outer(
            KIND_NOTIFY,
            false,
            &notify_body(0xDEAD_BEEF, SYNC_CONTAINER_METHOD_ID, b"zzz"),
        );
        let (_, containers) = demux.drain(&frame).unwrap();
        assert!(containers.is_empty());
    }

    #[test]
    fn test_wrong_method_id_discarded() {
        let mut demux = FrameDemux::new();
        let frame = outer(KIND_NOTIFY, false, &notify_body(GAME_SERVICE_UUID, 99, b"zzz"));
        let (_, containers) = demux.drain(&frame).unwrap();
        assert!(containers.is_empty());
        assert_eq!(demux.stats().containers, 0);
    }

    #[test]
    fn test_compressed_notify() {
        let mut demux = FrameDemux::new();
        let compressed = zstd::encode_all(&b"squeezed"[..], 3).unwrap();
        let frame = outer(
            KIND_NOTIFY,
            true,
            &notify_body(GAME_SERVICE_UUID, SYNC_CONTAINER_METHOD_ID, &compressed),
        );
        let (_, containers) = demux.drain(&frame).unwrap();
        assert_eq!(containers, vec![b"squeezed".to_vec()]);
    }

    #[test]
    fn test_bad_zstd_dropped_not_fatal() {
        let mut demux = FrameDemux::new();
        let frame = outer(
            KIND_NOTIFY,
            true,
            &notify_body(GAME_SERVICE_UUID, SYNC_CONTAINER_METHOD_ID, b"not zstd at all"),
        );
        let (consumed, containers) = demux.drain(&frame).unwrap();
        assert_eq!(consumed, frame.len());
        assert!(containers.is_empty());
        assert_eq!(demux.stats().dropped_messages, 1);
    }

    #[test]
    fn test_frame_down_recursion() {
        let mut demux = FrameDemux::new();
        let inner = outer(
            KIND_NOTIFY,
            false,
            &notify_body(GAME_SERVICE_UUID, SYNC_CONTAINER_METHOD_ID, b"nested"),
        );
        let mut fd_body = 7u32.to_be_bytes().to_vec(); // sequence id, ignored
        fd_body.extend_from_slice(&inner);
        let frame = outer(KIND_FRAME_DOWN, false, &fd_body);
        let (_, containers) = demux.drain(&frame).unwrap();
        assert_eq!(containers, vec![b"nested".to_vec()]);
    }

    #[test]
    fn test_compressed_frame_down_recursion() {
        let mut demux = FrameDemux::new();
        let inner = outer(
            KIND_NOTIFY,
            false,
            &notify_body(GAME_SERVICE_UUID, SYNC_CONTAINER_METHOD_ID, b"deep"),
        );
        let compressed = zstd::encode_all(inner.as_slice(), 3).unwrap();
        let mut fd_body = 1u32.to_be_bytes().to_vec();
        fd_body.extend_from_slice(&compressed);
        let frame = outer(KIND_FRAME_DOWN, true, &fd_body);
        let (_, containers) = demux.drain(&frame).unwrap();
        assert_eq!(containers, vec![b"deep".to_vec()]);
    }

    #[test]
    fn test_malformed_nested_drops_only_message() {
        let mut demux = FrameDemux::new();
        // Nested bytes with an absurd size field
        let mut fd_body = 1u32.to_be_bytes().to_vec();
        fd_body.extend_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF, 0, 0]);
        let mut buf = outer(KIND_FRAME_DOWN, false, &fd_body);
        // A good packet after the bad one still parses
        buf.extend_from_slice(&outer(
            KIND_NOTIFY,
            false,
            &notify_body(GAME_SERVICE_UUID, SYNC_CONTAINER_METHOD_ID, b"after"),
        ));
        let (consumed, containers) = demux.drain(&buf).unwrap();
        assert_eq!(consumed, buf.len());
        assert_eq!(containers, vec![b"after".to_vec()]);
    }

    #[test]
    fn test_nesting_depth_bounded() {
        let mut demux = FrameDemux::new();
        // Build a FrameDown chain deeper than the bound
        let mut frame = outer(
            KIND_NOTIFY,
            false,
            &notify_body(GAME_SERVICE_UUID, SYNC_CONTAINER_METHOD_ID, b"core"),
        );
        for _ in 0..(MAX_NESTING_DEPTH + 2) {
            let mut fd_body = 0u32.to_be_bytes().to_vec();
            fd_body.extend_from_slice(&frame);
            frame = outer(KIND_FRAME_DOWN, false, &fd_body);
        }
        let (_, containers) = demux.drain(&frame).unwrap();
        assert!(containers.is_empty());
        assert!(demux.stats().dropped_messages >= 1);
    }
}
