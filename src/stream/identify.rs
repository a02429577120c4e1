//! Game server identification.
//!
//! While no flow is selected, every TCP payload is inspected for one of two
//! fixed signatures the server emits early in a session. The first match
//! adopts that packet's source-side flow as the selected stream.

use std::time::Instant;

use tracing::info;

use super::FlowKey;

/// Offset of the service tag within a Signature A payload.
pub const SIGNATURE_A_OFFSET: usize = 15;

/// Service tag bytes for Signature A.
pub const SIGNATURE_A_TAG: [u8; 6] = [0x00, 0x63, 0x33, 0x53, 0x42, 0x00];

/// Exact payload length of a Signature B hello.
const SIGNATURE_B_LEN: usize = 0x62;

/// Signature B prefix at offset 0.
const SIGNATURE_B_PREFIX: [u8; 10] = [0x00, 0x00, 0x00, 0x62, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01];

/// Signature B marker at offset 14.
const SIGNATURE_B_MARKER: [u8; 6] = [0x00, 0x00, 0x00, 0x00, 0x0a, 0x4e];

/// Result of a successful server identification.
#[derive(Debug, Clone)]
pub struct Adoption {
    /// The server-to-client flow to lock onto.
    pub flow: FlowKey,
    /// First sequence number expected after the matched payload.
    pub next_seq: u32,
    pub adopted_at: Instant,
}

/// Does the payload carry the in-stream service tag?
fn matches_signature_a(payload: &[u8]) -> bool {
    payload.len() >= 21
        && payload[4] == 0x00
        && payload[SIGNATURE_A_OFFSET..SIGNATURE_A_OFFSET + 6] == SIGNATURE_A_TAG
}

/// Is the payload the fixed-size session hello?
fn matches_signature_b(payload: &[u8]) -> bool {
    payload.len() == SIGNATURE_B_LEN
        && payload[..10] == SIGNATURE_B_PREFIX
        && payload[14..20] == SIGNATURE_B_MARKER
}

/// Stateless matcher; the session owns the single selected flow.
#[derive(Debug, Default)]
pub struct ServerIdentifier;

impl ServerIdentifier {
    pub fn new() -> Self {
        Self
    }

    /// Inspect one payload. On a signature match, returns the adoption for
    /// the packet's source flow with `next_seq` past the matched bytes.
    pub fn inspect(&self, flow: FlowKey, seq: u32, payload: &[u8]) -> Option<Adoption> {
        if matches_signature_a(payload) || matches_signature_b(payload) {
            let next_seq = seq.wrapping_add(payload.len() as u32);
            info!(%flow, seq, len = payload.len(), "game server identified");
            return Some(Adoption {
                flow,
                next_seq,
                adopted_at: Instant::now(),
            });
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn flow() -> FlowKey {
        FlowKey {
            src_ip: Ipv4Addr::new(172, 65, 210, 7),
            src_port: 5010,
            dst_ip: Ipv4Addr::new(192, 168, 1, 2),
            dst_port: 51234,
        }
    }

    fn signature_a_payload() -> Vec<u8> {
        let mut payload = vec![0u8; 32];
        payload[0] = 0x00;
        payload[4] = 0x00;
        payload[15..21].copy_from_slice(&SIGNATURE_A_TAG);
        payload
    }

    fn signature_b_payload() -> Vec<u8> {
        let mut payload = vec![0u8; SIGNATURE_B_LEN];
        payload[..10].copy_from_slice(&SIGNATURE_B_PREFIX);
        payload[14..20].copy_from_slice(&SIGNATURE_B_MARKER);
        payload
    }

    #[test]
    fn test_signature_a_match() {
        let ident = ServerIdentifier::new();
        let adoption = ident.inspect(flow(), 1000, &signature_a_payload()).unwrap();
        assert_eq!(adoption.flow, flow());
        assert_eq!(adoption.next_seq, 1032);
    }

    #[test]
    fn test_signature_a_needs_zero_at_4() {
        let mut payload = signature_a_payload();
        payload[4] = 0x01;
        assert!(ServerIdentifier::new().inspect(flow(), 0, &payload).is_none());
    }

    #[test]
    fn test_signature_a_too_short() {
        let payload = signature_a_payload();
        assert!(ServerIdentifier::new().inspect(flow(), 0, &payload[..20]).is_none());
    }

    #[test]
    fn test_signature_b_match() {
        let adoption = ServerIdentifier::new()
            .inspect(flow(), 500, &signature_b_payload())
            .unwrap();
        assert_eq!(adoption.next_seq, 500 + 0x62);
    }

    #[test]
    fn test_signature_b_exact_length_required() {
        let mut payload = signature_b_payload();
        payload.push(0);
        assert!(ServerIdentifier::new().inspect(flow(), 0, &payload).is_none());
    }

    #[test]
    fn test_next_seq_wraps() {
        let payload = signature_a_payload();
        let adoption = ServerIdentifier::new()
            .inspect(flow(), u32::MAX - 10, &payload)
            .unwrap();
        assert_eq!(adoption.next_seq, 21); // 0xFFFF_FFF5 + 32, mod 2^32
    }

    #[test]
    fn test_plain_traffic_ignored() {
        let ident = ServerIdentifier::new();
        assert!(ident.inspect(flow(), 0, b"GET / HTTP/1.1\r\n\r\n").is_none());
        assert!(ident.inspect(flow(), 0, &[]).is_none());
    }
}
