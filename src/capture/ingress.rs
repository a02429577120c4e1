//! Live packet ingress.
//!
//! Opens one interface with a `tcp` filter and delivers every non-empty
//! TCP payload as a [`SegmentEvent`] over a bounded channel. Per-frame
//! parse failures are counted, never fatal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::Sender;
use etherparse::{NetSlice, SlicedPacket, TransportSlice};
use tracing::{debug, info, warn};

use crate::error::{CaptureError, Result};
use crate::stream::FlowKey;

/// Kernel ring buffer size.
const BUFFER_BYTES: i32 = 10 * 1024 * 1024;

/// Per-frame capture length.
const SNAPLEN: i32 = 65_535;

/// Read timeout so the loop can observe shutdown.
const READ_TIMEOUT_MS: i32 = 500;

/// Capture loop configuration.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Kernel-level device name.
    pub interface: String,
    /// BPF filter program.
    pub filter: String,
}

impl CaptureConfig {
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            filter: "tcp".to_string(),
        }
    }
}

/// One TCP segment as delivered to the pipeline.
#[derive(Debug, Clone)]
pub struct SegmentEvent {
    pub flow: FlowKey,
    pub seq: u32,
    pub payload: Vec<u8>,
}

/// Ingress counters. Parse errors are expected background noise (non-IPv4
/// frames, truncated captures) and only surface here.
#[derive(Debug, Clone, Copy, Default)]
pub struct IngressStats {
    pub frames: u64,
    pub delivered: u64,
    pub empty_payloads: u64,
    pub parse_errors: u64,
}

/// Decode one link-layer frame down to `(flow, seq, payload)`.
///
/// Returns `None` for anything that is not IPv4/TCP with a payload.
fn decode_frame(data: &[u8]) -> Option<(FlowKey, u32, &[u8])> {
    let sliced = SlicedPacket::from_ethernet(data).ok()?;

    let (src_ip, dst_ip) = match sliced.net.as_ref()? {
        NetSlice::Ipv4(ip) => (ip.header().source_addr(), ip.header().destination_addr()),
        _ => return None,
    };

    let tcp = match sliced.transport.as_ref()? {
        TransportSlice::Tcp(tcp) => tcp,
        _ => return None,
    };

    let flow = FlowKey {
        src_ip,
        src_port: tcp.source_port(),
        dst_ip,
        dst_port: tcp.destination_port(),
    };
    Some((flow, tcp.sequence_number(), tcp.payload()))
}

/// Run the capture loop until `shutdown` is set or the receiver drops.
///
/// Blocks the calling thread; callers spawn it on the dedicated capture
/// thread. Returns the final counters on orderly shutdown.
pub fn run_capture(
    config: &CaptureConfig,
    tx: Sender<SegmentEvent>,
    shutdown: Arc<AtomicBool>,
) -> Result<IngressStats> {
    let devices = pcap::Device::list().map_err(|e| CaptureError::BackendUnavailable {
        reason: e.to_string(),
    })?;
    let device = devices
        .into_iter()
        .find(|d| d.name == config.interface)
        .ok_or_else(|| CaptureError::UnknownInterface {
            name: config.interface.clone(),
        })?;

    let mut cap = pcap::Capture::from_device(device)
        .map_err(|e| CaptureError::OpenFailed {
            name: config.interface.clone(),
            reason: e.to_string(),
        })?
        .promisc(true)
        .snaplen(SNAPLEN)
        .buffer_size(BUFFER_BYTES)
        .timeout(READ_TIMEOUT_MS)
        .open()
        .map_err(|e| CaptureError::OpenFailed {
            name: config.interface.clone(),
            reason: e.to_string(),
        })?;

    cap.filter(&config.filter, true)
        .map_err(|e| CaptureError::OpenFailed {
            name: config.interface.clone(),
            reason: format!("filter rejected: {e}"),
        })?;

    info!(interface = %config.interface, filter = %config.filter, "capture started");

    let mut stats = IngressStats::default();
    while !shutdown.load(Ordering::SeqCst) {
        let packet = match cap.next_packet() {
            Ok(packet) => packet,
            // Timeout just re-checks the shutdown flag
            Err(pcap::Error::TimeoutExpired) => continue,
            Err(e) => {
                warn!(error = %e, "capture read failed, stopping");
                break;
            }
        };

        stats.frames += 1;
        let (flow, seq, payload) = match decode_frame(packet.data) {
            Some(decoded) => decoded,
            None => {
                stats.parse_errors += 1;
                continue;
            }
        };
        if payload.is_empty() {
            stats.empty_payloads += 1;
            continue;
        }

        stats.delivered += 1;
        let event = SegmentEvent {
            flow,
            seq,
            payload: payload.to_vec(),
        };
        if tx.send(event).is_err() {
            debug!("pipeline receiver dropped, stopping capture");
            break;
        }
    }

    info!(
        frames = stats.frames,
        delivered = stats.delivered,
        parse_errors = stats.parse_errors,
        "capture stopped"
    );
    Ok(stats)
}
