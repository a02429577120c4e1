//! Single-flow TCP reassembly with bounded memory.
//!
//! Out-of-order segments are cached by sequence number and drained greedily
//! once the expected sequence arrives. All sequence arithmetic is modulo
//! 2^32. Two hard caps bound memory: 1000 cached segments (LRU-evicted by
//! last access) and a 10 MiB in-order byte queue (overflow drops the queue,
//! an unrecoverable desync that is survived, not propagated).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::identify::Adoption;
use super::FlowKey;

/// Maximum number of out-of-order segments held at once.
const MAX_CACHED_SEGMENTS: usize = 1000;

/// Maximum size of the reassembled in-order byte queue.
const MAX_QUEUE_BYTES: usize = 10 * 1024 * 1024;

/// Cached segments idle longer than this are evicted by the janitor.
const SEGMENT_TTL: Duration = Duration::from_secs(60);

/// A queue idle longer than this resets the selected flow.
const IDLE_RESET: Duration = Duration::from_secs(30);

/// Largest plausible outer frame size, used to sanity-check a first segment
/// before adopting its sequence number.
const MAX_OUTER_SIZE: u32 = 0x0F_FFFF;

/// One out-of-order segment, keyed by the sequence of its first byte.
#[derive(Debug, Clone)]
pub struct SegmentCacheEntry {
    pub payload: Vec<u8>,
    pub last_access: Instant,
}

/// Reassembly counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReassemblyStats {
    pub segments: u64,
    pub out_of_order: u64,
    pub stale_drops: u64,
    pub lru_evictions: u64,
    pub ttl_evictions: u64,
    pub queue_overflows: u64,
    pub flow_resets: u64,
}

/// Result of one janitor sweep.
#[derive(Debug, Clone, Copy, Default)]
pub struct SweepOutcome {
    pub evicted: usize,
    pub flow_reset: bool,
}

/// Reassembles the single selected server-to-client flow.
#[derive(Debug)]
pub struct FlowReassembler {
    flow: Option<FlowKey>,
    expected_seq: Option<u32>,
    cache: HashMap<u32, SegmentCacheEntry>,
    queue: Vec<u8>,
    last_activity: Instant,
    stats: ReassemblyStats,
}

impl FlowReassembler {
    pub fn new() -> Self {
        Self {
            flow: None,
            expected_seq: None,
            cache: HashMap::new(),
            queue: Vec::new(),
            last_activity: Instant::now(),
            stats: ReassemblyStats::default(),
        }
    }

    /// Lock onto a flow identified by the server matcher. Clears any state
    /// left over from a previous selection.
    pub fn select(&mut self, adoption: &Adoption) {
        self.flow = Some(adoption.flow);
        self.expected_seq = Some(adoption.next_seq);
        self.cache.clear();
        self.queue.clear();
        self.last_activity = adoption.adopted_at;
    }

    pub fn selected_flow(&self) -> Option<FlowKey> {
        self.flow
    }

    pub fn expected_seq(&self) -> Option<u32> {
        self.expected_seq
    }

    pub fn stats(&self) -> ReassemblyStats {
        self.stats
    }

    /// In-order bytes awaiting frame parsing.
    pub fn queue(&self) -> &[u8] {
        &self.queue
    }

    /// Drop `bytes` from the front of the queue after a successful parse.
    pub fn consume(&mut self, bytes: usize) {
        if bytes > 0 && bytes <= self.queue.len() {
            self.queue.drain(..bytes);
        }
    }

    /// Reset the selected flow and all buffered state.
    pub fn reset(&mut self, reason: &str) {
        if self.flow.is_some() {
            warn!(reason, "resetting selected flow");
            self.stats.flow_resets += 1;
        }
        self.flow = None;
        self.expected_seq = None;
        self.cache.clear();
        self.queue.clear();
    }

    /// Accept one segment on the selected flow.
    ///
    /// Returns `true` when the in-order queue grew, i.e. the frame parser
    /// should run. Segments for other flows are ignored.
    pub fn accept(&mut self, flow: FlowKey, seq: u32, payload: &[u8], now: Instant) -> bool {
        if self.flow != Some(flow) || payload.is_empty() {
            return false;
        }
        self.stats.segments += 1;
        self.last_activity = now;

        let expected = match self.expected_seq {
            Some(expected) => expected,
            None => {
                // Mid-stream adoption: only trust a segment that starts on
                // a plausible frame boundary.
                if !starts_like_outer_frame(payload) {
                    self.stats.stale_drops += 1;
                    return false;
                }
                self.expected_seq = Some(seq);
                seq
            }
        };

        if !accepts_sequence(expected, seq) {
            self.stats.stale_drops += 1;
            return false;
        }

        if seq == expected {
            return self.append_and_drain(payload.to_vec(), now);
        }

        self.stats.out_of_order += 1;
        if self.cache.len() >= MAX_CACHED_SEGMENTS {
            self.evict_lru();
        }
        self.cache.insert(
            seq,
            SegmentCacheEntry {
                payload: payload.to_vec(),
                last_access: now,
            },
        );
        false
    }

    /// Append in-order data, then drain any cached continuation segments.
    fn append_and_drain(&mut self, payload: Vec<u8>, _now: Instant) -> bool {
        let mut grew = false;
        let mut next = match self.expected_seq {
            Some(e) => e,
            None => return false,
        };
        let mut pending = Some(payload);

        loop {
            let data = match pending.take() {
                Some(data) => data,
                None => match self.cache.remove(&next) {
                    Some(entry) => entry.payload,
                    None => break,
                },
            };

            if self.queue.len() + data.len() > MAX_QUEUE_BYTES {
                // Unrecoverable desync: drop everything buffered and keep
                // listening from here.
                warn!(queued = self.queue.len(), "byte queue overflow, dropping buffered stream");
                self.stats.queue_overflows += 1;
                self.queue.clear();
                self.cache.clear();
                self.expected_seq = Some(next.wrapping_add(data.len() as u32));
                return false;
            }

            self.queue.extend_from_slice(&data);
            next = next.wrapping_add(data.len() as u32);
            grew = true;
        }

        self.expected_seq = Some(next);
        if grew {
            debug!(queued = self.queue.len(), next_seq = next, "drained in-order bytes");
        }
        grew
    }

    /// Evict the cache entry with the oldest `last_access`.
    fn evict_lru(&mut self) {
        if let Some((&seq, _)) = self
            .cache
            .iter()
            .min_by_key(|(_, entry)| entry.last_access)
        {
            self.cache.remove(&seq);
            self.stats.lru_evictions += 1;
        }
    }

    /// Periodic janitor entry: evict stale cache entries and reset a flow
    /// whose queue has gone idle.
    pub fn sweep(&mut self, now: Instant) -> SweepOutcome {
        let mut outcome = SweepOutcome::default();

        let before = self.cache.len();
        self.cache
            .retain(|_, entry| now.duration_since(entry.last_access) <= SEGMENT_TTL);
        outcome.evicted = before - self.cache.len();
        self.stats.ttl_evictions += outcome.evicted as u64;

        if self.flow.is_some() && now.duration_since(self.last_activity) > IDLE_RESET {
            warn!("cannot capture next packet, flow idle too long");
            self.reset("idle timeout");
            outcome.flow_reset = true;
        }
        outcome
    }

    #[cfg(test)]
    fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

impl Default for FlowReassembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Accept `seq` at or after `expected` in unsigned order, or across a
/// plausible 2^32 wrap (`expected` above 2^31, `seq` below it).
fn accepts_sequence(expected: u32, seq: u32) -> bool {
    seq >= expected || (expected > u32::MAX / 2 + 1 && seq < u32::MAX / 2 + 1)
}

/// Do the first four bytes look like a valid outer frame size?
fn starts_like_outer_frame(payload: &[u8]) -> bool {
    if payload.len() < 4 {
        return false;
    }
    let size = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
    (6..=MAX_OUTER_SIZE).contains(&size)
}
