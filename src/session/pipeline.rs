//! The pipeline thread: identification, reassembly, framing, decoding,
//! and module aggregation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossbeam_channel::{select, tick, Receiver, Sender};
use tracing::{info, warn};

use crate::capture::SegmentEvent;
use crate::decode::ContainerDecoder;
use crate::frame::FrameDemux;
use crate::module::ModuleInfo;
use crate::stream::{FlowReassembler, ServerIdentifier};

use super::Event;

/// Janitor cadence for the reassembly state.
const JANITOR_PERIOD: Duration = Duration::from_secs(10);

/// Pipeline wiring, handed to the pipeline thread at spawn.
pub(super) struct Pipeline {
    pub segments: Receiver<SegmentEvent>,
    pub events: Sender<Event>,
    /// Set to stop the capture loop once data lands.
    pub capture_shutdown: Arc<AtomicBool>,
    /// Captured modules, shared so the optimizer can snapshot them.
    pub captured: Arc<Mutex<HashMap<u64, ModuleInfo>>>,
    /// Signals the control loop that a batch of new modules landed.
    pub data_ready: Sender<()>,
}

impl Pipeline {
    /// Run until the segment channel closes.
    pub fn run(self) {
        let identifier = ServerIdentifier::new();
        let mut reassembler = FlowReassembler::new();
        let mut demux = FrameDemux::new();
        let mut decoder = ContainerDecoder::new();
        let mut containers_seen: u64 = 0;
        let janitor = tick(JANITOR_PERIOD);

        loop {
            select! {
                recv(self.segments) -> msg => {
                    let segment = match msg {
                        Ok(segment) => segment,
                        Err(_) => break,
                    };
                    self.handle_segment(
                        segment,
                        &identifier,
                        &mut reassembler,
                        &mut demux,
                        &mut decoder,
                        &mut containers_seen,
                    );
                }
                recv(janitor) -> _ => {
                    reassembler.sweep(Instant::now());
                }
            }
        }

        let stats = reassembler.stats();
        info!(
            segments = stats.segments,
            out_of_order = stats.out_of_order,
            resets = stats.flow_resets,
            containers = containers_seen,
            "pipeline stopped"
        );
    }

    fn handle_segment(
        &self,
        segment: SegmentEvent,
        identifier: &ServerIdentifier,
        reassembler: &mut FlowReassembler,
        demux: &mut FrameDemux,
        decoder: &mut ContainerDecoder,
        containers_seen: &mut u64,
    ) {
        let now = Instant::now();

        if reassembler.selected_flow().is_none() {
            if let Some(adoption) = identifier.inspect(segment.flow, segment.seq, &segment.payload)
            {
                reassembler.select(&adoption);
                self.progress("Connected to game server...");
            }
            return;
        }

        if !reassembler.accept(segment.flow, segment.seq, &segment.payload, now) {
            return;
        }

        let containers = match demux.drain(reassembler.queue()) {
            Ok((consumed, containers)) => {
                reassembler.consume(consumed);
                containers
            }
            Err(e) => {
                warn!(error = %e, "malformed frame stream");
                reassembler.reset("protocol error");
                return;
            }
        };
        if containers.is_empty() {
            return;
        }

        *containers_seen += containers.len() as u64;
        self.progress(format!("Found {} container packets", containers_seen));

        for payload in containers {
            self.decode_container(&payload, decoder);
        }
    }

    fn decode_container(&self, payload: &[u8], decoder: &mut ContainerDecoder) {
        self.progress("Parsing module data...");
        let modules = match decoder.decode(payload) {
            Ok(modules) => modules,
            Err(e) => {
                warn!(error = %e, "container decode failed");
                self.progress("No modules found in container");
                return;
            }
        };

        let new_count = {
            let mut captured = self.captured.lock().unwrap();
            let before = captured.len();
            for module in modules {
                captured.entry(module.uuid).or_insert(module);
            }
            captured.len() - before
        };

        if new_count == 0 {
            self.progress("No new modules found");
            return;
        }

        info!(new_count, "module batch captured");
        let _ = self.events.send(Event::DataCaptured);
        // First useful batch ends the capture; rescreens reuse the set
        self.capture_shutdown.store(true, Ordering::SeqCst);
        let _ = self.data_ready.send(());
    }

    fn progress(&self, message: impl Into<String>) {
        let _ = self.events.send(Event::Progress(message.into()));
    }
}
