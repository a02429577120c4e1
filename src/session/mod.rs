//! Session control: commands in, events out.
//!
//! The core exposes a typed command/event bus over bounded channels. A
//! [`SessionHandle`] validates caller input, forwards commands to the
//! control thread, and surfaces [`Event`]s. The control thread owns the
//! worker lifecycle:
//!
//! - *capture thread* - the live capture loop (C2)
//! - *pipeline thread* - identification, reassembly, framing, decoding,
//!   aggregation, and the 10 s janitor tick
//! - *optimizer worker* - one per screening run, serialized
//!
//! The captured-module set is written only by the pipeline thread; the
//! optimizer reads a snapshot, so a rescreen works after capture stops.

mod pipeline;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, select, Receiver, Sender};
use tracing::{info, warn};

use crate::capture::{self, CaptureConfig};
use crate::error::{CaptureError, OptimizeError, Result};
use crate::module::attrs::all_attr_names;
use crate::module::{ModuleInfo, RankedSolution};
use crate::optimize::{optimize, GaParams, ScreenParams};

use pipeline::Pipeline;

/// Capacity of the segment, command, and event channels.
const CHANNEL_CAPACITY: usize = 1024;

/// Ignore rescreen commands arriving closer together than this.
const RESCREEN_DEBOUNCE: Duration = Duration::from_millis(300);

/// Parameters for `startMonitoring`.
#[derive(Debug, Clone)]
pub struct MonitorParams {
    pub interface: String,
    pub screen: ScreenParams,
}

/// Commands accepted by the control thread.
#[derive(Debug)]
enum Command {
    Start(MonitorParams),
    Stop,
    Rescreen(ScreenParams),
}

/// Events emitted to the shell.
#[derive(Debug, Clone)]
pub enum Event {
    /// A non-empty batch of new modules was captured.
    DataCaptured,
    /// Human-readable status line.
    Progress(String),
    /// Ranked solutions for one optimizer invocation, emitted at most once
    /// per invocation.
    ResultsReady(Vec<RankedSolution>),
    /// Monitoring wound down, by request or after data capture.
    MonitoringStopped,
}

/// The fixed, ordered attribute listing (`listAttributes`).
pub fn list_attributes() -> Vec<&'static str> {
    all_attr_names()
}

/// Validate caller-supplied screening parameters.
fn validate_screen(params: &ScreenParams) -> Result<()> {
    if params.prioritized_attrs.len() > 6 {
        return Err(OptimizeError::InvalidParams {
            reason: format!(
                "at most 6 prioritized attributes, got {}",
                params.prioritized_attrs.len()
            ),
        }
        .into());
    }
    let known = all_attr_names();
    for attr in params.attributes.iter().chain(params.prioritized_attrs.iter()) {
        if !known.contains(&attr.as_str()) {
            return Err(OptimizeError::InvalidParams {
                reason: format!("unknown attribute: {attr}"),
            }
            .into());
        }
    }
    Ok(())
}

/// Handle to a running session.
///
/// Dropping the handle shuts the control thread down.
pub struct SessionHandle {
    commands: Sender<Command>,
    events: Receiver<Event>,
    captured: Arc<Mutex<HashMap<u64, ModuleInfo>>>,
    control: Option<JoinHandle<()>>,
}

impl SessionHandle {
    /// Spawn a session with default GA parameters.
    pub fn spawn() -> Self {
        Self::spawn_with(GaParams::default())
    }

    /// Spawn a session with explicit GA parameters (tests shrink them).
    pub fn spawn_with(ga_params: GaParams) -> Self {
        let (command_tx, command_rx) = bounded(CHANNEL_CAPACITY);
        let (event_tx, event_rx) = bounded(CHANNEL_CAPACITY);
        let captured = Arc::new(Mutex::new(HashMap::new()));

        let control_captured = Arc::clone(&captured);
        let control = thread::Builder::new()
            .name("modsniff-control".to_string())
            .spawn(move || {
                Control::new(command_rx, event_tx, control_captured, ga_params).run();
            })
            .expect("spawning the control thread");

        Self {
            commands: command_tx,
            events: event_rx,
            captured,
            control: Some(control),
        }
    }

    /// The event stream. Receive on this to observe progress and results.
    pub fn events(&self) -> &Receiver<Event> {
        &self.events
    }

    /// Begin monitoring an interface. Validates parameters and interface
    /// existence synchronously; capture errors after that arrive as
    /// progress events.
    pub fn start_monitoring(&self, params: MonitorParams) -> Result<()> {
        validate_screen(&params.screen)?;
        let interfaces = capture::list_interfaces();
        if interfaces.is_empty() {
            return Err(CaptureError::BackendUnavailable {
                reason: "no capture-capable interfaces".to_string(),
            }
            .into());
        }
        if !interfaces.iter().any(|i| i.name == params.interface) {
            return Err(CaptureError::UnknownInterface {
                name: params.interface.clone(),
            }
            .into());
        }
        self.send(Command::Start(params))
    }

    /// Stop monitoring. The captured-module set is preserved.
    pub fn stop_monitoring(&self) -> Result<()> {
        self.send(Command::Stop)
    }

    /// Re-run the optimizer over the captured set with new parameters.
    pub fn rescreen(&self, params: ScreenParams) -> Result<()> {
        validate_screen(&params)?;
        if !self.has_captured_data() {
            return Err(OptimizeError::NoCapturedData.into());
        }
        self.send(Command::Rescreen(params))
    }

    /// Has any capture delivered modules this session?
    pub fn has_captured_data(&self) -> bool {
        !self.captured.lock().unwrap().is_empty()
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| CaptureError::BackendUnavailable {
                reason: "session control thread is gone".to_string(),
            })?;
        Ok(())
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        // Closing the command channel ends the control loop
        let (dead_tx, _) = bounded(1);
        self.commands = dead_tx;
        if let Some(handle) = self.control.take() {
            let _ = handle.join();
        }
    }
}

/// A running capture+pipeline pair.
struct Monitor {
    shutdown: Arc<AtomicBool>,
    capture: JoinHandle<()>,
    pipeline: JoinHandle<()>,
}

impl Monitor {
    /// Stop both threads and wait for them.
    fn stop(self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let _ = self.capture.join();
        let _ = self.pipeline.join();
    }
}

/// The control thread.
struct Control {
    commands: Receiver<Command>,
    events: Sender<Event>,
    captured: Arc<Mutex<HashMap<u64, ModuleInfo>>>,
    ga_params: GaParams,
    data_ready_tx: Sender<()>,
    data_ready_rx: Receiver<()>,
    monitor: Option<Monitor>,
    optimizer: Option<JoinHandle<()>>,
    screen: ScreenParams,
    last_rescreen: Option<Instant>,
}

impl Control {
    fn new(
        commands: Receiver<Command>,
        events: Sender<Event>,
        captured: Arc<Mutex<HashMap<u64, ModuleInfo>>>,
        ga_params: GaParams,
    ) -> Self {
        let (data_ready_tx, data_ready_rx) = bounded(16);
        Self {
            commands,
            events,
            captured,
            ga_params,
            data_ready_tx,
            data_ready_rx,
            monitor: None,
            optimizer: None,
            screen: ScreenParams::default(),
            last_rescreen: None,
        }
    }

    fn run(mut self) {
        let commands = self.commands.clone();
        let data_ready = self.data_ready_rx.clone();
        loop {
            select! {
                recv(commands) -> msg => match msg {
                    Ok(Command::Start(params)) => self.start(params),
                    Ok(Command::Stop) => self.stop_monitor(),
                    Ok(Command::Rescreen(params)) => self.rescreen(params),
                    Err(_) => break,
                },
                recv(data_ready) -> msg => {
                    if msg.is_ok() {
                        self.on_data_ready();
                    }
                }
            }
        }

        if let Some(monitor) = self.monitor.take() {
            monitor.stop();
        }
        if let Some(optimizer) = self.optimizer.take() {
            let _ = optimizer.join();
        }
        info!("session control stopped");
    }

    fn progress(&self, message: impl Into<String>) {
        let _ = self.events.send(Event::Progress(message.into()));
    }

    /// Start (or restart) monitoring. The captured set resets here and
    /// only here.
    fn start(&mut self, params: MonitorParams) {
        if let Some(monitor) = self.monitor.take() {
            monitor.stop();
        }
        self.captured.lock().unwrap().clear();
        self.screen = params.screen;

        let shutdown = Arc::new(AtomicBool::new(false));
        let (segment_tx, segment_rx) = bounded(CHANNEL_CAPACITY);

        let capture_shutdown = Arc::clone(&shutdown);
        let capture_events = self.events.clone();
        let config = CaptureConfig::new(params.interface);
        let capture = thread::Builder::new()
            .name("modsniff-capture".to_string())
            .spawn(move || {
                if let Err(e) = capture::run_capture(&config, segment_tx, capture_shutdown) {
                    warn!(error = %e, "capture failed");
                    let _ = capture_events.send(Event::Progress(format!("Capture error: {e}")));
                }
            })
            .expect("spawning the capture thread");

        let pipeline = Pipeline {
            segments: segment_rx,
            events: self.events.clone(),
            capture_shutdown: Arc::clone(&shutdown),
            captured: Arc::clone(&self.captured),
            data_ready: self.data_ready_tx.clone(),
        };
        let pipeline = thread::Builder::new()
            .name("modsniff-pipeline".to_string())
            .spawn(move || pipeline.run())
            .expect("spawning the pipeline thread");

        self.monitor = Some(Monitor {
            shutdown,
            capture,
            pipeline,
        });
        self.progress("Listening for game traffic...");
    }

    /// Orderly stop on request; preserves captured modules. A stop with no
    /// monitor running is a no-op.
    fn stop_monitor(&mut self) {
        if let Some(monitor) = self.monitor.take() {
            monitor.stop();
            let _ = self.events.send(Event::MonitoringStopped);
        }
    }

    /// First non-empty batch: capture is winding down, run the optimizer.
    fn on_data_ready(&mut self) {
        if let Some(monitor) = self.monitor.take() {
            monitor.stop();
            let _ = self.events.send(Event::MonitoringStopped);
        }
        let screen = self.screen.clone();
        self.spawn_optimizer(screen);
    }

    /// Rescreen with fresh parameters, debounced at 300 ms.
    fn rescreen(&mut self, params: ScreenParams) {
        let now = Instant::now();
        if let Some(last) = self.last_rescreen {
            if now.duration_since(last) < RESCREEN_DEBOUNCE {
                return;
            }
        }
        self.last_rescreen = Some(now);
        self.screen = params.clone();
        self.spawn_optimizer(params);
    }

    /// Run the optimizer on a snapshot of the captured set. A prior run
    /// still in flight is waited out first, so each invocation emits at
    /// most one `ResultsReady`.
    fn spawn_optimizer(&mut self, screen: ScreenParams) {
        if let Some(previous) = self.optimizer.take() {
            let _ = previous.join();
        }

        let pool: Vec<ModuleInfo> = self.captured.lock().unwrap().values().cloned().collect();
        let events = self.events.clone();
        let ga_params = self.ga_params.clone();

        let handle = thread::Builder::new()
            .name("modsniff-optimizer".to_string())
            .spawn(move || {
                let progress = {
                    let events = events.clone();
                    move |message: String| {
                        let _ = events.send(Event::Progress(message));
                    }
                };
                match optimize(&pool, &screen, &ga_params, None, progress) {
                    Ok(solutions) => {
                        let _ = events.send(Event::ResultsReady(solutions));
                    }
                    Err(e) => {
                        let _ = events.send(Event::Progress(format!("Optimization aborted: {e}")));
                    }
                }
            })
            .expect("spawning the optimizer thread");
        self.optimizer = Some(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn screen(prioritized: &[&str]) -> ScreenParams {
        ScreenParams {
            prioritized_attrs: prioritized.iter().map(|s| s.to_string()).collect(),
            ..ScreenParams::default()
        }
    }

    #[test]
    fn test_list_attributes_fixed() {
        let attrs = list_attributes();
        assert_eq!(attrs.len(), 21);
        assert_eq!(attrs[0], "Strength Boost");
    }

    #[test]
    fn test_validate_rejects_seven_priorities() {
        let params = screen(&[
            "Strength Boost",
            "Agility Boost",
            "Intellect Boost",
            "Special Attack",
            "Elite Strike",
            "Attack SPD",
            "Cast Focus",
        ]);
        assert!(validate_screen(&params).is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_attr() {
        assert!(validate_screen(&screen(&["Lifesteal"])).is_err());
        assert!(validate_screen(&screen(&["Special Attack"])).is_ok());
    }

    #[test]
    fn test_validate_checks_attribute_filter_too() {
        let params = ScreenParams {
            attributes: vec!["Bogus".to_string()],
            ..ScreenParams::default()
        };
        assert!(validate_screen(&params).is_err());
    }

    #[test]
    fn test_rescreen_without_data_errors() {
        let handle = SessionHandle::spawn_with(GaParams {
            population_size: 10,
            generations: 2,
            num_campaigns: 1,
            ..GaParams::default()
        });
        let err = handle.rescreen(ScreenParams::default()).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Optimize(OptimizeError::NoCapturedData)
        ));
    }

    #[test]
    fn test_handle_drop_shuts_down() {
        let handle = SessionHandle::spawn_with(GaParams {
            population_size: 10,
            generations: 2,
            num_campaigns: 1,
            ..GaParams::default()
        });
        drop(handle);
        // Reaching here without hanging is the assertion
    }
}
