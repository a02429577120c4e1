//! # modsniff
//!
//! Passive, live network observer and module-combination optimizer for a
//! specific online game. The crate sniffs TCP traffic on one interface,
//! reassembles the game-server-to-client byte stream, peels the nested
//! size-prefixed framing (zstd-compressed where flagged), decodes the
//! inventory container into module records, and feeds them to a parallel
//! genetic-algorithm optimizer that ranks four-module combinations.
//!
//! The observer never connects to, authenticates with, or writes to the
//! game; it only reads cleartext frames off the wire.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use modsniff::session::{Event, MonitorParams, SessionHandle};
//! use modsniff::optimize::ScreenParams;
//!
//! let session = SessionHandle::spawn();
//! session.start_monitoring(MonitorParams {
//!     interface: "eth0".to_string(),
//!     screen: ScreenParams::default(),
//! }).unwrap();
//!
//! for event in session.events().iter() {
//!     match event {
//!         Event::ResultsReady(solutions) => {
//!             println!("{} solutions", solutions.len());
//!             break;
//!         }
//!         Event::Progress(message) => println!("{message}"),
//!         _ => {}
//!     }
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------------+
//! |                            modsniff                                |
//! +--------------------------------------------------------------------+
//! |  capture/   - interface enumeration, live TCP ingress              |
//! |  stream/    - server identification, single-flow reassembly        |
//! |  frame/     - outer/inner frame demux, bounded zstd                |
//! |  decode/    - container schema decoding, heuristic fallback        |
//! |  module/    - module records, attributes, power tables, solutions  |
//! |  optimize/  - pre-filter, GA campaigns, ranking                    |
//! |  session/   - command/event bus, worker lifecycle                  |
//! |  error/     - error types                                         |
//! +--------------------------------------------------------------------+
//! ```
//!
//! Data flows leaves-first: raw frames -> reassembled bytes -> framed
//! messages -> decoded modules -> candidate pool -> ranked solutions.

pub mod capture;
pub mod decode;
pub mod error;
pub mod frame;
pub mod module;
pub mod optimize;
pub mod session;
pub mod stream;

// Re-export commonly used types at crate root for convenience
pub use capture::{
    check_capture_backend, default_interface, list_interfaces, BackendStatus, CaptureConfig,
    FriendlyClass, NetworkInterface,
};
pub use decode::ContainerDecoder;
pub use error::{CaptureError, DecodeError, Error, OptimizeError, ProtocolError, Result};
pub use frame::{FrameDemux, GAME_SERVICE_UUID, SYNC_CONTAINER_METHOD_ID};
pub use module::{ModuleCategory, ModuleInfo, ModulePart, ModuleSolution, RankedSolution, TargetCategory};
pub use optimize::{optimize, GaParams, ScreenParams};
pub use session::{list_attributes, Event, MonitorParams, SessionHandle};
pub use stream::{FlowKey, FlowReassembler, ServerIdentifier};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
