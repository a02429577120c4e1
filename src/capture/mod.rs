//! Live capture: interface enumeration and packet ingress.
//!
//! ## Components
//!
//! - [`NetworkInterface`] / [`list_interfaces`] - capture-capable interfaces
//!   with friendly classification and default selection
//! - [`CaptureConfig`] / [`run_capture`] - the live capture loop delivering
//!   TCP segments over a channel
//!
//! The backend is libpcap (Npcap on Windows). When it is unavailable the
//! enumerator degrades to an empty view instead of failing, so the control
//! surface stays responsive.

mod ingress;
mod interface;

pub use ingress::{run_capture, CaptureConfig, IngressStats, SegmentEvent};
pub use interface::{
    check_capture_backend, default_interface, list_interfaces, BackendStatus, FriendlyClass,
    InterfaceAddr, NetworkInterface,
};
