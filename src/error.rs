//! Error types for modsniff.
//!
//! This module provides structured error types for all modsniff operations:
//!
//! - [`enum@Error`] - Main error enum that wraps all error types
//! - [`CaptureError`] - Errors from the capture backend
//! - [`ProtocolError`] - Errors from application-layer frame parsing
//! - [`DecodeError`] - Errors from inventory container decoding
//! - [`OptimizeError`] - Errors from the combination optimizer
//!
//! All errors implement `std::error::Error` and can be converted to `anyhow::Error`.

use thiserror::Error;

/// Main error type for modsniff operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Error opening or driving the capture backend
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    /// Error during application-layer frame parsing
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Error decoding the inventory container
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Error during combination optimization
    #[error("Optimize error: {0}")]
    Optimize(#[from] OptimizeError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to the live capture backend.
#[derive(Error, Debug)]
pub enum CaptureError {
    /// The capture backend (libpcap/Npcap) is not usable on this host
    #[error("Capture backend unavailable: {reason}")]
    BackendUnavailable { reason: String },

    /// The requested interface does not exist
    #[error("Unknown interface: {name}")]
    UnknownInterface { name: String },

    /// Opening the interface failed (permissions, busy device)
    #[error("Failed to open {name}: {reason}")]
    OpenFailed { name: String, reason: String },
}

/// Errors related to game frame parsing.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Outer packet size field exceeds the protocol maximum
    #[error("Oversized outer packet: {size:#x} bytes (max {max:#x})")]
    OversizedPacket { size: u32, max: u32 },

    /// Outer packet size field is below the minimum frame size
    #[error("Runt outer packet: {size} bytes (min 6)")]
    RuntPacket { size: u32 },

    /// Frame body ended before a declared field
    #[error("Truncated frame: need {needed} bytes, have {have}")]
    TruncatedFrame { needed: usize, have: usize },

    /// Compressed payload failed to decompress
    #[error("Decompression failed: {reason}")]
    Decompress { reason: String },
}

/// Errors related to inventory container decoding.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Container bytes did not match any structured shape
    #[error("Malformed container: {reason}")]
    Malformed { reason: String },

    /// Container decoded but carried no module records
    #[error("Container held no modules")]
    NoModules,
}

/// Errors related to the combination optimizer.
#[derive(Error, Debug)]
pub enum OptimizeError {
    /// Working pool too small to form a single combination
    #[error("Insufficient modules: have {have}, need {need}")]
    InsufficientModules { have: usize, need: usize },

    /// Rescreen requested before any capture delivered data
    #[error("No captured module data")]
    NoCapturedData,

    /// Caller-supplied screening parameters failed validation
    #[error("Invalid parameters: {reason}")]
    InvalidParams { reason: String },
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
