//! Inventory container decoding.
//!
//! A container-sync payload is a schema-serialized character snapshot. The
//! decoder walks it with a minimal wire reader, extracts module records,
//! and falls back to progressively looser interpretations when the shape
//! drifts:
//!
//! 1. the outer container wrapper,
//! 2. the character data directly,
//! 3. the wrapper again past a 4-byte length prefix,
//! 4. a heuristic byte scan (last resort; structured paths always win).

mod container;
mod heuristic;
mod wire;

pub use container::ContainerDecoder;
pub use container::fixture;
pub use heuristic::scan_modules;
pub use wire::{Field, WireReader, WireValue};
