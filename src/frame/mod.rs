//! Application-layer frame demultiplexing.
//!
//! The reassembled byte stream is a sequence of size-prefixed outer
//! packets. Each packet carries a type tag whose high bit flags zstd
//! compression and whose low 15 bits select the message kind. Two kinds
//! matter: *Notify* (2) carries service calls, and *FrameDown* (6) nests
//! further outer packets. Everything else is skipped.
//!
//! ## Components
//!
//! - [`FrameDemux`] - the incremental outer/inner parse loop
//! - [`decompress_bounded`] - zstd payload decoding with a 1 MiB cap

mod compress;
mod demux;

pub use compress::{decompress_bounded, MAX_DECOMPRESSED_BYTES};
pub use demux::{FrameDemux, FrameStats, GAME_SERVICE_UUID, SYNC_CONTAINER_METHOD_ID};
