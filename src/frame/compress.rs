//! Bounded zstd payload decompression.

use std::io::{Cursor, Read};

use crate::error::ProtocolError;

/// Maximum decompressed payload size.
pub const MAX_DECOMPRESSED_BYTES: usize = 1024 * 1024;

/// Decompress a zstd payload with a hard output bound.
///
/// Uses the streaming decoder so frames without a declared content size
/// (streaming-framed inputs) decode fine. Output past the bound is an
/// error; the caller drops the message.
pub fn decompress_bounded(data: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let mut decoder =
        zstd::stream::read::Decoder::new(Cursor::new(data)).map_err(|e| ProtocolError::Decompress {
            reason: e.to_string(),
        })?;

    let mut output = vec![0u8; MAX_DECOMPRESSED_BYTES + 1];
    let mut total = 0;
    while total < output.len() {
        match decoder.read(&mut output[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(ProtocolError::Decompress {
                    reason: e.to_string(),
                })
            }
        }
    }

    if total > MAX_DECOMPRESSED_BYTES {
        return Err(ProtocolError::Decompress {
            reason: format!("output exceeds {MAX_DECOMPRESSED_BYTES} byte bound"),
        });
    }
    output.truncate(total);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let plain = b"module inventory payload".to_vec();
        let compressed = zstd::encode_all(plain.as_slice(), 3).unwrap();
        assert_eq!(decompress_bounded(&compressed).unwrap(), plain);
    }

    #[test]
    fn test_garbage_is_error_not_panic() {
        assert!(decompress_bounded(b"definitely not zstd").is_err());
        assert!(decompress_bounded(&[]).is_err());
    }

    #[test]
    fn test_output_bound_enforced() {
        let plain = vec![0u8; MAX_DECOMPRESSED_BYTES + 1];
        let compressed = zstd::encode_all(plain.as_slice(), 3).unwrap();
        let err = decompress_bounded(&compressed).unwrap_err();
        assert!(matches!(err, ProtocolError::Decompress { .. }));
    }

    #[test]
    fn test_exactly_at_bound_ok() {
        let plain = vec![7u8; MAX_DECOMPRESSED_BYTES];
        let compressed = zstd::encode_all(plain.as_slice(), 3).unwrap();
        assert_eq!(decompress_bounded(&compressed).unwrap().len(), MAX_DECOMPRESSED_BYTES);
    }
}
