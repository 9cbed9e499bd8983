/*!
Compression codecs for object content.

The codec is the adapter seam of the transform engine: the pipeline never
talks to a compression library directly, so a different at-rest format only
means a new [`TransformCodec`] implementation. The shipped implementation is
gzip via `flate2`, matching the `.gz` form objects take at rest.
*/

use crate::{AtRestError, Result};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use std::io::{self, Read, Write};

/// Magic bytes every gzip stream starts with.
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Codec abstraction for the raw <-> compressed conversion pair.
///
/// Both directions are streaming and return the number of *raw* bytes that
/// crossed the codec (read on encode, written on decode), which is the
/// byte count a job reports. `magic()` exposes the format marker the engine
/// uses to guard against a mis-stated action without trusting the caller.
pub trait TransformCodec {
    /// Compress `input` into `output`, returning raw bytes consumed.
    fn encode(&self, input: &mut dyn Read, output: &mut dyn Write) -> Result<u64>;

    /// Decompress `input` into `output`, returning raw bytes produced.
    fn decode(&self, input: &mut dyn Read, output: &mut dyn Write) -> Result<u64>;

    /// Name of the at-rest format (recorded in object sidecar metadata).
    fn name(&self) -> &str;

    /// Leading byte signature identifying content already in at-rest form.
    fn magic(&self) -> &[u8];
}

/// Gzip codec
///
/// # Example
/// ```rust
/// use atrest_core::codec::{GzipCodec, TransformCodec};
///
/// let codec = GzipCodec::new();
/// let raw = b"GATTACA".repeat(64);
/// let mut compressed = Vec::new();
/// codec.encode(&mut raw.as_slice(), &mut compressed)?;
///
/// let mut restored = Vec::new();
/// codec.decode(&mut compressed.as_slice(), &mut restored)?;
/// assert_eq!(restored, raw);
/// # Ok::<(), atrest_core::AtRestError>(())
/// ```
#[derive(Debug, Clone)]
pub struct GzipCodec {
    level: Compression,
}

impl GzipCodec {
    /// Create a gzip codec at the default level (6)
    pub fn new() -> Self {
        Self {
            level: Compression::default(),
        }
    }

    /// Create a gzip codec at the given level (0-9)
    pub fn with_level(level: u32) -> Self {
        Self {
            level: Compression::new(level),
        }
    }

    /// Fast compression (level 1), the original deployment's choice for
    /// large sequencing files
    pub fn fast() -> Self {
        Self::with_level(1)
    }
}

impl Default for GzipCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformCodec for GzipCodec {
    fn encode(&self, input: &mut dyn Read, output: &mut dyn Write) -> Result<u64> {
        let mut encoder = GzEncoder::new(output, self.level);
        let raw_bytes = io::copy(input, &mut encoder)
            .map_err(|e| AtRestError::transform(format!("gzip encode failed: {e}")))?;
        encoder
            .finish()
            .map_err(|e| AtRestError::transform(format!("gzip finish failed: {e}")))?;
        Ok(raw_bytes)
    }

    fn decode(&self, input: &mut dyn Read, output: &mut dyn Write) -> Result<u64> {
        let mut decoder = GzDecoder::new(input);
        io::copy(&mut decoder, output)
            .map_err(|e| AtRestError::transform(format!("gzip decode failed: {e}")))
    }

    fn name(&self) -> &str {
        "gzip"
    }

    fn magic(&self) -> &[u8] {
        &GZIP_MAGIC
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_is_byte_exact() {
        let codec = GzipCodec::new();
        let raw = b"@read1\nACGTACGTACGT\n+\nIIIIIIIIIIII\n".repeat(50);

        let mut compressed = Vec::new();
        let consumed = codec.encode(&mut raw.as_slice(), &mut compressed).unwrap();
        assert_eq!(consumed, raw.len() as u64);
        assert!(compressed.len() < raw.len());
        assert!(compressed.starts_with(&GZIP_MAGIC));

        let mut restored = Vec::new();
        let produced = codec
            .decode(&mut compressed.as_slice(), &mut restored)
            .unwrap();
        assert_eq!(produced, raw.len() as u64);
        assert_eq!(restored, raw);
    }

    #[test]
    fn test_empty_input_roundtrip() {
        let codec = GzipCodec::new();
        let mut compressed = Vec::new();
        codec.encode(&mut [].as_slice(), &mut compressed).unwrap();
        assert!(compressed.starts_with(&GZIP_MAGIC));

        let mut restored = Vec::new();
        let produced = codec
            .decode(&mut compressed.as_slice(), &mut restored)
            .unwrap();
        assert_eq!(produced, 0);
        assert!(restored.is_empty());
    }

    #[test]
    fn test_levels_all_decode_to_same_bytes() {
        let raw = b"repetitive payload ".repeat(100);
        for level in [1, 6, 9] {
            let codec = GzipCodec::with_level(level);
            let mut compressed = Vec::new();
            codec.encode(&mut raw.as_slice(), &mut compressed).unwrap();
            let mut restored = Vec::new();
            codec
                .decode(&mut compressed.as_slice(), &mut restored)
                .unwrap();
            assert_eq!(restored, raw);
        }
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let codec = GzipCodec::new();
        let mut out = Vec::new();
        let result = codec.decode(&mut b"definitely not gzip".as_slice(), &mut out);
        assert!(matches!(result, Err(AtRestError::Transform(_))));
    }

    #[test]
    fn test_codec_name() {
        assert_eq!(GzipCodec::new().name(), "gzip");
    }
}
