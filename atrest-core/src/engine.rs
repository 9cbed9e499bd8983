//! Transform engine: applies a codec to a local file with a format guard.

use crate::codec::TransformCodec;
use crate::event::Action;
use crate::{AtRestError, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::debug;

/// Applies the raw <-> compressed conversion to staged local files.
///
/// The engine does not trust the caller's stated action: before transforming
/// it inspects the input's leading bytes against the codec's format marker
/// and refuses to compress content that is already in at-rest form or to
/// decompress content that is not. Redundant triggers (a post-open compress
/// firing twice in a row) therefore surface as [`AtRestError::FormatMismatch`]
/// instead of producing double-wrapped or corrupt output.
///
/// The input file is never mutated; exactly one output file is written.
pub struct TransformEngine<C: TransformCodec> {
    codec: C,
}

impl<C: TransformCodec> TransformEngine<C> {
    pub fn new(codec: C) -> Self {
        Self { codec }
    }

    /// Name of the at-rest format this engine produces.
    pub fn codec_name(&self) -> &str {
        self.codec.name()
    }

    /// Whether the file's leading bytes carry the codec's format marker.
    pub fn is_at_rest_form<P: AsRef<Path>>(&self, path: P) -> Result<bool> {
        let mut file = File::open(path.as_ref())?;
        let magic = self.codec.magic();
        let mut header = vec![0u8; magic.len()];
        let mut read = 0;
        while read < header.len() {
            match file.read(&mut header[read..])? {
                0 => return Ok(false), // shorter than the marker
                n => read += n,
            }
        }
        Ok(header == magic)
    }

    /// Run `action` over `input`, writing the converted bytes to `output`.
    ///
    /// Returns the raw-side byte count (bytes consumed on compress, bytes
    /// produced on decompress).
    pub fn apply<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        action: Action,
        input: P,
        output: Q,
    ) -> Result<u64> {
        let input = input.as_ref();
        let output = output.as_ref();

        let at_rest = self.is_at_rest_form(input)?;
        match action {
            Action::Compress if at_rest => {
                return Err(AtRestError::format_mismatch(format!(
                    "{} is already {}-compressed; refusing to compress again",
                    input.display(),
                    self.codec.name()
                )));
            }
            Action::Decompress if !at_rest => {
                return Err(AtRestError::format_mismatch(format!(
                    "{} carries no {} marker; refusing to decompress raw content",
                    input.display(),
                    self.codec.name()
                )));
            }
            _ => {}
        }

        let mut reader = BufReader::new(File::open(input)?);
        let mut writer = BufWriter::new(File::create(output)?);

        let bytes = match action {
            Action::Compress => self.codec.encode(&mut reader, &mut writer)?,
            Action::Decompress => self.codec.decode(&mut reader, &mut writer)?,
        };
        writer.flush()?;

        debug!(
            action = %action,
            input = %input.display(),
            output = %output.display(),
            raw_bytes = bytes,
            "transform complete"
        );
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::GzipCodec;
    use std::fs;
    use tempfile::TempDir;

    fn engine() -> TransformEngine<GzipCodec> {
        TransformEngine::new(GzipCodec::new())
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = TempDir::new().unwrap();
        let raw_path = dir.path().join("s1.fastq");
        let gz_path = dir.path().join("s1.fastq.stage.gz");
        let back_path = dir.path().join("s1.fastq.back");

        let payload = b"@r1\nACGT\n+\nIIII\n".repeat(100);
        fs::write(&raw_path, &payload).unwrap();

        let engine = engine();
        let consumed = engine
            .apply(Action::Compress, &raw_path, &gz_path)
            .unwrap();
        assert_eq!(consumed, payload.len() as u64);
        // input untouched
        assert_eq!(fs::read(&raw_path).unwrap(), payload);
        assert!(engine.is_at_rest_form(&gz_path).unwrap());

        let produced = engine
            .apply(Action::Decompress, &gz_path, &back_path)
            .unwrap();
        assert_eq!(produced, payload.len() as u64);
        assert_eq!(fs::read(&back_path).unwrap(), payload);
    }

    #[test]
    fn test_compress_guard_rejects_compressed_input() {
        let dir = TempDir::new().unwrap();
        let raw = dir.path().join("a.fastq");
        let gz = dir.path().join("a.gz");
        let gz2 = dir.path().join("a.gz.gz");
        fs::write(&raw, b"some raw sequencing data").unwrap();

        let engine = engine();
        engine.apply(Action::Compress, &raw, &gz).unwrap();

        let err = engine.apply(Action::Compress, &gz, &gz2).unwrap_err();
        assert!(matches!(err, AtRestError::FormatMismatch(_)));
        // guard fires before any output file is created
        assert!(!gz2.exists());
    }

    #[test]
    fn test_decompress_guard_rejects_raw_input() {
        let dir = TempDir::new().unwrap();
        let raw = dir.path().join("a.fastq");
        let out = dir.path().join("a.out");
        fs::write(&raw, b"plain text, no gzip marker").unwrap();

        let err = engine().apply(Action::Decompress, &raw, &out).unwrap_err();
        assert!(matches!(err, AtRestError::FormatMismatch(_)));
    }

    #[test]
    fn test_empty_file_is_not_at_rest_form() {
        let dir = TempDir::new().unwrap();
        let empty = dir.path().join("empty.fastq");
        fs::write(&empty, b"").unwrap();

        let engine = engine();
        assert!(!engine.is_at_rest_form(&empty).unwrap());
        // and compressing an empty file is legitimate
        let gz = dir.path().join("empty.gz");
        assert_eq!(engine.apply(Action::Compress, &empty, &gz).unwrap(), 0);
        assert!(engine.is_at_rest_form(&gz).unwrap());
    }

    #[test]
    fn test_missing_input_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = engine()
            .apply(
                Action::Compress,
                dir.path().join("nope.fastq"),
                dir.path().join("out"),
            )
            .unwrap_err();
        assert!(matches!(err, AtRestError::Io(_)));
    }
}
