/*!
Error types for the atrest core pipeline.
*/

use thiserror::Error;

/// Result type used throughout the atrest core.
pub type Result<T> = std::result::Result<T, AtRestError>;

/// Errors that can occur while running a transform job.
///
/// Every variant is recovered at the job boundary: the pipeline converts it
/// into a terminal [`JobOutcome`](crate::pipeline::JobOutcome) and logs it,
/// so a failing job never takes down the trigger layer that invoked it.
#[derive(Error, Debug)]
pub enum AtRestError {
    /// I/O errors during local file operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors (lock records, sidecars)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Missing or invalid options, unknown event kinds
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The object lock could not be acquired within the bounded wait
    #[error("timed out after {waited_ms} ms waiting for object lock on {path}")]
    LockTimeout { path: String, waited_ms: u64 },

    /// Fetching from or replacing into the object store failed
    #[error("remote store error: {0}")]
    RemoteIo(String),

    /// The codec failed or produced invalid output
    #[error("transform failed: {0}")]
    Transform(String),

    /// The requested action contradicts the content's format marker
    #[error("format mismatch: {0}")]
    FormatMismatch(String),
}

impl AtRestError {
    /// Create a new configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a new remote store error
    pub fn remote_io<S: Into<String>>(msg: S) -> Self {
        Self::RemoteIo(msg.into())
    }

    /// Create a new transform error
    pub fn transform<S: Into<String>>(msg: S) -> Self {
        Self::Transform(msg.into())
    }

    /// Create a new format mismatch error
    pub fn format_mismatch<S: Into<String>>(msg: S) -> Self {
        Self::FormatMismatch(msg.into())
    }

    /// Process exit status for this failure category.
    ///
    /// The trigger layer only sees the exit status, so each category gets a
    /// distinct code: 2 configuration, 3 lock timeout, 4 remote I/O,
    /// 5 transform, 6 format mismatch. Local `Io` failures surface as 4 and
    /// `Json` (corrupt lock record or sidecar) as 5.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) => 2,
            Self::LockTimeout { .. } => 3,
            Self::RemoteIo(_) | Self::Io(_) => 4,
            Self::Transform(_) | Self::Json(_) => 5,
            Self::FormatMismatch(_) => 6,
        }
    }

    /// Whether the caller may safely retry the same invocation.
    ///
    /// The remote object is only ever mutated by the atomic replace, so lock
    /// timeouts and store I/O failures are idempotent to retry. Transform and
    /// format failures indicate corrupt input or a mis-wired resolver and
    /// must be surfaced to an operator instead.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::LockTimeout { .. } | Self::RemoteIo(_) | Self::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct_per_category() {
        let errors = [
            AtRestError::configuration("missing ipath"),
            AtRestError::LockTimeout {
                path: "a/iplant/s1.fastq".to_string(),
                waited_ms: 1000,
            },
            AtRestError::remote_io("fetch failed"),
            AtRestError::transform("gzip failed"),
            AtRestError::format_mismatch("already compressed"),
        ];
        let codes: Vec<i32> = errors.iter().map(|e| e.exit_code()).collect();
        assert_eq!(codes, vec![2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_retryable_split() {
        assert!(AtRestError::remote_io("put failed").retryable());
        assert!(AtRestError::LockTimeout {
            path: "p".to_string(),
            waited_ms: 5,
        }
        .retryable());
        assert!(!AtRestError::transform("bad stream").retryable());
        assert!(!AtRestError::format_mismatch("raw input").retryable());
        assert!(!AtRestError::configuration("unknown event").retryable());
    }
}
