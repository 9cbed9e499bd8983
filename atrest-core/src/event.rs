//! Lifecycle events emitted by the host rule engine and the action each one
//! resolves to.

use crate::{AtRestError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The transform an invocation runs against an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Raw -> gzip, storing the object compactly at rest
    Compress,
    /// Gzip -> raw, handing consumers the bytes they expect
    Decompress,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Compress => "compress",
            Action::Decompress => "decompress",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = AtRestError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "compress" => Ok(Action::Compress),
            "decompress" => Ok(Action::Decompress),
            other => Err(AtRestError::configuration(format!(
                "not a valid action: {other:?} (valid: compress, decompress)"
            ))),
        }
    }
}

/// Storage lifecycle events the host emits for governed objects.
///
/// The set is fixed by the host's dispatch rules; resolution to an action is
/// exhaustive, and anything outside the set is a configuration error at the
/// boundary rather than a guessed-at transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleEvent {
    /// The object is about to be opened for reading
    PreOpen,
    /// The object was just written/ingested
    PostWrite,
    /// A read of the object just finished
    PostOpen,
}

impl LifecycleEvent {
    /// The transform to run for this event.
    ///
    /// Readers need raw bytes, so a pre-open decompresses; a fresh write and
    /// a finished read both leave the object raw, so they compress it back
    /// into its at-rest form.
    pub fn action(&self) -> Action {
        match self {
            LifecycleEvent::PreOpen => Action::Decompress,
            LifecycleEvent::PostWrite => Action::Compress,
            LifecycleEvent::PostOpen => Action::Compress,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleEvent::PreOpen => "pre-open",
            LifecycleEvent::PostWrite => "post-write",
            LifecycleEvent::PostOpen => "post-open",
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleEvent {
    type Err = AtRestError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pre-open" | "pre_open" => Ok(LifecycleEvent::PreOpen),
            "post-write" | "post_write" => Ok(LifecycleEvent::PostWrite),
            "post-open" | "post_open" => Ok(LifecycleEvent::PostOpen),
            other => Err(AtRestError::configuration(format!(
                "not a valid lifecycle event: {other:?} (valid: pre-open, post-write, post-open)"
            ))),
        }
    }
}
