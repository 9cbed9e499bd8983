/*!
# atrest core

Transparent at-rest compression for files in a shared, policy-driven object
store: objects live compressed and are decompressed just before a consumer
reads them, then compressed back once the write or read path is done. The
consuming application never knows.

This crate is the staging/transform pipeline behind that behavior, built to
be safe under concurrent triggers:

- Per-object advisory locks serialize jobs racing on the same path
- Objects are replaced atomically (write to a swap name, rename over), so a
  concurrent reader never sees truncated content
- A format guard inspects content markers instead of trusting the stated
  action, so redundant triggers cannot double-compress or corrupt data
- Scratch files are reclaimed on every exit path

## Architecture

The store and the codec are adapters behind traits; the pipeline owns the
orchestration and nothing else. The host storage engine's rule dispatch is an
external collaborator that invokes the `atrest` binary with an object path
and an event kind; it is not modeled here.

## Usage

```rust,no_run
use atrest_core::{Action, GzipCodec, LocalObjectStore, PipelineConfig, TransformPipeline};
use std::path::Path;

let config = PipelineConfig::new("/zone/home/a/iplant");
let pipeline = TransformPipeline::new(config, LocalObjectStore::new(), GzipCodec::new())?;

let outcome = pipeline.run(Path::new("/zone/home/a/iplant/s1.fastq"), Action::Compress);
let _status_for_caller = outcome.exit_code();
# Ok::<(), atrest_core::AtRestError>(())
```
*/

pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod filter;
pub mod lock;
pub mod logging;
pub mod meta;
pub mod pipeline;
pub mod staging;
pub mod store;

pub use codec::{GzipCodec, TransformCodec};
pub use config::PipelineConfig;
pub use engine::TransformEngine;
pub use error::{AtRestError, Result};
pub use event::{Action, LifecycleEvent};
pub use filter::GovernedPath;
pub use lock::{LockGuard, ObjectLock};
pub use logging::{init_logging, LogLevel};
pub use meta::ObjectMeta;
pub use pipeline::{JobOutcome, JobStatus, TransformJob, TransformPipeline};
pub use staging::{StagedPaths, StagingArea};
pub use store::{LocalObjectStore, ObjectStore};
