/*!
The transform pipeline: fetch, transform, replace, clean up, as one unit.

A job walks a fixed sequence of states: the filter gate, the object lock,
the local staging copy, the transform, the atomic replace, and cleanup. Any
step's failure routes through the same cleanup before the job terminates,
and the caller always gets a typed [`JobOutcome`] back: never a panic, and
never a half-written object: the remote path is only ever mutated by
renaming a fully-written swap file over it.
*/

use crate::codec::TransformCodec;
use crate::config::PipelineConfig;
use crate::engine::TransformEngine;
use crate::event::Action;
use crate::filter::GovernedPath;
use crate::lock::ObjectLock;
use crate::meta::{file_checksum, ObjectMeta};
use crate::staging::{StagedPaths, StagingArea};
use crate::store::ObjectStore;
use crate::{AtRestError, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Terminal disposition of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// The object was transformed and replaced
    Success,
    /// Nothing to do: path not governed, or already in the target form
    Skipped,
    /// The job terminated on an error after cleanup
    Failed,
}

/// What a finished job reports back to its caller.
#[derive(Debug)]
pub struct JobOutcome {
    pub status: JobStatus,
    pub failure: Option<AtRestError>,
    pub bytes_processed: u64,
}

impl JobOutcome {
    fn success(bytes_processed: u64) -> Self {
        Self {
            status: JobStatus::Success,
            failure: None,
            bytes_processed,
        }
    }

    fn skipped() -> Self {
        Self {
            status: JobStatus::Skipped,
            failure: None,
            bytes_processed: 0,
        }
    }

    fn failed(failure: AtRestError) -> Self {
        Self {
            status: JobStatus::Failed,
            failure: Some(failure),
            bytes_processed: 0,
        }
    }

    /// Process exit status for the trigger layer: 0 for Success and
    /// Skipped, the failure category's code otherwise.
    pub fn exit_code(&self) -> i32 {
        match self.status {
            JobStatus::Success | JobStatus::Skipped => 0,
            JobStatus::Failed => self.failure.as_ref().map(|e| e.exit_code()).unwrap_or(1),
        }
    }
}

/// One invocation's unit of work, exclusively owned by that invocation.
#[derive(Debug)]
pub struct TransformJob {
    pub object_path: PathBuf,
    pub action: Action,
    /// Uniqueness token naming this job's scratch leaves
    pub token: Uuid,
    pub started_at: DateTime<Utc>,
    started: Instant,
}

impl TransformJob {
    fn new(object_path: &Path, action: Action) -> Self {
        Self {
            object_path: object_path.to_path_buf(),
            action,
            token: Uuid::new_v4(),
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

/// Orchestrates transform jobs over an object store and a codec.
pub struct TransformPipeline<S, C>
where
    S: ObjectStore,
    C: TransformCodec,
{
    config: PipelineConfig,
    filter: GovernedPath,
    staging: StagingArea,
    locks: ObjectLock,
    engine: TransformEngine<C>,
    store: S,
}

impl<S, C> TransformPipeline<S, C>
where
    S: ObjectStore,
    C: TransformCodec,
{
    /// Build a pipeline from validated configuration.
    pub fn new(config: PipelineConfig, store: S, codec: C) -> Result<Self> {
        config.validate()?;
        let filter = GovernedPath::new(&config.collection_root, &config.governed_suffix);
        let staging = StagingArea::new(&config.remote_scratch_root, &config.local_scratch_root);
        let locks = ObjectLock::new(
            config.lock_dir(),
            config.lock_timeout,
            config.lock_stale_after,
        );
        Ok(Self {
            filter,
            staging,
            locks,
            engine: TransformEngine::new(codec),
            store,
            config,
        })
    }

    /// Run one job: `action` against the object at `object_path`.
    ///
    /// Always returns a terminal outcome; every failure is logged with the
    /// job's identifying fields before this returns.
    pub fn run(&self, object_path: &Path, action: Action) -> JobOutcome {
        if !self.filter.is_governed(object_path) {
            debug!(
                object = %object_path.display(),
                "path not governed by this pipeline; nothing to do"
            );
            return JobOutcome::skipped();
        }

        let job = TransformJob::new(object_path, action);
        info!(
            object = %job.object_path.display(),
            action = %job.action,
            job = %job.token,
            "starting transform job"
        );

        let guard = match self.locks.acquire(object_path) {
            Ok(guard) => guard,
            Err(e) => return self.fail(&job, e),
        };

        let staged = match self.staging.allocate(object_path, &job.token) {
            Ok(staged) => staged,
            Err(e) => {
                drop(guard);
                return self.fail(&job, e);
            }
        };

        let result = self.execute(&job, &staged);

        self.staging.release(
            &staged,
            self.config.delete_remote_scratch,
            self.config.delete_local_scratch,
        );
        drop(guard);

        match result {
            Ok(Some(bytes)) => {
                info!(
                    object = %job.object_path.display(),
                    action = %job.action,
                    raw_bytes = bytes,
                    elapsed_ms = job.elapsed_ms(),
                    "transform job succeeded"
                );
                JobOutcome::success(bytes)
            }
            Ok(None) => {
                info!(
                    object = %job.object_path.display(),
                    action = %job.action,
                    elapsed_ms = job.elapsed_ms(),
                    "object already in target form; skipping"
                );
                JobOutcome::skipped()
            }
            Err(e) => self.fail(&job, e),
        }
    }

    /// Steps between lock acquisition and cleanup. `Ok(None)` is the
    /// already-in-target-form skip.
    fn execute(&self, job: &TransformJob, staged: &StagedPaths) -> Result<Option<u64>> {
        // A compress trigger against an object recorded as compressed is a
        // redundant re-fire (a post-open after a read that never
        // decompressed); short-circuit before any transfer.
        if job.action == Action::Compress {
            if let Some(meta) = self.read_meta_tolerant(&job.object_path) {
                if meta.is_compressed {
                    return Ok(None);
                }
            }
        }

        self.store.fetch(&job.object_path, &staged.local_fetch)?;

        // The sidecar can lag behind reality after a partial failure, so the
        // staged bytes themselves get the same check.
        if job.action == Action::Compress && self.engine.is_at_rest_form(&staged.local_fetch)? {
            return Ok(None);
        }

        let bytes = self
            .engine
            .apply(job.action, &staged.local_fetch, &staged.local_output)?;

        let meta = match job.action {
            Action::Compress => {
                let (raw_size, raw_sum) = file_checksum(&staged.local_fetch)?;
                ObjectMeta::compressed(self.engine.codec_name(), raw_size, raw_sum)
            }
            Action::Decompress => {
                let (raw_size, raw_sum) = file_checksum(&staged.local_output)?;
                if let Some(prev) = self.read_meta_tolerant(&job.object_path) {
                    if prev.is_compressed && !prev.matches_raw(raw_size, &raw_sum) {
                        return Err(AtRestError::transform(format!(
                            "recovered content for {} does not match the recorded checksum",
                            job.object_path.display()
                        )));
                    }
                }
                ObjectMeta::raw(raw_size, raw_sum)
            }
        };

        // Atomic replace: the object path only ever changes via this rename,
        // so a concurrent reader sees old content or new content in full.
        self.store.put(&staged.local_output, &staged.remote_swap)?;
        self.store.rename(&staged.remote_swap, &job.object_path)?;

        if let Err(e) = self.store.write_meta(&job.object_path, &meta) {
            // content is already correct; the magic-byte probe covers for a
            // lagging sidecar on the next trigger
            warn!(
                object = %job.object_path.display(),
                error = %e,
                "failed to update sidecar metadata after replace"
            );
        }

        Ok(Some(bytes))
    }

    fn read_meta_tolerant(&self, object: &Path) -> Option<ObjectMeta> {
        match self.store.read_meta(object) {
            Ok(meta) => meta,
            Err(e) => {
                warn!(
                    object = %object.display(),
                    error = %e,
                    "unreadable sidecar metadata; ignoring"
                );
                None
            }
        }
    }

    fn fail(&self, job: &TransformJob, err: AtRestError) -> JobOutcome {
        error!(
            object = %job.object_path.display(),
            action = %job.action,
            elapsed_ms = job.elapsed_ms(),
            error = %err,
            "transform job failed"
        );
        JobOutcome::failed(err)
    }
}
