/*!
Staging area management for transform jobs.

A staging area is a pair of scratch roots (one inside the object store for
swap files, one on the local filesystem for working copies) shared by every
job of the process but never sharing a leaf file between two live jobs: leaf
names derive from the object's file name plus the job's UUID token, never
from wall-clock time alone, so rapid repeated triggers cannot collide.
*/

use crate::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Scratch leaves allocated to a single job.
///
/// `local_fetch` receives the object's current bytes, `local_output` receives
/// the transformed bytes, and `remote_swap` is the temporary name inside the
/// store that gets renamed over the object during the atomic replace.
#[derive(Debug, Clone)]
pub struct StagedPaths {
    pub local_fetch: PathBuf,
    pub local_output: PathBuf,
    pub remote_swap: PathBuf,
}

impl StagedPaths {
    fn leaves(&self) -> [(&Path, bool); 3] {
        // (path, is_remote)
        [
            (self.local_fetch.as_path(), false),
            (self.local_output.as_path(), false),
            (self.remote_swap.as_path(), true),
        ]
    }
}

/// Allocates and reclaims scratch files for transform jobs.
#[derive(Debug, Clone)]
pub struct StagingArea {
    remote_root: PathBuf,
    local_root: PathBuf,
}

impl StagingArea {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(remote_root: P, local_root: Q) -> Self {
        Self {
            remote_root: remote_root.as_ref().to_path_buf(),
            local_root: local_root.as_ref().to_path_buf(),
        }
    }

    /// Allocate fresh scratch leaves for a job on `object_path`.
    ///
    /// Both roots are created on first use. The returned paths do not exist
    /// yet; they are names reserved by the token's uniqueness.
    pub fn allocate<P: AsRef<Path>>(&self, object_path: P, token: &Uuid) -> Result<StagedPaths> {
        fs::create_dir_all(&self.remote_root)?;
        fs::create_dir_all(&self.local_root)?;

        let name = object_path
            .as_ref()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "object".to_string());

        let staged = StagedPaths {
            local_fetch: self.local_root.join(format!("{name}.{token}.stage")),
            local_output: self.local_root.join(format!("{name}.{token}.out")),
            remote_swap: self.remote_root.join(format!("{name}.{token}.swap")),
        };
        debug!(
            object = %object_path.as_ref().display(),
            local_fetch = %staged.local_fetch.display(),
            remote_swap = %staged.remote_swap.display(),
            "allocated staging leaves"
        );
        Ok(staged)
    }

    /// Remove a job's scratch leaves.
    ///
    /// Runs on every exit path. Each retention flag keeps the corresponding
    /// side's leaves on disk for debugging. Removal failures are logged at
    /// WARN and swallowed, since they must not mask the job's primary result.
    pub fn release(&self, staged: &StagedPaths, delete_remote: bool, delete_local: bool) {
        for (path, is_remote) in staged.leaves() {
            let delete = if is_remote { delete_remote } else { delete_local };
            if !delete {
                if path.exists() {
                    debug!(path = %path.display(), "retaining scratch file");
                }
                continue;
            }
            match fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "removed scratch file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to remove scratch file"
                ),
            }
        }
    }
}
