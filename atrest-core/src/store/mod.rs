/*!
Object store adapters.

This module defines the storage abstraction (port) and the concrete adapter
for path-addressed stores mounted as a filesystem. The pipeline only ever
speaks to the trait, so the store a deployment actually runs against (a
network object store with its own fetch/put/rename verbs) plugs in as
another adapter without touching the transform logic.
*/

pub mod local;

pub use local::LocalObjectStore;

use crate::meta::ObjectMeta;
use crate::Result;
use std::path::Path;

/// Storage abstraction for fetching, replacing, and annotating objects.
///
/// `rename` is the load-bearing operation: it must be atomic within the
/// store, because the pipeline replaces an object by writing the transformed
/// bytes to a scratch name and renaming over the final path, and a reader must
/// only ever see the old content or the new content in full.
pub trait ObjectStore {
    /// Copy an object's bytes to a local destination, returning bytes copied
    fn fetch(&self, object: &Path, local_dest: &Path) -> Result<u64>;

    /// Copy a local file's bytes to a location in the store, returning
    /// bytes copied
    fn put(&self, local_src: &Path, object: &Path) -> Result<u64>;

    /// Atomically rename `from` to `to` within the store, replacing any
    /// object already at `to`
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Whether an object exists at the given path
    fn exists(&self, object: &Path) -> bool;

    /// Delete an object if present
    fn delete(&self, object: &Path) -> Result<()>;

    /// Read the sidecar metadata for an object, if any has been written
    fn read_meta(&self, object: &Path) -> Result<Option<ObjectMeta>>;

    /// Write (or overwrite) the sidecar metadata for an object
    fn write_meta(&self, object: &Path, meta: &ObjectMeta) -> Result<()>;
}
