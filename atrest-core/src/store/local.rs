/*!
Path-addressed object store adapter over the local filesystem.
*/

use super::ObjectStore;
use crate::meta::ObjectMeta;
use crate::{AtRestError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Suffix of the sidecar file carrying an object's metadata record. The
/// sidecar never matches the governed filename pattern, so it is invisible
/// to the path filter and to the host's dispatch rules.
pub const META_SUFFIX: &str = ".atrest.json";

/// Object store adapter for collections mounted as a local directory tree.
///
/// Paths are used as-is unless a base directory is set, in which case they
/// resolve relative to it (handy in tests). Parent directories are created
/// as needed on writes. `rename` maps to `fs::rename`, which is atomic on
/// POSIX filesystems when source and destination share a mount, which is why
/// swap files live beside the collection rather than on the local scratch
/// disk.
#[derive(Debug, Clone, Default)]
pub struct LocalObjectStore {
    base_dir: Option<PathBuf>,
}

impl LocalObjectStore {
    /// Create an adapter that uses object paths as given.
    pub fn new() -> Self {
        Self { base_dir: None }
    }

    /// Create an adapter resolving all object paths under a base directory.
    pub fn with_base_dir<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: Some(base_dir.as_ref().to_path_buf()),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) => base.join(path),
            None => path.to_path_buf(),
        }
    }

    fn meta_path(&self, object: &Path) -> PathBuf {
        let resolved = self.resolve(object);
        let mut name = resolved
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        name.push_str(META_SUFFIX);
        resolved.with_file_name(name)
    }

    fn ensure_parent_dir(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    AtRestError::remote_io(format!(
                        "failed to create directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }
        Ok(())
    }
}

impl ObjectStore for LocalObjectStore {
    fn fetch(&self, object: &Path, local_dest: &Path) -> Result<u64> {
        let src = self.resolve(object);
        if let Some(parent) = local_dest.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = fs::copy(&src, local_dest).map_err(|e| {
            AtRestError::remote_io(format!("failed to fetch {}: {e}", src.display()))
        })?;
        debug!(object = %src.display(), bytes, "fetched object to local scratch");
        Ok(bytes)
    }

    fn put(&self, local_src: &Path, object: &Path) -> Result<u64> {
        let dest = self.resolve(object);
        Self::ensure_parent_dir(&dest)?;
        let bytes = fs::copy(local_src, &dest).map_err(|e| {
            AtRestError::remote_io(format!("failed to put {}: {e}", dest.display()))
        })?;
        debug!(object = %dest.display(), bytes, "put local file into store");
        Ok(bytes)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let from = self.resolve(from);
        let to = self.resolve(to);
        Self::ensure_parent_dir(&to)?;
        fs::rename(&from, &to).map_err(|e| {
            AtRestError::remote_io(format!(
                "failed to rename {} over {}: {e}",
                from.display(),
                to.display()
            ))
        })
    }

    fn exists(&self, object: &Path) -> bool {
        self.resolve(object).exists()
    }

    fn delete(&self, object: &Path) -> Result<()> {
        let path = self.resolve(object);
        if path.exists() {
            fs::remove_file(&path).map_err(|e| {
                AtRestError::remote_io(format!("failed to delete {}: {e}", path.display()))
            })?;
        }
        Ok(())
    }

    fn read_meta(&self, object: &Path) -> Result<Option<ObjectMeta>> {
        let path = self.meta_path(object);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AtRestError::remote_io(format!(
                "failed to read sidecar {}: {e}",
                path.display()
            ))),
        }
    }

    fn write_meta(&self, object: &Path, meta: &ObjectMeta) -> Result<()> {
        let path = self.meta_path(object);
        Self::ensure_parent_dir(&path)?;
        fs::write(&path, serde_json::to_string_pretty(meta)?).map_err(|e| {
            AtRestError::remote_io(format!(
                "failed to write sidecar {}: {e}",
                path.display()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fetch_put_rename_delete() {
        let dir = TempDir::new().unwrap();
        let store = LocalObjectStore::with_base_dir(dir.path());
        let scratch = TempDir::new().unwrap();

        fs::create_dir_all(dir.path().join("iplant")).unwrap();
        fs::write(dir.path().join("iplant/s1.fastq"), b"ACGT").unwrap();

        // fetch
        let local = scratch.path().join("s1.fastq.stage");
        let bytes = store.fetch(Path::new("iplant/s1.fastq"), &local).unwrap();
        assert_eq!(bytes, 4);
        assert_eq!(fs::read(&local).unwrap(), b"ACGT");

        // put to a swap name, then rename over the object
        fs::write(scratch.path().join("out"), b"TGCA").unwrap();
        store
            .put(&scratch.path().join("out"), Path::new("iplant/s1.swap"))
            .unwrap();
        store
            .rename(Path::new("iplant/s1.swap"), Path::new("iplant/s1.fastq"))
            .unwrap();
        assert_eq!(fs::read(dir.path().join("iplant/s1.fastq")).unwrap(), b"TGCA");
        assert!(!store.exists(Path::new("iplant/s1.swap")));

        // delete
        store.delete(Path::new("iplant/s1.fastq")).unwrap();
        assert!(!store.exists(Path::new("iplant/s1.fastq")));
    }

    #[test]
    fn test_put_creates_missing_directories() {
        let dir = TempDir::new().unwrap();
        let store = LocalObjectStore::with_base_dir(dir.path());
        let scratch = TempDir::new().unwrap();
        fs::write(scratch.path().join("out"), b"x").unwrap();

        store
            .put(&scratch.path().join("out"), Path::new("a/b/c/s1.fastq"))
            .unwrap();
        assert!(store.exists(Path::new("a/b/c/s1.fastq")));
    }

    #[test]
    fn test_fetch_missing_object_is_remote_io() {
        let dir = TempDir::new().unwrap();
        let store = LocalObjectStore::with_base_dir(dir.path());
        let err = store
            .fetch(Path::new("iplant/absent.fastq"), &dir.path().join("x"))
            .unwrap_err();
        assert!(matches!(err, AtRestError::RemoteIo(_)));
        assert!(err.retryable());
    }

    #[test]
    fn test_meta_roundtrip_and_absence() {
        let dir = TempDir::new().unwrap();
        let store = LocalObjectStore::with_base_dir(dir.path());
        let object = Path::new("iplant/s1.fastq");

        assert!(store.read_meta(object).unwrap().is_none());

        let meta = ObjectMeta::compressed("gzip", 1000, "abc".to_string());
        store.write_meta(object, &meta).unwrap();
        let back = store.read_meta(object).unwrap().unwrap();
        assert_eq!(back, meta);

        // sidecar sits beside the object and never matches the governed suffix
        assert!(dir.path().join("iplant/s1.fastq.atrest.json").exists());
    }
}
