//! Path filter deciding which objects the pipeline governs.

use std::path::{Path, PathBuf};

/// The governed-collection gate: an object path is processed only if it lies
/// strictly under the collection root and its file name carries the governed
/// suffix. Everything else passes through untouched.
///
/// The root check is component-wise, not a substring match, so a sibling
/// collection sharing a name prefix (`/zone/iplant2` next to `/zone/iplant`)
/// is never caught. The filter is pure and runs before any lock is taken or
/// any I/O performed.
#[derive(Debug, Clone)]
pub struct GovernedPath {
    root: PathBuf,
    suffix: String,
}

impl GovernedPath {
    pub fn new<P: AsRef<Path>, S: Into<String>>(root: P, suffix: S) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            suffix: suffix.into(),
        }
    }

    /// Whether `candidate` is governed by this pipeline.
    pub fn is_governed<P: AsRef<Path>>(&self, candidate: P) -> bool {
        let candidate = candidate.as_ref();
        if candidate == self.root || !candidate.starts_with(&self.root) {
            return false;
        }
        candidate
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.ends_with(&self.suffix) && name.len() > self.suffix.len())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> GovernedPath {
        GovernedPath::new("/zone/home/a/iplant", ".fastq")
    }

    #[test]
    fn test_governed_path_accepted() {
        assert!(filter().is_governed("/zone/home/a/iplant/s1.fastq"));
        assert!(filter().is_governed("/zone/home/a/iplant/run7/s2.fastq"));
    }

    #[test]
    fn test_sibling_prefix_rejected() {
        // "/zone/home/a/iplant2" shares a string prefix but is not under the root
        assert!(!filter().is_governed("/zone/home/a/iplant2/s1.fastq"));
        assert!(!filter().is_governed("/zone/home/a/iplant-archive/s1.fastq"));
    }

    #[test]
    fn test_outside_root_rejected() {
        assert!(!filter().is_governed("/zone/home/b/other/s1.fastq"));
        assert!(!filter().is_governed("/s1.fastq"));
    }

    #[test]
    fn test_root_itself_rejected() {
        assert!(!filter().is_governed("/zone/home/a/iplant"));
    }

    #[test]
    fn test_wrong_suffix_rejected() {
        assert!(!filter().is_governed("/zone/home/a/iplant/s1.bam"));
        assert!(!filter().is_governed("/zone/home/a/iplant/s1.fastq.gz"));
        // a bare ".fastq" file name has no stem to register under
        assert!(!filter().is_governed("/zone/home/a/iplant/.fastq"));
    }
}
