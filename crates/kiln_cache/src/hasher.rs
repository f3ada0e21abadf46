//! Source file hashing and change detection.
//!
//! Computes content hashes and modification times for source files and
//! compares the current source records against those of an earlier build to
//! identify which are new, modified, deleted or unchanged.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use kiln_common::{ContentHash, QName};
use rayon::prelude::*;

use crate::error::CacheError;
use crate::source::SourceRecord;

/// Result of comparing current source records against an earlier build's.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Records not present earlier.
    pub new_sources: Vec<QName>,
    /// Records whose path, timestamp or content hash differs.
    pub modified_sources: Vec<QName>,
    /// Records present earlier but not now.
    pub deleted_sources: Vec<QName>,
    /// Records that match exactly.
    pub unchanged_sources: Vec<QName>,
}

impl ChangeSet {
    /// Classifies `current` against `previous`. All lists are in name order.
    pub fn detect(
        current: &BTreeMap<QName, SourceRecord>,
        previous: &BTreeMap<QName, SourceRecord>,
    ) -> Self {
        let mut changes = ChangeSet::default();
        for (name, record) in current {
            match previous.get(name) {
                Some(old) if old.path == record.path && old.same_content(record) => {
                    changes.unchanged_sources.push(name.clone());
                }
                Some(_) => changes.modified_sources.push(name.clone()),
                None => changes.new_sources.push(name.clone()),
            }
        }
        changes.deleted_sources = previous
            .keys()
            .filter(|name| !current.contains_key(*name))
            .cloned()
            .collect();
        changes
    }

    /// Returns `true` if there are no new, modified or deleted sources.
    pub fn is_empty(&self) -> bool {
        self.new_sources.is_empty()
            && self.modified_sources.is_empty()
            && self.deleted_sources.is_empty()
    }

    /// Number of sources that need compiling (new + modified).
    pub fn dirty_count(&self) -> usize {
        self.new_sources.len() + self.modified_sources.len()
    }
}

/// Returns a file's modification time in milliseconds since the epoch.
pub fn file_modified_millis(path: &Path) -> Result<u64, CacheError> {
    let io = |source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    };
    let modified = std::fs::metadata(path).and_then(|m| m.modified()).map_err(io)?;
    let millis = modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    Ok(u64::try_from(millis).unwrap_or(u64::MAX))
}

/// Utility for computing content hashes of source files.
pub struct SourceHasher;

impl SourceHasher {
    /// Reads a file and returns its XXH3-128 content hash.
    pub fn hash_file(path: &Path) -> Result<ContentHash, CacheError> {
        let content = std::fs::read(path).map_err(|e| CacheError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(ContentHash::from_bytes(&content))
    }

    /// Hashes many files in parallel.
    ///
    /// Files that cannot be read are left out of the result; callers see them
    /// as missing.
    pub fn hash_files(paths: &[PathBuf]) -> HashMap<PathBuf, ContentHash> {
        paths
            .par_iter()
            .filter_map(|path| Self::hash_file(path).ok().map(|hash| (path.clone(), hash)))
            .collect()
    }
}
