//! Per-artifact build state and its incremental-cache file form.

use crate::collab::LinkedArtifact;
use crate::fingerprint::{FingerprintSet, LibraryRecord};
use kiln_cache::{decode_blob, encode_blob, CacheError, ResolvedLibraries, SourceRecord, TranslationUnit};
use kiln_common::QName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Read, Write};

/// Everything an artifact build retains between runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildState {
    /// Fingerprints recorded at the last successful compile.
    pub fingerprints: FingerprintSet,
    /// Source records with their compiled units.
    pub sources: BTreeMap<QName, SourceRecord>,
    /// Library signature and file checksums.
    pub library: LibraryRecord,
    /// Libraries the units were compiled against.
    pub libraries: ResolvedLibraries,
    /// The last compile produced units that have not been linked yet.
    pub needs_link: bool,
    /// The last linked artifact. Not persisted.
    pub linked: Option<LinkedArtifact>,
}

impl BuildState {
    /// Number of compiled units.
    pub fn unit_count(&self) -> usize {
        self.sources.values().filter(|r| r.unit.is_some()).count()
    }

    /// Compiled units in name order.
    pub fn units(&self) -> impl Iterator<Item = (&QName, &TranslationUnit)> {
        self.sources
            .iter()
            .filter_map(|(name, record)| record.unit.as_ref().map(|u| (name, u)))
    }

    /// Writes the persistent part of this state as a versioned blob.
    pub fn save(
        &self,
        artifact: &str,
        toolchain_version: &str,
        writer: &mut dyn Write,
    ) -> Result<u64, CacheError> {
        let saved = SavedStateRef {
            artifact,
            fingerprints: &self.fingerprints,
            sources: &self.sources,
            library: &self.library,
            libraries: &self.libraries,
            needs_link: self.needs_link,
        };
        encode_blob(&saved, toolchain_version, writer)
    }
}

/// The persisted form of [`BuildState`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SavedState {
    /// Name of the artifact the state belongs to.
    pub artifact: String,
    /// Recorded fingerprints.
    pub fingerprints: FingerprintSet,
    /// Source records with their compiled units.
    pub sources: BTreeMap<QName, SourceRecord>,
    /// Library signature and file checksums.
    pub library: LibraryRecord,
    /// Libraries the units were compiled against.
    pub libraries: ResolvedLibraries,
    /// Whether a link was still pending when saved.
    pub needs_link: bool,
}

/// Borrowed twin of [`SavedState`]; field order must match.
#[derive(Serialize)]
struct SavedStateRef<'a> {
    artifact: &'a str,
    fingerprints: &'a FingerprintSet,
    sources: &'a BTreeMap<QName, SourceRecord>,
    library: &'a LibraryRecord,
    libraries: &'a ResolvedLibraries,
    needs_link: bool,
}

impl SavedState {
    /// Reads and validates a blob written by [`BuildState::save`].
    pub fn load(reader: &mut dyn Read, toolchain_version: &str) -> Result<Self, CacheError> {
        decode_blob(reader, toolchain_version)
    }

    /// Restores a build state. A restored state holds no linked artifact, so
    /// it is marked as needing a link.
    pub fn into_state(self) -> BuildState {
        BuildState {
            fingerprints: self.fingerprints,
            sources: self.sources,
            library: self.library,
            libraries: self.libraries,
            needs_link: true,
            linked: None,
        }
    }
}
