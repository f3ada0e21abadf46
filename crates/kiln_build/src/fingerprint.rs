//! Build fingerprints and dependency-library change detection.

use kiln_cache::{ResolvedLibraries, SourceRecord};
use kiln_common::{Checksum, QName};
use kiln_config::BuildOptions;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// The four fingerprints of one artifact build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintSet {
    /// Hash of every option except link-only options.
    pub command: u64,
    /// Hash of link-only options and link roots.
    pub link: u64,
    /// Hash of resolved library identities and timestamps.
    pub dependency: u64,
    /// Hash derived after a successful compile from signature and per-file
    /// library checksums. `None` until a compile succeeds.
    pub aggregate: Option<u64>,
}

/// Sorts every array (recursively) so list order never affects the hash.
fn canonicalize(value: &mut Value) {
    match value {
        Value::Array(items) => {
            for item in items.iter_mut() {
                canonicalize(item);
            }
            items.sort_by_cached_key(|item| item.to_string());
        }
        Value::Object(map) => {
            for item in map.values_mut() {
                canonicalize(item);
            }
        }
        _ => {}
    }
}

fn canonical_hash<T: Serialize>(domain: &str, value: &T, extra: &[String]) -> u64 {
    let mut value = serde_json::to_value(value).unwrap_or_default();
    canonicalize(&mut value);
    let mut checksum = Checksum::new(domain);
    checksum.write_str(&value.to_string());
    let mut extra: Vec<&String> = extra.iter().collect();
    extra.sort();
    for item in extra {
        checksum.write_str(item);
    }
    checksum.finish()
}

/// Computes the command, link and dependency fingerprints.
///
/// Pure and deterministic: reordering option lists, link roots or libraries
/// yields the same fingerprints. The aggregate is left unset.
pub fn compute_fingerprints(
    options: &BuildOptions,
    link_roots: &[String],
    libraries: &ResolvedLibraries,
) -> FingerprintSet {
    let command = canonical_hash("kiln.command", &options.compiler, &[]);
    let link = canonical_hash("kiln.link", &options.link, link_roots);

    let mut entries: Vec<(String, &str, u64)> = libraries
        .iter()
        .map(|lib| {
            (
                lib.location.to_string_lossy().into_owned(),
                lib.identity.as_str(),
                lib.last_modified,
            )
        })
        .collect();
    entries.sort();
    let mut dependency = Checksum::new("kiln.dependency");
    for (location, identity, modified) in entries {
        dependency
            .write_str(&location)
            .write_str(identity)
            .write_u64(modified);
    }

    FingerprintSet {
        command,
        link,
        dependency: dependency.finish(),
        aggregate: None,
    }
}

/// Computes the aggregate fingerprint.
///
/// Combines the command fingerprint, recorded signature checksums and
/// library file names. The dependency fingerprint is included only when
/// library checksums are disabled or none were recorded, so with checksums
/// a library timestamp change alone does not alter the aggregate.
pub fn aggregate_checksum<'a>(
    command: u64,
    signatures: &BTreeMap<QName, u64>,
    library_files: impl IntoIterator<Item = &'a PathBuf>,
    dependency: u64,
    checksums_enabled: bool,
) -> u64 {
    let mut checksum = Checksum::new("kiln.aggregate");
    checksum.write_u64(command);
    for (name, signature) in signatures {
        checksum.write_str(&name.to_string()).write_u64(*signature);
    }
    let mut files: Vec<&PathBuf> = library_files.into_iter().collect();
    files.sort();
    for file in files {
        checksum.write_str(&file.to_string_lossy());
    }
    if !checksums_enabled || signatures.is_empty() {
        checksum.write_u64(dependency);
    }
    checksum.finish()
}

/// Outcome of comparing current libraries against those recorded at the
/// last successful compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryCheck {
    /// Nothing changed.
    Unchanged,
    /// Only timestamps of these library files changed; units referencing
    /// their definitions must be recompiled.
    Changed(BTreeSet<PathBuf>),
    /// A full recompilation is needed.
    Recompile(String),
}

/// Library signature and file checksums recorded after a compile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryRecord {
    /// Signature checksum of every library definition a unit references.
    pub signatures: BTreeMap<QName, u64>,
    /// Modification time of every library file.
    pub files: BTreeMap<PathBuf, u64>,
}

impl LibraryRecord {
    /// Captures signatures of library definitions referenced by `records`
    /// (when enabled) and all library file times.
    pub fn capture(
        records: &BTreeMap<QName, SourceRecord>,
        libraries: &ResolvedLibraries,
        checksums_enabled: bool,
    ) -> Self {
        let mut signatures = BTreeMap::new();
        if checksums_enabled {
            let defined: BTreeSet<&QName> = records
                .values()
                .filter_map(|r| r.unit.as_ref())
                .flat_map(|u| u.top_level_definitions.iter())
                .collect();
            for unit in records.values().filter_map(|r| r.unit.as_ref()) {
                for reference in unit.references() {
                    if defined.contains(reference) {
                        continue;
                    }
                    if let Some(signature) = libraries.signature(reference) {
                        signatures.insert(reference.clone(), signature);
                    }
                }
            }
        }
        Self {
            signatures,
            files: libraries.file_times(),
        }
    }

    /// The aggregate fingerprint for this record.
    pub fn aggregate(&self, fingerprints: &FingerprintSet, checksums_enabled: bool) -> u64 {
        aggregate_checksum(
            fingerprints.command,
            &self.signatures,
            self.files.keys(),
            fingerprints.dependency,
            checksums_enabled,
        )
    }

    /// Decides whether `libraries` force a full recompilation compared with
    /// this record and the aggregate stored alongside it.
    pub fn check(
        &self,
        previous_aggregate: Option<u64>,
        current: &FingerprintSet,
        libraries: &ResolvedLibraries,
        checksums_enabled: bool,
    ) -> LibraryCheck {
        let files = libraries.file_times();
        let expected = aggregate_checksum(
            current.command,
            &self.signatures,
            files.keys(),
            current.dependency,
            checksums_enabled,
        );
        if previous_aggregate != Some(expected) {
            return LibraryCheck::Recompile("aggregate fingerprint changed".to_string());
        }
        for (name, signature) in &self.signatures {
            match libraries.signature(name) {
                Some(now) if now == *signature => {}
                Some(_) => {
                    return LibraryCheck::Recompile(format!("signature of '{name}' changed"))
                }
                None => {
                    return LibraryCheck::Recompile(format!(
                        "'{name}' is no longer provided by any library"
                    ))
                }
            }
        }
        if files.len() < self.files.len() {
            return LibraryCheck::Recompile("a dependency library was removed".to_string());
        }
        let changed: BTreeSet<PathBuf> = files
            .iter()
            .filter(|(location, modified)| self.files.get(*location) != Some(*modified))
            .map(|(location, _)| location.clone())
            .collect();
        if changed.is_empty() {
            LibraryCheck::Unchanged
        } else {
            LibraryCheck::Changed(changed)
        }
    }
}
