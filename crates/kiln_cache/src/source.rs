//! Source records: resolved sources and their optional compiled units.

use crate::unit::TranslationUnit;
use kiln_common::{ContentHash, QName};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// The kind of container a source record was resolved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainerKind {
    /// Explicit target files.
    FileSpec,
    /// An explicit list of source files.
    SourceList,
    /// A source-path root searched by qualified name.
    SourcePath,
    /// Embedded resources.
    Resources,
    /// Localized resource bundles.
    BundlePath,
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContainerKind::FileSpec => "file spec",
            ContainerKind::SourceList => "source list",
            ContainerKind::SourcePath => "source path",
            ContainerKind::Resources => "resources",
            ContainerKind::BundlePath => "bundle path",
        };
        f.write_str(name)
    }
}

/// One resolved source and, once compiled, its translation unit.
///
/// Identity is the qualified name plus the canonical path. A record is
/// replaced whenever its content changes; it survives across builds only
/// inside a translation cache or a saved build state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Qualified name of the definition this source provides.
    pub name: QName,
    /// Canonical path of the source file.
    pub path: PathBuf,
    /// Root directory the source was resolved under, if any.
    pub path_root: Option<PathBuf>,
    /// Last-modified time in milliseconds since the epoch.
    pub last_modified: u64,
    /// Hash of the source content.
    pub content_hash: ContentHash,
    /// The container the source was resolved from.
    pub owner: ContainerKind,
    /// Set when the unit was copied in from a translation cache.
    pub reused: bool,
    /// The compiled unit, once available.
    pub unit: Option<TranslationUnit>,
}

impl SourceRecord {
    /// Creates an uncompiled record.
    pub fn new(
        name: QName,
        path: impl Into<PathBuf>,
        owner: ContainerKind,
        last_modified: u64,
        content_hash: ContentHash,
    ) -> Self {
        Self {
            name,
            path: path.into(),
            path_root: None,
            last_modified,
            content_hash,
            owner,
            reused: false,
            unit: None,
        }
    }

    /// Sets the root the source was resolved under.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.path_root = Some(root.into());
        self
    }

    /// Attaches a compiled unit.
    pub fn with_unit(mut self, unit: TranslationUnit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Returns `true` if the record carries a fully resolved unit.
    pub fn has_type_info(&self) -> bool {
        self.unit.as_ref().is_some_and(|u| u.has_type_info)
    }

    /// Returns `true` if `other` describes the same file content at the same
    /// location: equal path root, modification time and content hash.
    pub fn same_content(&self, other: &SourceRecord) -> bool {
        self.path_root == other.path_root
            && self.last_modified == other.last_modified
            && self.content_hash == other.content_hash
    }

    /// Transitive dependent count of the unit, or 0 without one.
    pub fn total_dependent_count(&self) -> usize {
        self.unit.as_ref().map_or(0, |u| u.total_dependent_count())
    }

    /// Returns this record without its unit.
    pub fn without_unit(&self) -> SourceRecord {
        SourceRecord {
            unit: None,
            reused: false,
            ..self.clone()
        }
    }
}
