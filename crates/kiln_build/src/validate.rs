//! Validation of previously compiled units against current sources.

use kiln_cache::{ChangeSet, DependentIndex, SourceRecord};
use kiln_common::QName;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Why a unit must be recompiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StaleReason {
    /// The source did not exist in the previous build.
    New,
    /// The source content, timestamp or location changed.
    Modified,
    /// The previous unit lacked type info.
    Placeholder,
    /// The unit references a definition of a changed library.
    LibraryChanged,
    /// The unit transitively references a changed or removed definition.
    Dependent,
}

impl StaleReason {
    /// Returns `true` if a cached unit may satisfy a unit stale for this
    /// reason. Units invalidated through a changed definition they reference
    /// must always be compiled.
    pub fn allows_reuse(self) -> bool {
        matches!(
            self,
            StaleReason::New | StaleReason::Modified | StaleReason::Placeholder
        )
    }
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StaleReason::New => "new",
            StaleReason::Modified => "modified",
            StaleReason::Placeholder => "placeholder",
            StaleReason::LibraryChanged => "library changed",
            StaleReason::Dependent => "dependent",
        };
        f.write_str(name)
    }
}

/// The outcome of [`validate_units`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validation {
    /// Current sources needing compilation, with the first reason found.
    pub stale: BTreeMap<QName, StaleReason>,
    /// Sources present in the previous build but not the current one.
    pub removed: BTreeSet<QName>,
}

impl Validation {
    /// Returns `true` if every previous unit is still valid.
    pub fn is_empty(&self) -> bool {
        self.stale.is_empty() && self.removed.is_empty()
    }

    /// Returns `true` if `name` is stale for a reason that permits reuse of
    /// a cached unit.
    pub fn reusable_from_cache(&self, name: &QName) -> bool {
        self.stale.get(name).is_some_and(|r| r.allows_reuse())
    }
}

/// Validates the previous build's records against the current resolution.
///
/// `changed_library_definitions` are the definitions of dependency libraries
/// whose files changed since the previous build.
pub fn validate_units(
    previous: &BTreeMap<QName, SourceRecord>,
    current: &BTreeMap<QName, SourceRecord>,
    changed_library_definitions: &BTreeSet<QName>,
) -> Validation {
    let changes = ChangeSet::detect(current, previous);
    let mut stale = BTreeMap::new();

    for name in &changes.new_sources {
        stale.insert(name.clone(), StaleReason::New);
    }
    for name in &changes.modified_sources {
        stale.insert(name.clone(), StaleReason::Modified);
    }
    for name in &changes.unchanged_sources {
        if !previous.get(name).is_some_and(SourceRecord::has_type_info) {
            stale.insert(name.clone(), StaleReason::Placeholder);
        }
    }

    let mut changed: BTreeSet<QName> = changes.new_sources.iter().cloned().collect();
    for name in changes
        .modified_sources
        .iter()
        .chain(changes.deleted_sources.iter())
    {
        if let Some(unit) = previous.get(name).and_then(|r| r.unit.as_ref()) {
            changed.extend(unit.top_level_definitions.iter().cloned());
        }
        changed.insert(name.clone());
    }

    if !changed_library_definitions.is_empty() {
        for name in &changes.unchanged_sources {
            let references = previous
                .get(name)
                .and_then(|r| r.unit.as_ref())
                .is_some_and(|u| u.references_any(changed_library_definitions));
            if references {
                stale.entry(name.clone()).or_insert(StaleReason::LibraryChanged);
            }
        }
        changed.extend(changed_library_definitions.iter().cloned());
    }

    let index = DependentIndex::build(
        previous
            .iter()
            .filter_map(|(name, record)| record.unit.as_ref().map(|u| (name, u))),
    );
    for name in index.dependents_of(changed.iter()) {
        if current.contains_key(&name) {
            stale.entry(name).or_insert(StaleReason::Dependent);
        }
    }

    Validation {
        stale,
        removed: changes.deleted_sources.into_iter().collect(),
    }
}
