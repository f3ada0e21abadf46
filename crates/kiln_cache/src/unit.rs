//! Compiled translation units and the relations they record.

use kiln_common::QName;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// The kind of reference a translation unit makes to a qualified name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Relation {
    /// Base types and implemented interfaces.
    Inheritance,
    /// Namespaces opened or used.
    Namespace,
    /// Names referenced in executable code.
    Expression,
    /// Names referenced only as a static type.
    Type,
}

impl Relation {
    /// All relation kinds, in a fixed order.
    pub const ALL: [Relation; 4] = [
        Relation::Inheritance,
        Relation::Namespace,
        Relation::Expression,
        Relation::Type,
    ];
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Relation::Inheritance => "inheritance",
            Relation::Namespace => "namespace",
            Relation::Expression => "expression",
            Relation::Type => "type",
        };
        f.write_str(name)
    }
}

/// The compiled representation of one source record.
///
/// A unit without type info is a placeholder: the compiler produced enough to
/// know its definitions but never fully resolved it. Placeholders are never
/// used to satisfy a lookup in place of a more complete cached unit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TranslationUnit {
    /// Whether the unit was fully type-resolved.
    pub has_type_info: bool,
    /// Names referenced as base types or interfaces.
    pub inheritance: BTreeSet<QName>,
    /// Namespaces referenced.
    pub namespaces: BTreeSet<QName>,
    /// Names referenced in executable code.
    pub expressions: BTreeSet<QName>,
    /// Names referenced only as static types.
    pub types: BTreeSet<QName>,
    /// Definitions introduced by this unit.
    pub top_level_definitions: BTreeSet<QName>,
    /// Checksum of the public signature of this unit's definitions.
    pub signature_checksum: Option<u64>,
    /// Signatures of the library definitions this unit referenced when it
    /// was compiled.
    pub library_signatures: BTreeMap<QName, u64>,
    /// Opaque compiled code handed to the linker.
    pub code: Vec<u8>,
    total_dependent_count: usize,
}

impl TranslationUnit {
    /// Creates a fully resolved unit introducing `definitions`.
    pub fn new(definitions: impl IntoIterator<Item = QName>) -> Self {
        Self {
            has_type_info: true,
            top_level_definitions: definitions.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Creates a placeholder unit introducing `definitions`.
    pub fn placeholder(definitions: impl IntoIterator<Item = QName>) -> Self {
        Self {
            has_type_info: false,
            ..Self::new(definitions)
        }
    }

    /// Adds a reference of the given kind.
    pub fn with_reference(mut self, relation: Relation, name: QName) -> Self {
        self.relation_mut(relation).insert(name);
        self
    }

    /// Sets the compiled code.
    pub fn with_code(mut self, code: impl Into<Vec<u8>>) -> Self {
        self.code = code.into();
        self
    }

    /// Records the signature of every referenced name `signature` resolves.
    ///
    /// Replaces any signatures recorded earlier.
    pub fn record_library_signatures(&mut self, signature: impl Fn(&QName) -> Option<u64>) {
        let recorded: BTreeMap<QName, u64> = self
            .references()
            .filter_map(|name| signature(name).map(|sig| (name.clone(), sig)))
            .collect();
        self.library_signatures = recorded;
    }

    /// Returns the set of names referenced by `relation`.
    pub fn relation(&self, relation: Relation) -> &BTreeSet<QName> {
        match relation {
            Relation::Inheritance => &self.inheritance,
            Relation::Namespace => &self.namespaces,
            Relation::Expression => &self.expressions,
            Relation::Type => &self.types,
        }
    }

    /// Returns the mutable set of names referenced by `relation`.
    pub fn relation_mut(&mut self, relation: Relation) -> &mut BTreeSet<QName> {
        match relation {
            Relation::Inheritance => &mut self.inheritance,
            Relation::Namespace => &mut self.namespaces,
            Relation::Expression => &mut self.expressions,
            Relation::Type => &mut self.types,
        }
    }

    /// Iterates every referenced name across all four relations.
    ///
    /// A name referenced by several relations is yielded once per relation.
    pub fn references(&self) -> impl Iterator<Item = &QName> {
        Relation::ALL
            .into_iter()
            .flat_map(move |relation| self.relation(relation).iter())
    }

    /// Returns `true` if this unit references any of `names`.
    pub fn references_any(&self, names: &BTreeSet<QName>) -> bool {
        self.references().any(|name| names.contains(name))
    }

    /// Number of definitions in the transitive dependent set of this unit,
    /// as of the last recomputation by the owning cache.
    pub fn total_dependent_count(&self) -> usize {
        self.total_dependent_count
    }

    pub(crate) fn set_total_dependent_count(&mut self, count: usize) {
        self.total_dependent_count = count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(s: &str) -> QName {
        s.parse().unwrap()
    }

    #[test]
    fn references_cover_all_relations() {
        let unit = TranslationUnit::new([q("app:Main")])
            .with_reference(Relation::Inheritance, q("ui:Base"))
            .with_reference(Relation::Namespace, q("ui"))
            .with_reference(Relation::Expression, q("util:log"))
            .with_reference(Relation::Type, q("ui:Event"));
        let refs: Vec<String> = unit.references().map(|n| n.to_string()).collect();
        assert_eq!(refs, vec!["ui:Base", "ui", "util:log", "ui:Event"]);
    }

    #[test]
    fn references_any_matches() {
        let unit = TranslationUnit::new([q("B")]).with_reference(Relation::Type, q("A"));
        let names: BTreeSet<QName> = [q("A")].into_iter().collect();
        assert!(unit.references_any(&names));
        let others: BTreeSet<QName> = [q("C")].into_iter().collect();
        assert!(!unit.references_any(&others));
    }

    #[test]
    fn placeholder_has_no_type_info() {
        let unit = TranslationUnit::placeholder([q("A")]);
        assert!(!unit.has_type_info);
        assert!(unit.top_level_definitions.contains(&q("A")));
        assert!(TranslationUnit::new([q("A")]).has_type_info);
    }

    #[test]
    fn records_only_resolved_library_signatures() {
        let mut unit = TranslationUnit::new([q("app:Main")])
            .with_reference(Relation::Inheritance, q("ui:Button"))
            .with_reference(Relation::Type, q("app:Helper"));
        unit.record_library_signatures(|name| (name == &q("ui:Button")).then_some(7));
        assert_eq!(unit.library_signatures.len(), 1);
        assert_eq!(unit.library_signatures[&q("ui:Button")], 7);

        unit.record_library_signatures(|_| None);
        assert!(unit.library_signatures.is_empty());
    }

    #[test]
    fn relation_display() {
        assert_eq!(Relation::Inheritance.to_string(), "inheritance");
        assert_eq!(Relation::Type.to_string(), "type");
    }
}
