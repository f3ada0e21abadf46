//! The cross-build translation cache.

use crate::consistency::ConsistencyKey;
use crate::deps::DependentIndex;
use crate::library::ResolvedLibraries;
use crate::source::SourceRecord;
use crate::unit::TranslationUnit;
use kiln_common::QName;
use kiln_config::CompilerOptions;
use std::collections::BTreeMap;

/// Keyed store of previously compiled source records.
///
/// Every mutation recomputes the transitive dependent count of every cached
/// unit, so stored counts always equal the closure over the current contents.
/// Lookups never fail; a miss means there is nothing to reuse.
///
/// The cache is owned by the caller and handed to builds through
/// [`SharedTranslationCache`](crate::SharedTranslationCache). Mutation is not
/// safe from two builds at once; the shared handle serializes it.
#[derive(Debug, Clone, Default)]
pub struct TranslationCache {
    sources: BTreeMap<QName, SourceRecord>,
    lowest_dependent_count: usize,
    configuration: Option<ConsistencyKey>,
}

impl TranslationCache {
    /// Creates an empty cache with no associated configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges `records` into the cache, replacing same-named entries, then
    /// recomputes every dependent count and the cache minimum.
    pub fn add_sources(&mut self, records: impl IntoIterator<Item = (QName, SourceRecord)>) {
        self.sources.extend(records);
        self.recompute();
    }

    /// Looks up a record by qualified name.
    pub fn get(&self, name: &QName) -> Option<&SourceRecord> {
        self.sources.get(name)
    }

    /// Number of cached records.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Returns `true` if the cache holds no records.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Iterates cached records in name order.
    pub fn records(&self) -> impl Iterator<Item = &SourceRecord> {
        self.sources.values()
    }

    /// The smallest dependent count among cached records.
    pub fn lowest_dependent_count(&self) -> usize {
        self.lowest_dependent_count
    }

    /// Removes every record whose dependent count equals the current minimum,
    /// then recomputes counts among the survivors. Returns how many records
    /// were removed.
    pub fn prune(&mut self) -> usize {
        if self.sources.is_empty() {
            return 0;
        }
        let lowest = self.lowest_dependent_count;
        let before = self.sources.len();
        self.sources
            .retain(|_, record| record.total_dependent_count() != lowest);
        let removed = before - self.sources.len();
        self.recompute();
        removed
    }

    /// Removes every record and forgets the associated configuration.
    pub fn clear(&mut self) {
        self.sources.clear();
        self.lowest_dependent_count = 0;
        self.configuration = None;
    }

    /// Associates the cache with the configuration it is being populated under.
    pub fn set_configuration(&mut self, options: &CompilerOptions) {
        self.configuration = Some(ConsistencyKey::from_options(options));
    }

    /// The configuration the cache was populated under, if any.
    pub fn configuration(&self) -> Option<&ConsistencyKey> {
        self.configuration.as_ref()
    }

    /// Returns `true` if units cached here may be reused under `options`.
    ///
    /// A cache never associated with a configuration is not consistent with
    /// any.
    pub fn is_consistent(&self, options: &CompilerOptions) -> bool {
        self.configuration
            .as_ref()
            .is_some_and(|key| *key == ConsistencyKey::from_options(options))
    }

    /// Recomputes the dependent closure and checks that every stored count
    /// and the cache minimum match it.
    pub fn is_internally_consistent(&self) -> bool {
        let expected = self.compute_counts();
        let counts_match = self.sources.iter().all(|(name, record)| {
            record.total_dependent_count() == expected.get(name).copied().unwrap_or(0)
        });
        counts_match && self.lowest_dependent_count == self.minimum_count()
    }

    /// Finds a cached unit that may stand in for `current`.
    ///
    /// Reuse requires that `current` has no fully resolved unit, that the
    /// cached record describes the same content at the same root, and that
    /// the cached unit has type info. Every source it references which is
    /// also in `resolved` must still have the content hash it had when
    /// cached. Every other reference must resolve in `libraries` to the
    /// signature recorded on the unit, or stay unresolved as it was.
    pub fn reusable_unit(
        &self,
        current: &SourceRecord,
        resolved: &BTreeMap<QName, SourceRecord>,
        libraries: &ResolvedLibraries,
    ) -> Option<&TranslationUnit> {
        if current.has_type_info() {
            return None;
        }
        let cached = self.sources.get(&current.name)?;
        if !cached.same_content(current) {
            return None;
        }
        let unit = cached.unit.as_ref().filter(|u| u.has_type_info)?;
        for reference in unit.references() {
            let Some(now) = resolved.get(reference) else {
                let recorded = unit.library_signatures.get(reference).copied();
                if recorded != libraries.signature(reference) {
                    return None;
                }
                continue;
            };
            match self.sources.get(reference) {
                Some(then) if then.content_hash == now.content_hash => {}
                _ => return None,
            }
        }
        Some(unit)
    }

    fn compute_counts(&self) -> BTreeMap<QName, usize> {
        DependentIndex::build(
            self.sources
                .iter()
                .filter_map(|(name, record)| record.unit.as_ref().map(|unit| (name, unit))),
        )
        .counts()
    }

    fn minimum_count(&self) -> usize {
        self.sources
            .values()
            .map(SourceRecord::total_dependent_count)
            .min()
            .unwrap_or(0)
    }

    fn recompute(&mut self) {
        let counts = self.compute_counts();
        for (name, count) in counts {
            if let Some(unit) = self.sources.get_mut(&name).and_then(|r| r.unit.as_mut()) {
                unit.set_total_dependent_count(count);
            }
        }
        self.lowest_dependent_count = self.minimum_count();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::ResolvedLibrary;
    use crate::source::ContainerKind;
    use crate::unit::Relation;
    use kiln_common::ContentHash;
    use std::path::PathBuf;

    fn q(s: &str) -> QName {
        s.parse().unwrap()
    }

    fn record(name: &str, unit: TranslationUnit) -> (QName, SourceRecord) {
        let record = SourceRecord::new(
            q(name),
            format!("/p/src/{name}.as"),
            ContainerKind::SourcePath,
            100,
            ContentHash::from_bytes(name.as_bytes()),
        )
        .with_root("/p/src")
        .with_unit(unit);
        (q(name), record)
    }

    /// A defines X; B defines Y and inherits X; C defines Z and inherits Y.
    fn chain() -> Vec<(QName, SourceRecord)> {
        vec![
            record("A", TranslationUnit::new([q("X")])),
            record(
                "B",
                TranslationUnit::new([q("Y")]).with_reference(Relation::Inheritance, q("X")),
            ),
            record(
                "C",
                TranslationUnit::new([q("Z")]).with_reference(Relation::Inheritance, q("Y")),
            ),
        ]
    }

    #[test]
    fn dependent_closure_is_transitive() {
        let mut cache = TranslationCache::new();
        cache.add_sources(chain());
        assert_eq!(cache.get(&q("A")).unwrap().total_dependent_count(), 2);
        assert_eq!(cache.get(&q("B")).unwrap().total_dependent_count(), 1);
        assert_eq!(cache.get(&q("C")).unwrap().total_dependent_count(), 0);
        assert_eq!(cache.lowest_dependent_count(), 0);
        assert!(cache.is_internally_consistent());
    }

    #[test]
    fn incremental_adds_recompute_everything() {
        let mut cache = TranslationCache::new();
        let mut units = chain();
        let c = units.pop().unwrap();
        cache.add_sources(units);
        assert_eq!(cache.get(&q("A")).unwrap().total_dependent_count(), 1);
        cache.add_sources([c]);
        assert_eq!(cache.get(&q("A")).unwrap().total_dependent_count(), 2);
        assert!(cache.is_internally_consistent());
    }

    #[test]
    fn later_add_overwrites() {
        let mut cache = TranslationCache::new();
        cache.add_sources(chain());
        // B no longer inherits X
        cache.add_sources([record("B", TranslationUnit::new([q("Y")]))]);
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get(&q("A")).unwrap().total_dependent_count(), 0);
    }

    #[test]
    fn miss_is_none() {
        let cache = TranslationCache::new();
        assert!(cache.get(&q("Missing")).is_none());
    }

    #[test]
    fn prune_removes_lowest_tier() {
        let mut cache = TranslationCache::new();
        cache.add_sources(chain());
        assert_eq!(cache.prune(), 1);
        assert!(cache.get(&q("C")).is_none());
        // B is now a leaf
        assert_eq!(cache.get(&q("B")).unwrap().total_dependent_count(), 0);
        assert_eq!(cache.lowest_dependent_count(), 0);
        assert!(cache.is_internally_consistent());
        assert_eq!(cache.prune(), 1);
        assert_eq!(cache.prune(), 1);
        assert!(cache.is_empty());
        assert_eq!(cache.prune(), 0);
    }

    #[test]
    fn consistency_requires_configuration() {
        let options = CompilerOptions::default();
        let mut cache = TranslationCache::new();
        assert!(!cache.is_consistent(&options));
        cache.set_configuration(&options);
        assert!(cache.is_consistent(&options));
    }

    #[test]
    fn consistency_gate_on_strict_mode() {
        let mut strict = CompilerOptions::default();
        strict.strict = true;
        let mut cache = TranslationCache::new();
        cache.set_configuration(&strict);

        let mut lax = strict.clone();
        lax.strict = false;
        assert!(!cache.is_consistent(&lax));

        let mut tokens = strict.clone();
        tokens
            .tokens
            .insert("build".to_string(), "42".to_string());
        assert!(cache.is_consistent(&tokens));
    }

    #[test]
    fn clear_forgets_configuration() {
        let options = CompilerOptions::default();
        let mut cache = TranslationCache::new();
        cache.set_configuration(&options);
        cache.add_sources(chain());
        cache.clear();
        assert!(cache.is_empty());
        assert!(!cache.is_consistent(&options));
    }

    #[test]
    fn reuse_requires_matching_content() {
        let mut cache = TranslationCache::new();
        cache.add_sources(chain());
        let resolved: BTreeMap<QName, SourceRecord> = chain()
            .into_iter()
            .map(|(n, r)| (n, r.without_unit()))
            .collect();

        let current = resolved[&q("B")].clone();
        assert!(cache.reusable_unit(&current, &resolved, &ResolvedLibraries::default()).is_some());

        let mut touched = current.clone();
        touched.last_modified += 1;
        assert!(cache.reusable_unit(&touched, &resolved, &ResolvedLibraries::default()).is_none());
    }

    #[test]
    fn reuse_rejected_when_reference_changed() {
        let mut cache = TranslationCache::new();
        cache.add_sources([
            record("X", TranslationUnit::new([q("X")])),
            record(
                "Y",
                TranslationUnit::new([q("Y")]).with_reference(Relation::Inheritance, q("X")),
            ),
        ]);

        let mut resolved: BTreeMap<QName, SourceRecord> = BTreeMap::new();
        let (_, y) = record("Y", TranslationUnit::default());
        resolved.insert(q("Y"), y.without_unit());
        let (_, mut x) = record("X", TranslationUnit::default());
        x.content_hash = ContentHash::from_bytes(b"edited");
        resolved.insert(q("X"), x.without_unit());

        let current = resolved[&q("Y")].clone();
        assert!(cache.reusable_unit(&current, &resolved, &ResolvedLibraries::default()).is_none());

        // With X unchanged, Y is reusable again.
        let (_, x) = record("X", TranslationUnit::default());
        resolved.insert(q("X"), x.without_unit());
        assert!(cache.reusable_unit(&current, &resolved, &ResolvedLibraries::default()).is_some());
    }

    #[test]
    fn placeholder_never_reused_and_never_satisfies() {
        let mut cache = TranslationCache::new();
        cache.add_sources([record("A", TranslationUnit::placeholder([q("A")]))]);
        let (_, current) = record("A", TranslationUnit::placeholder([q("A")]));
        let resolved = BTreeMap::new();
        assert!(cache.reusable_unit(&current, &resolved, &ResolvedLibraries::default()).is_none());

        let mut cache = TranslationCache::new();
        cache.add_sources([record("A", TranslationUnit::new([q("A")]))]);
        let (_, complete) = record("A", TranslationUnit::new([q("A")]));
        assert!(cache.reusable_unit(&complete, &resolved, &ResolvedLibraries::default()).is_none());
        assert!(cache.reusable_unit(&current, &resolved, &ResolvedLibraries::default()).is_some());
    }

    fn ui_library(signature: u64) -> ResolvedLibraries {
        ResolvedLibraries::new([ResolvedLibrary {
            location: PathBuf::from("libs/ui.lib"),
            identity: "ui@1".to_string(),
            last_modified: signature,
            definitions: [(q("ui:Button"), signature)].into_iter().collect(),
        }])
    }

    #[test]
    fn reuse_rejected_when_library_signature_changed() {
        let mut unit =
            TranslationUnit::new([q("Main")]).with_reference(Relation::Inheritance, q("ui:Button"));
        let before = ui_library(7);
        unit.record_library_signatures(|name| before.signature(name));
        let mut cache = TranslationCache::new();
        cache.add_sources([record("Main", unit)]);

        let (_, current) = record("Main", TranslationUnit::default());
        let current = current.without_unit();
        let resolved: BTreeMap<QName, SourceRecord> =
            [(q("Main"), current.clone())].into_iter().collect();

        assert!(cache.reusable_unit(&current, &resolved, &before).is_some());
        assert!(cache.reusable_unit(&current, &resolved, &ui_library(9)).is_none());
        // A library name that vanished no longer matches the recorded signature.
        assert!(cache
            .reusable_unit(&current, &resolved, &ResolvedLibraries::default())
            .is_none());
    }

    #[test]
    fn reuse_rejected_when_unresolved_name_gains_a_library() {
        let mut cache = TranslationCache::new();
        cache.add_sources([record(
            "Main",
            TranslationUnit::new([q("Main")]).with_reference(Relation::Type, q("ui:Button")),
        )]);
        let (_, current) = record("Main", TranslationUnit::default());
        let current = current.without_unit();
        let resolved: BTreeMap<QName, SourceRecord> =
            [(q("Main"), current.clone())].into_iter().collect();

        assert!(cache
            .reusable_unit(&current, &resolved, &ResolvedLibraries::default())
            .is_some());
        assert!(cache.reusable_unit(&current, &resolved, &ui_library(7)).is_none());
    }
}
