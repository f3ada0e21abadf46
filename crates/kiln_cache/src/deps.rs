//! Transitive-dependent computation over a set of translation units.

use crate::unit::TranslationUnit;
use kiln_common::{Ident, Interner, QName};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Reverse-reference index over a set of translation units.
///
/// Definitions and referenced names are interned so the closure walk works on
/// integer identifiers. Results are independent of the order units were
/// supplied in.
pub struct DependentIndex {
    interner: Interner,
    names: Vec<QName>,
    definitions: Vec<Vec<Ident>>,
    /// Name to the units referencing it by any relation.
    referrers: HashMap<Ident, Vec<usize>>,
    by_name: BTreeMap<QName, usize>,
}

impl DependentIndex {
    /// Builds the index from `(record name, unit)` pairs.
    pub fn build<'a>(units: impl IntoIterator<Item = (&'a QName, &'a TranslationUnit)>) -> Self {
        let interner = Interner::new();
        let mut names = Vec::new();
        let mut definitions = Vec::new();
        let mut referrers: HashMap<Ident, Vec<usize>> = HashMap::new();
        let mut by_name = BTreeMap::new();

        for (index, (name, unit)) in units.into_iter().enumerate() {
            names.push(name.clone());
            by_name.insert(name.clone(), index);
            definitions.push(
                unit.top_level_definitions
                    .iter()
                    .map(|d| interner.get_or_intern(&d.to_string()))
                    .collect(),
            );
            for reference in unit.references() {
                let ident = interner.get_or_intern(&reference.to_string());
                referrers.entry(ident).or_default().push(index);
            }
        }

        for users in referrers.values_mut() {
            users.sort_unstable();
            users.dedup();
        }

        Self {
            interner,
            names,
            definitions,
            referrers,
            by_name,
        }
    }

    /// Number of indexed units.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` if no units are indexed.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Walks reverse references from `seeds`, returning the dependent
    /// definitions found and the dependent units visited. `origin` is treated
    /// as already visited so a unit never counts itself through a cycle.
    fn closure(
        &self,
        seeds: Vec<Ident>,
        origin: Option<usize>,
    ) -> (BTreeSet<Ident>, BTreeSet<usize>) {
        let mut visited: BTreeSet<usize> = origin.into_iter().collect();
        let mut found = BTreeSet::new();
        let mut frontier = seeds;

        while let Some(def) = frontier.pop() {
            let Some(users) = self.referrers.get(&def) else {
                continue;
            };
            for &user in users {
                if !visited.insert(user) {
                    continue;
                }
                for &d in &self.definitions[user] {
                    if found.insert(d) {
                        frontier.push(d);
                    }
                }
            }
        }

        if let Some(origin) = origin {
            visited.remove(&origin);
        }
        (found, visited)
    }

    /// Size of the transitive dependent definition set of the named unit.
    pub fn total_dependent_count(&self, name: &QName) -> Option<usize> {
        let &index = self.by_name.get(name)?;
        let (found, _) = self.closure(self.definitions[index].clone(), Some(index));
        Some(found.len())
    }

    /// Transitive dependent counts for every indexed unit.
    pub fn counts(&self) -> BTreeMap<QName, usize> {
        (0..self.names.len())
            .map(|index| {
                let (found, _) = self.closure(self.definitions[index].clone(), Some(index));
                (self.names[index].clone(), found.len())
            })
            .collect()
    }

    /// Names of every unit that transitively references any of `definitions`.
    pub fn dependents_of<'a>(
        &self,
        definitions: impl IntoIterator<Item = &'a QName>,
    ) -> BTreeSet<QName> {
        let seeds = definitions
            .into_iter()
            .filter_map(|d| self.interner.get(&d.to_string()))
            .collect();
        let (_, units) = self.closure(seeds, None);
        units.into_iter().map(|i| self.names[i].clone()).collect()
    }
}
