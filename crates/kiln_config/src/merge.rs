//! Deep merging of TOML override tables.

/// Merges `overlay` into `base`.
///
/// Keys present in both where both values are tables are merged recursively;
/// any other value in `overlay` replaces the value in `base`. Arrays are
/// replaced, not concatenated.
pub fn merge_tables(base: &mut toml::Table, overlay: &toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}
