//! Typed compiler and link options, and effective-option resolution.

use crate::error::ConfigError;
use crate::merge::merge_tables;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Options that affect compilation of translation units.
///
/// A subset of these (see `ConsistencyKey` in `kiln_cache`) is load-bearing
/// for translation-cache reuse; the rest, such as `tokens`, only affect the
/// command fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerOptions {
    /// Strict-mode type checking.
    pub strict: bool,
    /// Source language dialect number.
    pub dialect: u32,
    /// Target runtime version as a dotted string, e.g. `"11.1"`.
    pub target_runtime: String,
    /// Emit debug information.
    pub debug: bool,
    /// Remove trace statements from compiled code.
    pub omit_trace_statements: bool,
    /// Enable accessibility support.
    pub accessible: bool,
    /// Conditional-compilation definitions, `NAMESPACE::name` to expression.
    pub define: BTreeMap<String, String>,
    /// Include line numbers in runtime stack traces.
    pub verbose_stacktraces: bool,
    /// Metadata names preserved in compiled output.
    pub keep_metadata: Vec<String>,
    /// Keep generated intermediate sources.
    pub keep_generated: bool,
    /// Enable runtime design layers.
    pub runtime_design_layers: bool,
    /// Locales compiled into the artifact.
    pub locales: Vec<String>,
    /// Theme files applied to the artifact.
    pub themes: Vec<PathBuf>,
    /// Roots searched for sources by qualified name.
    pub source_path: Vec<PathBuf>,
    /// Dependency library locations.
    pub library_path: Vec<PathBuf>,
    /// Token substitutions applied to option values.
    pub tokens: BTreeMap<String, String>,
    /// Record signature and per-file checksums of dependency libraries.
    pub library_checksums: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            strict: true,
            dialect: 10,
            target_runtime: "11.1".to_string(),
            debug: false,
            omit_trace_statements: true,
            accessible: false,
            define: BTreeMap::new(),
            verbose_stacktraces: false,
            keep_metadata: Vec::new(),
            keep_generated: false,
            runtime_design_layers: true,
            locales: Vec::new(),
            themes: Vec::new(),
            source_path: Vec::new(),
            library_path: Vec::new(),
            tokens: BTreeMap::new(),
            library_checksums: true,
        }
    }
}

impl CompilerOptions {
    /// Returns the major component of `target_runtime`, if it is an integer.
    pub fn target_runtime_major(&self) -> Option<u32> {
        self.target_runtime.split('.').next()?.trim().parse().ok()
    }
}

/// Options that only affect linking.
///
/// A change confined to these options never forces recompilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkOptions {
    /// Definitions linked in even when unreferenced.
    pub includes: Vec<String>,
    /// Definitions never linked in.
    pub excludes: Vec<String>,
    /// Definitions resolved at runtime rather than linked.
    pub externs: Vec<String>,
    /// Frame label to the definitions placed on that frame.
    pub frames: BTreeMap<String, Vec<String>>,
    /// Run the link-time optimizer.
    pub optimize: bool,
    /// Default width of an application image.
    pub default_width: u32,
    /// Default height of an application image.
    pub default_height: u32,
    /// Default frame rate of an application image.
    pub default_frame_rate: u32,
    /// Descriptive metadata written into the artifact.
    pub metadata: BTreeMap<String, String>,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            includes: Vec::new(),
            excludes: Vec::new(),
            externs: Vec::new(),
            frames: BTreeMap::new(),
            optimize: true,
            default_width: 500,
            default_height: 375,
            default_frame_rate: 24,
            metadata: BTreeMap::new(),
        }
    }
}

/// The complete option set for one artifact build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    /// Compilation options.
    pub compiler: CompilerOptions,
    /// Link-only options.
    pub link: LinkOptions,
}

impl BuildOptions {
    /// Computes the effective options with an override table applied.
    ///
    /// The override table mirrors the shape of `BuildOptions`: optional
    /// `compiler` and `link` sub-tables whose keys replace or deep-merge into
    /// the stored values. The result is validated.
    pub fn resolve(&self, overrides: Option<&toml::Table>) -> Result<BuildOptions, ConfigError> {
        let resolved = match overrides {
            None => self.clone(),
            Some(overrides) => {
                let mut table = match toml::Value::try_from(self) {
                    Ok(toml::Value::Table(table)) => table,
                    Ok(_) => {
                        return Err(ConfigError::ParseError(
                            "build options did not serialize to a table".to_string(),
                        ))
                    }
                    Err(e) => return Err(ConfigError::ParseError(e.to_string())),
                };
                merge_tables(&mut table, overrides);
                toml::Value::Table(table)
                    .try_into()
                    .map_err(|e: toml::de::Error| ConfigError::ParseError(e.to_string()))?
            }
        };
        resolved.validate()?;
        Ok(resolved)
    }

    /// Checks option values that cannot be expressed in the type system.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.compiler.target_runtime_major().is_none() {
            return Err(ConfigError::ValidationError(format!(
                "target_runtime '{}' must start with an integer major version",
                self.compiler.target_runtime
            )));
        }
        for name in self.compiler.define.keys() {
            let valid = name
                .split_once("::")
                .is_some_and(|(ns, local)| !ns.is_empty() && !local.is_empty());
            if !valid {
                return Err(ConfigError::ValidationError(format!(
                    "define '{name}' must have the form NAMESPACE::name"
                )));
            }
        }
        if self.link.default_frame_rate == 0 {
            return Err(ConfigError::ValidationError(
                "default_frame_rate must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overrides(src: &str) -> toml::Table {
        src.parse::<toml::Table>().unwrap()
    }

    #[test]
    fn defaults_are_valid() {
        let options = BuildOptions::default();
        assert!(options.validate().is_ok());
        assert_eq!(options.compiler.target_runtime_major(), Some(11));
        assert!(options.compiler.library_checksums);
    }

    #[test]
    fn resolve_without_overrides_is_identity() {
        let options = BuildOptions::default();
        assert_eq!(options.resolve(None).unwrap(), options);
    }

    #[test]
    fn resolve_applies_compiler_override() {
        let options = BuildOptions::default();
        let resolved = options
            .resolve(Some(&overrides("[compiler]\ndebug = true\nlocales = [\"en_US\"]")))
            .unwrap();
        assert!(resolved.compiler.debug);
        assert_eq!(resolved.compiler.locales, vec!["en_US"]);
        assert_eq!(resolved.link, options.link);
    }

    #[test]
    fn resolve_merges_nested_maps() {
        let mut options = BuildOptions::default();
        options
            .compiler
            .define
            .insert("CONFIG::debug".to_string(), "false".to_string());
        options
            .compiler
            .define
            .insert("CONFIG::mobile".to_string(), "false".to_string());
        let resolved = options
            .resolve(Some(&overrides("[compiler.define]\n\"CONFIG::debug\" = \"true\"")))
            .unwrap();
        assert_eq!(resolved.compiler.define["CONFIG::debug"], "true");
        assert_eq!(resolved.compiler.define["CONFIG::mobile"], "false");
    }

    #[test]
    fn resolve_rejects_bad_type() {
        let err = BuildOptions::default()
            .resolve(Some(&overrides("[compiler]\ndebug = \"yes\"")))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn resolve_rejects_bad_runtime() {
        let err = BuildOptions::default()
            .resolve(Some(&overrides("[compiler]\ntarget_runtime = \"next\"")))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn validate_rejects_malformed_define() {
        let mut options = BuildOptions::default();
        options
            .compiler
            .define
            .insert("debug".to_string(), "true".to_string());
        assert!(matches!(
            options.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn validate_rejects_zero_frame_rate() {
        let mut options = BuildOptions::default();
        options.link.default_frame_rate = 0;
        assert!(options.validate().is_err());
    }

    #[test]
    fn runtime_major_parsing() {
        let mut compiler = CompilerOptions::default();
        compiler.target_runtime = "32".to_string();
        assert_eq!(compiler.target_runtime_major(), Some(32));
        compiler.target_runtime = "".to_string();
        assert_eq!(compiler.target_runtime_major(), None);
    }
}
