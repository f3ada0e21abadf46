//! The subset of compiler options that translation-cache reuse depends on.

use kiln_config::CompilerOptions;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Load-bearing compiler options captured when a cache is populated.
///
/// Two keys compare equal exactly when units compiled under one may be reused
/// under the other. List-valued options are held as sets so ordering
/// differences never force a cache clear. Options outside this key, such as
/// token substitutions or library paths, do not affect reuse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyKey {
    strict: bool,
    dialect: u32,
    target_runtime_major: Option<u32>,
    debug: bool,
    omit_trace_statements: bool,
    accessible: bool,
    define: BTreeMap<String, String>,
    verbose_stacktraces: bool,
    keep_metadata: BTreeSet<String>,
    keep_generated: bool,
    runtime_design_layers: bool,
    locales: BTreeSet<String>,
    themes: BTreeSet<PathBuf>,
    source_path: BTreeSet<PathBuf>,
}

impl ConsistencyKey {
    /// Captures the load-bearing subset of `options`.
    pub fn from_options(options: &CompilerOptions) -> Self {
        Self {
            strict: options.strict,
            dialect: options.dialect,
            target_runtime_major: options.target_runtime_major(),
            debug: options.debug,
            omit_trace_statements: options.omit_trace_statements,
            accessible: options.accessible,
            define: options.define.clone(),
            verbose_stacktraces: options.verbose_stacktraces,
            keep_metadata: options.keep_metadata.iter().cloned().collect(),
            keep_generated: options.keep_generated,
            runtime_design_layers: options.runtime_design_layers,
            locales: options.locales.iter().cloned().collect(),
            themes: options.themes.iter().cloned().collect(),
            source_path: options.source_path.iter().cloned().collect(),
        }
    }
}

impl From<&CompilerOptions> for ConsistencyKey {
    fn from(options: &CompilerOptions) -> Self {
        Self::from_options(options)
    }
}
