//! Post-build extension hooks.

use crate::decision::Decision;
use kiln_config::{ArtifactKind, BuildOptions};

/// An immutable view of a finished build handed to extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSnapshot {
    /// Artifact name.
    pub artifact: String,
    /// Application or library.
    pub kind: ArtifactKind,
    /// Effective options the build ran with.
    pub options: BuildOptions,
    /// What the compile pass decided.
    pub decision: Decision,
    /// Bytes written.
    pub bytes: u64,
    /// Compiled units retained.
    pub unit_count: usize,
}

/// Runs after every successful build that logged no errors.
pub trait Extension: Send + Sync {
    /// Called once per successful build.
    fn on_build(&self, snapshot: &BuildSnapshot);
}
