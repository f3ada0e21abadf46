//! Configuration types deserialized from `kiln.toml`.

use crate::options::{CompilerOptions, LinkOptions};
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

/// The top-level project configuration parsed from `kiln.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    /// Core project metadata.
    pub project: ProjectMeta,
    /// Project-wide compiler options shared by every artifact.
    #[serde(default)]
    pub compiler: CompilerOptions,
    /// Project-wide link options shared by every artifact.
    #[serde(default)]
    pub link: LinkOptions,
    /// The artifacts the project builds.
    #[serde(default)]
    pub artifacts: Vec<ArtifactConfig>,
}

impl ProjectConfig {
    /// Looks up an artifact by name.
    pub fn artifact(&self, name: &str) -> Option<&ArtifactConfig> {
        self.artifacts.iter().find(|a| a.name == name)
    }
}

/// Core project metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectMeta {
    /// The project name.
    pub name: String,
    /// The project version string.
    #[serde(default)]
    pub version: String,
}

/// The kind of binary artifact an artifact build produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// An executable application image.
    Application,
    /// A reusable library archive.
    Library,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Application => write!(f, "application"),
            ArtifactKind::Library => write!(f, "library"),
        }
    }
}

/// One `[[artifacts]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactConfig {
    /// Unique artifact name.
    pub name: String,
    /// Whether this is an application or a library.
    pub kind: ArtifactKind,
    /// Output file the encoded artifact is written to.
    pub output: PathBuf,
    /// Optional incremental-cache file persisted between builds.
    #[serde(default)]
    pub cache_file: Option<PathBuf>,
    /// Application target files; the last one is the main target.
    #[serde(default)]
    pub targets: Vec<PathBuf>,
    /// Library component: definitions included by qualified name.
    #[serde(default)]
    pub include_classes: Vec<String>,
    /// Library component: source files or directories included wholesale.
    #[serde(default)]
    pub include_sources: Vec<PathBuf>,
    /// Library component: namespaces whose definitions are included.
    #[serde(default)]
    pub include_namespaces: Vec<String>,
    /// Library component: resource bundles included.
    #[serde(default)]
    pub include_bundles: Vec<String>,
    /// Names of artifacts that must be built before this one.
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Compiler option overrides for this artifact.
    #[serde(default)]
    pub compiler: Option<toml::Table>,
    /// Link option overrides for this artifact.
    #[serde(default)]
    pub link: Option<toml::Table>,
}
