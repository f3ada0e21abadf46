//! Artifact resolution: merging project-level and artifact-specific options.

use crate::error::ConfigError;
use crate::options::BuildOptions;
use crate::types::{ArtifactKind, ProjectConfig};
use std::path::PathBuf;

/// A fully resolved artifact with project and artifact options merged.
#[derive(Debug, Clone)]
pub struct ResolvedArtifact {
    /// The artifact name.
    pub name: String,
    /// Application or library.
    pub kind: ArtifactKind,
    /// Output file.
    pub output: PathBuf,
    /// Optional incremental-cache file.
    pub cache_file: Option<PathBuf>,
    /// Application target files.
    pub targets: Vec<PathBuf>,
    /// Library definitions included by qualified name.
    pub include_classes: Vec<String>,
    /// Library source files included wholesale.
    pub include_sources: Vec<PathBuf>,
    /// Library namespaces included.
    pub include_namespaces: Vec<String>,
    /// Library resource bundles included.
    pub include_bundles: Vec<String>,
    /// Artifacts this one builds after.
    pub depends_on: Vec<String>,
    /// Effective options (project base, artifact overlay).
    pub options: BuildOptions,
}

/// Resolves a named artifact by merging project options with its overrides.
///
/// The artifact's `compiler` and `link` tables are deep-merged over the
/// project-level tables; maps merge key by key, lists are replaced.
pub fn resolve_artifact(
    config: &ProjectConfig,
    artifact_name: &str,
) -> Result<ResolvedArtifact, ConfigError> {
    let artifact = config
        .artifact(artifact_name)
        .ok_or_else(|| ConfigError::UnknownArtifact(artifact_name.to_string()))?;

    let base = BuildOptions {
        compiler: config.compiler.clone(),
        link: config.link.clone(),
    };

    let mut overrides = toml::Table::new();
    if let Some(compiler) = &artifact.compiler {
        overrides.insert("compiler".to_string(), toml::Value::Table(compiler.clone()));
    }
    if let Some(link) = &artifact.link {
        overrides.insert("link".to_string(), toml::Value::Table(link.clone()));
    }
    let options = if overrides.is_empty() {
        base.resolve(None)?
    } else {
        base.resolve(Some(&overrides))?
    };

    Ok(ResolvedArtifact {
        name: artifact.name.clone(),
        kind: artifact.kind,
        output: artifact.output.clone(),
        cache_file: artifact.cache_file.clone(),
        targets: artifact.targets.clone(),
        include_classes: artifact.include_classes.clone(),
        include_sources: artifact.include_sources.clone(),
        include_namespaces: artifact.include_namespaces.clone(),
        include_bundles: artifact.include_bundles.clone(),
        depends_on: artifact.depends_on.clone(),
        options,
    })
}
