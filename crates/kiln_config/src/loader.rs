//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::{ArtifactKind, ProjectConfig};
use std::collections::BTreeSet;
use std::path::Path;

/// The configuration file name looked up in a project directory.
pub const CONFIG_FILE_NAME: &str = "kiln.toml";

/// Loads and validates a `kiln.toml` configuration from a project directory.
pub fn load_config(project_dir: &Path) -> Result<ProjectConfig, ConfigError> {
    let config_path = project_dir.join(CONFIG_FILE_NAME);
    let content = std::fs::read_to_string(&config_path)?;
    load_config_from_str(&content)
}

/// Parses and validates a `kiln.toml` configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<ProjectConfig, ConfigError> {
    let config: ProjectConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates required fields and cross-artifact references.
fn validate_config(config: &ProjectConfig) -> Result<(), ConfigError> {
    if config.project.name.is_empty() {
        return Err(ConfigError::MissingField("project.name".to_string()));
    }

    let mut names = BTreeSet::new();
    for artifact in &config.artifacts {
        if artifact.name.is_empty() {
            return Err(ConfigError::MissingField("artifacts.name".to_string()));
        }
        if !names.insert(artifact.name.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate artifact name '{}'",
                artifact.name
            )));
        }
        if artifact.kind == ArtifactKind::Application && artifact.targets.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "application '{}' has no targets",
                artifact.name
            )));
        }
    }

    for artifact in &config.artifacts {
        for dep in &artifact.depends_on {
            if !names.contains(dep.as_str()) {
                return Err(ConfigError::UnknownArtifact(dep.clone()));
            }
        }
    }

    if config.compiler.target_runtime_major().is_none() {
        return Err(ConfigError::ValidationError(format!(
            "target_runtime '{}' must start with an integer major version",
            config.compiler.target_runtime
        )));
    }
    Ok(())
}
