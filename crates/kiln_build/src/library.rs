//! Library archive builds.

use crate::builder::forward_builder;
use crate::collab::{SourceContainers, Toolchain};
use crate::engine::{anchor_options, anchored, ArtifactBuild, LinkRoots};
use kiln_common::QName;
use kiln_config::{ArtifactKind, BuildOptions, ConfigError, ResolvedArtifact};
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

/// What a library archive includes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryComponents {
    /// Definitions included by qualified name.
    pub classes: Vec<QName>,
    /// Source files or directories included wholesale.
    pub sources: Vec<PathBuf>,
    /// Namespaces whose definitions are all included.
    pub namespaces: Vec<String>,
    /// Resource bundles included.
    pub bundles: Vec<String>,
}

/// Builds a library archive from its components.
#[derive(Debug)]
pub struct LibraryBuild {
    engine: ArtifactBuild,
    components: LibraryComponents,
}

impl LibraryBuild {
    /// Creates a library build.
    pub fn new(
        name: impl Into<String>,
        components: LibraryComponents,
        options: BuildOptions,
        toolchain: Toolchain,
    ) -> Self {
        let containers = SourceContainers {
            file_specs: Vec::new(),
            source_list: components.sources.clone(),
            source_path: Vec::new(),
            bundles: components.bundles.clone(),
        };
        let engine = ArtifactBuild::new(
            name,
            ArtifactKind::Library,
            containers,
            LinkRoots::Components(components.clone()),
            options,
            toolchain,
        );
        Self { engine, components }
    }

    /// Creates a library build from a resolved `kiln.toml` artifact,
    /// anchoring relative paths at `base`.
    pub fn from_resolved(
        artifact: &ResolvedArtifact,
        base: &Path,
        toolchain: Toolchain,
    ) -> Result<Self, ConfigError> {
        let classes = artifact
            .include_classes
            .iter()
            .map(|c| {
                c.parse::<QName>().map_err(|e| {
                    ConfigError::ValidationError(format!(
                        "artifact '{}': include class '{c}': {e}",
                        artifact.name
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let components = LibraryComponents {
            classes,
            sources: artifact
                .include_sources
                .iter()
                .map(|s| anchored(base, s))
                .collect(),
            namespaces: artifact.include_namespaces.clone(),
            bundles: artifact.include_bundles.clone(),
        };
        let mut options = artifact.options.clone();
        anchor_options(base, &mut options);
        let mut build = Self::new(artifact.name.clone(), components, options, toolchain);
        build.engine.configure_from(artifact, base);
        Ok(build)
    }

    /// The included components.
    pub fn components(&self) -> &LibraryComponents {
        &self.components
    }

    fn engine(&self) -> &ArtifactBuild {
        &self.engine
    }

    fn engine_mut(&mut self) -> &mut ArtifactBuild {
        &mut self.engine
    }
}

impl Deref for LibraryBuild {
    type Target = ArtifactBuild;

    fn deref(&self) -> &ArtifactBuild {
        &self.engine
    }
}

impl DerefMut for LibraryBuild {
    fn deref_mut(&mut self) -> &mut ArtifactBuild {
        &mut self.engine
    }
}

forward_builder!(LibraryBuild);
