//! Application image builds.

use crate::builder::forward_builder;
use crate::collab::{SourceContainers, Toolchain};
use crate::engine::{anchor_options, anchored, ArtifactBuild, LinkRoots};
use kiln_config::{ArtifactKind, BuildOptions, ResolvedArtifact};
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

/// Builds an application image from its target files.
///
/// The last target is the main target; its definitions are the link roots.
#[derive(Debug)]
pub struct ApplicationBuild {
    engine: ArtifactBuild,
    targets: Vec<PathBuf>,
}

impl ApplicationBuild {
    /// Creates an application build.
    pub fn new(
        name: impl Into<String>,
        targets: Vec<PathBuf>,
        options: BuildOptions,
        toolchain: Toolchain,
    ) -> Self {
        let main = targets.last().cloned().unwrap_or_default();
        let containers = SourceContainers {
            file_specs: targets.clone(),
            ..SourceContainers::default()
        };
        let engine = ArtifactBuild::new(
            name,
            ArtifactKind::Application,
            containers,
            LinkRoots::MainTarget(main),
            options,
            toolchain,
        );
        Self { engine, targets }
    }

    /// Creates an application build from a resolved `kiln.toml` artifact,
    /// anchoring relative paths at `base`.
    pub fn from_resolved(artifact: &ResolvedArtifact, base: &Path, toolchain: Toolchain) -> Self {
        let targets = artifact
            .targets
            .iter()
            .map(|t| anchored(base, t))
            .collect();
        let mut options = artifact.options.clone();
        anchor_options(base, &mut options);
        let mut build = Self::new(artifact.name.clone(), targets, options, toolchain);
        build.engine.configure_from(artifact, base);
        build
    }

    /// The target files, main target last.
    pub fn targets(&self) -> &[PathBuf] {
        &self.targets
    }

    /// The main target.
    pub fn main_target(&self) -> Option<&Path> {
        self.targets.last().map(PathBuf::as_path)
    }

    fn engine(&self) -> &ArtifactBuild {
        &self.engine
    }

    fn engine_mut(&mut self) -> &mut ArtifactBuild {
        &mut self.engine
    }
}

impl Deref for ApplicationBuild {
    type Target = ArtifactBuild;

    fn deref(&self) -> &ArtifactBuild {
        &self.engine
    }
}

impl DerefMut for ApplicationBuild {
    fn deref_mut(&mut self) -> &mut ArtifactBuild {
        &mut self.engine
    }
}

forward_builder!(ApplicationBuild);
