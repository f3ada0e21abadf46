//! Project-wide sweeps over the build graph.

use crate::codes;
use crate::error::ProjectError;
use crate::graph::{lock, BuildGraph, NodeId, SharedBuilder};
use kiln_build::{ApplicationBuild, ArtifactBuild, Decision, LibraryBuild, StopHandle, Toolchain};
use kiln_cache::{SharedLibraryCache, SharedTranslationCache};
use kiln_config::{load_config, resolve_artifact, ArtifactKind, ProjectConfig};
use kiln_diagnostics::{Diagnostic, Logger, NullLogger};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// How one artifact fared in a project build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactOutcome {
    /// The artifact name.
    pub name: String,
    /// Bytes written. Zero means the build failed.
    pub bytes: u64,
    /// The decision its last compile took.
    pub decision: Option<Decision>,
}

/// The result of [`Project::build`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectOutcome {
    /// Artifacts that were built, in build order.
    pub built: Vec<ArtifactOutcome>,
    /// Artifacts left out because they are in or depend on a cycle.
    pub excluded: Vec<String>,
    /// The sweep was stopped before reaching every artifact.
    pub stopped: bool,
}

impl ProjectOutcome {
    /// Names of the artifacts whose build produced no output.
    pub fn failed(&self) -> Vec<&str> {
        self.built
            .iter()
            .filter(|a| a.bytes == 0)
            .map(|a| a.name.as_str())
            .collect()
    }

    /// Every artifact was built and produced output.
    pub fn is_success(&self) -> bool {
        !self.stopped && self.excluded.is_empty() && self.built.iter().all(|a| a.bytes > 0)
    }
}

/// A set of artifact builds and the order they build in.
pub struct Project {
    name: String,
    graph: BuildGraph,
    logger: Arc<dyn Logger>,
    stop: StopHandle,
}

impl Project {
    /// Creates an empty project.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            graph: BuildGraph::new(),
            logger: Arc::new(NullLogger),
            stop: StopHandle::new(),
        }
    }

    /// Loads `kiln.toml` from `project_dir` and builds the project from it.
    pub fn load(project_dir: &Path, toolchain: Toolchain) -> Result<Self, ProjectError> {
        let config = load_config(project_dir)?;
        Self::from_config(&config, project_dir, toolchain, Arc::new(NullLogger))
    }

    /// Creates one builder per configured artifact, with relative paths
    /// anchored at `base`, and wires up their `depends_on` edges.
    ///
    /// All builders share one translation cache, one library cache and
    /// `logger`. Each builder also stops when the project is stopped, until
    /// the next sweep begins.
    pub fn from_config(
        config: &ProjectConfig,
        base: &Path,
        toolchain: Toolchain,
        logger: Arc<dyn Logger>,
    ) -> Result<Self, ProjectError> {
        let translation_cache = SharedTranslationCache::default();
        let library_cache = SharedLibraryCache::default();

        let mut project = Self::new(config.project.name.clone());
        project.set_logger(logger);
        let mut by_name: HashMap<String, SharedBuilder> = HashMap::new();
        for artifact in &config.artifacts {
            let resolved = resolve_artifact(config, &artifact.name)?;
            let builder: SharedBuilder = match resolved.kind {
                ArtifactKind::Application => {
                    let mut build = ApplicationBuild::from_resolved(&resolved, base, toolchain.clone());
                    share(&mut build, &project, &translation_cache, &library_cache);
                    Arc::new(Mutex::new(build))
                }
                ArtifactKind::Library => {
                    let mut build = LibraryBuild::from_resolved(&resolved, base, toolchain.clone())?;
                    share(&mut build, &project, &translation_cache, &library_cache);
                    Arc::new(Mutex::new(build))
                }
            };
            project.add_builder(builder.clone());
            by_name.insert(resolved.name, builder);
        }

        for artifact in &config.artifacts {
            let Some(dependent) = by_name.get(&artifact.name) else {
                continue;
            };
            for dependency in &artifact.depends_on {
                let Some(target) = by_name.get(dependency) else {
                    return Err(ProjectError::UnknownDependency {
                        artifact: artifact.name.clone(),
                        dependency: dependency.clone(),
                    });
                };
                project.depends_on(dependent, target);
            }
        }
        Ok(project)
    }

    /// The project name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Routes project diagnostics to `logger`.
    pub fn set_logger(&mut self, logger: Arc<dyn Logger>) {
        self.logger = logger;
    }

    /// The underlying graph.
    pub fn graph(&self) -> &BuildGraph {
        &self.graph
    }

    /// Registers `builder`. Returns `false` if it was already registered.
    pub fn add_builder(&mut self, builder: SharedBuilder) -> bool {
        self.graph.add(builder)
    }

    /// Unregisters `builder` and its edges.
    pub fn remove_builder(&mut self, builder: &SharedBuilder) -> bool {
        self.graph.remove(builder)
    }

    /// Records that `dependent` builds after `dependency`.
    pub fn depends_on(&mut self, dependent: &SharedBuilder, dependency: &SharedBuilder) -> bool {
        self.graph.depends_on(dependent, dependency)
    }

    /// Looks a builder up by artifact name.
    pub fn builder(&self, name: &str) -> Option<SharedBuilder> {
        self.graph
            .find(name)
            .and_then(|id| self.graph.builder(id))
            .cloned()
    }

    /// Number of registered builders.
    pub fn len(&self) -> usize {
        self.graph.len()
    }

    /// Returns `true` if no builders are registered.
    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    fn handles(&self, ids: Vec<NodeId>) -> Vec<SharedBuilder> {
        ids.into_iter()
            .filter_map(|id| self.graph.builder(id).cloned())
            .collect()
    }

    fn names(&self, ids: &[NodeId]) -> Vec<String> {
        ids.iter()
            .filter_map(|id| self.graph.name(*id).map(str::to_string))
            .collect()
    }

    /// Builders in dependency order, without cycle members and what depends
    /// on them.
    pub fn build_order(&self) -> Vec<SharedBuilder> {
        self.handles(self.graph.build_order())
    }

    /// Builders participating in at least one cycle.
    pub fn detect_cycles(&self) -> Vec<SharedBuilder> {
        self.handles(self.graph.detect_cycles())
    }

    fn report_exclusions(&self) -> Vec<String> {
        let mut excluded = Vec::new();
        for cycle in self.graph.cycles() {
            let members = self.names(&cycle);
            self.logger.log(
                Diagnostic::error(
                    codes::DEPENDENCY_CYCLE,
                    format!("artifacts depend on each other: {}", members.join(" -> ")),
                )
                .with_note("these artifacts are not built by project-wide sweeps"),
            );
            excluded.extend(members);
        }
        for name in self.names(&self.graph.blocked()) {
            self.logger.log(Diagnostic::warning(
                codes::BLOCKED_BY_CYCLE,
                format!("skipping '{name}': it depends on a dependency cycle"),
            ));
            excluded.push(name);
        }
        excluded
    }

    /// Builds every artifact in build order.
    ///
    /// A failed artifact does not stop the sweep; its outcome records zero
    /// bytes. I/O errors abort the sweep.
    pub fn build(&self, incremental: bool) -> Result<ProjectOutcome, ProjectError> {
        self.stop.reset();
        let mut outcome = ProjectOutcome {
            excluded: self.report_exclusions(),
            ..ProjectOutcome::default()
        };

        let order = self.graph.build_order();
        for (done, id) in order.iter().enumerate() {
            if self.stop.is_requested() {
                self.logger.log(Diagnostic::info(
                    codes::PROJECT_STOPPED,
                    format!(
                        "project '{}' stopped after {done} of {} artifacts",
                        self.name,
                        order.len()
                    ),
                ));
                outcome.stopped = true;
                break;
            }
            let Some(builder) = self.graph.builder(*id) else {
                continue;
            };
            let mut guard = lock(builder);
            let bytes = guard.build(incremental).map_err(|source| ProjectError::Io {
                artifact: guard.name().to_string(),
                source,
            })?;
            outcome.built.push(ArtifactOutcome {
                name: guard.name().to_string(),
                bytes,
                decision: guard.last_decision(),
            });
        }
        Ok(outcome)
    }

    /// Cleans every artifact in build order.
    pub fn clean(&self) -> Result<(), ProjectError> {
        for id in self.graph.build_order() {
            let Some(builder) = self.graph.builder(id) else {
                continue;
            };
            let mut guard = lock(builder);
            guard.clean().map_err(|source| ProjectError::Io {
                artifact: guard.name().to_string(),
                source,
            })?;
        }
        Ok(())
    }

    /// Requests cancellation of the current sweep and of every artifact in
    /// build order. Never blocks on a running build.
    pub fn stop(&self) {
        self.stop.request();
        for id in self.graph.build_order() {
            if let Some(handle) = self.graph.stop_handle(id) {
                handle.request();
            }
        }
    }

    /// A handle that stops the current sweep from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }
}

fn share(
    engine: &mut ArtifactBuild,
    project: &Project,
    translation_cache: &SharedTranslationCache,
    library_cache: &SharedLibraryCache,
) {
    engine.set_translation_cache(translation_cache.clone());
    engine.set_library_cache(library_cache.clone());
    engine.set_logger(project.logger.clone());
    engine.follow_stop(&project.stop);
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("name", &self.name)
            .field("graph", &self.graph)
            .finish_non_exhaustive()
    }
}
