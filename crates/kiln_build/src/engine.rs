//! The compile → link → encode pipeline shared by application and library
//! builds.

use crate::codes;
use crate::collab::{CompileRequest, LinkRequest, SourceContainers, Toolchain};
use crate::decision::{decide_with, Decision, Evidence};
use crate::error::{CompileError, EncodeError, ResolveError, LoadError};
use crate::extension::{BuildSnapshot, Extension};
use crate::fingerprint::{compute_fingerprints, FingerprintSet, LibraryCheck, LibraryRecord};
use crate::library::LibraryComponents;
use crate::phase::Phase;
use crate::state::{BuildState, SavedState};
use crate::stop::StopHandle;
use crate::validate::{validate_units, Validation};
use kiln_cache::{
    CacheError, CacheLease, CompilerContext, ConsistencyKey, ContainerKind, ResolvedLibraries,
    SharedLibraryCache, SharedTranslationCache, SourceRecord, TranslationUnit,
};
use kiln_common::QName;
use kiln_config::{ArtifactKind, BuildOptions, ResolvedArtifact};
use kiln_diagnostics::{Diagnostic, Location, Logger, NullLogger};
use std::cell::Cell;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What an artifact's link starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkRoots {
    /// The definitions of the source at this path (an application's main
    /// target).
    MainTarget(PathBuf),
    /// The definitions selected by library components.
    Components(LibraryComponents),
}

impl LinkRoots {
    /// Stable string form hashed into the link fingerprint.
    fn keys(&self) -> Vec<String> {
        match self {
            LinkRoots::MainTarget(path) => vec![format!("target:{}", path.display())],
            LinkRoots::Components(components) => components
                .classes
                .iter()
                .map(|c| format!("class:{c}"))
                .chain(components.sources.iter().map(|s| format!("source:{}", s.display())))
                .chain(components.namespaces.iter().map(|n| format!("namespace:{n}")))
                .chain(components.bundles.iter().map(|b| format!("bundle:{b}")))
                .collect(),
        }
    }

    /// Selects root definitions among compiled `sources`.
    fn select(&self, sources: &BTreeMap<QName, SourceRecord>) -> BTreeSet<QName> {
        let definitions = |record: &SourceRecord| -> Vec<QName> {
            match &record.unit {
                Some(unit) if !unit.top_level_definitions.is_empty() => {
                    unit.top_level_definitions.iter().cloned().collect()
                }
                _ => vec![record.name.clone()],
            }
        };
        match self {
            LinkRoots::MainTarget(path) => sources
                .values()
                .filter(|r| r.path == *path)
                .flat_map(definitions)
                .collect(),
            LinkRoots::Components(components) => {
                let mut roots: BTreeSet<QName> = components.classes.iter().cloned().collect();
                for record in sources.values() {
                    let listed = record.owner == ContainerKind::SourceList
                        || components.sources.iter().any(|s| record.path.starts_with(s));
                    let namespace = record.name.namespace();
                    let in_namespace = components.namespaces.iter().any(|ns| {
                        namespace == ns.as_str()
                            || namespace
                                .strip_prefix(ns.as_str())
                                .is_some_and(|rest| rest.starts_with('.'))
                    });
                    let bundle = record.owner == ContainerKind::Resources
                        || record.owner == ContainerKind::BundlePath;
                    if listed || in_namespace || bundle {
                        roots.extend(definitions(record));
                    }
                }
                roots
            }
        }
    }
}

/// The work one compile pass will do.
struct Plan {
    decision: Decision,
    records: BTreeMap<QName, SourceRecord>,
    compile: Vec<QName>,
    reusable: BTreeSet<QName>,
    removed: usize,
    reason: Option<String>,
}

impl Plan {
    fn full(records: BTreeMap<QName, SourceRecord>, reason: Option<String>) -> Self {
        let compile: Vec<QName> = records.keys().cloned().collect();
        Self {
            decision: Decision::FullRebuild,
            reusable: compile.iter().cloned().collect(),
            compile,
            records,
            removed: 0,
            reason,
        }
    }

    fn without_reuse(mut self) -> Self {
        self.reusable.clear();
        self
    }
}

enum CompileFailure {
    Stopped,
    Errors(Vec<CompileError>),
}

/// One artifact's build pipeline.
///
/// Owns the artifact's options, source containers, link roots and retained
/// state. The translation cache and library cache are shared handles owned by
/// the caller; `clean` never touches them.
pub struct ArtifactBuild {
    name: String,
    kind: ArtifactKind,
    options: BuildOptions,
    overrides: Option<toml::Table>,
    containers: SourceContainers,
    roots: LinkRoots,
    output: Option<PathBuf>,
    cache_file: Option<PathBuf>,
    toolchain: Toolchain,
    logger: Arc<dyn Logger>,
    translation_cache: SharedTranslationCache,
    library_cache: SharedLibraryCache,
    extensions: Vec<Arc<dyn Extension>>,
    stop: StopHandle,
    phase: Phase,
    state: Option<BuildState>,
    effective: Option<BuildOptions>,
    last_decision: Option<Decision>,
    relink: bool,
    errors: Cell<usize>,
}

impl ArtifactBuild {
    /// Creates a build with private caches and a logger that discards
    /// everything.
    pub fn new(
        name: impl Into<String>,
        kind: ArtifactKind,
        containers: SourceContainers,
        roots: LinkRoots,
        options: BuildOptions,
        toolchain: Toolchain,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            options,
            overrides: None,
            containers,
            roots,
            output: None,
            cache_file: None,
            toolchain,
            logger: Arc::new(NullLogger),
            translation_cache: SharedTranslationCache::default(),
            library_cache: SharedLibraryCache::default(),
            extensions: Vec::new(),
            stop: StopHandle::new(),
            phase: Phase::Idle,
            state: None,
            effective: None,
            last_decision: None,
            relink: false,
            errors: Cell::new(0),
        }
    }

    /// The artifact name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Application or library.
    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    /// The stored options, before overrides.
    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Replaces the stored options.
    pub fn set_options(&mut self, options: BuildOptions) {
        self.options = options;
    }

    /// Sets the override table merged over the stored options at every
    /// compile and link.
    pub fn set_overrides(&mut self, overrides: Option<toml::Table>) {
        self.overrides = overrides;
    }

    /// Where [`build`](Self::build) writes.
    pub fn output(&self) -> Option<&Path> {
        self.output.as_deref()
    }

    /// Sets the output file.
    pub fn set_output(&mut self, output: impl Into<PathBuf>) {
        self.output = Some(output.into());
    }

    /// Sets the incremental-cache file restored before and written after a
    /// build.
    pub fn set_cache_file(&mut self, cache_file: impl Into<PathBuf>) {
        self.cache_file = Some(cache_file.into());
    }

    /// Sets the output and cache files of a resolved artifact,
    /// anchoring relative paths at `base`.
    pub(crate) fn configure_from(&mut self, artifact: &ResolvedArtifact, base: &Path) {
        self.output = Some(anchored(base, &artifact.output));
        self.cache_file = artifact.cache_file.as_deref().map(|p| anchored(base, p));
    }

    /// Sets the diagnostics destination.
    pub fn set_logger(&mut self, logger: Arc<dyn Logger>) {
        self.logger = logger;
    }

    /// Shares a translation cache with other builds.
    pub fn set_translation_cache(&mut self, cache: SharedTranslationCache) {
        self.translation_cache = cache;
    }

    /// Shares a library cache with other builds.
    pub fn set_library_cache(&mut self, cache: SharedLibraryCache) {
        self.library_cache = cache;
    }

    /// Registers a post-build extension.
    pub fn add_extension(&mut self, extension: Arc<dyn Extension>) {
        self.extensions.push(extension);
    }

    /// The source containers resolved at each compile.
    pub fn containers(&self) -> &SourceContainers {
        &self.containers
    }

    /// Makes this build also stop when `parent` is requested.
    ///
    /// Replaces the build's stop handle; handles taken earlier no longer
    /// reach it.
    pub fn follow_stop(&mut self, parent: &StopHandle) {
        self.stop = StopHandle::following(parent);
    }

    /// A handle that cancels this build from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// The current pipeline phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The decision of the last compile, if any.
    pub fn last_decision(&self) -> Option<Decision> {
        self.last_decision
    }

    /// Retained state, if a compile has succeeded or state was loaded.
    pub fn state(&self) -> Option<&BuildState> {
        self.state.as_ref()
    }

    /// Number of compiled units in the retained state.
    pub fn unit_count(&self) -> usize {
        self.state.as_ref().map_or(0, BuildState::unit_count)
    }

    fn report(&self, diagnostic: Diagnostic) {
        if diagnostic.severity.is_error() {
            self.errors.set(self.errors.get() + 1);
        }
        self.logger
            .log(diagnostic.in_build(self.name.clone(), self.phase.to_string()));
    }

    fn fail(&mut self) -> Decision {
        self.phase = Phase::Failed;
        Decision::Fail
    }

    fn stopped(&mut self) {
        self.phase = Phase::Stopped;
        self.report(Diagnostic::info(codes::STOPPED, "build stopped on request"));
    }

    fn resolve_options(&self) -> Option<BuildOptions> {
        match self.options.resolve(self.overrides.as_ref()) {
            Ok(options) => Some(options),
            Err(err) => {
                self.report(Diagnostic::error(
                    codes::CONFIG_INVALID,
                    format!("invalid configuration: {err}"),
                ));
                None
            }
        }
    }

    fn load_libraries(&self, options: &BuildOptions) -> Result<ResolvedLibraries, LoadError> {
        let loader = &self.toolchain.loader;
        let mut libraries = Vec::with_capacity(options.compiler.library_path.len());
        for location in &options.compiler.library_path {
            let modified = loader.last_modified(location)?;
            let library = match self.library_cache.fresh(location, modified) {
                Some(library) => library,
                None => {
                    let library = loader.load(location)?;
                    self.library_cache.insert(library.clone());
                    library
                }
            };
            libraries.push(library);
        }
        Ok(ResolvedLibraries::new(libraries))
    }

    fn resolve_sources(
        &self,
        options: &BuildOptions,
    ) -> Result<BTreeMap<QName, SourceRecord>, ResolveError> {
        let mut containers = self.containers.clone();
        let mut source_path = options.compiler.source_path.clone();
        source_path.append(&mut containers.source_path);
        containers.source_path = source_path;

        let mut records = BTreeMap::new();
        for record in self.toolchain.resolver.resolve(&containers)? {
            match records.entry(record.name.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(record.without_unit());
                }
                Entry::Occupied(kept) => {
                    let kept: &SourceRecord = kept.get();
                    self.report(
                        Diagnostic::warning(
                            codes::DUPLICATE_SOURCE,
                            format!("'{}' is defined by more than one source", record.name),
                        )
                        .at(Location::file(&record.path))
                        .with_note(format!("using {}", kept.path.display())),
                    );
                }
            }
        }
        Ok(records)
    }

    /// Brings the shared translation cache in line with `options`, clearing
    /// it if it was populated under a load-bearing difference.
    fn check_cache_consistency(&self, lease: &CacheLease, options: &BuildOptions) {
        let mut cache = lease.lock();
        if cache.is_consistent(&options.compiler) {
            return;
        }
        if !cache.is_empty() {
            self.report(Diagnostic::info(
                codes::CACHE_CLEARED,
                format!(
                    "translation cache cleared: {} entries were compiled under different options",
                    cache.len()
                ),
            ));
        }
        cache.clear();
        cache.set_configuration(&options.compiler);
    }

    fn plan(
        &self,
        incremental: bool,
        resolved: BTreeMap<QName, SourceRecord>,
        fingerprints: &FingerprintSet,
        libraries: &ResolvedLibraries,
        checksums: bool,
    ) -> Plan {
        let previous = if incremental { self.state.as_ref() } else { None };
        let Some(state) = previous else {
            if incremental {
                return Plan::full(resolved, None);
            }
            return Plan::full(resolved, Some("non-incremental build".to_string())).without_reuse();
        };

        // Checked under the previous command fingerprint so the result
        // reflects libraries alone.
        let libraries_only = FingerprintSet {
            command: state.fingerprints.command,
            ..*fingerprints
        };
        let check = state
            .library
            .check(state.fingerprints.aggregate, &libraries_only, libraries, checksums);
        let libraries_drifted = matches!(check, LibraryCheck::Recompile(_));
        let mut reason = None;
        if let LibraryCheck::Recompile(why) = &check {
            reason = Some(why.clone());
        } else if state.fingerprints.command != fingerprints.command {
            reason = Some("compiler options changed".to_string());
        }
        let full_recompile = libraries_drifted || state.fingerprints.command != fingerprints.command;

        let validation = if full_recompile {
            Validation::default()
        } else {
            let changed = match &check {
                LibraryCheck::Changed(files) => {
                    let mut defs = libraries.definitions_of(files);
                    defs.extend(state.libraries.definitions_of(files));
                    defs
                }
                _ => BTreeSet::new(),
            };
            validate_units(&state.sources, &resolved, &changed)
        };

        let evidence = Evidence {
            unit_count_changed: !validation.is_empty(),
            relink: self.relink || matches!(check, LibraryCheck::Changed(_)),
            full_recompile: Some(full_recompile),
        };
        let decision = decide_with(Some(&state.fingerprints), fingerprints, evidence);
        if decision == Decision::FullRebuild {
            let plan = Plan::full(resolved, reason);
            return if libraries_drifted { plan.without_reuse() } else { plan };
        }

        let mut records = resolved;
        for (name, record) in records.iter_mut() {
            if validation.stale.contains_key(name) {
                continue;
            }
            if let Some(previous) = state.sources.get(name) {
                record.unit = previous.unit.clone();
                record.reused = previous.reused;
            }
        }
        Plan {
            decision,
            compile: validation.stale.keys().cloned().collect(),
            reusable: validation
                .stale
                .keys()
                .filter(|name| validation.reusable_from_cache(name))
                .cloned()
                .collect(),
            records,
            removed: validation.removed.len(),
            reason,
        }
    }

    /// Copies still-valid units out of the translation cache into `plan`,
    /// removing them from the compile list. Returns how many were reused.
    fn reuse_cached_units(
        &self,
        lease: &CacheLease,
        plan: &mut Plan,
        libraries: &ResolvedLibraries,
    ) -> usize {
        let found: Vec<(QName, TranslationUnit)> = {
            let cache = lease.lock();
            plan.compile
                .iter()
                .filter(|name| plan.reusable.contains(*name))
                .filter_map(|name| {
                    let current = plan.records.get(name)?;
                    cache
                        .reusable_unit(current, &plan.records, libraries)
                        .map(|unit| (name.clone(), unit.clone()))
                })
                .collect()
        };
        for (name, unit) in &found {
            if let Some(record) = plan.records.get_mut(name) {
                record.unit = Some(unit.clone());
                record.reused = true;
            }
        }
        let reused: BTreeSet<&QName> = found.iter().map(|(name, _)| name).collect();
        plan.compile.retain(|name| !reused.contains(name));
        found.len()
    }

    /// Compiles `names` one at a time, staging results. Nothing is merged
    /// unless every unit succeeds.
    fn compile_units(
        &self,
        names: &[QName],
        records: &BTreeMap<QName, SourceRecord>,
        options: &BuildOptions,
        libraries: &ResolvedLibraries,
    ) -> Result<BTreeMap<QName, TranslationUnit>, CompileFailure> {
        let key = ConsistencyKey::from_options(&options.compiler);
        let mut context = self
            .library_cache
            .take_context(&key)
            .unwrap_or_else(|| CompilerContext::new(key));

        let mut staged = BTreeMap::new();
        let mut errors = Vec::new();
        let mut stopped = false;
        for name in names {
            if self.stop.is_requested() {
                stopped = true;
                break;
            }
            let Some(source) = records.get(name) else {
                continue;
            };
            let request = CompileRequest {
                source,
                options: &options.compiler,
                libraries,
            };
            match self.toolchain.compiler.compile(&request, &mut context) {
                Ok(unit) => {
                    staged.insert(name.clone(), unit);
                }
                Err(err) => errors.push(err),
            }
        }
        self.library_cache.return_context(context);

        if stopped {
            Err(CompileFailure::Stopped)
        } else if !errors.is_empty() {
            Err(CompileFailure::Errors(errors))
        } else {
            Ok(staged)
        }
    }

    /// Runs one compile pass and returns its decision.
    ///
    /// Clears any pending stop request first. On failure the previously
    /// retained state is left untouched.
    pub fn compile(&mut self, incremental: bool) -> Decision {
        self.stop.reset();
        self.compile_pass(incremental)
    }

    fn compile_pass(&mut self, incremental: bool) -> Decision {
        self.phase = Phase::Compiling;
        let decision = self.run_compile(incremental);
        self.last_decision = Some(decision);
        if decision != Decision::Fail {
            self.phase = Phase::Idle;
        }
        decision
    }

    fn run_compile(&mut self, incremental: bool) -> Decision {
        let Some(options) = self.resolve_options() else {
            return self.fail();
        };
        let libraries = match self.load_libraries(&options) {
            Ok(libraries) => libraries,
            Err(err) => {
                self.report(
                    Diagnostic::error(codes::LIBRARY_LOAD_FAILED, err.reason.clone())
                        .at(Location::file(&err.location)),
                );
                return self.fail();
            }
        };
        let mut fingerprints = compute_fingerprints(&options, &self.roots.keys(), &libraries);
        let resolved = match self.resolve_sources(&options) {
            Ok(resolved) => resolved,
            Err(err) => {
                let mut diagnostic = Diagnostic::error(codes::RESOLVE_FAILED, err.to_string());
                if let Some(path) = err.path() {
                    diagnostic = diagnostic.at(Location::file(path));
                }
                self.report(diagnostic);
                return self.fail();
            }
        };

        let lease = self.translation_cache.lease();
        self.check_cache_consistency(&lease, &options);

        let checksums = options.compiler.library_checksums;
        let mut plan = self.plan(incremental, resolved, &fingerprints, &libraries, checksums);
        let reused = self.reuse_cached_units(&lease, &mut plan, &libraries);
        if reused > 0 {
            self.relink = true;
        }

        let staged = match self.compile_units(&plan.compile, &plan.records, &options, &libraries) {
            Ok(staged) => staged,
            Err(CompileFailure::Stopped) => {
                self.stopped();
                return Decision::Fail;
            }
            Err(CompileFailure::Errors(errors)) => {
                for err in errors {
                    let mut diagnostic = Diagnostic::error(codes::COMPILE_FAILED, err.to_string());
                    if let Some(location) = err.location {
                        diagnostic = diagnostic.at(location);
                    }
                    self.report(diagnostic);
                }
                return self.fail();
            }
        };

        let compiled = staged.len();
        for (name, mut unit) in staged {
            unit.record_library_signatures(|reference| {
                if plan.records.contains_key(reference) {
                    None
                } else {
                    libraries.signature(reference)
                }
            });
            if let Some(record) = plan.records.get_mut(&name) {
                record.unit = Some(unit);
                record.reused = false;
            }
        }
        if matches!(
            plan.decision,
            Decision::FullRebuild | Decision::IncrementalRecompile
        ) {
            let mut cache = lease.lock();
            cache.add_sources(
                plan.records
                    .iter()
                    .filter(|(_, record)| record.unit.is_some())
                    .map(|(name, record)| (name.clone(), record.clone())),
            );
        }
        drop(lease);

        let library = LibraryRecord::capture(&plan.records, &libraries, checksums);
        fingerprints.aggregate = Some(library.aggregate(&fingerprints, checksums));
        let (needs_link, linked) = match self.state.take() {
            Some(previous) => (previous.needs_link, previous.linked),
            None => (false, None),
        };

        let mut summary = Diagnostic::info(
            codes::DECISION,
            format!(
                "{}: {compiled} compiled, {reused} reused, {} removed",
                plan.decision, plan.removed
            ),
        );
        if let Some(reason) = &plan.reason {
            summary = summary.with_note(reason.clone());
        }
        self.report(summary);

        self.effective = Some(options);
        self.state = Some(BuildState {
            fingerprints,
            sources: plan.records,
            library,
            libraries,
            needs_link: needs_link || plan.decision.needs_link(),
            linked,
        });
        plan.decision
    }

    /// Links the retained units and encodes the result into `output`.
    ///
    /// Returns 0 when there is nothing to link, when the last compile failed
    /// or when linking fails. A link failure leaves the compiled units intact
    /// for a later relink.
    pub fn link(&mut self, output: &mut dyn Write) -> io::Result<u64> {
        if self.stop.is_requested() {
            self.stopped();
            return Ok(0);
        }
        if self.state.is_none() || self.last_decision == Some(Decision::Fail) {
            return Ok(0);
        }
        self.phase = Phase::Linking;
        let Some(options) = self.resolve_options() else {
            self.fail();
            return Ok(0);
        };
        let Some(state) = self.state.as_ref() else {
            return Ok(0);
        };
        let link_fingerprint =
            compute_fingerprints(&options, &self.roots.keys(), &state.libraries).link;
        let result = {
            let request = LinkRequest {
                artifact: &self.name,
                kind: self.kind,
                units: state.units().collect(),
                roots: self.roots.select(&state.sources),
                options: &options.link,
                libraries: &state.libraries,
            };
            self.toolchain.linker.link(&request)
        };

        match result {
            Ok(linked) => {
                if let Some(state) = self.state.as_mut() {
                    state.linked = Some(linked);
                    state.needs_link = false;
                    state.fingerprints.link = link_fingerprint;
                }
                self.relink = false;
                self.encode(output)
            }
            Err(err) => {
                self.report(Diagnostic::error(
                    codes::LINK_FAILED,
                    format!("link failed: {err}"),
                ));
                self.fail();
                Ok(0)
            }
        }
    }

    /// Encodes the last linked artifact into `output`.
    ///
    /// Returns 0 when nothing has been linked or the artifact cannot be
    /// encoded. Write failures propagate.
    pub fn encode(&mut self, output: &mut dyn Write) -> io::Result<u64> {
        let Some(linked) = self.state.as_ref().and_then(|s| s.linked.as_ref()) else {
            return Ok(0);
        };
        self.phase = Phase::Encoding;
        match self.toolchain.encoder.encode(linked, output) {
            Ok(written) => {
                self.phase = Phase::Idle;
                Ok(written)
            }
            Err(EncodeError::Io(err)) => {
                self.phase = Phase::Failed;
                Err(err)
            }
            Err(err) => {
                self.report(Diagnostic::error(
                    codes::ENCODE_FAILED,
                    format!("encode failed: {err}"),
                ));
                self.phase = Phase::Failed;
                Ok(0)
            }
        }
    }

    /// Compiles, links and encodes into `output`. Returns the bytes written,
    /// or 0 on failure.
    ///
    /// A stop requested at any point after the call begins, including while
    /// the cache file is restored, stops the build.
    pub fn build_to(&mut self, output: &mut dyn Write, incremental: bool) -> io::Result<u64> {
        self.errors.set(0);
        self.stop.reset();
        if incremental && self.state.is_none() {
            self.restore_cache_file()?;
        }

        let decision = self.compile_pass(incremental);
        let written = match decision {
            Decision::Fail => return Ok(0),
            Decision::Skip => {
                let pending = self
                    .state
                    .as_ref()
                    .map_or(true, |s| s.needs_link || s.linked.is_none());
                if pending {
                    self.link(output)?
                } else {
                    self.encode(output)?
                }
            }
            Decision::FullRebuild | Decision::IncrementalRecompile | Decision::RelinkOnly => {
                self.link(output)?
            }
        };

        if written > 0 {
            self.write_cache_file();
            if self.errors.get() == 0 {
                self.notify_extensions(decision, written);
            }
        }
        Ok(written)
    }

    /// Builds into the configured output file. Returns the bytes written, or
    /// 0 on failure or when no output is configured. The file is only
    /// written when the build produced bytes.
    pub fn build(&mut self, incremental: bool) -> io::Result<u64> {
        let Some(path) = self.output.clone() else {
            self.report(Diagnostic::error(
                codes::NO_OUTPUT,
                "no output location configured",
            ));
            return Ok(0);
        };
        let mut buffer = Vec::new();
        let written = self.build_to(&mut buffer, incremental)?;
        if written > 0 {
            create_parent(&path)?;
            fs::write(&path, &buffer)?;
        }
        Ok(written)
    }

    /// Discards retained state and deletes the cache and output files. The
    /// shared caches are left alone.
    pub fn clean(&mut self) -> io::Result<()> {
        self.state = None;
        self.effective = None;
        self.last_decision = None;
        self.relink = false;
        self.phase = Phase::Idle;
        for path in [self.cache_file.as_deref(), self.output.as_deref()]
            .into_iter()
            .flatten()
        {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Restores retained state from an incremental-cache stream.
    ///
    /// Returns `false` (and logs) when the stream holds no usable state for
    /// this artifact and toolchain; read failures propagate.
    pub fn load(&mut self, input: &mut dyn Read) -> io::Result<bool> {
        match SavedState::load(input, &self.toolchain.version) {
            Ok(saved) if saved.artifact == self.name => {
                self.state = Some(saved.into_state());
                self.last_decision = None;
                Ok(true)
            }
            Ok(saved) => {
                self.report(Diagnostic::info(
                    codes::CACHE_UNREADABLE,
                    format!(
                        "incremental cache belongs to artifact '{}'; ignoring it",
                        saved.artifact
                    ),
                ));
                Ok(false)
            }
            Err(CacheError::Stream(err)) => Err(err),
            Err(err) => {
                self.report(Diagnostic::info(
                    codes::CACHE_UNREADABLE,
                    format!("incremental cache ignored: {err}"),
                ));
                Ok(false)
            }
        }
    }

    /// Writes retained state to `output`. Returns 0 when there is none.
    pub fn save(&self, output: &mut dyn Write) -> io::Result<u64> {
        let Some(state) = &self.state else {
            return Ok(0);
        };
        state
            .save(&self.name, &self.toolchain.version, output)
            .map_err(|err| match err {
                CacheError::Stream(err) => err,
                CacheError::Io { source, .. } => source,
                other => io::Error::new(io::ErrorKind::InvalidData, other.to_string()),
            })
    }

    fn restore_cache_file(&mut self) -> io::Result<()> {
        let Some(path) = self.cache_file.clone() else {
            return Ok(());
        };
        let file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) => {
                self.report(
                    Diagnostic::info(
                        codes::CACHE_UNREADABLE,
                        format!("incremental cache ignored: {err}"),
                    )
                    .at(Location::file(&path)),
                );
                return Ok(());
            }
        };
        self.load(&mut BufReader::new(file))?;
        Ok(())
    }

    fn write_cache_file(&self) {
        let Some(path) = &self.cache_file else {
            return;
        };
        let result = create_parent(path)
            .and_then(|()| fs::File::create(path))
            .and_then(|file| {
                let mut writer = BufWriter::new(file);
                let written = self.save(&mut writer)?;
                writer.flush()?;
                Ok(written)
            });
        if let Err(err) = result {
            self.report(
                Diagnostic::warning(
                    codes::CACHE_SAVE_FAILED,
                    format!("failed to write incremental cache: {err}"),
                )
                .at(Location::file(path)),
            );
        }
    }

    fn notify_extensions(&self, decision: Decision, bytes: u64) {
        if self.extensions.is_empty() {
            return;
        }
        let snapshot = BuildSnapshot {
            artifact: self.name.clone(),
            kind: self.kind,
            options: self.effective.clone().unwrap_or_else(|| self.options.clone()),
            decision,
            bytes,
            unit_count: self.unit_count(),
        };
        for extension in &self.extensions {
            extension.on_build(&snapshot);
        }
    }
}

/// Resolves `path` against `base` unless it is absolute.
pub(crate) fn anchored(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Anchors the path-valued compiler options at `base`.
pub(crate) fn anchor_options(base: &Path, options: &mut BuildOptions) {
    let compiler = &mut options.compiler;
    for path in compiler
        .source_path
        .iter_mut()
        .chain(compiler.library_path.iter_mut())
        .chain(compiler.themes.iter_mut())
    {
        *path = anchored(base, path);
    }
}

fn create_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

impl std::fmt::Debug for ArtifactBuild {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactBuild")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("phase", &self.phase)
            .field("last_decision", &self.last_decision)
            .field("units", &self.unit_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_common::ContentHash;

    fn q(s: &str) -> QName {
        s.parse().unwrap()
    }

    fn record(name: &str, path: &str, owner: ContainerKind, defs: &[&str]) -> SourceRecord {
        SourceRecord::new(q(name), path, owner, 1, ContentHash::from_bytes(name.as_bytes()))
            .with_unit(TranslationUnit::new(defs.iter().map(|d| q(d))))
    }

    fn sources(records: Vec<SourceRecord>) -> BTreeMap<QName, SourceRecord> {
        records.into_iter().map(|r| (r.name.clone(), r)).collect()
    }

    #[test]
    fn main_target_roots() {
        let sources = sources(vec![
            record("app:Main", "src/app/Main.as", ContainerKind::FileSpec, &["app:Main", "app:Helper"]),
            record("app:Other", "src/app/Other.as", ContainerKind::SourcePath, &["app:Other"]),
        ]);
        let roots = LinkRoots::MainTarget(PathBuf::from("src/app/Main.as")).select(&sources);
        assert_eq!(roots, [q("app:Main"), q("app:Helper")].into_iter().collect());
    }

    #[test]
    fn component_roots() {
        let components = LibraryComponents {
            classes: vec![q("ui:Button")],
            sources: Vec::new(),
            namespaces: vec!["ui.controls".to_string()],
            bundles: Vec::new(),
        };
        let sources = sources(vec![
            record("ui.controls:Slider", "src/ui/controls/Slider.as", ContainerKind::SourcePath, &["ui.controls:Slider"]),
            record("ui.controls.skins:Skin", "src/ui/controls/skins/Skin.as", ContainerKind::SourcePath, &["ui.controls.skins:Skin"]),
            record("ui.controlsx:Other", "src/ui/controlsx/Other.as", ContainerKind::SourcePath, &["ui.controlsx:Other"]),
            record("extra:Listed", "lib/Listed.as", ContainerKind::SourceList, &["extra:Listed"]),
            record("core", "locale/core.properties", ContainerKind::Resources, &[]),
        ]);
        let roots = LinkRoots::Components(components).select(&sources);
        assert!(roots.contains(&q("ui:Button")));
        assert!(roots.contains(&q("ui.controls:Slider")));
        assert!(roots.contains(&q("ui.controls.skins:Skin")));
        assert!(!roots.contains(&q("ui.controlsx:Other")));
        assert!(roots.contains(&q("extra:Listed")));
        assert!(roots.contains(&q("core")));
    }

    #[test]
    fn root_keys_are_distinct_per_kind() {
        let components = LibraryComponents {
            classes: vec![q("ui:Button")],
            sources: vec![PathBuf::from("ui")],
            namespaces: vec!["ui".to_string()],
            bundles: vec!["ui".to_string()],
        };
        let keys = LinkRoots::Components(components).keys();
        assert_eq!(keys.len(), 4);
        let unique: BTreeSet<&String> = keys.iter().collect();
        assert_eq!(unique.len(), 4);
    }

    #[test]
    fn full_plan_compiles_everything() {
        let records = sources(vec![
            record("A", "A.as", ContainerKind::SourcePath, &["A"]).without_unit(),
            record("B", "B.as", ContainerKind::SourcePath, &["B"]).without_unit(),
        ]);
        let plan = Plan::full(records, None);
        assert_eq!(plan.decision, Decision::FullRebuild);
        assert_eq!(plan.compile, vec![q("A"), q("B")]);
        assert!(plan.reusable.contains(&q("A")));
    }

    #[test]
    fn relative_option_paths_are_anchored() {
        let mut options = BuildOptions::default();
        options.compiler.source_path = vec![PathBuf::from("src"), PathBuf::from("/abs/src")];
        options.compiler.library_path = vec![PathBuf::from("libs/ui.lib")];
        anchor_options(Path::new("/work"), &mut options);
        assert_eq!(
            options.compiler.source_path,
            vec![PathBuf::from("/work/src"), PathBuf::from("/abs/src")]
        );
        assert_eq!(options.compiler.library_path, vec![PathBuf::from("/work/libs/ui.lib")]);
    }
}
