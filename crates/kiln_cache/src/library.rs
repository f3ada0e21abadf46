//! Dependency libraries, the shared library cache, and the compiler context slot.

use crate::consistency::ConsistencyKey;
use kiln_common::QName;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A loaded dependency library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedLibrary {
    /// Location the library was loaded from.
    pub location: PathBuf,
    /// Stable identity reported by the loader (e.g. name and version).
    pub identity: String,
    /// Last-modified time in milliseconds since the epoch.
    pub last_modified: u64,
    /// Exposed top-level definitions and their signature checksums.
    pub definitions: BTreeMap<QName, u64>,
}

/// The resolved dependency libraries of one build, in `library_path` order.
///
/// When several libraries define the same name, the earliest one wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedLibraries {
    libraries: Vec<ResolvedLibrary>,
}

impl ResolvedLibraries {
    /// Collects libraries, keeping the order given.
    pub fn new(libraries: impl IntoIterator<Item = ResolvedLibrary>) -> Self {
        Self {
            libraries: libraries.into_iter().collect(),
        }
    }

    /// Iterates the libraries in precedence order.
    pub fn iter(&self) -> impl Iterator<Item = &ResolvedLibrary> {
        self.libraries.iter()
    }

    /// Number of libraries.
    pub fn len(&self) -> usize {
        self.libraries.len()
    }

    /// Returns `true` if there are no libraries.
    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }

    /// The first library, in precedence order, that defines `name`.
    pub fn defining_library(&self, name: &QName) -> Option<&ResolvedLibrary> {
        self.libraries
            .iter()
            .find(|lib| lib.definitions.contains_key(name))
    }

    /// Signature checksum of a library definition.
    pub fn signature(&self, name: &QName) -> Option<u64> {
        self.defining_library(name)
            .and_then(|lib| lib.definitions.get(name).copied())
    }

    /// Last-modified time of every library file, keyed by location.
    pub fn file_times(&self) -> BTreeMap<PathBuf, u64> {
        self.libraries
            .iter()
            .map(|lib| (lib.location.clone(), lib.last_modified))
            .collect()
    }

    /// Definitions exposed by libraries whose location is in `locations`.
    pub fn definitions_of(&self, locations: &BTreeSet<PathBuf>) -> BTreeSet<QName> {
        self.libraries
            .iter()
            .filter(|lib| locations.contains(&lib.location))
            .flat_map(|lib| lib.definitions.keys().cloned())
            .collect()
    }
}

/// Accumulated compiler symbol state reused across compiles.
///
/// A context is tied to the configuration it was built under and is never
/// handed to a build with a different one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerContext {
    configuration: ConsistencyKey,
    known_definitions: BTreeSet<QName>,
    compile_count: u64,
}

impl CompilerContext {
    /// Creates an empty context for `configuration`.
    pub fn new(configuration: ConsistencyKey) -> Self {
        Self {
            configuration,
            known_definitions: BTreeSet::new(),
            compile_count: 0,
        }
    }

    /// Returns `true` if this context was built under `configuration`.
    pub fn is_for(&self, configuration: &ConsistencyKey) -> bool {
        self.configuration == *configuration
    }

    /// Records a definition resolved during compilation.
    pub fn record_definition(&mut self, name: QName) {
        self.known_definitions.insert(name);
    }

    /// Counts one completed unit compilation.
    pub fn note_compile(&mut self) {
        self.compile_count += 1;
    }

    /// Number of unit compilations this context has accumulated.
    pub fn compile_count(&self) -> u64 {
        self.compile_count
    }
}

/// Loaded libraries keyed by location, plus the compiler-context slot.
#[derive(Debug, Default)]
pub struct LibraryCache {
    libraries: BTreeMap<PathBuf, ResolvedLibrary>,
    context: Option<CompilerContext>,
}

impl LibraryCache {
    /// Creates an empty library cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached library at `location` if it was loaded with the
    /// same modification time.
    pub fn fresh(&self, location: &Path, last_modified: u64) -> Option<&ResolvedLibrary> {
        self.libraries
            .get(location)
            .filter(|lib| lib.last_modified == last_modified)
    }

    /// Caches a loaded library, replacing any entry at the same location.
    pub fn insert(&mut self, library: ResolvedLibrary) {
        self.libraries.insert(library.location.clone(), library);
    }

    /// Number of cached libraries.
    pub fn len(&self) -> usize {
        self.libraries.len()
    }

    /// Returns `true` if no libraries are cached.
    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }

    /// Takes the compiler context out of the slot if it matches
    /// `configuration`. A mismatched context is discarded.
    pub fn take_context(&mut self, configuration: &ConsistencyKey) -> Option<CompilerContext> {
        match self.context.take() {
            Some(context) if context.is_for(configuration) => Some(context),
            _ => None,
        }
    }

    /// Puts a context back into the empty slot.
    pub fn return_context(&mut self, context: CompilerContext) {
        self.context = Some(context);
    }

    /// Returns `true` if a context is waiting in the slot.
    pub fn has_context(&self) -> bool {
        self.context.is_some()
    }
}

/// A library cache shared between artifact builds.
///
/// The compiler context moves out of the slot for the duration of one
/// compile, so two builds never hold it at once; a second build that finds
/// the slot empty starts from a fresh context.
#[derive(Clone, Default)]
pub struct SharedLibraryCache {
    inner: Arc<Mutex<LibraryCache>>,
}

impl SharedLibraryCache {
    /// Wraps a library cache.
    pub fn new(cache: LibraryCache) -> Self {
        Self {
            inner: Arc::new(Mutex::new(cache)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LibraryCache> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// See [`LibraryCache::fresh`].
    pub fn fresh(&self, location: &Path, last_modified: u64) -> Option<ResolvedLibrary> {
        self.lock().fresh(location, last_modified).cloned()
    }

    /// See [`LibraryCache::insert`].
    pub fn insert(&self, library: ResolvedLibrary) {
        self.lock().insert(library);
    }

    /// Number of cached libraries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if no libraries are cached.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// See [`LibraryCache::take_context`].
    pub fn take_context(&self, configuration: &ConsistencyKey) -> Option<CompilerContext> {
        self.lock().take_context(configuration)
    }

    /// See [`LibraryCache::return_context`].
    pub fn return_context(&self, context: CompilerContext) {
        self.lock().return_context(context);
    }

    /// See [`LibraryCache::has_context`].
    pub fn has_context(&self) -> bool {
        self.lock().has_context()
    }
}

impl std::fmt::Debug for SharedLibraryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedLibraryCache")
            .field("libraries", &self.len())
            .finish()
    }
}
