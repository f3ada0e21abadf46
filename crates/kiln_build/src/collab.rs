//! Interfaces to the external collaborators an artifact build drives.

use crate::error::{CompileError, EncodeError, LinkError, LoadError, ResolveError};
use kiln_cache::{CompilerContext, ResolvedLibraries, ResolvedLibrary, SourceRecord, TranslationUnit};
use kiln_common::QName;
use kiln_config::{ArtifactKind, CompilerOptions, LinkOptions};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The source containers one artifact build resolves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceContainers {
    /// Explicit target files.
    pub file_specs: Vec<PathBuf>,
    /// Explicitly listed source files or directories.
    pub source_list: Vec<PathBuf>,
    /// Roots searched by qualified name.
    pub source_path: Vec<PathBuf>,
    /// Resource bundle names searched under the source path.
    pub bundles: Vec<String>,
}

/// Resolves source containers into source records.
pub trait SourceResolver: Send + Sync {
    /// Returns every source record the containers resolve to, with stable
    /// identity, modification time and content hash, and no unit.
    fn resolve(&self, containers: &SourceContainers) -> Result<Vec<SourceRecord>, ResolveError>;
}

/// One translation unit's compile inputs.
pub struct CompileRequest<'a> {
    /// The source to compile.
    pub source: &'a SourceRecord,
    /// Effective compiler options.
    pub options: &'a CompilerOptions,
    /// Resolved dependency libraries.
    pub libraries: &'a ResolvedLibraries,
}

/// Compiles one source into a translation unit.
///
/// Called once per unit so cancellation can be honoured between units. The
/// context carries symbol state accumulated across compiles; the build owns
/// it exclusively for the duration of the call.
pub trait Compiler: Send + Sync {
    /// Compiles `request.source`. The returned unit reports whether type info
    /// was produced.
    fn compile(
        &self,
        request: &CompileRequest<'_>,
        context: &mut CompilerContext,
    ) -> Result<TranslationUnit, CompileError>;
}

/// Loads dependency libraries.
pub trait LibraryLoader: Send + Sync {
    /// Returns the library's modification time without loading it.
    fn last_modified(&self, location: &Path) -> Result<u64, LoadError>;

    /// Loads the library's identity, timestamp and exposed definitions.
    fn load(&self, location: &Path) -> Result<ResolvedLibrary, LoadError>;
}

/// A linked artifact ready for encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedArtifact {
    /// Application image or library archive.
    pub kind: ArtifactKind,
    /// Definitions present in the artifact.
    pub definitions: Vec<QName>,
    /// Linker output handed to the encoder.
    pub payload: Vec<u8>,
}

/// Link inputs.
pub struct LinkRequest<'a> {
    /// Name of the artifact being linked.
    pub artifact: &'a str,
    /// Application image or library archive.
    pub kind: ArtifactKind,
    /// Compiled units in name order.
    pub units: Vec<(&'a QName, &'a TranslationUnit)>,
    /// Definitions the link starts from.
    pub roots: BTreeSet<QName>,
    /// Link-only options.
    pub options: &'a LinkOptions,
    /// Resolved dependency libraries.
    pub libraries: &'a ResolvedLibraries,
}

/// Links compiled units.
pub trait Linker: Send + Sync {
    /// Produces a linked artifact or a link error.
    fn link(&self, request: &LinkRequest<'_>) -> Result<LinkedArtifact, LinkError>;
}

/// Serializes linked artifacts.
pub trait Encoder: Send + Sync {
    /// Writes `artifact` to `output` and returns the byte count.
    fn encode(&self, artifact: &LinkedArtifact, output: &mut dyn Write) -> Result<u64, EncodeError>;
}

/// The collaborators one build uses, plus the toolchain version that keys
/// incremental-cache compatibility.
#[derive(Clone)]
pub struct Toolchain {
    /// Source resolution.
    pub resolver: Arc<dyn SourceResolver>,
    /// Unit compilation.
    pub compiler: Arc<dyn Compiler>,
    /// Library loading.
    pub loader: Arc<dyn LibraryLoader>,
    /// Linking.
    pub linker: Arc<dyn Linker>,
    /// Encoding.
    pub encoder: Arc<dyn Encoder>,
    /// Version string written into incremental-cache files.
    pub version: String,
}

impl Toolchain {
    /// Bundles collaborators under this crate's version.
    pub fn new(
        resolver: Arc<dyn SourceResolver>,
        compiler: Arc<dyn Compiler>,
        loader: Arc<dyn LibraryLoader>,
        linker: Arc<dyn Linker>,
        encoder: Arc<dyn Encoder>,
    ) -> Self {
        Self {
            resolver,
            compiler,
            loader,
            linker,
            encoder,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Overrides the toolchain version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }
}

impl std::fmt::Debug for Toolchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Toolchain")
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}
