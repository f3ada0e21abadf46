//! Artifact builds: fingerprinting, build decisions, and the compile → link →
//! encode pipeline.
//!
//! An [`ArtifactBuild`] drives one artifact through its pipeline, consulting a
//! shared translation cache and fingerprint history to decide whether to fully
//! rebuild, recompile only stale units, only relink, or skip. The compiler,
//! linker, encoder, library loader and source resolver are external
//! collaborators bundled in a [`Toolchain`]. [`ApplicationBuild`] and
//! [`LibraryBuild`] configure the engine for the two artifact kinds; both
//! implement the [`Builder`] surface used by project graphs.

#![warn(missing_docs)]

pub mod application;
pub mod builder;
pub mod codes;
pub mod collab;
pub mod decision;
pub mod engine;
pub mod error;
pub mod extension;
pub mod fingerprint;
pub mod fs;
pub mod library;
pub mod phase;
pub mod state;
pub mod stop;
pub mod validate;

pub use application::ApplicationBuild;
pub use builder::Builder;
pub use collab::{
    CompileRequest, Compiler, Encoder, LibraryLoader, LinkRequest, LinkedArtifact, Linker,
    SourceContainers, SourceResolver, Toolchain,
};
pub use decision::{decide, decide_with, BuildCode, Decision, Evidence};
pub use engine::{ArtifactBuild, LinkRoots};
pub use error::{BuildError, CompileError, EncodeError, LinkError, LoadError, ResolveError};
pub use extension::{BuildSnapshot, Extension};
pub use fingerprint::{
    aggregate_checksum, compute_fingerprints, FingerprintSet, LibraryCheck, LibraryRecord,
};
pub use fs::FsSourceResolver;
pub use library::{LibraryBuild, LibraryComponents};
pub use phase::Phase;
pub use state::{BuildState, SavedState};
pub use stop::StopHandle;
pub use validate::{validate_units, StaleReason, Validation};
