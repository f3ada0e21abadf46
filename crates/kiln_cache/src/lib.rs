//! Translation cache and dependency-library cache for incremental builds.
//!
//! The [`TranslationCache`] lets unrelated artifact builds reuse previously
//! compiled source units and tracks symbol-level dependents so entries can be
//! evicted without stranding units that are still referenced. The
//! [`LibraryCache`] keeps loaded dependency libraries and the single-owner
//! [`CompilerContext`] slot. [`persist`] provides the versioned blob format
//! used for on-disk incremental-cache files.

#![warn(missing_docs)]

pub mod consistency;
pub mod deps;
pub mod error;
pub mod hasher;
pub mod library;
pub mod persist;
pub mod shared;
pub mod source;
pub mod translation;
pub mod unit;

pub use consistency::ConsistencyKey;
pub use deps::DependentIndex;
pub use error::CacheError;
pub use hasher::{file_modified_millis, ChangeSet, SourceHasher};
pub use library::{
    CompilerContext, LibraryCache, ResolvedLibraries, ResolvedLibrary, SharedLibraryCache,
};
pub use persist::{decode_blob, encode_blob, BlobHeader};
pub use shared::{CacheGuard, CacheLease, PrunePolicy, SharedTranslationCache};
pub use source::{ContainerKind, SourceRecord};
pub use translation::TranslationCache;
pub use unit::{Relation, TranslationUnit};
