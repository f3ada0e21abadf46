//! Error types for cache operations.

use std::path::PathBuf;

/// Errors that can occur during cache operations.
///
/// Translation-cache lookups never fail; this enum covers reading and
/// writing incremental-cache blobs and hashing source files. Callers treat
/// every variant when loading a cache as "no cache available".
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An I/O error occurred while reading or writing a file.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// An I/O error occurred on a caller-supplied stream.
    #[error("cache stream error: {0}")]
    Stream(#[from] std::io::Error),

    /// A blob has an invalid or missing header.
    #[error("invalid cache header: {reason}")]
    InvalidHeader {
        /// Description of the header problem.
        reason: String,
    },

    /// The stored checksum does not match the computed checksum of the payload.
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// The expected checksum from the header.
        expected: String,
        /// The actual checksum computed from the payload.
        actual: String,
    },

    /// The blob format version does not match the current version.
    #[error("version mismatch: expected {expected}, got {actual}")]
    VersionMismatch {
        /// The expected format version.
        expected: u32,
        /// The actual format version found in the blob.
        actual: u32,
    },

    /// The blob was written by a different toolchain version.
    #[error("cache written by toolchain {actual}, current toolchain is {expected}")]
    ToolchainMismatch {
        /// The current toolchain version.
        expected: String,
        /// The toolchain version recorded in the blob.
        actual: String,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },
}
