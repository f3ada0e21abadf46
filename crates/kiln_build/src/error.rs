//! Error types reported by build collaborators and the build engine.

use kiln_common::{InternalError, QName};
use kiln_diagnostics::Location;
use std::path::PathBuf;

/// A source container could not be resolved.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// A target or listed source file does not exist.
    #[error("source file not found: {0}")]
    MissingSource(PathBuf),

    /// A source-path root does not exist or is not a directory.
    #[error("source path root not found: {0}")]
    MissingRoot(PathBuf),

    /// A resource bundle was not found under any source-path root.
    #[error("resource bundle '{0}' not found")]
    MissingBundle(String),

    /// A source file exists but could not be read.
    #[error("failed to read {path}: {source}")]
    Unreadable {
        /// The unreadable file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

impl ResolveError {
    /// The path the error refers to, if any.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            ResolveError::MissingSource(path)
            | ResolveError::MissingRoot(path)
            | ResolveError::Unreadable { path, .. } => Some(path),
            ResolveError::MissingBundle(_) => None,
        }
    }
}

/// A translation unit failed to compile.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{source_name}: {message}")]
pub struct CompileError {
    /// The source that failed.
    pub source_name: QName,
    /// What went wrong.
    pub message: String,
    /// Where in the source it went wrong.
    pub location: Option<Location>,
}

impl CompileError {
    /// Creates a compile error without a location.
    pub fn new(source_name: QName, message: impl Into<String>) -> Self {
        Self {
            source_name,
            message: message.into(),
            location: None,
        }
    }
}

/// A dependency library could not be loaded.
#[derive(Debug, Clone, thiserror::Error)]
#[error("failed to load library {location}: {reason}")]
pub struct LoadError {
    /// The library location.
    pub location: PathBuf,
    /// Description of the failure.
    pub reason: String,
}

/// Linking failed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LinkError {
    /// A referenced definition is provided by no unit or library.
    #[error("undefined definition '{0}'")]
    Undefined(QName),

    /// Any other link failure.
    #[error("{0}")]
    Other(String),
}

/// Encoding a linked artifact failed.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// Writing to the output stream failed. Propagated to the caller.
    #[error("output write failed: {0}")]
    Io(#[from] std::io::Error),

    /// The artifact could not be represented in the output format.
    #[error("{0}")]
    Format(String),
}

/// Any failure an artifact build can encounter.
///
/// Builds report these through their logger and return result codes; only
/// I/O failures cross the [`Builder`](crate::Builder) surface as errors.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// Effective configuration could not be resolved.
    #[error(transparent)]
    Config(#[from] kiln_config::ConfigError),
    /// Source resolution failed.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    /// Library loading failed.
    #[error(transparent)]
    Load(#[from] LoadError),
    /// A unit failed to compile.
    #[error(transparent)]
    Compile(#[from] CompileError),
    /// Linking failed.
    #[error(transparent)]
    Link(#[from] LinkError),
    /// Encoding failed.
    #[error(transparent)]
    Encode(#[from] EncodeError),
    /// Reading or writing an incremental-cache blob failed.
    #[error(transparent)]
    Cache(#[from] kiln_cache::CacheError),
    /// An internal invariant was violated.
    #[error(transparent)]
    Internal(#[from] InternalError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_error_display() {
        let err = CompileError::new("app:Main".parse().unwrap(), "type was not found: Widget");
        assert_eq!(err.to_string(), "app:Main: type was not found: Widget");
    }

    #[test]
    fn resolve_error_path() {
        let err = ResolveError::MissingSource(PathBuf::from("src/Main.as"));
        assert_eq!(err.path(), Some(&PathBuf::from("src/Main.as")));
        assert!(ResolveError::MissingBundle("core".into()).path().is_none());
        assert_eq!(err.to_string(), "source file not found: src/Main.as");
    }

    #[test]
    fn build_error_is_transparent() {
        let err: BuildError = LinkError::Undefined("ui:Button".parse().unwrap()).into();
        assert_eq!(err.to_string(), "undefined definition 'ui:Button'");
        let err: BuildError = LoadError {
            location: PathBuf::from("libs/ui.lib"),
            reason: "bad archive".into(),
        }
        .into();
        assert_eq!(err.to_string(), "failed to load library libs/ui.lib: bad archive");
    }

    #[test]
    fn encode_io_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed");
        assert!(matches!(EncodeError::from(io), EncodeError::Io(_)));
    }
}
