//! Error types for project construction and sweeps.

use kiln_config::ConfigError;

/// Errors raised while assembling or driving a project.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    /// The project configuration failed to load or resolve.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An artifact lists a dependency the project does not contain.
    #[error("artifact '{artifact}' depends on unknown artifact '{dependency}'")]
    UnknownDependency {
        /// The dependent artifact.
        artifact: String,
        /// The missing dependency.
        dependency: String,
    },

    /// Building or cleaning an artifact failed with an I/O error.
    #[error("artifact '{artifact}': {source}")]
    Io {
        /// The artifact whose build failed.
        artifact: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}
