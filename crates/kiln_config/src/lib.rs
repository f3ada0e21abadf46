//! Parsing and validation of `kiln.toml` project configuration files.
//!
//! This crate reads the project configuration file and produces a strongly-typed
//! [`ProjectConfig`]. Compiler and link options are kept as typed
//! [`BuildOptions`], and per-artifact override tables are deep-merged over the
//! project-level options by [`resolve_artifact`].

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod merge;
pub mod options;
pub mod resolve;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, CONFIG_FILE_NAME};
pub use merge::merge_tables;
pub use options::{BuildOptions, CompilerOptions, LinkOptions};
pub use resolve::{resolve_artifact, ResolvedArtifact};
pub use types::*;
