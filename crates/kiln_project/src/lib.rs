//! Multi-artifact projects: the dependency graph between artifact builds.
//!
//! A [`Project`] holds shareable builder handles, orders them so every
//! artifact builds after the artifacts it depends on, and drives project-wide
//! build, clean and stop sweeps. Artifacts caught in a dependency cycle, and
//! everything downstream of one, are reported and left out of the sweeps.

#![warn(missing_docs)]

pub mod codes;
pub mod error;
pub mod graph;
pub mod project;

pub use error::ProjectError;
pub use graph::{BuildGraph, NodeId, SharedBuilder};
pub use project::{ArtifactOutcome, Project, ProjectOutcome};
