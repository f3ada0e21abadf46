//! Diagnostic codes emitted by project sweeps.

use kiln_diagnostics::{Category, DiagnosticCode};

/// Artifacts depend on each other in a cycle.
pub const DEPENDENCY_CYCLE: DiagnosticCode = DiagnosticCode::new(Category::Project, 1);
/// An artifact depends, directly or transitively, on a cycle and was skipped.
pub const BLOCKED_BY_CYCLE: DiagnosticCode = DiagnosticCode::new(Category::Project, 2);
/// A project build stopped before every artifact was built.
pub const PROJECT_STOPPED: DiagnosticCode = DiagnosticCode::new(Category::Project, 3);
