//! A collecting logger shared by every build of a project.

use crate::code::DiagnosticCode;
use crate::diagnostic::Diagnostic;
use crate::logger::Logger;
use crate::renderer::DiagnosticRenderer;
use crate::severity::Severity;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Collects diagnostics from any number of builds and threads.
///
/// Per-severity counts are kept atomically so `has_errors` never takes the
/// lock. Counts survive [`take_all`](Self::take_all).
#[derive(Default)]
pub struct DiagnosticSink {
    diagnostics: Mutex<Vec<Diagnostic>>,
    counts: [AtomicUsize; 3],
}

fn slot(severity: Severity) -> usize {
    match severity {
        Severity::Info => 0,
        Severity::Warning => 1,
        Severity::Error => 2,
    }
}

impl DiagnosticSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, Vec<Diagnostic>> {
        self.diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Records `diag`.
    pub fn emit(&self, diag: Diagnostic) {
        self.counts[slot(diag.severity)].fetch_add(1, Ordering::Relaxed);
        self.entries().push(diag);
    }

    /// Returns `true` once any error has been recorded.
    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    /// Errors recorded so far.
    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    /// Diagnostics of `severity` recorded so far.
    pub fn count(&self, severity: Severity) -> usize {
        self.counts[slot(severity)].load(Ordering::Relaxed)
    }

    /// Drains the recorded diagnostics.
    pub fn take_all(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.entries())
    }

    /// A copy of the recorded diagnostics.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.entries().clone()
    }

    /// Diagnostics reported by the build of `artifact`.
    pub fn for_artifact(&self, artifact: &str) -> Vec<Diagnostic> {
        self.entries()
            .iter()
            .filter(|d| d.artifact.as_deref() == Some(artifact))
            .cloned()
            .collect()
    }

    /// Diagnostics carrying `code`.
    pub fn with_code(&self, code: DiagnosticCode) -> Vec<Diagnostic> {
        self.entries()
            .iter()
            .filter(|d| d.code == code)
            .cloned()
            .collect()
    }

    /// Renders every recorded diagnostic, one after another.
    pub fn render(&self, renderer: &dyn DiagnosticRenderer) -> String {
        self.entries()
            .iter()
            .map(|d| renderer.render(d))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Logger for DiagnosticSink {
    fn log(&self, diagnostic: Diagnostic) {
        self.emit(diagnostic);
    }
}
