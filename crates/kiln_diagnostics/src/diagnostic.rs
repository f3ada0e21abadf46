//! Structured diagnostic messages with severity, code, location and build context.

use crate::code::DiagnosticCode;
use crate::location::Location;
use crate::severity::Severity;
use serde::{Deserialize, Serialize};

/// A structured diagnostic message.
///
/// Diagnostics are the only channel through which the build core reports to
/// its caller. Each diagnostic includes:
/// - A severity level and a code identifying the kind of report
/// - A message and an optional source location
/// - The artifact identity and pipeline phase it was emitted from, so that
///   "needs a full rebuild" can be told apart from a genuine failure
/// - Optional explanatory notes
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The severity level of this diagnostic.
    pub severity: Severity,
    /// The code identifying the kind of diagnostic.
    pub code: DiagnosticCode,
    /// The main diagnostic message.
    pub message: String,
    /// The source location the diagnostic refers to, if any.
    pub location: Option<Location>,
    /// Name of the artifact build that emitted this diagnostic.
    pub artifact: Option<String>,
    /// Pipeline phase the artifact build was in.
    pub phase: Option<String>,
    /// Explanatory footnotes.
    pub notes: Vec<String>,
}

impl Diagnostic {
    fn with_severity(severity: Severity, code: DiagnosticCode, message: String) -> Self {
        Self {
            severity,
            code,
            message,
            location: None,
            artifact: None,
            phase: None,
            notes: Vec::new(),
        }
    }

    /// Creates a new error diagnostic.
    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Error, code, message.into())
    }

    /// Creates a new warning diagnostic.
    pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Warning, code, message.into())
    }

    /// Creates a new informational diagnostic.
    pub fn info(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Info, code, message.into())
    }

    /// Sets the source location of this diagnostic.
    pub fn at(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Records which artifact build, in which phase, emitted this diagnostic.
    pub fn in_build(mut self, artifact: impl Into<String>, phase: impl Into<String>) -> Self {
        self.artifact = Some(artifact.into());
        self.phase = Some(phase.into());
        self
    }

    /// Adds a note to this diagnostic.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}
