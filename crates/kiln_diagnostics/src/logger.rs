//! The logging capability handed to every artifact build.

use crate::diagnostic::Diagnostic;

/// A destination for diagnostics.
///
/// Builds never print; they hand every report to a `Logger`. Implementations
/// must be shareable across threads because a project may build artifacts on
/// worker threads while one sink collects everything.
pub trait Logger: Send + Sync {
    /// Records one diagnostic.
    fn log(&self, diagnostic: Diagnostic);
}

/// A logger that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLogger;

impl Logger for NullLogger {
    fn log(&self, _diagnostic: Diagnostic) {}
}

impl<L: Logger + ?Sized> Logger for std::sync::Arc<L> {
    fn log(&self, diagnostic: Diagnostic) {
        (**self).log(diagnostic);
    }
}
