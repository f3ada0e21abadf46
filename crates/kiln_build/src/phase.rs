//! Pipeline phases of an artifact build.

use std::fmt;

/// Where an artifact build is in its compile → link → encode pipeline.
///
/// `Failed` is reachable from any phase; `Stopped` from `Compiling` and
/// `Linking` when cancellation is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    /// Not running.
    #[default]
    Idle,
    /// Resolving sources and compiling units.
    Compiling,
    /// Linking compiled units.
    Linking,
    /// Serializing the linked artifact.
    Encoding,
    /// The last run failed.
    Failed,
    /// The last run was cancelled.
    Stopped,
}

impl Phase {
    /// Returns `true` for the terminal failure phases.
    pub fn is_terminal_failure(self) -> bool {
        matches!(self, Phase::Failed | Phase::Stopped)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Compiling => "compiling",
            Phase::Linking => "linking",
            Phase::Encoding => "encoding",
            Phase::Failed => "failed",
            Phase::Stopped => "stopped",
        };
        f.write_str(name)
    }
}
