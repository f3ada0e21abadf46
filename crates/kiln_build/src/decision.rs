//! The build decision engine.

use crate::fingerprint::FingerprintSet;
use std::fmt;

/// What a compile pass decided to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    /// Every unit was (or must be) compiled from scratch.
    FullRebuild,
    /// Only stale units and their dependents were recompiled.
    IncrementalRecompile,
    /// No unit needed compiling, but the artifact must be relinked.
    RelinkOnly,
    /// Nothing changed.
    Skip,
    /// Resolution or compilation failed.
    Fail,
}

impl Decision {
    /// The pipeline result code for this decision.
    pub fn code(self) -> BuildCode {
        match self {
            Decision::FullRebuild | Decision::IncrementalRecompile => BuildCode::Ok,
            Decision::RelinkOnly => BuildCode::Link,
            Decision::Skip => BuildCode::Skip,
            Decision::Fail => BuildCode::Fail,
        }
    }

    /// Returns `true` when the decision involves linking.
    pub fn needs_link(self) -> bool {
        !matches!(self, Decision::Skip | Decision::Fail)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Decision::FullRebuild => "full rebuild",
            Decision::IncrementalRecompile => "incremental recompile",
            Decision::RelinkOnly => "relink only",
            Decision::Skip => "skip",
            Decision::Fail => "fail",
        };
        f.write_str(name)
    }
}

/// Result codes surfaced from the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum BuildCode {
    /// Nothing to do.
    Skip = 0,
    /// Compiled successfully.
    Ok = 1,
    /// Failed.
    Fail = -1,
    /// Relink advisory. Negative so it can never collide with a unit count.
    Link = -2,
}

impl BuildCode {
    /// The numeric code.
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// Extra inputs to [`decide_with`] gathered by validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Evidence {
    /// Validation found stale, missing or removed units.
    pub unit_count_changed: bool,
    /// A cache-sourced relink was requested.
    pub relink: bool,
    /// Result of the library recompilation check, when it ran. `None` falls
    /// back to comparing dependency fingerprints.
    pub full_recompile: Option<bool>,
}

/// Decides what a compile pass must do.
///
/// Equivalent to [`decide_with`] with only `unit_count_changed` set.
pub fn decide(
    previous: Option<&FingerprintSet>,
    current: &FingerprintSet,
    unit_count_changed: bool,
) -> Decision {
    decide_with(
        previous,
        current,
        Evidence {
            unit_count_changed,
            ..Evidence::default()
        },
    )
}

/// Decides what a compile pass must do given validation evidence.
///
/// Never returns [`Decision::Fail`]; failures come from resolution and
/// compilation, not from fingerprint comparison.
pub fn decide_with(
    previous: Option<&FingerprintSet>,
    current: &FingerprintSet,
    evidence: Evidence,
) -> Decision {
    let Some(previous) = previous else {
        return Decision::FullRebuild;
    };
    if previous.command != current.command {
        return Decision::FullRebuild;
    }
    let full = evidence
        .full_recompile
        .unwrap_or(previous.dependency != current.dependency);
    if full {
        return Decision::FullRebuild;
    }
    if evidence.unit_count_changed {
        return Decision::IncrementalRecompile;
    }
    if previous.link != current.link || evidence.relink {
        return Decision::RelinkOnly;
    }
    Decision::Skip
}
