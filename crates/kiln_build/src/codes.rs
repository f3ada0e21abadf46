//! Diagnostic codes emitted by artifact builds.

use kiln_diagnostics::{Category, DiagnosticCode};

/// Effective configuration could not be resolved.
pub const CONFIG_INVALID: DiagnosticCode = DiagnosticCode::new(Category::Config, 1);

/// Source resolution failed.
pub const RESOLVE_FAILED: DiagnosticCode = DiagnosticCode::new(Category::Resolution, 1);
/// A dependency library could not be loaded.
pub const LIBRARY_LOAD_FAILED: DiagnosticCode = DiagnosticCode::new(Category::Resolution, 2);
/// Two sources resolved to the same qualified name; the first is kept.
pub const DUPLICATE_SOURCE: DiagnosticCode = DiagnosticCode::new(Category::Resolution, 3);

/// A unit failed to compile.
pub const COMPILE_FAILED: DiagnosticCode = DiagnosticCode::new(Category::Compile, 1);

/// Linking failed.
pub const LINK_FAILED: DiagnosticCode = DiagnosticCode::new(Category::Link, 1);
/// Encoding failed.
pub const ENCODE_FAILED: DiagnosticCode = DiagnosticCode::new(Category::Link, 2);
/// `build` was called without an output location.
pub const NO_OUTPUT: DiagnosticCode = DiagnosticCode::new(Category::Link, 3);

/// An incremental-cache file or stream was unreadable and was ignored.
pub const CACHE_UNREADABLE: DiagnosticCode = DiagnosticCode::new(Category::Cache, 1);
/// The shared translation cache was built under a different configuration
/// and was cleared.
pub const CACHE_CLEARED: DiagnosticCode = DiagnosticCode::new(Category::Cache, 2);
/// Summary of the build decision.
pub const DECISION: DiagnosticCode = DiagnosticCode::new(Category::Cache, 3);
/// Writing the incremental-cache file failed.
pub const CACHE_SAVE_FAILED: DiagnosticCode = DiagnosticCode::new(Category::Cache, 4);
/// The build was stopped on request.
pub const STOPPED: DiagnosticCode = DiagnosticCode::new(Category::Cache, 5);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_render_with_prefixes() {
        assert_eq!(CONFIG_INVALID.to_string(), "F001");
        assert_eq!(RESOLVE_FAILED.to_string(), "R001");
        assert_eq!(COMPILE_FAILED.to_string(), "C001");
        assert_eq!(LINK_FAILED.to_string(), "L001");
        assert_eq!(CACHE_CLEARED.to_string(), "K002");
    }
}
