//! Diagnostic codes with category prefixes for structured error identification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The build concern a diagnostic belongs to, determining its prefix letter.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Category {
    /// Configuration resolution, prefixed with `F`.
    Config,
    /// Source or dependency-library resolution, prefixed with `R`.
    Resolution,
    /// Compilation of translation units, prefixed with `C`.
    Compile,
    /// Linking and encoding, prefixed with `L`.
    Link,
    /// Incremental and translation cache handling, prefixed with `K`.
    Cache,
    /// Multi-artifact project graph, prefixed with `P`.
    Project,
}

impl Category {
    /// Returns the single-character prefix for this category.
    pub fn prefix(self) -> char {
        match self {
            Category::Config => 'F',
            Category::Resolution => 'R',
            Category::Compile => 'C',
            Category::Link => 'L',
            Category::Cache => 'K',
            Category::Project => 'P',
        }
    }
}

/// A structured diagnostic code combining a category prefix and a numeric identifier.
///
/// Displayed as the category prefix followed by a zero-padded 3-digit number,
/// e.g., `R101`, `K201`, `P301`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct DiagnosticCode {
    /// The category of this diagnostic.
    pub category: Category,
    /// The numeric identifier within the category.
    pub number: u16,
}

impl DiagnosticCode {
    /// Creates a new diagnostic code.
    pub const fn new(category: Category, number: u16) -> Self {
        Self { category, number }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:03}", self.category.prefix(), self.number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_prefixes() {
        assert_eq!(Category::Config.prefix(), 'F');
        assert_eq!(Category::Resolution.prefix(), 'R');
        assert_eq!(Category::Compile.prefix(), 'C');
        assert_eq!(Category::Link.prefix(), 'L');
        assert_eq!(Category::Cache.prefix(), 'K');
        assert_eq!(Category::Project.prefix(), 'P');
    }

    #[test]
    fn display_format() {
        let code = DiagnosticCode::new(Category::Resolution, 101);
        assert_eq!(format!("{code}"), "R101");

        let code = DiagnosticCode::new(Category::Cache, 3);
        assert_eq!(format!("{code}"), "K003");
    }

    #[test]
    fn serde_roundtrip() {
        let code = DiagnosticCode::new(Category::Link, 201);
        let json = serde_json::to_string(&code).unwrap();
        let back: DiagnosticCode = serde_json::from_str(&json).unwrap();
        assert_eq!(code, back);
    }
}
