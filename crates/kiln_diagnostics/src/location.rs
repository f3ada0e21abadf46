//! Human-readable source locations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A point in a source file that a diagnostic refers to.
///
/// Line and column are 1-indexed; a value of 0 means "unknown" and is
/// omitted when displayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// The filesystem path of the source file.
    pub path: PathBuf,
    /// The line number (1-indexed, 0 if unknown).
    pub line: u32,
    /// The column number (1-indexed, 0 if unknown).
    pub column: u32,
}

impl Location {
    /// Creates a location at a specific line and column.
    pub fn new(path: impl Into<PathBuf>, line: u32, column: u32) -> Self {
        Self {
            path: path.into(),
            line,
            column,
        }
    }

    /// Creates a location that names only a file.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(path, 0, 0)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())?;
        if self.line > 0 {
            write!(f, ":{}", self.line)?;
            if self.column > 0 {
                write!(f, ":{}", self.column)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_full() {
        let loc = Location::new("src/Main.as", 10, 5);
        assert_eq!(format!("{loc}"), "src/Main.as:10:5");
    }

    #[test]
    fn display_file_only() {
        let loc = Location::file("libs/framework.lib");
        assert_eq!(format!("{loc}"), "libs/framework.lib");
    }

    #[test]
    fn display_line_without_column() {
        let loc = Location::new("a.as", 3, 0);
        assert_eq!(format!("{loc}"), "a.as:3");
    }
}
