//! The internal error type for the kiln build core.

/// An internal error indicating a bug in kiln, not a user input problem.
///
/// User errors are reported through a logger and the operation still
/// returns a value.
#[derive(Debug, thiserror::Error)]
#[error("internal build error: {message}")]
pub struct InternalError {
    /// Description of the internal error.
    pub message: String,
}

impl InternalError {
    /// Creates a new internal error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for InternalError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_format() {
        let err = InternalError::new("dependent count underflow");
        assert_eq!(
            format!("{err}"),
            "internal build error: dependent count underflow"
        );
    }

    #[test]
    fn from_string() {
        let err: InternalError = "from string".to_string().into();
        assert_eq!(err.message, "from string");
    }
}
