//! Error handling for mathspeak translation
//!
//! This module provides a unified error type and result type for parsing,
//! configuration and translation. Error codes mirror the historical message
//! numbering of the engine so that downstream consumers keyed on codes keep
//! working: 1001-1010 are parse errors, 3005-3008 are configuration and
//! internal errors.

use serde::Serialize;
use std::fmt;

/// Parse error codes.
pub const E_EXPECTED_FOUND: u32 = 1001;
pub const E_ONE_DECIMAL_SEPARATOR: u32 = 1002;
pub const E_EXTRA_CHARACTERS: u32 = 1003;
pub const E_INVALID_CHARACTER: u32 = 1004;
pub const E_MISPLACED_THOUSANDS: u32 = 1005;
pub const E_EXPRESSION_EXPECTED: u32 = 1006;
pub const E_UNEXPECTED_CHARACTER: u32 = 1007;
pub const E_SEPARATOR_CONFLICT: u32 = 1008;
pub const E_MISSING_ARGUMENT: u32 = 1009;
pub const E_OPERATOR_EXPECTED: u32 = 1010;

/// Configuration and internal error codes.
pub const E_TOO_LONG: u32 = 3005;
pub const E_INVALID_OPTION_NAME: u32 = 3006;
pub const E_INVALID_OPTION_VALUE: u32 = 3007;
pub const E_INTERNAL: u32 = 3008;

/// Translation error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MathError {
    /// Parse error - the markup could not be parsed
    Parse {
        code: u32,
        message: String,
        /// Byte offset into the (preprocessed) input where scanning stopped
        position: usize,
    },
    /// Configuration error - unknown option, bad value, separator conflict
    Config { code: u32, message: String },
    /// Internal error - a node shape outside the closed operator set, or the
    /// operation counter tripping
    Internal {
        code: u32,
        message: String,
        location: Option<String>,
    },
}

impl fmt::Display for MathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MathError::Parse {
                code,
                message,
                position,
            } => {
                write!(f, "{}: Parse error at {}: {}", code, position, message)
            }
            MathError::Config { code, message } => {
                write!(f, "{}: Configuration error: {}", code, message)
            }
            MathError::Internal {
                code,
                message,
                location,
            } => {
                if let Some(loc) = location {
                    write!(f, "{}: Internal error ({}): {}", code, loc, message)
                } else {
                    write!(f, "{}: Internal error: {}", code, message)
                }
            }
        }
    }
}

impl std::error::Error for MathError {}

/// Result type for all fallible engine operations
pub type MathResult<T> = Result<T, MathError>;

// Convenience constructors
impl MathError {
    pub fn parse(code: u32, message: impl Into<String>, position: usize) -> Self {
        MathError::Parse {
            code,
            message: message.into(),
            position,
        }
    }

    pub fn expected_found(expected: &str, found: &str, position: usize) -> Self {
        MathError::parse(
            E_EXPECTED_FOUND,
            format!("Invalid syntax. '{}' expected, '{}' found.", expected, found),
            position,
        )
    }

    pub fn config(code: u32, message: impl Into<String>) -> Self {
        MathError::Config {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_option(name: &str) -> Self {
        MathError::config(
            E_INVALID_OPTION_NAME,
            format!("Invalid option name '{}'.", name),
        )
    }

    pub fn invalid_option_value(name: &str, value: &str) -> Self {
        MathError::config(
            E_INVALID_OPTION_VALUE,
            format!("Invalid option value '{}' for option '{}'.", value, name),
        )
    }

    pub fn separator_conflict(sep: char) -> Self {
        MathError::config(
            E_SEPARATOR_CONFLICT,
            format!(
                "The same character '{}' is being used as a thousands and decimal separators.",
                sep
            ),
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        MathError::Internal {
            code: E_INTERNAL,
            message: message.into(),
            location: None,
        }
    }

    pub fn internal_at(message: impl Into<String>, location: impl Into<String>) -> Self {
        MathError::Internal {
            code: E_INTERNAL,
            message: message.into(),
            location: Some(location.into()),
        }
    }

    pub fn too_long() -> Self {
        MathError::Internal {
            code: E_TOO_LONG,
            message: "Operation taking too long.".to_string(),
            location: None,
        }
    }

    /// Numeric error code for the structured surface.
    pub fn code(&self) -> u32 {
        match self {
            MathError::Parse { code, .. }
            | MathError::Config { code, .. }
            | MathError::Internal { code, .. } => *code,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            MathError::Parse { message, .. }
            | MathError::Config { message, .. }
            | MathError::Internal { message, .. } => message,
        }
    }
}

/// Structured result of the verbose translation surface.
///
/// Either `result` holds the rendered string with `error_code == 0`, or
/// `error_code`/`message`/`location` describe the failure. This is the value
/// callers receive instead of an unstructured panic.
#[derive(Debug, Clone, Serialize)]
pub struct VerboseOutcome {
    pub result: Option<String>,
    #[serde(rename = "errorCode")]
    pub error_code: u32,
    pub message: String,
    pub location: Option<String>,
}

impl VerboseOutcome {
    pub fn success(result: String) -> Self {
        VerboseOutcome {
            result: Some(result),
            error_code: 0,
            message: "Normal completion".to_string(),
            location: None,
        }
    }

    pub fn failure(err: &MathError, location: &str) -> Self {
        let loc = match err {
            MathError::Internal {
                location: Some(l), ..
            } => Some(l.clone()),
            MathError::Parse { position, .. } => Some(format!("{}:{}", location, position)),
            _ => Some(location.to_string()),
        };
        VerboseOutcome {
            result: None,
            error_code: err.code(),
            message: err.message().to_string(),
            location: loc,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error_code == 0 && self.result.is_some()
    }
}

impl fmt::Display for VerboseOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.result {
            Some(r) => write!(f, "{}", r),
            None => write!(
                f,
                "{}: ({}) {}",
                self.error_code,
                self.location.as_deref().unwrap_or("?"),
                self.message
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = MathError::expected_found("}", "EOS", 12);
        let msg = err.to_string();
        assert!(msg.contains("1001"));
        assert!(msg.contains("'}' expected"));
        assert!(msg.contains("at 12"));
    }

    #[test]
    fn test_separator_conflict_code() {
        let err = MathError::separator_conflict(',');
        assert_eq!(err.code(), E_SEPARATOR_CONFLICT);
    }

    #[test]
    fn test_verbose_outcome() {
        let ok = VerboseOutcome::success("1 plus 2".to_string());
        assert!(ok.is_success());
        assert_eq!(ok.error_code, 0);

        let err = VerboseOutcome::failure(&MathError::too_long(), "user");
        assert!(!err.is_success());
        assert_eq!(err.error_code, E_TOO_LONG);
    }
}
