use std::fmt::Display;
use std::path::PathBuf;
use thiserror::Error;

use crate::validation::FieldErrors;

pub mod codes;

pub use codes::{describe_error_code, ErrorCode};

/// The unified error type for everything that is not a field-level
/// validation finding.
///
/// Field-level problems in a spec are reported as [`FieldErrors`] so that a
/// single pass can surface every one of them. This type covers the rest:
/// configuration, reading documents, and defects discovered while
/// substituting a spec that was expected to be valid.
#[derive(Error, Debug)]
pub enum TaskVarsError {
    #[error("[E{code:04}] Configuration error: {message}")]
    Config {
        code: u16,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] Load error: {message}")]
    Load {
        code: u16,
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] Validation failed:\n{errors}")]
    Validation { code: u16, errors: FieldErrors },

    /// A reference that should have been rejected by validation reached the
    /// substitution engine. Always a defect in the caller or in this crate.
    #[error("[E{code:04}] Invariant violated: {message} (reference {reference:?} at {path})")]
    Invariant {
        code: u16,
        message: String,
        reference: String,
        path: String,
    },

    #[error("[E{code:04}] {message}")]
    Other {
        code: u16,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl TaskVarsError {
    /// Create a configuration error with default code
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            code: ErrorCode::CONFIG_GENERIC,
            message: message.into(),
            source: None,
        }
    }

    /// Create a configuration error with specific code
    pub fn config_with_code(code: u16, message: impl Into<String>) -> Self {
        Self::Config {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create a load error with specific code and path
    pub fn load_with_code(code: u16, message: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self::Load {
            code,
            message: message.into(),
            path,
            source: None,
        }
    }

    /// Wrap aggregated field errors produced by spec validation
    pub fn validation(errors: FieldErrors) -> Self {
        Self::Validation {
            code: ErrorCode::VALIDATION_SPEC_REJECTED,
            errors,
        }
    }

    /// Wrap aggregated field errors produced while checking run-time bindings
    pub fn binding(errors: FieldErrors) -> Self {
        Self::Validation {
            code: ErrorCode::VALIDATION_BINDING_REJECTED,
            errors,
        }
    }

    /// Create an invariant violation raised during substitution
    pub fn invariant(
        code: u16,
        message: impl Into<String>,
        reference: impl Into<String>,
        path: impl Display,
    ) -> Self {
        Self::Invariant {
            code,
            message: message.into(),
            reference: reference.into(),
            path: path.to_string(),
        }
    }

    /// Create a generic other error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            code: ErrorCode::OTHER_GENERIC,
            message: message.into(),
            source: None,
        }
    }

    /// Add a source error to this error
    pub fn with_source(
        mut self,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        match &mut self {
            Self::Config { source: src, .. }
            | Self::Load { source: src, .. }
            | Self::Other { source: src, .. } => {
                *src = Some(source.into());
            }
            Self::Validation { .. } | Self::Invariant { .. } => {}
        }
        self
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } => 2,
            Self::Load { .. } => 3,
            Self::Validation { .. } => 4,
            Self::Invariant { .. } => 70,
            Self::Other { .. } => 1,
        }
    }

    /// Get the error code
    pub fn code(&self) -> u16 {
        match self {
            Self::Config { code, .. }
            | Self::Load { code, .. }
            | Self::Validation { code, .. }
            | Self::Invariant { code, .. }
            | Self::Other { code, .. } => *code,
        }
    }

    /// Whether this error is a defect rather than a problem with user input
    pub fn is_invariant(&self) -> bool {
        matches!(self, Self::Invariant { .. })
    }
}

impl From<FieldErrors> for TaskVarsError {
    fn from(errors: FieldErrors) -> Self {
        Self::validation(errors)
    }
}

impl From<serde_yaml::Error> for TaskVarsError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::load_with_code(ErrorCode::LOAD_INVALID_YAML, err.to_string(), None).with_source(err)
    }
}

impl From<serde_json::Error> for TaskVarsError {
    fn from(err: serde_json::Error) -> Self {
        Self::load_with_code(ErrorCode::LOAD_INVALID_JSON, err.to_string(), None).with_source(err)
    }
}

impl From<std::io::Error> for TaskVarsError {
    fn from(err: std::io::Error) -> Self {
        Self::load_with_code(ErrorCode::LOAD_IO_ERROR, err.to_string(), None).with_source(err)
    }
}

pub type Result<T> = std::result::Result<T, TaskVarsError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::FieldError;

    #[test]
    fn test_config_error_display_carries_code() {
        let err = TaskVarsError::config_with_code(ErrorCode::CONFIG_INVALID_VALUE, "bad flag");
        assert_eq!(err.to_string(), "[E1005] Configuration error: bad flag");
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_invariant_is_distinct_from_validation() {
        let invariant = TaskVarsError::invariant(
            ErrorCode::SUBSTITUTION_UNRESOLVED,
            "no binding",
            "$(params.x)",
            "steps[0].image",
        );
        assert!(invariant.is_invariant());
        assert_eq!(invariant.code(), 4001);

        let validation: TaskVarsError = FieldErrors::from(FieldError::missing_field("steps")).into();
        assert!(!validation.is_invariant());
        assert_eq!(validation.exit_code(), 4);
        assert!(validation.to_string().contains("missing field(s): steps"));
    }

    #[test]
    fn test_yaml_error_conversion() {
        let err: TaskVarsError = serde_yaml::from_str::<Vec<String>>("{not: [a list")
            .unwrap_err()
            .into();
        assert_eq!(err.code(), ErrorCode::LOAD_INVALID_YAML);
    }
}
