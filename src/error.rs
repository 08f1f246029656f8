//! Error types for Fanfolio
//!
//! Every failure the content model can report is an `AppError`.
//! All of them are local and recoverable: the model never retries and
//! never aborts, it hands the error back to the caller.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Model-wide error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Kind tag and payload slots disagree
    #[error("Invalid variant: {0}")]
    InvalidVariant(String),

    /// Ordered-collection position outside the valid range
    #[error("Index {index} out of range for collection of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// Reply operation on a node that was removed from its thread
    #[error("Reply {0} is detached from its thread")]
    DetachedNode(String),

    /// Structurally inconsistent input (one or more field errors)
    #[error("Validation error: {0}")]
    Validation(ValidationErrors),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Short label used for metrics and structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidVariant(_) => "invalid_variant",
            AppError::IndexOutOfRange { .. } => "index_out_of_range",
            AppError::DetachedNode(_) => "detached_node",
            AppError::Validation(_) => "validation",
            AppError::Config(_) => "config",
            AppError::Internal(_) => "internal",
        }
    }

    /// Build a validation error carrying a single field error.
    pub fn field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        AppError::Validation(ValidationErrors::single(field, reason))
    }

    /// Count the error in the metrics registry and hand it back.
    pub(crate) fn recorded(self) -> Self {
        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL.with_label_values(&[self.kind()]).inc();
        self
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::Validation(errors)
    }
}

/// A single rejected field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Dotted path of the field (e.g. `images[2].video`)
    pub field: String,
    pub reason: String,
}

/// Field errors collected while validating one input
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.push(field, reason);
        errors
    }

    pub fn push(&mut self, field: impl Into<String>, reason: impl Into<String>) {
        self.0.push(FieldError {
            field: field.into(),
            reason: reason.into(),
        });
    }

    /// Record the error of a nested check under `prefix`.
    ///
    /// Nested validation errors are flattened with their paths prefixed,
    /// any other error becomes one field error at `prefix`.
    pub fn absorb(&mut self, prefix: &str, error: AppError) {
        match error {
            AppError::Validation(nested) => {
                for FieldError { field, reason } in nested.0 {
                    let path = if field.is_empty() {
                        prefix.to_string()
                    } else if field.starts_with('[') {
                        format!("{prefix}{field}")
                    } else {
                        format!("{prefix}.{field}")
                    };
                    self.0.push(FieldError { field: path, reason });
                }
            }
            other => self.push(prefix, other.to_string()),
        }
    }

    /// Append every error of `other` unchanged.
    pub fn merge(&mut self, other: ValidationErrors) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    /// Does any error point at `field`?
    pub fn mentions(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", error.field, error.reason)?;
        }
        Ok(())
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absorb_prefixes_nested_fields() {
        let mut outer = ValidationErrors::new();
        outer.absorb(
            "images",
            AppError::Validation(ValidationErrors::single("[1].video", "must not be empty")),
        );
        outer.absorb("cover", AppError::InvalidVariant("no kind".to_string()));

        assert_eq!(outer.len(), 2);
        assert!(outer.mentions("images[1].video"));
        assert!(outer.mentions("cover"));
    }

    #[test]
    fn display_joins_field_errors() {
        let mut errors = ValidationErrors::single("title", "too long");
        errors.push("price", "must not be negative");

        let error = AppError::from(errors);
        assert_eq!(
            error.to_string(),
            "Validation error: title: too long; price: must not be negative"
        );
        assert_eq!(error.kind(), "validation");
    }
}
