//! # Error standards
//!
//! This module provides a standardised error enum and result type for this crate.

// -----------------------------------------------------------------------------------------------
// TYPES
// -----------------------------------------------------------------------------------------------

/// Standard result type used in the disparity crate.
pub type Result<T> = std::result::Result<T, Error>;

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The images or parameters handed to the matcher cannot be processed.
    ///
    /// `field` names the offending image or parameter.
    #[error("Invalid input `{field}`: {reason}")]
    InvalidInput {
        field: &'static str,
        reason: String
    }
}

impl Error {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidInput {
            field,
            reason: reason.into()
        }
    }

    /// Name of the image or parameter that caused the error.
    pub fn field(&self) -> &'static str {
        match self {
            Error::InvalidInput { field, .. } => field
        }
    }
}
