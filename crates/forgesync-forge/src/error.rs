//! Forge adapter error types.
//!
//! The adapter surfaces a classified error; the reconciler decides
//! per class whether an entity is skipped or the run aborts.

use thiserror::Error;

/// Error raised by a forge API call.
#[derive(Debug, Error)]
pub enum ForgeError {
    /// The forge rejected the call. Recoverable per entity when the
    /// run allows continuing on failure.
    #[error("forge call failed with status {status}: {message}")]
    Transient { status: u16, message: String },

    /// A recognized, always-non-fatal rejection (e.g. creating a user
    /// whose email is already taken).
    #[error("forge skipped operation: {message}")]
    KnownSkip { message: String },

    /// Network-level failure below HTTP semantics.
    #[error("forge transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The forge answered with a body the adapter could not interpret.
    #[error("invalid forge response: {message}")]
    InvalidResponse { message: String },
}

/// Lower-cased fragment of the creation failure that is demoted to a
/// skip. The forge reports it both as a flat message
/// (`Email has already been taken`) and as a field-keyed validation
/// object (`{"message": {"email": ["has already been taken"]}}`) that
/// flattens to this form.
pub const EMAIL_TAKEN_MESSAGE: &str = "email has already been taken";

impl ForgeError {
    /// Whether this error is the recognized non-fatal kind.
    #[must_use]
    pub fn is_known_skip(&self) -> bool {
        matches!(self, ForgeError::KnownSkip { .. })
    }

    /// Short kind tag for log fields.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ForgeError::Transient { .. } => "transient",
            ForgeError::KnownSkip { .. } => "known_skip",
            ForgeError::Transport { .. } => "transport",
            ForgeError::InvalidResponse { .. } => "invalid_response",
        }
    }

    pub fn transport(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ForgeError::Transport {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        ForgeError::InvalidResponse {
            message: message.into(),
        }
    }

    /// Classify an HTTP failure, demoting the known email conflict.
    /// The match is case-insensitive so both the flat and the
    /// flattened field-keyed message shapes are recognized.
    #[must_use]
    pub fn from_status(status: u16, message: String) -> Self {
        if message.to_lowercase().contains(EMAIL_TAKEN_MESSAGE) {
            ForgeError::KnownSkip { message }
        } else {
            ForgeError::Transient { status, message }
        }
    }
}

/// Result type for forge operations.
pub type ForgeResult<T> = Result<T, ForgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_taken_is_demoted() {
        let err = ForgeError::from_status(409, "Email has already been taken".to_string());
        assert!(err.is_known_skip());
        assert_eq!(err.kind(), "known_skip");
    }

    #[test]
    fn flattened_email_validation_form_is_demoted() {
        // {"message": {"email": ["has already been taken"]}} flattens
        // to this lower-case form.
        let err = ForgeError::from_status(400, "email has already been taken".to_string());
        assert!(err.is_known_skip());
    }

    #[test]
    fn other_failures_stay_transient() {
        let err = ForgeError::from_status(400, "Username has already been taken".to_string());
        assert!(!err.is_known_skip());
        assert_eq!(err.kind(), "transient");

        let err = ForgeError::from_status(400, "username has already been taken".to_string());
        assert!(!err.is_known_skip());
    }
}
