//! Error types for template synthesis and preview annotation.
//!
//! Every error here is recoverable: a failed edit leaves the previously-good
//! derived state (`assembled`, `preview`) in place so the caller can present
//! the error and retry.

use thiserror::Error;

/// Errors raised by the synthesis engine.
#[derive(Debug, Clone, Error)]
pub enum NlgError {
    /// A candidate selection referenced a text not present in the token's
    /// candidate list.
    #[error("no candidate matching '{text}' on token '{placeholder}'")]
    NoSuchCandidate {
        /// Placeholder of the token being edited.
        placeholder: String,
        /// The candidate text that was requested.
        text: String,
    },

    /// A token's candidate list violated the exactly-one-enabled invariant.
    #[error("token '{placeholder}' has {enabled} enabled candidates (expected exactly 1)")]
    InvariantViolation {
        /// Placeholder of the offending token.
        placeholder: String,
        /// Number of candidates currently enabled.
        enabled: usize,
    },

    /// A grammar-feature selection referenced a name absent from the catalog.
    #[error("unknown grammar feature '{feature}'")]
    UnknownGrammarFeature {
        /// The feature name that was requested.
        feature: String,
    },

    /// A token's placeholder does not occur in its template's source text.
    #[error("placeholder '{placeholder}' not found in source text")]
    PlaceholderNotFound {
        /// The missing placeholder.
        placeholder: String,
    },

    /// Two token placeholders occupy overlapping spans of the source text.
    /// Placeholders must be unique and non-overlapping; the engine refuses
    /// to guess a precedence.
    #[error("placeholders '{first}' and '{second}' overlap in the source text")]
    OverlappingPlaceholders {
        /// Placeholder whose span starts first.
        first: String,
        /// Placeholder whose span collides with it.
        second: String,
    },

    /// The tokenizer service returned a payload the engine cannot trust.
    #[error("invalid tokenizer response: {reason}")]
    InvalidTokenizerResponse {
        /// What was wrong with the payload.
        reason: String,
    },

    /// The renderer service failed or returned a response that cannot be
    /// applied. Existing rendered/annotated state is left untouched.
    #[error("render failed: {reason}")]
    RenderFailed {
        /// What went wrong.
        reason: String,
    },
}

impl NlgError {
    /// Get a stable code for this error type.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoSuchCandidate { .. } => "NO_SUCH_CANDIDATE",
            Self::InvariantViolation { .. } => "INVARIANT_VIOLATION",
            Self::UnknownGrammarFeature { .. } => "UNKNOWN_GRAMMAR_FEATURE",
            Self::PlaceholderNotFound { .. } => "PLACEHOLDER_NOT_FOUND",
            Self::OverlappingPlaceholders { .. } => "OVERLAPPING_PLACEHOLDERS",
            Self::InvalidTokenizerResponse { .. } => "INVALID_TOKENIZER_RESPONSE",
            Self::RenderFailed { .. } => "RENDER_FAILED",
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, NlgError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = NlgError::NoSuchCandidate {
            placeholder: "X".to_string(),
            text: "df.growth".to_string(),
        };
        assert_eq!(err.code(), "NO_SUCH_CANDIDATE");
        assert!(err.to_string().contains("df.growth"));

        let err = NlgError::InvariantViolation {
            placeholder: "X".to_string(),
            enabled: 0,
        };
        assert!(err.to_string().contains("expected exactly 1"));
    }
}
