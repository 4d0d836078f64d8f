//! Lateral synthesis errors

use serde_json::{json, Value};
use thiserror::Error;

use crate::envelope::ToolFailure;

pub type LateralResult<T> = Result<T, LateralError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LateralError {
    #[error("Origin is required")]
    MissingOrigin,

    #[error("Origin exceeds maximum length of {max} characters")]
    OriginTooLong { length: usize, max: usize },

    #[error("No active session. Call start_session first.")]
    NoSession,

    #[error("Divergent concepts already generated for this session (use override=true to regenerate)")]
    AlreadyGenerated { concepts: Vec<String> },

    #[error("count must be an integer between 1 and {max}")]
    InvalidCount { value: Option<i64>, max: usize },

    #[error("No divergent concepts generated. Call generate_divergence first.")]
    NoDivergence,

    #[error("divergent_concept is required")]
    MissingConcept,

    #[error("'{concept}' is not one of the divergent concepts for this session")]
    InvalidConcept { concept: String, valid: Vec<String> },

    #[error("'{concept}' has already been synthesized")]
    AlreadySynthesized { concept: String, remaining: Vec<String> },

    #[error("connection_type is required. Must be one of: {valid}")]
    MissingConnectionType { valid: String },

    #[error("confidence is required (0.0-1.0)")]
    MissingConfidence,

    #[error("insight is required")]
    MissingInsight,

    #[error("most_valuable_insight is required")]
    MissingMostValuable,

    #[error("why_valuable is required")]
    MissingWhyValuable,

    #[error("overall_rating is required (0.0-1.0)")]
    MissingRating,

    #[error("{message}")]
    Validation { message: String, value: Option<Value> },

    #[error("Insight exceeds maximum length of {max} characters")]
    InsightTooLong { length: usize, max: usize },

    #[error("All {required} syntheses must be recorded before reflection")]
    SynthesisIncomplete {
        completed: usize,
        required: usize,
        remaining: Vec<String>,
    },

    #[error("Session already has a reflection recorded")]
    AlreadyReflected,
}

impl LateralError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            value: None,
        }
    }

    pub fn validation_value(message: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Validation {
            message: message.into(),
            value: Some(value.into()),
        }
    }
}

impl ToolFailure for LateralError {
    fn kind(&self) -> &'static str {
        match self {
            Self::MissingOrigin => "missing_origin",
            Self::OriginTooLong { .. } => "origin_too_long",
            Self::NoSession => "no_session",
            Self::AlreadyGenerated { .. } => "already_generated",
            Self::InvalidCount { .. } => "invalid_count",
            Self::NoDivergence => "no_divergence",
            Self::MissingConcept => "missing_concept",
            Self::InvalidConcept { .. } => "invalid_concept",
            Self::AlreadySynthesized { .. } => "already_synthesized",
            Self::MissingConnectionType { .. } => "missing_connection_type",
            Self::MissingConfidence => "missing_confidence",
            Self::MissingInsight => "missing_insight",
            Self::MissingMostValuable => "missing_most_valuable",
            Self::MissingWhyValuable => "missing_why_valuable",
            Self::MissingRating => "missing_rating",
            Self::Validation { .. } => "validation_error",
            Self::InsightTooLong { .. } => "insight_too_long",
            Self::SynthesisIncomplete { .. } => "synthesis_incomplete",
            Self::AlreadyReflected => "already_reflected",
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            Self::OriginTooLong { length, max } | Self::InsightTooLong { length, max } => {
                Some(json!({ "length": length, "max_length": max }))
            }
            Self::AlreadyGenerated { concepts } => Some(json!({ "concepts": concepts })),
            Self::InvalidCount {
                value: Some(value), ..
            } => Some(json!({ "value": value })),
            Self::InvalidConcept { valid, .. } => Some(json!({ "valid_concepts": valid })),
            Self::AlreadySynthesized { remaining, .. } => Some(json!({ "remaining": remaining })),
            Self::Validation {
                value: Some(value), ..
            } => Some(json!({ "value": value })),
            Self::SynthesisIncomplete {
                completed,
                required,
                remaining,
            } => Some(json!({
                "completed": completed,
                "required": required,
                "remaining_concepts": remaining,
            })),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Envelope;

    #[test]
    fn test_envelope_rendering() {
        let env = Envelope::failure(&LateralError::InsightTooLong {
            length: 2500,
            max: 2000,
        });
        assert_eq!(env.error_kind(), Some("insight_too_long"));
        assert_eq!(env.details().unwrap()["max_length"], 2000);

        let env = Envelope::failure(&LateralError::NoSession);
        assert_eq!(env.error_kind(), Some("no_session"));
        assert!(env.details().is_none());

        let env = Envelope::failure(&LateralError::InvalidCount { value: None, max: 50 });
        assert_eq!(env.error_kind(), Some("invalid_count"));
        assert!(env.details().is_none());
        assert_eq!(
            Envelope::failure(&LateralError::MissingRating).error_kind(),
            Some("missing_rating")
        );
    }
}
