use crate::domain::models::{AssuranceLevel, OutcomeKind};
use std::time::Duration;

/// Connection-level failure. Never retried by the client.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },
    #[error("transport failure calling {url}: {message}")]
    Failed { url: String, message: String },
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum FreshnessError {
    #[error("meta missing required field: {0}")]
    MissingField(String),
    #[error("meta.{field} must be an RFC3339 date-time string, got {value}")]
    MalformedTimestamp { field: String, value: String },
    #[error("meta.expires_at ({expires_at}) precedes meta.time_evaluated ({time_evaluated})")]
    Inverted {
        time_evaluated: String,
        expires_at: String,
    },
    #[error("meta.time_evaluated ({value}) is {skew_seconds}s away from local clock; max_skew_seconds={max}")]
    Skew {
        value: String,
        skew_seconds: i64,
        max: i64,
    },
}

/// Everything a check can end in other than PASS.
#[derive(thiserror::Error, Debug)]
pub enum CheckError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("schema violation: {}", .0.join("; "))]
    SchemaViolation(Vec<String>),
    #[error("response shape differs across probes: {}", .0.join(" | "))]
    ShapeInconsistency(Vec<String>),
    #[error("signature verification failed: {0}")]
    SignatureVerification(String),
    #[error("capability not declared or unavailable: {0}")]
    MissingCapability(String),
    #[error("expected assurance_level={expected}, metadata declares {declared}")]
    AssuranceLevelMismatch {
        expected: AssuranceLevel,
        declared: String,
    },
    #[error(transparent)]
    Freshness(#[from] FreshnessError),
    #[error("{0}")]
    Assertion(String),
    #[error("precondition not met: {0}")]
    Precondition(String),
    #[error("not applicable: {0}")]
    NotApplicable(String),
    #[error("known profile ambiguity: {0}")]
    KnownAmbiguity(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CheckError {
    pub fn outcome(&self) -> OutcomeKind {
        match self {
            Self::Transport(_) | Self::Internal(_) => OutcomeKind::Error,
            Self::SchemaViolation(_)
            | Self::ShapeInconsistency(_)
            | Self::SignatureVerification(_)
            | Self::AssuranceLevelMismatch { .. }
            | Self::Freshness(_)
            | Self::Assertion(_) => OutcomeKind::Fail,
            Self::MissingCapability(_) | Self::Precondition(_) => OutcomeKind::Skip,
            Self::NotApplicable(_) => OutcomeKind::NotApplicable,
            Self::KnownAmbiguity(_) => OutcomeKind::Xfail,
        }
    }
}
