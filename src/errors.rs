use thiserror::Error;

/// Top-level application error.
/// All variants carry a human-readable message for display/logging.
#[derive(Debug, Error)]
pub enum AppError {
    // ── Agent gateway errors ─────────────────────────────────────────────────
    #[error("Agent service unavailable at {host}")]
    AgentUnavailable { host: String },

    #[error("Agent '{agent_id}' not found")]
    ModelNotFound { agent_id: String },

    #[error("Agent call failed: {message}")]
    GatewayFailed { message: String },

    // ── Persistence errors ───────────────────────────────────────────────────
    #[error("Persistence failed: {message}")]
    PersistenceFailed {
        message: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Snapshot encoding failed: {0}")]
    SnapshotEncoding(#[source] serde_json::Error),

    // ── Validation errors ────────────────────────────────────────────────────
    #[error("Field '{field_name}' cannot be empty")]
    EmptyField { field_name: String },

    // ── Conversation flow errors ─────────────────────────────────────────────
    #[error("A message is already being processed")]
    TurnInFlight,

    #[error("Conversation '{id}' not found")]
    ConversationNotFound { id: String },

    // ── System errors ────────────────────────────────────────────────────────
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn persistence(message: impl Into<String>, source: sqlx::Error) -> Self {
        AppError::PersistenceFailed { message: message.into(), source }
    }

    pub fn gateway(message: impl Into<String>) -> Self {
        AppError::GatewayFailed { message: message.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::ConversationNotFound { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::EmptyField { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, AppError::TurnInFlight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_helpers_match_variants() {
        assert!(AppError::EmptyField { field_name: "message".into() }.is_validation());
        assert!(AppError::TurnInFlight.is_conflict());
        assert!(AppError::ConversationNotFound { id: "c".into() }.is_not_found());
    }

    #[test]
    fn messages_are_human_readable() {
        let err = AppError::EmptyField { field_name: "message".into() };
        assert_eq!(err.to_string(), "Field 'message' cannot be empty");
        assert_eq!(AppError::gateway("timeout").to_string(), "Agent call failed: timeout");
    }
}
