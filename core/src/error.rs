use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not authorized: {0}")]
    Unauthorized(String),

    #[error("Complaint '{complaint_id}' not found")]
    NotFound { complaint_id: String },

    #[error("{reason}")]
    StateConflict {
        reason: String,
        /// Measured admin-to-complaint distance, set on GPS mismatch.
        distance_m: Option<f64>,
    },

    #[error("Admin area dataset unavailable: {0}")]
    Dataset(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn not_found(complaint_id: &str) -> Self {
        Self::NotFound {
            complaint_id: complaint_id.to_string(),
        }
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::StateConflict {
            reason: reason.into(),
            distance_m: None,
        }
    }

    /// Stable taxonomy name handed to the transport layer.
    /// Everything that is not a caller mistake collapses to "internal".
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Unauthorized(_) => "authorization",
            Self::NotFound { .. } => "not_found",
            Self::StateConflict { .. } => "state_conflict",
            Self::Dataset(_)
            | Self::Database(_)
            | Self::Serialization(_)
            | Self::Other(_) => "internal",
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
