use thiserror::Error;

/// Bearer-token failures at the request boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("No token provided")]
    MissingHeader,

    #[error("Malformed authorization header")]
    MalformedHeader,
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Cannot load {source_name}: {reason}")]
    Load { source_name: String, reason: String },

    #[error("Upstream returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Computation failed: {0}")]
    Computation(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EngineError {
    pub fn load(source_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::Load {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn computation(reason: impl Into<String>) -> Self {
        Self::Computation(reason.into())
    }

    /// HTTP status the request boundary answers with.
    pub fn status(&self) -> u16 {
        match self {
            Self::Auth(AuthError::MissingHeader) => 401,
            Self::Auth(AuthError::MalformedHeader) => 403,
            Self::Upstream { status, .. } => *status,
            Self::InvalidRequest(_) => 400,
            Self::Load { .. }
            | Self::Database(_)
            | Self::Csv(_)
            | Self::Serialization(_)
            | Self::Io(_)
            | Self::Computation(_)
            | Self::Other(_) => 500,
        }
    }

    /// Whether this failure came from reading the source data.
    pub fn is_load_failure(&self) -> bool {
        matches!(
            self,
            Self::Load { .. } | Self::Database(_) | Self::Csv(_) | Self::Io(_)
        )
    }

    /// Message safe to hand back to a caller. Auth and load failures never
    /// expose their internals.
    pub fn public_message(&self) -> String {
        match self {
            Self::Auth(e) => e.to_string(),
            Self::Upstream { message, .. } => message.clone(),
            Self::InvalidRequest(reason) => reason.clone(),
            e if e.is_load_failure() => "Failed to load source data.".to_string(),
            _ => "Analytics computation failed.".to_string(),
        }
    }

    /// Raw cause string attached to computation failures for diagnostics.
    pub fn detail(&self) -> Option<String> {
        match self {
            Self::Computation(reason) => Some(reason.clone()),
            Self::Serialization(e) => Some(e.to_string()),
            Self::Other(e) => Some(format!("{e:#}")),
            e if e.is_load_failure() => Some(e.to_string()),
            _ => None,
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
