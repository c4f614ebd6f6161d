use thiserror::Error;

use crate::export::Stage;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Authentication failed ({mode}): {message}")]
    Auth { mode: String, message: String },

    #[error("Query service error: {0}")]
    Service(String),

    #[error("Query service request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Export result extraction failed: {0}")]
    Extraction(String),

    #[error("Object storage error (HTTP {status}): {message}")]
    Storage { status: u16, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid response payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Stage '{stage}' cancelled after exceeding its deadline")]
    Cancelled { stage: Stage },
}

impl ExportError {
    pub fn auth(mode: impl std::fmt::Display, message: impl Into<String>) -> Self {
        ExportError::Auth {
            mode: mode.to_string(),
            message: message.into(),
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, ExportError::Auth { .. })
    }

    /// Stable classification used in failure logs and exit codes.
    pub fn kind(&self) -> &'static str {
        match self {
            ExportError::Auth { .. } => "auth",
            ExportError::Service(_) | ExportError::Transport(_) | ExportError::Json(_) => {
                "service"
            }
            ExportError::Extraction(_) => "extraction",
            ExportError::Storage { .. } | ExportError::Io(_) | ExportError::Csv(_) => "io",
            ExportError::Config(_) => "config",
            ExportError::Cancelled { .. } => "cancelled",
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            "auth" => 2,
            "service" => 3,
            "extraction" => 4,
            "io" => 5,
            "config" => 6,
            "cancelled" => 7,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, ExportError>;
