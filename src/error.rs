use thiserror::Error;

use crate::mx::ResolutionError;
use crate::smtp::{DialogueStage, TransportError};

/// Why a check produced no outcome. SMTP bounces are not errors; they end up
/// in the returned [`Outcome`](crate::Outcome).
#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error("{message}")]
    Dialogue {
        stage: DialogueStage,
        message: String,
    },
    #[error("connection timed out")]
    Timeout { stage: DialogueStage },
    /// A value that ends up in an SMTP command contains a line break.
    #[error("option {option} must not contain CR or LF")]
    InvalidOption { option: &'static str },
}

impl CheckError {
    pub(crate) fn transport(stage: DialogueStage, err: TransportError) -> Self {
        match err {
            TransportError::TimedOut => Self::Timeout { stage },
            other => Self::Dialogue {
                stage,
                message: other.to_string(),
            },
        }
    }

    pub(crate) fn dialogue(stage: DialogueStage, message: impl Into<String>) -> Self {
        Self::Dialogue {
            stage,
            message: message.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Stage the dialogue was in when it failed. Resolution and option
    /// failures happen before any connection.
    pub fn stage(&self) -> DialogueStage {
        match self {
            Self::Resolution(_) | Self::InvalidOption { .. } => DialogueStage::Connect,
            Self::Dialogue { stage, .. } | Self::Timeout { stage } => *stage,
        }
    }
}
