use thiserror::Error;

use crate::model::ErrorStatus;
use crate::request::OutputShape;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("General failure: {0}")]
    GeneralFailure(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Remote endpoint died: {0}")]
    DeadObject(String),

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("Internal consistency violation: {0}")]
    InternalConsistency(String),

    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    #[error("Execution failed with {status}: {message}")]
    Execution { status: ErrorStatus, message: String },

    #[error("Output buffers too small: {message}")]
    OutputInsufficientSize {
        message: String,
        output_shapes: Vec<OutputShape>,
    },
}

impl Error {
    /// Build the error matching a status reported by a remote endpoint
    pub fn from_status(status: ErrorStatus, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            ErrorStatus::InvalidArgument => Error::InvalidArgument(message),
            ErrorStatus::GeneralFailure => Error::GeneralFailure(message),
            ErrorStatus::DeadObject => Error::DeadObject(message),
            ErrorStatus::OutputInsufficientSize => Error::OutputInsufficientSize {
                message,
                output_shapes: Vec::new(),
            },
            ErrorStatus::None
            | ErrorStatus::DeviceUnavailable
            | ErrorStatus::MissedDeadlineTransient
            | ErrorStatus::MissedDeadlinePersistent
            | ErrorStatus::ResourceExhaustedTransient
            | ErrorStatus::ResourceExhaustedPersistent => Error::Execution { status, message },
        }
    }

    /// Machine-checkable status code of this error
    pub fn status(&self) -> ErrorStatus {
        match self {
            Error::InvalidArgument(_) => ErrorStatus::InvalidArgument,
            Error::GeneralFailure(_) | Error::Unsupported(_) | Error::InternalConsistency(_) => {
                ErrorStatus::GeneralFailure
            }
            Error::DeadObject(_) => ErrorStatus::DeadObject,
            Error::ResourceExhausted(_) => ErrorStatus::ResourceExhaustedTransient,
            Error::DeadlineExceeded(_) => ErrorStatus::MissedDeadlineTransient,
            Error::Execution { status, .. } => *status,
            Error::OutputInsufficientSize { .. } => ErrorStatus::OutputInsufficientSize,
        }
    }

    /// True when the remote endpoint is gone and a reconnect may help
    pub fn is_dead_object(&self) -> bool {
        self.status() == ErrorStatus::DeadObject
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::GeneralFailure(format!("I/O error: {}", error))
    }
}
