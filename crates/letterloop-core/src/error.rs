use letterloop_client::ClientError;
use letterloop_critic::CriticError;
use letterloop_store::StoreError;
use letterloop_writer::WriterError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoopError {
    #[error("Writer error: {0}")]
    Writer(#[from] WriterError),

    #[error("Critic error: {0}")]
    Critic(#[from] CriticError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Rules document is missing or empty")]
    MissingRules,

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Failure taxonomy reported in a fatal outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing or invalid credentials, model name or rules document
    Config,
    /// Rate limit or transport failure; only seen inside the client
    TransientService,
    /// The service refused the request outright
    PermanentService,
    /// Retries exhausted or an unclassified non-success
    Service,
    /// A required upstream artifact was missing
    InputIncomplete,
    /// The scorecard total could not be extracted
    Parse,
    Store,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Config => "config",
            ErrorKind::TransientService => "transient_service",
            ErrorKind::PermanentService => "permanent_service",
            ErrorKind::Service => "service",
            ErrorKind::InputIncomplete => "input_incomplete",
            ErrorKind::Parse => "parse",
            ErrorKind::Store => "store",
        };
        write!(f, "{}", name)
    }
}

impl ErrorKind {
    pub fn of_client(error: &ClientError) -> Self {
        match error {
            ClientError::Config(_) => ErrorKind::Config,
            ClientError::InvalidRequest(_) => ErrorKind::InputIncomplete,
            ClientError::Rejected(_) => ErrorKind::PermanentService,
            ClientError::RetriesExhausted { .. }
            | ClientError::Status { .. }
            | ClientError::Malformed(_) => ErrorKind::Service,
        }
    }
}

impl LoopError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LoopError::Writer(e) => match e {
                WriterError::InputIncomplete(_) => ErrorKind::InputIncomplete,
                WriterError::Client(c) => ErrorKind::of_client(c),
                WriterError::EmptyResponse(_) => ErrorKind::Service,
                WriterError::Store(_) => ErrorKind::Store,
            },
            LoopError::Critic(e) => match e {
                CriticError::MissingRules => ErrorKind::Config,
                CriticError::Client(c) => ErrorKind::of_client(c),
                CriticError::EmptyResponse(_) => ErrorKind::Service,
                CriticError::Parse(_) => ErrorKind::Parse,
                CriticError::Store(_) => ErrorKind::Store,
            },
            LoopError::Store(_) => ErrorKind::Store,
            LoopError::MissingRules | LoopError::Config(_) => ErrorKind::Config,
        }
    }
}
