use letterloop_client::ClientError;
use letterloop_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WriterError {
    /// A required input was missing or blank. No model call was made.
    #[error("Input incomplete: {0}")]
    InputIncomplete(String),

    #[error("Model call failed: {0}")]
    Client(#[from] ClientError),

    #[error("Model returned an empty {0}")]
    EmptyResponse(&'static str),

    #[error("Failed to persist artifact: {0}")]
    Store(#[from] StoreError),
}
