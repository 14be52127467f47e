//! # letterloop-client
//!
//! Single entry point for calls to the generative text service.
//!
//! ## Key Types
//!
//! - [`ModelClient`] - One logical prompt/response call
//! - [`ResilientClient`] - Retry and exponential backoff around a [`TextService`]
//! - [`GeminiService`] - HTTP transport for the Gemini `generateContent` API
//!
//! Retries happen here and nowhere else: rate limits and transport failures
//! back off and retry, permanent rejections and other errors do not.

mod gemini;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
mod output;
mod retry;
mod service;
mod traits;

pub use gemini::{classify, GeminiService};
pub use retry::{ResilientClient, Sleeper, TokioSleeper};
pub use service::{ServiceRequest, ServiceResponse, TextService, TransportError};
pub use traits::{
    ClientError, ClientSettings, Credentials, ModelClient, ModelMode, DEFAULT_ENDPOINT,
    DEFAULT_LITE_MODEL,
};
