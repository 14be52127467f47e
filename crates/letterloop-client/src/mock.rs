//! Scripted [`ModelClient`] for tests in downstream crates.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::{ClientError, ModelClient, ModelMode};

/// A call observed by [`MockClient`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCall {
    pub prompt: String,
    pub system_instruction: Option<String>,
    pub mode: ModelMode,
}

type Responder = Box<dyn Fn(&ModelCall) -> Result<String, ClientError> + Send + Sync>;

/// Records every call and answers through a caller-supplied closure
pub struct MockClient {
    responder: Responder,
    calls: Mutex<Vec<ModelCall>>,
}

impl MockClient {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&ModelCall) -> Result<String, ClientError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always answer with the same text
    pub fn replying(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::new(move |_| Ok(text.clone()))
    }

    /// Always fail with the same error
    pub fn failing(error: ClientError) -> Self {
        Self::new(move |_| Err(error.clone()))
    }

    pub fn calls(&self) -> Vec<ModelCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ModelClient for MockClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn invoke(
        &self,
        prompt: &str,
        system_instruction: Option<&str>,
        mode: ModelMode,
    ) -> Result<String, ClientError> {
        let call = ModelCall {
            prompt: prompt.to_string(),
            system_instruction: system_instruction.map(String::from),
            mode,
        };
        let reply = (self.responder)(&call);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        reply
    }
}
