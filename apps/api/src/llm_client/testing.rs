//! Scripted completion backend for tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{CompletionBackend, CompletionRequest, LlmClient, LlmError, RateLimiter, RetryPolicy};

/// Replays a fixed queue of replies and records every request it receives.
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedBackend {
    pub fn new(replies: Vec<Result<String, LlmError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.prompt.clone())
            .collect()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(LlmError::Api {
                    status: 500,
                    message: "no scripted reply left".to_string(),
                })
            })
    }
}

/// An unpaced client over the given backend, with no throttle retries.
pub fn scripted_client(backend: Arc<ScriptedBackend>) -> LlmClient {
    LlmClient::new(
        backend,
        Arc::new(RateLimiter::unlimited()),
        RetryPolicy {
            max_retries: 0,
            ..RetryPolicy::default()
        },
    )
}
