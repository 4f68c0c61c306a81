use crate::config::Config;
use crate::llm_client::LlmClient;

/// Shared application state injected into all route handlers via Axum extractors.
/// Nothing here is per-request; batches and rubrics live only for one request.
#[derive(Clone)]
pub struct AppState {
    /// Paced, retrying completion client. Clones share one rate limiter.
    pub llm: LlmClient,
    pub config: Config,
}
