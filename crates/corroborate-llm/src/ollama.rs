//! Ollama Reasoner Implementation
//!
//! Provides integration with Ollama's local LLM API.
//!
//! # Features
//!
//! - Async HTTP communication with Ollama API
//! - JSON mode for prompt kinds that expect structured output
//! - Retry logic with exponential backoff
//! - Timeout handling and cooperative cancellation
//!
//! # Examples
//!
//! ```no_run
//! use corroborate_llm::OllamaReasoner;
//!
//! let reasoner = OllamaReasoner::new("http://localhost:11434", "llama3.1")?;
//! # Ok::<(), corroborate_llm::LlmError>(())
//! ```

use crate::LlmError;
use corroborate_domain::{CancellationToken, ReasoningError, ReasoningPort, ReasoningRequest};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Default Ollama API endpoint
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// Default timeout for LLM requests (60 seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default number of attempts
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Ollama API reasoner for local LLM inference
pub struct OllamaReasoner {
    endpoint: String,
    model: String,
    client: reqwest::Client,
    max_retries: u32,
}

/// Request body for Ollama generate API
#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
}

/// Response from Ollama generate API
#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

impl OllamaReasoner {
    /// Create a new Ollama reasoner
    ///
    /// # Parameters
    ///
    /// - `endpoint`: Ollama API endpoint (e.g., "http://localhost:11434")
    /// - `model`: Model to use (e.g., "llama3.1", "mistral")
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| LlmError::Communication(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            client,
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    /// Create a new Ollama reasoner on the default endpoint
    pub fn default_endpoint(model: impl Into<String>) -> Result<Self, LlmError> {
        Self::new(DEFAULT_ENDPOINT, model)
    }

    /// Set the maximum number of attempts
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Model name used for requests
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Generate text using the Ollama API
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Ollama is not running
    /// - Model is not available
    /// - Network communication fails
    /// - Response format is invalid
    /// - `cancel` fires before a response arrives
    pub async fn complete(
        &self,
        request: &ReasoningRequest,
        cancel: &CancellationToken,
    ) -> Result<String, LlmError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(LlmError::Canceled),
            result = self.complete_with_retries(request) => result,
        }
    }

    async fn complete_with_retries(&self, request: &ReasoningRequest) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.endpoint);

        let body = OllamaGenerateRequest {
            model: &self.model,
            prompt: &request.prompt,
            stream: false,
            format: request.kind.expects_json().then_some("json"),
        };

        // Retry logic with exponential backoff
        let mut attempts = 0;
        let mut last_error = None;

        while attempts < self.max_retries {
            debug!("Ollama {} request, attempt {}", request.kind, attempts + 1);
            match self.client.post(&url).json(&body).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response
                            .json::<OllamaGenerateResponse>()
                            .await
                            .map(|r| r.response)
                            .map_err(|e| {
                                LlmError::InvalidResponse(format!("Failed to parse response: {}", e))
                            });
                    } else if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(LlmError::ModelNotAvailable(self.model.clone()));
                    } else if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        last_error = Some(LlmError::RateLimitExceeded);
                    } else {
                        let error_text = response
                            .text()
                            .await
                            .unwrap_or_else(|_| "Unknown error".to_string());
                        last_error = Some(LlmError::Communication(format!(
                            "HTTP {}: {}",
                            status, error_text
                        )));
                    }
                }
                Err(e) => {
                    last_error = Some(LlmError::Communication(format!("Request failed: {}", e)));
                }
            }

            attempts += 1;
            if attempts < self.max_retries {
                // Exponential backoff: 1s, 2s, 4s, etc.
                let delay = Duration::from_secs(2u64.pow(attempts - 1));
                warn!("Ollama request failed, retrying in {:?}", delay);
                tokio::time::sleep(delay).await;
            }
        }

        Err(last_error
            .unwrap_or_else(|| LlmError::Communication("Max retries exceeded".to_string())))
    }
}

impl ReasoningPort for OllamaReasoner {
    /// Blocking wrapper around [`OllamaReasoner::complete`]
    ///
    /// The engine calls ports from the blocking pool, where the current
    /// runtime handle is available. Outside a runtime a private
    /// current-thread runtime is used.
    fn generate(
        &self,
        request: &ReasoningRequest,
        cancel: &CancellationToken,
    ) -> Result<String, ReasoningError> {
        let result = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle.block_on(self.complete(request, cancel)),
            Err(_) => tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| LlmError::Communication(format!("Failed to start runtime: {}", e)))?
                .block_on(self.complete(request, cancel)),
        };
        result.map_err(ReasoningError::from)
    }
}
