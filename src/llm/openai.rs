//! OpenAI-compatible chat-completion client
//!
//! Talks to either an Azure OpenAI deployment or a plain OpenAI-style
//! endpoint. The client owns the transport-level retry policy: a small,
//! fixed number of retries with a fixed delay, applied only to retryable
//! errors (network, timeout, 429, 5xx).

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::TransportError;
use crate::llm::client::LlmClient;
use crate::llm::types::{CompletionRequest, CompletionResponse, Role, Usage};

/// Default Azure OpenAI REST API version
const DEFAULT_API_VERSION: &str = "2024-02-01";

/// Default deployment / model
const DEFAULT_MODEL: &str = "gpt-4";

/// Which URL and auth scheme the endpoint expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiFlavor {
    /// `{endpoint}/openai/deployments/{model}/chat/completions`, `api-key` header
    #[default]
    Azure,
    /// `{endpoint}/v1/chat/completions`, bearer token, model in the body
    OpenAi,
}

/// Configuration for the OpenAI client
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub flavor: ApiFlavor,
    pub endpoint: String,
    /// Deployment name (Azure) or model id (OpenAI)
    pub model: String,
    pub api_version: String,
    pub max_tokens: Option<u32>,
    /// Response timeout per HTTP request
    pub timeout: Duration,
    /// Retries after the first request; 0 disables transport retries
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            flavor: ApiFlavor::Azure,
            endpoint: String::new(),
            model: DEFAULT_MODEL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            max_tokens: None,
            timeout: Duration::from_secs(120),
            max_retries: 3,
            retry_delay: Duration::from_secs(10),
        }
    }
}

impl OpenAiConfig {
    /// Create a new config for an endpoint and deployment
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            ..Default::default()
        }
    }

    /// Full URL of the chat-completions route
    pub fn completions_url(&self) -> String {
        let base = self.endpoint.trim_end_matches('/');
        match self.flavor {
            ApiFlavor::Azure => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                base, self.model, self.api_version
            ),
            ApiFlavor::OpenAi => format!("{}/v1/chat/completions", base),
        }
    }
}

/// OpenAI / Azure OpenAI client
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    config: OpenAiConfig,
    usage: Arc<Mutex<Usage>>,
}

impl OpenAiClient {
    /// Create a client reading the API key from the named environment variable
    pub fn from_env(api_key_env: &str, config: OpenAiConfig) -> Result<Self, TransportError> {
        let api_key = std::env::var(api_key_env).map_err(|_| TransportError::MissingApiKey {
            env_var: api_key_env.to_string(),
        })?;

        Self::with_api_key(api_key, config)
    }

    /// Create a client with an explicit API key
    pub fn with_api_key(api_key: String, config: OpenAiConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TransportError::Network(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!(model = %config.model, endpoint = %config.endpoint, "OpenAI client initialized");

        Ok(Self {
            client,
            api_key,
            config,
            usage: Arc::new(Mutex::new(Usage::default())),
        })
    }

    /// Build the request body for the chat-completions API
    fn build_request(&self, request: &CompletionRequest) -> Value {
        let messages: Vec<Value> = request
            .messages
            .iter()
            .map(|m| {
                json!({
                    "role": match m.role {
                        Role::System => "system",
                        Role::User => "user",
                        Role::Assistant => "assistant",
                    },
                    "content": m.content
                })
            })
            .collect();

        let mut body = json!({ "messages": messages });

        if self.config.flavor == ApiFlavor::OpenAi {
            body["model"] = json!(self.config.model);
        }

        if let Some(max_tokens) = request.max_tokens.or(self.config.max_tokens) {
            body["max_tokens"] = json!(max_tokens);
        }

        body
    }

    /// Parse the API response into a CompletionResponse
    fn parse_response(&self, body: Value) -> Result<CompletionResponse, TransportError> {
        let choices = body["choices"]
            .as_array()
            .ok_or_else(|| TransportError::InvalidResponse("response has no choices".to_string()))?;

        let mut content = String::new();
        for choice in choices {
            if let Some(text) = choice["message"]["content"].as_str() {
                content.push_str(text);
            }
            content.push('\n');
        }

        let usage = match body.get("usage") {
            Some(u) => Usage::new(
                u["prompt_tokens"].as_u64().unwrap_or(0),
                u["completion_tokens"].as_u64().unwrap_or(0),
            ),
            None => Usage::default(),
        };

        // Track cumulative usage
        self.usage
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .add(&usage);

        Ok(CompletionResponse { content, usage })
    }

    /// Send a single request, without retries
    async fn send_request(&self, body: &Value) -> Result<Value, TransportError> {
        let mut builder = self
            .client
            .post(self.config.completions_url())
            .header("content-type", "application/json");

        builder = match self.config.flavor {
            ApiFlavor::Azure => builder.header("api-key", &self.api_key),
            ApiFlavor::OpenAi => builder.bearer_auth(&self.api_key),
        };

        let response = builder.json(body).send().await.map_err(|e| self.map_send_error(e))?;

        let status = response.status();

        // Handle rate limiting
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(TransportError::RateLimited {
                retry_after: Duration::from_secs(retry_after),
            });
        }

        // Handle other errors
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TransportError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| TransportError::InvalidResponse(format!("Failed to parse response: {}", e)))
    }

    fn map_send_error(&self, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout(self.config.timeout)
        } else {
            e.into()
        }
    }

    /// Get cumulative token usage
    pub fn total_usage(&self) -> Usage {
        self.usage.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, TransportError> {
        let body = self.build_request(&request);
        let mut retries = 0;

        loop {
            match self.send_request(&body).await {
                Ok(response) => return self.parse_response(response),
                Err(e) if e.is_retryable() && retries < self.config.max_retries => {
                    retries += 1;
                    tracing::warn!(
                        error = %e,
                        retry = retries,
                        max_retries = self.config.max_retries,
                        delay_ms = self.config.retry_delay.as_millis() as u64,
                        "Transport error, retrying"
                    );
                    tokio::time::sleep(self.config.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn is_ready(&self) -> bool {
        !self.api_key.is_empty() && !self.config.endpoint.is_empty()
    }
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("endpoint", &self.config.endpoint)
            .field("model", &self.config.model)
            .finish()
    }
}
