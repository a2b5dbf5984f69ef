//! OpenAI adapter (chat completions).
//!
//! Implements the core `CompletionClient` port over the `chat/completions`
//! endpoint of any OpenAI-compatible base URL.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use rentbot_core::{
    config::Config,
    errors::Error,
    model::{client::CompletionClient, types::CompletionRequest},
    Result,
};

#[derive(Clone, Debug)]
pub struct OpenAiOptions {
    pub base_url: String,
    pub timeout: Duration,
    /// Explicit proxy URL. Without one reqwest still honors `HTTPS_PROXY`.
    pub proxy: Option<String>,
    /// `NO_PROXY` host list applied to the explicit proxy.
    pub no_proxy: Option<String>,
}

impl OpenAiOptions {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            base_url: cfg.openai_base_url.clone(),
            timeout: cfg.openai_timeout,
            proxy: cfg.outbound_proxy().map(str::to_string),
            no_proxy: cfg.no_proxy.clone(),
        }
    }
}

#[derive(Clone)]
pub struct OpenAiClient {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>, opts: OpenAiOptions) -> Result<Self> {
        let mut builder = reqwest::Client::builder().timeout(opts.timeout);
        if let Some(p) = &opts.proxy {
            let proxy = reqwest::Proxy::all(p)
                .map_err(|e| Error::Config(format!("invalid proxy for OpenAI client: {e}")))?
                .no_proxy(opts.no_proxy.as_deref().and_then(reqwest::NoProxy::from_string));
            builder = builder.proxy(proxy);
        }
        let http = builder
            .build()
            .map_err(|e| Error::External(format!("openai client build error: {e}")))?;

        Ok(Self {
            api_key: api_key.into(),
            base_url: opts.base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Build a client from config, or `None` when no API key is configured.
    pub fn from_config(cfg: &Config) -> Result<Option<Self>> {
        match &cfg.openai_api_key {
            Some(key) => Self::new(key.clone(), OpenAiOptions::from_config(cfg)).map(Some),
            None => Ok(None),
        }
    }

    /// Cheap authenticated request used by `rentbot check`.
    pub async fn probe(&self) -> Result<()> {
        let resp = self
            .http
            .get(format!("{}/models", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(request_error)?;

        if resp.status().is_success() {
            return Ok(());
        }
        Err(status_error(resp, "openai probe failed").await)
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, req: CompletionRequest) -> Result<String> {
        let body = ChatRequest {
            model: req.model.api_name(),
            messages: [
                ChatMessage {
                    role: "system",
                    content: &req.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &req.prompt,
                },
            ],
        };

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;

        if !resp.status().is_success() {
            return Err(status_error(resp, "openai completion failed").await);
        }

        let raw = resp.text().await.map_err(request_error)?;
        let v: serde_json::Value = serde_json::from_str(&raw)?;

        let text = extract_content(&v)?;
        tracing::debug!(model = req.model.api_name(), chars = text.len(), "completion done");
        Ok(text)
    }
}

fn request_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        return Error::Network("openai request timed out".to_string());
    }
    if e.is_connect() {
        return Error::Network(format!(
            "cannot reach OpenAI (check network or HTTPS_PROXY): {e}"
        ));
    }
    Error::External(format!("openai request error: {e}"))
}

async fn status_error(resp: reqwest::Response, what: &str) -> Error {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Error::Unauthorized("OpenAI rejected the API key (HTTP 401)".to_string());
    }
    Error::External(format!("{what}: {status} {}", error_detail(&body)))
}

/// First 200 chars of `error.message` from an OpenAI error body, or of the body itself.
fn error_detail(body: &str) -> String {
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|v| v.pointer("/error/message"))
        .and_then(|m| m.as_str())
        .unwrap_or(body);
    message.chars().take(200).collect()
}

fn extract_content(v: &serde_json::Value) -> Result<String> {
    let text = v
        .pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .unwrap_or("")
        .trim()
        .to_string();

    if text.is_empty() {
        let reason = v
            .pointer("/choices/0/finish_reason")
            .and_then(|r| r.as_str())
            .unwrap_or("no choices");
        return Err(Error::External(format!(
            "openai returned an empty completion ({reason})"
        )));
    }
    Ok(text)
}
