use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::capability::{CapabilityHost, CapabilityKind, CapabilitySession, InvokeOptions};

/// Capability host backed by a locally running OpenAI-compatible server
/// (llama.cpp, vLLM, Ollama).
///
/// Every capability kind maps to the same model; dedicated kinds differ only in
/// the system prompt their sessions carry.
#[derive(Debug, Clone)]
pub struct OpenAiCapabilityHost {
    base_url: String,
    model: String,
    http: reqwest::Client,
}

impl OpenAiCapabilityHost {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(3))
            .timeout(Duration::from_secs(120))
            .build()
            .context("build http client")?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            http,
        })
    }
}

fn system_prompt(kind: CapabilityKind) -> Option<&'static str> {
    match kind {
        CapabilityKind::LanguageModel | CapabilityKind::Prompt => None,
        CapabilityKind::Writer => {
            Some("You write new text from a short brief. Return only the text.")
        }
        CapabilityKind::Rewriter => {
            Some("You rewrite text while preserving its meaning. Return only the rewritten text.")
        }
        CapabilityKind::Summarizer => {
            Some("You summarize text into its key points. Return only the summary.")
        }
        CapabilityKind::Proofreader => Some(
            "You fix grammar, spelling and punctuation. Return only the corrected text.",
        ),
    }
}

#[derive(Debug)]
struct OpenAiSession {
    kind: CapabilityKind,
    url: String,
    model: String,
    http: reqwest::Client,
}

impl OpenAiSession {
    async fn chat(&self, system: Option<String>, input: &str) -> Result<String> {
        let mut messages = Vec::with_capacity(2);
        if let Some(sys) = system {
            messages.push(serde_json::json!({"role": "system", "content": sys}));
        }
        messages.push(serde_json::json!({"role": "user", "content": input}));

        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
        });

        let resp = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("{} request failed", self.kind))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("{} returned {status}: {text}", self.kind);
        }

        let v: Value = resp.json().await?;
        v.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c0| {
                c0.get("message")
                    .and_then(|m| m.get("content"))
                    .and_then(|t| t.as_str())
                    .or_else(|| c0.get("text").and_then(|t| t.as_str()))
            })
            .map(|s| s.trim().to_string())
            .ok_or_else(|| anyhow::anyhow!("{} response has no completion text", self.kind))
    }
}

#[async_trait]
impl CapabilitySession for OpenAiSession {
    async fn prompt(&self, input: &str) -> Result<String> {
        self.chat(system_prompt(self.kind).map(str::to_string), input)
            .await
    }

    async fn rewrite(&self, input: &str, options: &InvokeOptions) -> Result<String> {
        let system = format!(
            "{} Use a {} tone. Target length: {}.",
            system_prompt(CapabilityKind::Rewriter).unwrap_or_default(),
            options.tone(),
            options.length()
        );
        self.chat(Some(system), input).await
    }
}

#[async_trait]
impl CapabilityHost for OpenAiCapabilityHost {
    fn is_available(&self, _kind: CapabilityKind) -> bool {
        true
    }

    /// Fails when the server is unreachable or does not serve the model, the
    /// same way a browser capability fails before its model is downloaded.
    async fn create_session(&self, kind: CapabilityKind) -> Result<Box<dyn CapabilitySession>> {
        let url = format!("{}/v1/models", self.base_url);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("reach model server at {}", self.base_url))?;
        if !resp.status().is_success() {
            anyhow::bail!("model server answered {} on /v1/models", resp.status());
        }

        let listing: Value = resp.json().await?;
        let served = listing
            .get("data")
            .and_then(|d| d.as_array())
            .map(|models| {
                models
                    .iter()
                    .any(|m| m.get("id").and_then(|id| id.as_str()) == Some(self.model.as_str()))
            })
            .unwrap_or(true);
        if !served {
            anyhow::bail!("model '{}' is not served at {}", self.model, self.base_url);
        }

        tracing::debug!(capability=%kind, model=%self.model, "capability session created");
        Ok(Box::new(OpenAiSession {
            kind,
            url: format!("{}/v1/chat/completions", self.base_url),
            model: self.model.clone(),
            http: self.http.clone(),
        }))
    }
}
