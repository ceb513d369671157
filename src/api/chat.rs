use crate::config::Config;
use crate::scenario::has_more_than_words;
use crate::{logi, logw};
use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const BODY_SNIPPET_CHARS: usize = 800;
const MAX_EXTEND_ROUNDS: usize = 8;

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

fn extract_content(raw: &str) -> Option<String> {
    let resp: ChatResponse = serde_json::from_str(raw).ok()?;
    resp.choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .map(|m| m.content)
}

fn snippet(raw: &str) -> String {
    raw.chars().take(BODY_SNIPPET_CHARS).collect()
}

pub struct ChatClient {
    client: Client,
    base_url: String,
    timeout: Duration,
    temperature: f64,
}

impl ChatClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration, temperature: f64) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self::with_client(client, base_url, timeout, temperature))
    }

    pub fn with_client(
        client: Client,
        base_url: impl Into<String>,
        timeout: Duration,
        temperature: f64,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            timeout,
            temperature,
        }
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(cfg.ai_base_url.clone(), cfg.ai_timeout(), cfg.ai_temperature)
    }

    pub(crate) fn request_body(&self, system: &str, user: &str) -> serde_json::Value {
        json!({
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "temperature": self.temperature,
            "max_tokens": -1,
            "stream": false,
        })
    }

    pub async fn send(&self, system: &str, user: &str) -> Result<String> {
        let resp = self
            .client
            .post(&self.base_url)
            .json(&self.request_body(system, user))
            .timeout(self.timeout)
            .send()
            .await
            .with_context(|| format!("AI request to {} failed", self.base_url))?;

        let status = resp.status();
        let raw = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            logw(format!("AI HTTP {}", status.as_u16()));
            if !raw.is_empty() {
                logw(format!("AI raw body: {}", snippet(&raw)));
            }
            anyhow::bail!("AI request returned HTTP {}", status.as_u16());
        }

        match extract_content(&raw) {
            Some(text) => Ok(text),
            None => {
                logw(format!("AI raw body: {}", snippet(&raw)));
                anyhow::bail!("AI response had no choices[0].message.content")
            }
        }
    }

    /// Appends continuations to `original` until it has more than `max_words`
    /// words or a round yields nothing new.
    pub async fn extend_text(&self, original: &str, max_words: usize, system: &str) -> Result<String> {
        let mut extended = original.to_string();
        for round in 1..=MAX_EXTEND_ROUNDS {
            if has_more_than_words(&extended, max_words) {
                break;
            }
            let more = self.send(system, &extended).await?;
            if more.trim().is_empty() {
                logw("AI returned empty continuation; stopping extension.");
                break;
            }
            extended.push(' ');
            extended.push_str(more.trim());
            logi(format!(
                "Extension round {}: {} words",
                round,
                extended.split_whitespace().count()
            ));
        }
        Ok(extended)
    }
}
