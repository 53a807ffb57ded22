//! AI assistant client.
//!
//! Open-ended questions and photo descriptions go to an OpenAI-compatible
//! chat-completions endpoint. Failures are caught by the dispatcher and
//! turned into a spoken apology; nothing here reaches the user directly.

use std::future::Future;
use std::pin::Pin;

use serde_json::json;
use tracing::debug;

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// System prompt tuned for short, warm, spoken answers.
const SYSTEM_PROMPT: &str = "You are Sunny, a friendly companion for an elderly \
person looking at a photo slideshow. Answer in one or two short, warm, plain \
sentences suitable for being read aloud. Never mention that you are an AI.";

/// Common trait for assistant backends (dyn-compatible).
pub trait AssistantClient: Send + Sync {
    /// Respond to a prompt, optionally grounded on an image.
    fn respond<'a>(
        &'a self,
        prompt: &'a str,
        image_url: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>>;
}

/// OpenAI-compatible chat completions client.
pub struct OpenAiAssistant {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiAssistant {
    pub fn new(endpoint: Option<&str>, api_key: Option<&str>, model: Option<&str>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.unwrap_or(DEFAULT_ENDPOINT).to_string(),
            api_key: api_key.map(|s| s.to_string()),
            model: model.unwrap_or(DEFAULT_MODEL).to_string(),
        }
    }

    async fn request(&self, prompt: &str, image_url: Option<&str>) -> anyhow::Result<String> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("assistant API key not configured"))?;

        // With an image attached, use the multimodal content-array form.
        let user_content = match image_url {
            Some(url) => json!([
                { "type": "text", "text": prompt },
                { "type": "image_url", "image_url": { "url": url } },
            ]),
            None => json!(prompt),
        };

        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": user_content },
            ],
            "max_tokens": 120,
        });

        debug!(endpoint = %self.endpoint, has_image = image_url.is_some(), "Assistant request");

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("assistant API error {}: {}", status, body);
        }

        let json: serde_json::Value = resp.json().await?;
        let text = json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .trim()
            .to_string();

        if text.is_empty() {
            anyhow::bail!("assistant returned an empty response");
        }
        Ok(text)
    }
}

impl AssistantClient for OpenAiAssistant {
    fn respond<'a>(
        &'a self,
        prompt: &'a str,
        image_url: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>> {
        Box::pin(self.request(prompt, image_url))
    }
}
