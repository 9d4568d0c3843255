use std::env;

use async_trait::async_trait;
use eyre::{Result, eyre};
use serde_json::{json, Value};
use tracing::{debug, error};

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Something that can answer a prompt accepted by the conversation guard.
#[async_trait]
pub trait AnswerProvider: Send + Sync {
    async fn answer(&self, prompt: &str) -> Result<String>;
}

pub struct GeminiClient {
    api_key: String,
    model: String,
    api_base: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(model: impl Into<String>) -> Result<Self> {
        let api_key = env::var("GEMINI_API_KEY")
            .map_err(|_| eyre!("GEMINI_API_KEY environment variable not set"))?;

        let mut client = Self::with_api_key(api_key, model);
        if let Ok(api_base) = env::var("GEMINI_API_BASE") {
            client = client.with_api_base(api_base);
        }
        Ok(client)
    }

    pub fn with_api_key(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            api_base: API_BASE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    // The key travels in a header so it never shows up in a request URL,
    // and therefore never in a reqwest error message.
    fn api_url(&self) -> String {
        format!("{}/{}:generateContent", self.api_base, self.model)
    }

    pub async fn generate_content(&self, prompt: &str) -> Result<String> {
        let request_body = request_body(prompt);

        debug!(
            "Sending request to Gemini API: {}",
            serde_json::to_string_pretty(&request_body)?
        );

        let response = self.client.post(self.api_url())
            .header("x-goog-api-key", self.api_key.as_str())
            .json(&request_body)
            .send()
            .await
            .map_err(|e| e.without_url())?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.map_err(|e| e.without_url())?;
            error!("API request failed with status {}: {}", status, error_text);
            return Err(eyre!("API request failed ({}): {}", status, error_text));
        }

        let response_json: Value = response.json().await.map_err(|e| e.without_url())?;

        debug!(
            "Received response from Gemini API: {}",
            serde_json::to_string_pretty(&response_json)?
        );

        extract_text(&response_json)
    }
}

#[async_trait]
impl AnswerProvider for GeminiClient {
    async fn answer(&self, prompt: &str) -> Result<String> {
        self.generate_content(prompt).await
    }
}

fn request_body(prompt: &str) -> Value {
    json!({
        "contents": [
            {
                "role": "user",
                "parts": [
                    {
                        "text": prompt
                    }
                ]
            }
        ],
        "generationConfig": {
            "temperature": 0.7,
            "topP": 0.95,
            "topK": 40,
            "maxOutputTokens": 2048
        }
    })
}

/// Joins the text parts of the first candidate.
fn extract_text(response_json: &Value) -> Result<String> {
    let parts = response_json
        .get("candidates")
        .and_then(|candidates| candidates.as_array())
        .and_then(|candidates| candidates.first())
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(|parts| parts.as_array());

    let text: String = parts
        .into_iter()
        .flatten()
        .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
        .collect();

    if !text.is_empty() {
        return Ok(text);
    }

    // Blocked prompts come back with no candidates and a feedback reason
    if let Some(reason) = response_json
        .get("promptFeedback")
        .and_then(|feedback| feedback.get("blockReason"))
        .and_then(|reason| reason.as_str())
    {
        return Err(eyre!("Prompt was blocked: {}", reason));
    }

    Err(eyre!("Response contained no text"))
}
