use crate::logw;
use anyhow::{Context, Result};
use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use reqwest::Client;
use serde_json::{Value, json};
use std::path::Path;
use tokio::fs;

/// Image bytes sent inline next to the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

impl InlineImage {
    pub async fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)
            .await
            .with_context(|| format!("Failed to read image {}", path.display()))?;
        let mime_type = match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("jpg") | Some("jpeg") => "image/jpeg",
            Some("webp") => "image/webp",
            _ => "image/png",
        };
        Ok(Self {
            mime_type: mime_type.to_string(),
            data: BASE64_STANDARD.encode(bytes),
        })
    }
}

fn plan_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "narration": {"type": "STRING"},
                "visual_prompt": {"type": "STRING"},
                "voice_direction": {"type": "STRING"},
            },
            "required": ["narration", "visual_prompt", "voice_direction"],
        },
    })
}

pub fn build_request_body(prompt: &str, image: Option<&InlineImage>) -> Value {
    let mut parts = vec![json!({"text": prompt})];
    if let Some(image) = image {
        parts.push(json!({
            "inline_data": {
                "mime_type": image.mime_type,
                "data": image.data,
            }
        }));
    }

    json!({
        "contents": [{"parts": parts}],
        "generationConfig": {
            "temperature": 0.7,
            "responseMimeType": "application/json",
            "responseSchema": plan_schema(),
        },
    })
}

/// `candidates[0].content.parts[0].text`
pub fn extract_text(resp: &Value) -> Option<String> {
    if let Some(msg) = resp.pointer("/error/message").and_then(Value::as_str) {
        logw(format!("Gemini error message: {}", msg));
        return None;
    }
    resp.pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Remove markdown code fences the model may add despite JSON mode.
pub fn strip_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

pub async fn generate_content(
    client: &Client,
    endpoint: &str,
    model: &str,
    api_key: &str,
    body: &Value,
) -> Result<String> {
    let url = format!("{}/models/{}:generateContent", endpoint.trim_end_matches('/'), model);

    let resp = client
        .post(&url)
        .header("x-goog-api-key", api_key)
        .json(body)
        .send()
        .await
        .context("Gemini request failed")?;

    let status = resp.status();
    let raw = resp.text().await.unwrap_or_default();
    if !status.is_success() {
        let snippet = raw.chars().take(800).collect::<String>();
        anyhow::bail!("Gemini HTTP {}: {}", status.as_u16(), snippet);
    }

    let root: Value = serde_json::from_str(&raw).context("Gemini response is not JSON")?;
    extract_text(&root).context("Gemini response has no candidate text")
}
