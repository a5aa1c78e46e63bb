//! Gemini adapter: text and photo-task answering via `generateContent`.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use gtb_core::{
    ports::{AnswerClient, Prompt},
    Error, Result,
};
use serde_json::{json, Value};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Clone, Debug)]
pub struct GeminiClient {
    model: String,
    http: reqwest::Client,
}

impl GeminiClient {
    pub fn new(model: impl Into<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client build");
        Self {
            model: model.into(),
            http,
        }
    }

    fn request_body(prompt: &Prompt) -> Value {
        let mut parts = vec![json!({ "text": prompt.text })];
        if let Some(img) = &prompt.image {
            let data = base64::engine::general_purpose::STANDARD.encode(&img.bytes);
            parts.push(json!({
                "inline_data": { "mime_type": img.mime_type, "data": data }
            }));
        }
        json!({ "contents": [{ "parts": parts }] })
    }

    fn extract_text(v: &Value) -> Option<String> {
        let parts = v
            .get("candidates")?
            .get(0)?
            .get("content")?
            .get("parts")?
            .as_array()?;
        let text: String = parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n");
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

fn looks_rate_limited(status: reqwest::StatusCode, body: &str) -> bool {
    status.as_u16() == 429
        || body.contains("RESOURCE_EXHAUSTED")
        || body.to_lowercase().contains("quota")
}

#[async_trait]
impl AnswerClient for GeminiClient {
    async fn answer(&self, api_key: &str, prompt: &Prompt) -> Result<String> {
        let url = format!("{API_BASE}/{}:generateContent", self.model);

        let resp = self
            .http
            .post(&url)
            .query(&[("key", api_key)])
            .json(&Self::request_body(prompt))
            .send()
            .await
            .map_err(|e| Error::Transport(format!("gemini request error: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(300).collect();
            if looks_rate_limited(status, &body) {
                return Err(Error::RateLimited(format!("gemini {status}: {snippet}")));
            }
            return Err(Error::Upstream(format!("gemini {status}: {snippet}")));
        }

        let v: Value = resp
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("gemini json error: {e}")))?;

        Self::extract_text(&v)
            .ok_or_else(|| Error::Upstream("gemini returned no answer text".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_includes_inline_image_when_present() {
        let prompt = Prompt::with_image("what is this", "image/jpeg", vec![1, 2, 3]);
        let body = GeminiClient::request_body(&prompt);
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "what is this");
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/jpeg");
        assert_eq!(parts[1]["inline_data"]["data"], "AQID");
    }

    #[test]
    fn extracts_answer_from_candidates() {
        let v = serde_json::json!({
            "candidates": [{
                "content": { "parts": [{ "text": "42" }] }
            }]
        });
        assert_eq!(GeminiClient::extract_text(&v).as_deref(), Some("42"));
        assert_eq!(GeminiClient::extract_text(&serde_json::json!({})), None);
    }

    #[test]
    fn quota_errors_classify_as_rate_limited() {
        assert!(looks_rate_limited(
            reqwest::StatusCode::TOO_MANY_REQUESTS,
            ""
        ));
        assert!(looks_rate_limited(
            reqwest::StatusCode::FORBIDDEN,
            "RESOURCE_EXHAUSTED"
        ));
        assert!(!looks_rate_limited(
            reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            "boom"
        ));
    }
}
