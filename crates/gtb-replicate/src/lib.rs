//! Replicate adapter: synchronous image generation via the model
//! predictions endpoint with `Prefer: wait`.

use std::time::Duration;

use async_trait::async_trait;
use gtb_core::{ports::ImageClient, Error, Result};
use serde_json::{json, Value};

const API_BASE: &str = "https://api.replicate.com/v1/models";

#[derive(Clone, Debug)]
pub struct ReplicateClient {
    model: String,
    http: reqwest::Client,
}

impl ReplicateClient {
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

    fn request_body(description: &str) -> Value {
        json!({
            "input": {
                "prompt": description,
                "width": 512,
                "height": 512,
                "num_inference_steps": 30,
                "guidance_scale": 7.5,
                "num_outputs": 1
            }
        })
    }

    /// The `output` field is a URL string or an array of them depending on
    /// the model.
    fn output_url(v: &Value) -> Option<String> {
        match v.get("output")? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Array(items) => items
                .iter()
                .find_map(|i| i.as_str())
                .map(str::to_string),
            _ => None,
        }
    }
}

#[async_trait]
impl ImageClient for ReplicateClient {
    async fn generate(&self, api_key: &str, description: &str) -> Result<Option<String>> {
        let url = format!("{API_BASE}/{}/predictions", self.model);

        let resp = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .header("Prefer", "wait")
            .json(&Self::request_body(description))
            .send()
            .await
            .map_err(|e| Error::Transport(format!("replicate request error: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(300).collect();
            if status.as_u16() == 429 {
                return Err(Error::RateLimited(format!("replicate {status}: {snippet}")));
            }
            return Err(Error::Upstream(format!("replicate {status}: {snippet}")));
        }

        let v: Value = resp
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("replicate json error: {e}")))?;

        Ok(Self::output_url(&v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_carries_fixed_generation_parameters() {
        let body = ReplicateClient::request_body("a red cat");
        assert_eq!(body["input"]["prompt"], "a red cat");
        assert_eq!(body["input"]["width"], 512);
        assert_eq!(body["input"]["height"], 512);
        assert_eq!(body["input"]["num_inference_steps"], 30);
        assert_eq!(body["input"]["guidance_scale"], 7.5);
        assert_eq!(body["input"]["num_outputs"], 1);
    }

    #[test]
    fn output_url_handles_string_and_array() {
        let s = serde_json::json!({ "output": "https://x/1.png" });
        assert_eq!(
            ReplicateClient::output_url(&s).as_deref(),
            Some("https://x/1.png")
        );

        let a = serde_json::json!({ "output": ["https://x/2.png"] });
        assert_eq!(
            ReplicateClient::output_url(&a).as_deref(),
            Some("https://x/2.png")
        );

        assert_eq!(ReplicateClient::output_url(&serde_json::json!({})), None);
        assert_eq!(
            ReplicateClient::output_url(&serde_json::json!({ "output": [] })),
            None
        );
    }
}
