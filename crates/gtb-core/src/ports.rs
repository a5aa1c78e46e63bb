//! Upstream client traits. Adapter crates implement these against the real
//! HTTP APIs; tests substitute mocks.

use async_trait::async_trait;

use crate::Result;

/// A question for the answer model: text plus an optional photo of the task.
#[derive(Clone, Debug)]
pub struct Prompt {
    pub text: String,
    pub image: Option<ImageAttachment>,
}

#[derive(Clone, Debug)]
pub struct ImageAttachment {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl Prompt {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image: None,
        }
    }

    pub fn with_image(text: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            text: text.into(),
            image: Some(ImageAttachment {
                mime_type: mime_type.into(),
                bytes,
            }),
        }
    }
}

/// Text-answer upstream. `api_key` is chosen by the caller so the key pool
/// can rotate on rate limits.
#[async_trait]
pub trait AnswerClient: Send + Sync {
    async fn answer(&self, api_key: &str, prompt: &Prompt) -> Result<String>;
}

/// Image-generation upstream. Returns the hosted image URL, or `None` when
/// generation failed for any reason.
#[async_trait]
pub trait ImageClient: Send + Sync {
    async fn generate(&self, api_key: &str, description: &str) -> Result<Option<String>>;
}
