//! Image description provider for non-text source material.
//!
//! Scanned uploads arrive as base64-encoded page images. An external
//! vision-capable model turns batches of them into study-note text, which the
//! pipeline then treats as ordinary raw text input.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use crate::types::PipelineError;

/// Prompt used when summarizing uploaded page images into note text.
pub const STUDY_NOTES_PROMPT: &str =
    "Extract all key ideas from these images and create concise study notes from them.";

/// Number of images sent per description call.
pub const IMAGE_BATCH_SIZE: usize = 5;

/// Capability: base64 page images plus a prompt in, descriptive text out.
#[async_trait]
pub trait DescriptionProvider: Send + Sync {
    async fn describe(&self, images: &[String], prompt: &str) -> Result<String, PipelineError>;
}

#[derive(Serialize)]
struct DescriptionRequest<'a> {
    prompt: &'a str,
    images: &'a [String],
}

#[derive(Deserialize)]
struct DescriptionResponse {
    response: String,
}

/// HTTP vision client.
///
/// Speaks the internal image-description endpoint contract: `POST` with
/// `{"prompt": …, "images": […]}`, expecting `{"response": …}` back.
#[derive(Clone, Debug)]
pub struct HttpVisionClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl HttpVisionClient {
    pub fn new(endpoint: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
        }
    }

    pub fn with_client(http: reqwest::Client, endpoint: Url) -> Self {
        Self { http, endpoint }
    }
}

#[async_trait]
impl DescriptionProvider for HttpVisionClient {
    async fn describe(&self, images: &[String], prompt: &str) -> Result<String, PipelineError> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&DescriptionRequest { prompt, images })
            .send()
            .await
            .map_err(|err| PipelineError::Completion(err.to_string()))?;

        if !response.status().is_success() {
            return Err(PipelineError::Completion(format!(
                "endpoint returned {}",
                response.status()
            )));
        }

        let body: DescriptionResponse = response
            .json()
            .await
            .map_err(|err| PipelineError::Completion(format!("invalid response body: {err}")))?;
        Ok(body.response)
    }
}

/// Summarizes page images into one raw text, [`IMAGE_BATCH_SIZE`] images per
/// call.
///
/// A failed batch is skipped with a warning so one bad page does not sink the
/// whole document; if every batch fails the error is surfaced instead of
/// returning silently empty text.
pub async fn summarize_images(
    provider: &dyn DescriptionProvider,
    images: &[String],
    prompt: &str,
) -> Result<String, PipelineError> {
    if images.is_empty() {
        return Err(PipelineError::Validation("no images to describe".into()));
    }

    let mut summaries = Vec::new();
    for (batch_index, batch) in images.chunks(IMAGE_BATCH_SIZE).enumerate() {
        match provider.describe(batch, prompt).await {
            Ok(text) if !text.is_empty() => summaries.push(text),
            Ok(_) => warn!(batch_index, "image description batch returned empty text"),
            Err(err) => warn!(batch_index, %err, "image description batch failed, skipping"),
        }
    }

    if summaries.is_empty() {
        return Err(PipelineError::Completion(
            "all image description batches failed".into(),
        ));
    }
    Ok(summaries.join("\n\n"))
}
