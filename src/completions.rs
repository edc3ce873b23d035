//! Completion provider: the contract for downstream per-window model calls.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::types::PipelineError;

/// Capability: a system message plus context text in, completion text out.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, system_message: &str, context: &str)
    -> Result<String, PipelineError>;
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    system_message: &'a str,
    context: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    response: String,
}

/// HTTP completion client.
///
/// Speaks the internal completion endpoint contract: `POST` with
/// `{"system_message": …, "context": …}`, expecting `{"response": …}` back.
#[derive(Clone, Debug)]
pub struct HttpCompletionClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl HttpCompletionClient {
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
impl CompletionProvider for HttpCompletionClient {
    async fn complete(
        &self,
        system_message: &str,
        context: &str,
    ) -> Result<String, PipelineError> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&CompletionRequest {
                system_message,
                context,
            })
            .send()
            .await
            .map_err(|err| PipelineError::Completion(err.to_string()))?;

        if !response.status().is_success() {
            return Err(PipelineError::Completion(format!(
                "endpoint returned {}",
                response.status()
            )));
        }

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|err| PipelineError::Completion(format!("invalid response body: {err}")))?;
        Ok(body.response)
    }
}
