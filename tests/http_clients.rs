//! HTTP collaborator clients against a mock server: wire formats, error
//! mapping, and the image batching rules.

use httpmock::prelude::*;
use serde_json::json;
use url::Url;

use notesmith::completions::{CompletionProvider, HttpCompletionClient};
use notesmith::embeddings::{EmbeddingProvider, HttpEmbeddingClient};
use notesmith::vision::{self, HttpVisionClient, IMAGE_BATCH_SIZE, STUDY_NOTES_PROMPT};
use notesmith::PipelineError;

fn endpoint(server: &MockServer, path: &str) -> Url {
    Url::parse(&server.url(path)).unwrap()
}

#[tokio::test]
async fn embedding_client_speaks_the_wire_contract() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/embed")
                .json_body(json!({"text": "cell membrane"}));
            then.status(200)
                .json_body(json!({"embedding": [0.25, -0.5, 1.0]}));
        })
        .await;

    let client = HttpEmbeddingClient::new(endpoint(&server, "/embed"));
    let vector = client.embed("cell membrane").await.unwrap();

    mock.assert_async().await;
    assert_eq!(vector, vec![0.25, -0.5, 1.0]);
}

#[tokio::test]
async fn embedding_endpoint_failure_is_a_retryable_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/embed");
            then.status(503);
        })
        .await;

    let client = HttpEmbeddingClient::new(endpoint(&server, "/embed"));
    let err = client.embed("anything").await.unwrap_err();

    assert!(matches!(err, PipelineError::Embedding(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn embedding_client_rejects_malformed_bodies() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/embed");
            then.status(200).json_body(json!({"vectors": [1.0]}));
        })
        .await;

    let client = HttpEmbeddingClient::new(endpoint(&server, "/embed"));
    let err = client.embed("anything").await.unwrap_err();
    assert!(matches!(err, PipelineError::Embedding(_)));
}

#[tokio::test]
async fn completion_client_sends_system_message_and_context() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/complete").json_body(json!({
                "system_message": "You are a tutor.",
                "context": "Mitochondria produce ATP."
            }));
            then.status(200)
                .json_body(json!({"response": "Q1: What produces ATP?"}));
        })
        .await;

    let client = HttpCompletionClient::new(endpoint(&server, "/complete"));
    let answer = client
        .complete("You are a tutor.", "Mitochondria produce ATP.")
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(answer, "Q1: What produces ATP?");
}

#[tokio::test]
async fn completion_failure_maps_to_a_completion_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/complete");
            then.status(500);
        })
        .await;

    let client = HttpCompletionClient::new(endpoint(&server, "/complete"));
    let err = client.complete("system", "context").await.unwrap_err();
    assert!(matches!(err, PipelineError::Completion(_)));
}

#[tokio::test]
async fn image_summaries_batch_five_images_per_call() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/describe");
            then.status(200).json_body(json!({"response": "notes"}));
        })
        .await;

    let client = HttpVisionClient::new(endpoint(&server, "/describe"));
    let images: Vec<String> = (0..12).map(|i| format!("page-{i}")).collect();

    let text = vision::summarize_images(&client, &images, STUDY_NOTES_PROMPT)
        .await
        .unwrap();

    // 12 images at 5 per call is 3 calls.
    mock.assert_hits_async(images.len().div_ceil(IMAGE_BATCH_SIZE))
        .await;
    assert_eq!(text, "notes\n\nnotes\n\nnotes");
}

#[tokio::test]
async fn a_failed_image_batch_is_skipped_not_fatal() {
    let server = MockServer::start_async().await;
    // First batch (pages 0-4) fails; the second (pages 5-6) succeeds.
    server
        .mock_async(|when, then| {
            when.method(POST).path("/describe").body_contains("page-0");
            then.status(500);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/describe").body_contains("page-5");
            then.status(200)
                .json_body(json!({"response": "second batch notes"}));
        })
        .await;

    let client = HttpVisionClient::new(endpoint(&server, "/describe"));
    let images: Vec<String> = (0..7).map(|i| format!("page-{i}")).collect();

    let text = vision::summarize_images(&client, &images, STUDY_NOTES_PROMPT)
        .await
        .unwrap();
    assert_eq!(text, "second batch notes");
}

#[tokio::test]
async fn all_image_batches_failing_is_an_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/describe");
            then.status(500);
        })
        .await;

    let client = HttpVisionClient::new(endpoint(&server, "/describe"));
    let images = vec!["page-0".to_string()];

    let err = vision::summarize_images(&client, &images, STUDY_NOTES_PROMPT)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Completion(_)));
}

#[tokio::test]
async fn no_images_is_a_validation_error() {
    let server = MockServer::start_async().await;
    let client = HttpVisionClient::new(endpoint(&server, "/describe"));

    let err = vision::summarize_images(&client, &[], STUDY_NOTES_PROMPT)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Validation(_)));
}
