use serde_json::json;
use std::time::Duration;
use thumbgen::{
    GenerationRequest, ImageClient, OpenRouterConfig, RetryPolicy, RewriteConfig, TextClient,
    ThumbnailError,
};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_policy() -> RetryPolicy {
    RetryPolicy::new()
        .with_base_delay(Duration::from_millis(1))
        .with_max_jitter(Duration::ZERO)
}

fn image_client(server: &MockServer, policy: RetryPolicy) -> ImageClient {
    let config = OpenRouterConfig::new()
        .with_credentials("sk-or-test")
        .with_base_url(format!("{}/api/v1", server.uri()))
        .with_model("google/gemini-2.5-flash-image-preview")
        .with_app_headers("https://thumbs.example", "Thumbgen")
        .with_timeout(Duration::from_secs(5));
    ImageClient::new(&config, policy).expect("client should build")
}

fn request() -> GenerationRequest {
    GenerationRequest::new("bold gaming thumbnail").with_base_image("QUJD")
}

fn image_body() -> serde_json::Value {
    json!({
        "choices": [{ "message": {
            "role": "assistant",
            "content": "",
            "images": [{ "type": "image_url", "image_url": { "url": "data:image/png;base64,QUJD" } }]
        }}]
    })
}

#[tokio::test]
async fn sends_bearer_headers_and_multimodal_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-or-test"))
        .and(header("http-referer", "https://thumbs.example"))
        .and(header("x-title", "Thumbgen"))
        .and(body_partial_json(json!({
            "model": "google/gemini-2.5-flash-image-preview",
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": "bold gaming thumbnail" },
                    { "type": "image_url", "image_url": { "url": "data:image/png;base64,QUJD" } }
                ]
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_body()))
        .expect(1)
        .mount(&server)
        .await;

    let response = image_client(&server, fast_policy())
        .generate(&request())
        .await
        .expect("generation should succeed");

    assert_eq!(response.image_data, "QUJD");
    assert_eq!(response.attempts, 1);
}

#[tokio::test]
async fn retries_rate_limited_responses() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(429)
                .set_body_json(json!({ "error": { "message": "Rate limit exceeded" } })),
        )
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_body()))
        .expect(1)
        .mount(&server)
        .await;

    let response = image_client(&server, fast_policy())
        .generate(&request())
        .await
        .expect("third attempt should succeed");

    assert_eq!(response.attempts, 3);
}

#[tokio::test]
async fn bad_request_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({ "error": { "message": "invalid model id" } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = image_client(&server, fast_policy())
        .generate(&request())
        .await
        .unwrap_err();

    match err {
        ThumbnailError::NonTransientProvider { status, message } => {
            assert_eq!(status, Some(400));
            assert_eq!(message, "invalid model id");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn error_inside_success_body_is_classified() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": { "code": 502, "message": "upstream provider unavailable" }
        })))
        .expect(2)
        .mount(&server)
        .await;

    let err = image_client(&server, fast_policy().with_max_attempts(2))
        .generate(&request())
        .await
        .unwrap_err();

    assert_eq!(err.code(), "RATE_LIMIT");
    assert_eq!(err.status(), Some(502));
    assert!(matches!(err, ThumbnailError::RetryExhausted { attempts: 2, .. }));
}

#[tokio::test]
async fn non_json_body_is_provider_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let err = image_client(&server, fast_policy())
        .generate(&request())
        .await
        .unwrap_err();

    assert_eq!(err.code(), "PROVIDER_ERROR");
    assert_eq!(err.status(), None);
}

#[tokio::test]
async fn completion_without_image_reports_no_image_data() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "I cannot edit photos of people." } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = image_client(&server, fast_policy())
        .generate(&request())
        .await
        .unwrap_err();

    assert!(matches!(err, ThumbnailError::NoImageData));
}

#[tokio::test]
async fn text_client_rewrites_through_endpoint() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-openai-test"))
        .and(body_partial_json(json!({ "model": "gpt-4o-mini", "max_tokens": 300 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "A glowing arcade scene." }, "finish_reason": "stop" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = RewriteConfig::new()
        .with_credentials("sk-openai-test")
        .with_base_url(format!("{}/v1", server.uri()));
    let client = TextClient::new(&config).expect("client should build");

    assert_eq!(
        client.rewrite_prompt("gaming thumbnail").await,
        "A glowing arcade scene."
    );
}
