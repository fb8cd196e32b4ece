mod common;

use common::TestApp;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, ResponseTemplate};

async fn enhance(app: &TestApp, body: serde_json::Value) -> reqwest::Response {
    app.client()
        .post(app.url("/api/v1/prompt/enhance"))
        .json(&body)
        .send()
        .await
        .expect("Failed to execute request")
}

#[tokio::test]
async fn prompt_is_enhanced_by_chat_model() {
    let app = TestApp::spawn().await;

    Mock::given(method("POST"))
        .and(path("/openai/chat/completions"))
        .and(body_partial_json(serde_json::json!({
            "model": "gpt-4o",
            "max_tokens": 300
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{ "message": { "content": "  A cinematic drone shot over misty hills  " } }]
        })))
        .expect(1)
        .mount(&app.upstream)
        .await;

    let response = enhance(
        &app,
        serde_json::json!({ "prompt": "hills", "type": "video" }),
    )
    .await;

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], 200);
    assert_eq!(body["success_message"], "Prompt enhanced successfully");
    assert_eq!(
        body["enhanced_prompt"],
        "A cinematic drone shot over misty hills"
    );
}

#[tokio::test]
async fn enhancer_failure_returns_original_prompt() {
    let app = TestApp::spawn().await;

    Mock::given(method("POST"))
        .and(path("/openai/chat/completions"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&app.upstream)
        .await;

    let response = enhance(&app, serde_json::json!({ "prompt": "a quiet harbor" })).await;

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["enhanced_prompt"], "a quiet harbor");
}

#[tokio::test]
async fn unknown_type_is_unprocessable() {
    let app = TestApp::spawn().await;

    let response = enhance(
        &app,
        serde_json::json!({ "prompt": "p", "type": "hologram" }),
    )
    .await;

    assert_eq!(response.status(), 422);
}

#[tokio::test]
async fn type_is_matched_exactly() {
    let app = TestApp::spawn().await;

    let response = enhance(
        &app,
        serde_json::json!({ "prompt": "p", "type": "IMAGE" }),
    )
    .await;

    assert_eq!(response.status(), 422);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Validation Error");
}

#[tokio::test]
async fn empty_or_missing_prompt_is_unprocessable() {
    let app = TestApp::spawn().await;

    let empty = enhance(&app, serde_json::json!({ "prompt": "" })).await;
    assert_eq!(empty.status(), 422);

    let missing = enhance(&app, serde_json::json!({ "type": "image" })).await;
    assert_eq!(missing.status(), 422);
    let body: serde_json::Value = missing.json().await.unwrap();
    assert_eq!(body["error"], "Validation Error");
}
