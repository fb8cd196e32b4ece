mod common;

use common::TestApp;

#[tokio::test]
async fn health_check_returns_200() {
    let app = TestApp::spawn().await;

    let response = app
        .client()
        .get(app.url("/health"))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), 200);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(
        response.headers()["x-content-type-options"],
        "nosniff"
    );

    let body: serde_json::Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "media-service");
}

#[tokio::test]
async fn readiness_follows_media_directory() {
    let app = TestApp::spawn().await;

    let response = app.client().get(app.url("/ready")).send().await.unwrap();
    assert_eq!(response.status(), 200);

    std::fs::remove_dir_all(app.media_dir.path()).unwrap();
    let response = app.client().get(app.url("/ready")).send().await.unwrap();
    assert_eq!(response.status(), 503);
}

#[tokio::test]
async fn caller_request_id_is_echoed() {
    let app = TestApp::spawn().await;

    let response = app
        .client()
        .get(app.url("/"))
        .header("x-request-id", "trace-me")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["x-request-id"], "trace-me");
}

#[tokio::test]
async fn metrics_endpoint_serves_text() {
    let app = TestApp::spawn().await;

    let response = app.client().get(app.url("/metrics")).send().await.unwrap();

    assert_eq!(response.status(), 200);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
}

#[tokio::test]
async fn model_catalogs_list_the_vocabulary() {
    let app = TestApp::spawn().await;

    let images: serde_json::Value = app
        .client()
        .get(app.url("/api/v1/image/models"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(images["models"].as_array().unwrap().len(), 8);
    assert_eq!(images["default_shape"], "square");
    assert!(images["styles"]
        .as_array()
        .unwrap()
        .contains(&serde_json::json!("PopArt")));

    let kontext_edit = images["models"]
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["name"] == "flux_kontext_edit")
        .unwrap();
    assert_eq!(kontext_edit["modes"][0]["mode"], "edit");
    assert_eq!(kontext_edit["modes"][0]["min_images"], 1);

    let videos: serde_json::Value = app
        .client()
        .get(app.url("/api/v1/video/models"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(videos["models"].as_array().unwrap().len(), 7);
    assert_eq!(videos["default_shape"], "landscape");
    assert!(videos.get("styles").is_none());
}
