//! Integration tests for the tubedigest-server HTTP API
//!
//! Routers are driven in-process with `oneshot`; YouTube, transcripts and
//! the LLM are fakes from `helpers`.

mod helpers;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use helpers::{candidate, create_test_app, send, upload, wait_for, TestServices};
use http_body_util::BodyExt;
use serde_json::json;
use std::sync::Arc;
use tower::util::ServiceExt;
use tubedigest_common::events::TaskStage;

use helpers::{FakeCatalog, FakeDirectory};

/// Services knowing one channel `UCalpha` reachable as `@alpha`, with two uploads
fn services_with_channel() -> TestServices {
    let mut directory = FakeDirectory::default();
    directory.searches.insert(
        "@alpha".to_string(),
        vec![
            candidate("UCother", "Alpha Fans", Some("@alphafans")),
            candidate("UCalpha", "Alpha", Some("@alpha")),
        ],
    );

    let catalog = FakeCatalog::default();
    let playlist = catalog.add_channel("UCalpha", "Alpha");
    catalog.set_uploads(&playlist, vec![upload("vid1", 1), upload("vid2", 2)]);

    TestServices {
        directory: Arc::new(directory),
        catalog: Arc::new(catalog),
        ..TestServices::default()
    }
}

async fn register_alpha(app: &axum::Router) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/channels",
        Some(json!({"url": "https://www.youtube.com/@alpha", "frequency": "weekly"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["guid"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _state) = create_test_app(&TestServices::default()).await;

    let (status, body) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "tubedigest-server");
    assert!(body["uptime_seconds"].is_u64());
}

#[tokio::test]
async fn test_resolve_direct_channel_url() {
    let (app, _state) = create_test_app(&TestServices::default()).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/channels/resolve",
        Some(json!({"url": "https://www.youtube.com/channel/UCdirect123"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["channel_id"], "UCdirect123");
    assert_eq!(body["tier"], "direct");
    assert_eq!(body["confident"], true);
}

#[tokio::test]
async fn test_resolve_prefers_exact_custom_url() {
    let (app, _state) = create_test_app(&services_with_channel()).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/channels/resolve",
        Some(json!({"url": "youtube.com/@alpha/videos"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["channel_id"], "UCalpha");
    assert_eq!(body["tier"], "exact_custom_url");
}

#[tokio::test]
async fn test_resolve_error_statuses() {
    let (app, _state) = create_test_app(&TestServices::default()).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/channels/resolve",
        Some(json!({"url": "https://example.com/@alpha"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, _) = send(
        &app,
        "POST",
        "/api/channels/resolve",
        Some(json!({"url": "https://www.youtube.com/@nobody"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let offline = TestServices {
        directory: Arc::new(FakeDirectory {
            offline: true,
            ..FakeDirectory::default()
        }),
        ..TestServices::default()
    };
    let (app, _state) = create_test_app(&offline).await;
    let (status, body) = send(
        &app,
        "POST",
        "/api/channels/resolve",
        Some(json!({"url": "https://www.youtube.com/@alpha"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "UPSTREAM_ERROR");
}

#[tokio::test]
async fn test_register_list_and_duplicate_channel() {
    let (app, _state) = create_test_app(&services_with_channel()).await;
    let guid = register_alpha(&app).await;

    let (status, body) = send(&app, "GET", "/api/channels", None).await;
    assert_eq!(status, StatusCode::OK);
    let channels = body.as_array().unwrap();
    assert_eq!(channels.len(), 1);
    assert_eq!(channels[0]["external_id"], "UCalpha");
    assert_eq!(channels[0]["frequency"], "weekly");
    assert_eq!(channels[0]["uploads_playlist_id"], "UUalpha");

    let (status, body) = send(&app, "GET", &format!("/api/channels/{}", guid), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Alpha");

    // Same channel through its id URL
    let (status, body) = send(
        &app,
        "POST",
        "/api/channels",
        Some(json!({"url": "https://www.youtube.com/channel/UCalpha"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn test_register_rejects_unknown_frequency() {
    let (app, _state) = create_test_app(&services_with_channel()).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/channels",
        Some(json!({"url": "https://www.youtube.com/@alpha", "frequency": "fortnightly"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"].as_str().unwrap().contains("fortnightly"));
}

#[tokio::test]
async fn test_update_and_delete_channel() {
    let (app, _state) = create_test_app(&services_with_channel()).await;
    let guid = register_alpha(&app).await;

    let (status, body) = send(
        &app,
        "PATCH",
        &format!("/api/channels/{}", guid),
        Some(json!({"frequency": "manual", "active": false})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["frequency"], "manual");
    assert_eq!(body["active"], false);

    let (status, _) = send(&app, "DELETE", &format!("/api/channels/{}", guid), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "GET", &format!("/api/channels/{}", guid), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/api/channels/{}", guid),
        Some(json!({"active": true})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_refresh_discovers_new_videos_once() {
    let services = services_with_channel();
    let (app, _state) = create_test_app(&services).await;
    let guid = register_alpha(&app).await;

    let (status, body) = send(&app, "POST", &format!("/api/channels/{}/refresh", guid), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["new_videos"], 2);

    let (_, body) = send(&app, "POST", &format!("/api/channels/{}/refresh", guid), None).await;
    assert_eq!(body["new_videos"], 0);

    services
        .catalog
        .set_uploads("UUalpha", vec![upload("vid1", 1), upload("vid2", 2), upload("vid3", 3)]);
    let (_, body) = send(&app, "POST", &format!("/api/channels/{}/refresh", guid), None).await;
    assert_eq!(body["new_videos"], 1);

    let (status, body) = send(&app, "GET", &format!("/api/channels/{}/videos", guid), None).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["external_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["vid3", "vid2", "vid1"]);
    assert!(body[0]["summary_guid"].is_null());
}

#[tokio::test]
async fn test_summarize_video_then_export() {
    let (app, state) = create_test_app(&services_with_channel()).await;
    let guid = register_alpha(&app).await;
    send(&app, "POST", &format!("/api/channels/{}/refresh", guid), None).await;

    let (_, videos) = send(&app, "GET", &format!("/api/channels/{}/videos", guid), None).await;
    let video_guid = videos[0]["guid"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/videos/{}/summarize", video_guid),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let task_key = body["task_key"].as_str().unwrap().to_string();

    let tasks = state.tasks.clone();
    let key = task_key.clone();
    assert!(
        wait_for(|| {
            let tasks = tasks.clone();
            let key = key.clone();
            async move {
                matches!(tasks.get(&key).await, Some(t) if t.stage == TaskStage::Completed)
            }
        })
        .await
    );

    let (status, task) = send(&app, "GET", &format!("/api/tasks/{}", task_key), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(task["stage"], "completed");
    let summary_guid = task["summary_guid"].as_str().unwrap().to_string();

    let (status, summary) = send(&app, "GET", &format!("/api/summaries/{}", summary_guid), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["title"], "Summary of Upload vid2");
    assert_eq!(summary["model"], "fake-model");

    let (_, videos) = send(&app, "GET", &format!("/api/channels/{}/videos", guid), None).await;
    assert_eq!(videos[0]["summary_guid"], summary_guid.as_str());

    // No vault configured: export is a download
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/export/{}", summary_guid))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
    assert!(disposition.starts_with("attachment;"));
    assert!(disposition.contains("2024-06-02"));
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let markdown = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(markdown.starts_with("---\n"));
    assert!(markdown.contains("# Summary of Upload vid2"));
    assert!(markdown.contains("&t=65s"));
}

#[tokio::test]
async fn test_summarize_unknown_video_is_404() {
    let (app, _state) = create_test_app(&TestServices::default()).await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/videos/00000000-0000-0000-0000-000000000000/summarize",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_summarize_all_and_export_archive() {
    let (app, state) = create_test_app(&services_with_channel()).await;
    let guid = register_alpha(&app).await;
    send(&app, "POST", &format!("/api/channels/{}/refresh", guid), None).await;

    let (status, body) = send(&app, "POST", &format!("/api/channels/{}/summarize-all", guid), None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["queued"], 2);

    let db = state.db.clone();
    assert!(
        wait_for(|| {
            let db = db.clone();
            async move {
                tubedigest_server::db::summaries::list_summaries(&db, None)
                    .await
                    .map(|s| s.len() == 2)
                    .unwrap_or(false)
            }
        })
        .await
    );

    // Everything is summarized now
    let (_, body) = send(&app, "POST", &format!("/api/channels/{}/summarize-all", guid), None).await;
    assert_eq!(body["queued"], 0);

    let (_, summaries) = send(&app, "GET", &format!("/api/summaries?channel_id={}", guid), None).await;
    assert_eq!(summaries.as_array().unwrap().len(), 2);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/export-all?channel_id={}", guid))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/zip");
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert!(bytes.starts_with(b"PK"));
}

#[tokio::test]
async fn test_export_all_unknown_channel_is_404() {
    let (app, _state) = create_test_app(&TestServices::default()).await;

    let (status, _) = send(
        &app,
        "GET",
        "/api/export-all?channel_id=00000000-0000-0000-0000-000000000000",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cancel_unknown_task_is_404() {
    let (app, _state) = create_test_app(&TestServices::default()).await;

    let (status, body) = send(&app, "POST", "/api/tasks/summary:missing/cancel", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, body) = send(&app, "GET", "/api/tasks", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_settings_report_and_update_secrets() {
    let (app, state) = create_test_app(&TestServices::default()).await;

    let (status, body) = send(&app, "GET", "/api/settings", None).await;
    assert_eq!(status, StatusCode::OK);
    let keys: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["key"].as_str().unwrap())
        .collect();
    assert_eq!(keys, vec!["youtube_api_key", "llm_api_key", "vault_api_key"]);
    assert!(body.as_array().unwrap().iter().all(|s| s["configured"] == false));

    let (status, body) = send(
        &app,
        "PUT",
        "/api/settings/llm_api_key",
        Some(json!({"value": "  sk-test  "})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["configured"], true);
    assert_eq!(state.settings.secrets.llm.get().await.as_deref(), Some("sk-test"));

    let stored: Option<String> =
        tubedigest_server::db::settings::get_setting(&state.db, "llm_api_key").await.unwrap();
    assert_eq!(stored.as_deref(), Some("sk-test"));

    let (status, _) = send(&app, "PUT", "/api/settings/llm_api_key", Some(json!({"value": "   "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "PUT", "/api/settings/theme", Some(json!({"value": "dark"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
