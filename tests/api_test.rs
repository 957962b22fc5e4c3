mod common;

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use slideforge::api::{create_router, AppState};
use slideforge::models::{JobId, JobStatus, Resolution};
use slideforge::{Config, JobManager};
use tower::ServiceExt;

use common::{build_zip, deck_html, manager_with, test_config, wait_terminal, FakeBrowser};

fn router(manager: &Arc<JobManager>) -> Router {
    create_router(AppState::new(manager.clone()), 10 * 1024 * 1024, &[])
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, Vec<u8>, axum::http::HeaderMap) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec(), headers)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/zip")
        .body(Body::from(body))
        .unwrap()
}

const BOUNDARY: &str = "----slideforge-test-boundary";

/// 组装 `multipart/form-data` 请求；`(字段名, 文件名, 内容)`
fn post_form(uri: &str, parts: &[(&str, Option<&str>, &[u8])]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, file_name, content) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match file_name {
            Some(file_name) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/zip\r\n\r\n",
                    name, file_name
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
            ),
        }
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

fn json(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap()
}

#[tokio::test]
async fn test_health() {
    let work = tempfile::tempdir().unwrap();
    let manager = manager_with(test_config(work.path()), FakeBrowser::with_slides(2));

    let (status, body, _) = send(router(&manager), get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["status"], "ok");
    assert!(body["uptime"].is_u64());
}

#[tokio::test]
async fn test_submit_poll_and_download() {
    let work = tempfile::tempdir().unwrap();
    let manager = manager_with(test_config(work.path()), FakeBrowser::with_slides(2));
    let archive = build_zip(&[("index.html", deck_html(2).as_str())]);

    let (status, body, _) = send(router(&manager), post("/api/render?resolution=4k", archive)).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let body = json(&body);
    assert_eq!(body["status"], "pending");
    let job_id = body["jobId"].as_str().unwrap().to_string();

    let view = wait_terminal(&manager, &JobId::from(job_id.as_str())).await;
    assert_eq!(view.status, JobStatus::Completed);

    let (status, body, _) = send(router(&manager), get(&format!("/api/jobs/{}", job_id))).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["jobId"], job_id.as_str());
    assert_eq!(body["status"], "completed");
    assert_eq!(body["phase"], "packaging");
    assert_eq!(body["progress"]["current"], 2);
    assert_eq!(body["progress"]["total"], 2);
    assert!(body["error"].is_null());
    assert!(body["completedAt"].is_string());

    let (status, bytes, headers) =
        send(router(&manager), get(&format!("/api/jobs/{}/download", job_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "application/zip");
    let disposition = headers[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.starts_with("attachment; filename=\"slideforge-"));
    let archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
    assert_eq!(archive.len(), 2);
}

#[tokio::test]
async fn test_multipart_upload_renders_with_form_resolution() {
    let work = tempfile::tempdir().unwrap();
    let manager = manager_with(test_config(work.path()), FakeBrowser::with_slides(2));
    let archive = build_zip(&[("index.html", deck_html(2).as_str())]);

    let request = post_form(
        "/api/render",
        &[
            ("resolution", None, b"4k".as_slice()),
            ("zipFile", Some("deck.zip"), archive.as_slice()),
        ],
    );
    let (status, body, _) = send(router(&manager), request).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let id = JobId::from(json(&body)["jobId"].as_str().unwrap());

    let view = wait_terminal(&manager, &id).await;
    assert_eq!(view.status, JobStatus::Completed, "{:?}", view.error);
    assert_eq!(manager.get(&id).unwrap().resolution, Resolution::Uhd4k);

    let (status, bytes, _) =
        send(router(&manager), get(&format!("/api/jobs/{}/download", id))).await;
    assert_eq!(status, StatusCode::OK);
    let archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
    assert_eq!(archive.len(), 2);
}

#[tokio::test]
async fn test_multipart_without_archive_field_is_400() {
    let work = tempfile::tempdir().unwrap();
    let manager = manager_with(test_config(work.path()), FakeBrowser::with_slides(2));

    let request = post_form("/api/render", &[("resolution", None, b"hd".as_slice())]);
    let (status, body, _) = send(router(&manager), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json(&body)["error"].is_string());
    assert_eq!(manager.active_count(), 0);
}

#[tokio::test]
async fn test_unknown_job_is_404() {
    let work = tempfile::tempdir().unwrap();
    let manager = manager_with(test_config(work.path()), FakeBrowser::with_slides(2));

    let (status, body, _) = send(router(&manager), get("/api/jobs/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json(&body)["error"].is_string());

    let (status, _, _) = send(router(&manager), get("/api/jobs/nope/download")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_download_before_completion_is_400() {
    let work = tempfile::tempdir().unwrap();
    let manager = manager_with(test_config(work.path()), FakeBrowser::with_slides(2));
    let id = manager.create(Resolution::Hd);

    let (status, _, _) =
        send(router(&manager), get(&format!("/api/jobs/{}/download", id))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_download_after_output_removed_is_410() {
    let work = tempfile::tempdir().unwrap();
    let manager = manager_with(test_config(work.path()), FakeBrowser::with_slides(2));
    let id = manager
        .submit(build_zip(&[("index.html", deck_html(2).as_str())]), Resolution::Hd)
        .unwrap();
    wait_terminal(&manager, &id).await;

    let (path, _) = manager.download_path(&id).await.unwrap();
    std::fs::remove_file(path).unwrap();

    let (status, _, _) =
        send(router(&manager), get(&format!("/api/jobs/{}/download", id))).await;
    assert_eq!(status, StatusCode::GONE);
}

#[tokio::test]
async fn test_busy_server_returns_503_with_retry_hint() {
    let work = tempfile::tempdir().unwrap();
    let config = Config {
        max_concurrent_jobs: 1,
        ..test_config(work.path())
    };
    let manager = manager_with(config, FakeBrowser::hanging());
    let archive = build_zip(&[("index.html", deck_html(2).as_str())]);

    let (status, _, _) = send(router(&manager), post("/api/render", archive.clone())).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, body, headers) = send(router(&manager), post("/api/render", archive)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(headers[header::RETRY_AFTER], "30");
    let body = json(&body);
    assert_eq!(body["retryAfterSeconds"], 30);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_rejects_empty_body_and_unknown_resolution() {
    let work = tempfile::tempdir().unwrap();
    let manager = manager_with(test_config(work.path()), FakeBrowser::with_slides(2));

    let (status, _, _) = send(router(&manager), post("/api/render", Vec::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let archive = build_zip(&[("index.html", deck_html(2).as_str())]);
    let (status, body, _) =
        send(router(&manager), post("/api/render?resolution=8k", archive)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json(&body)["error"].as_str().unwrap().contains("8k"));
    assert_eq!(manager.active_count(), 0);
}

#[tokio::test]
async fn test_oversized_upload_rejected() {
    let work = tempfile::tempdir().unwrap();
    let manager = manager_with(test_config(work.path()), FakeBrowser::with_slides(2));
    let router = create_router(AppState::new(manager.clone()), 1024, &[]);

    let (status, _, _) = send(router, post("/api/render", vec![b'x'; 4096])).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}
