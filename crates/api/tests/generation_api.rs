//! Integration tests for job submission and status polling.

mod common;

use std::collections::HashSet;

use axum::http::StatusCode;
use common::{body_bytes, body_json, get, post_json, post_raw, poll_until_terminal, TestDirs};
use kura_pipeline::orchestrator::PipelineMode;
use serde_json::json;

const BOUNDARY: &str = "kura-test-boundary";

fn multipart_body(parts: &[(&str, Option<&str>, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, file_name, data) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match file_name {
            Some(file_name) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            ),
        }
        body.extend_from_slice(data.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={BOUNDARY}")
}

// ---------------------------------------------------------------------------
// Test: submit returns 202 with job id and status URL
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submit_returns_accepted_with_status_url() {
    let dirs = TestDirs::new().with_images("LandingPage", 5);
    let (app, _) = common::build_test_app(dirs.config());

    let response = post_json(
        app,
        "/api/generate",
        json!({ "textPrompt": "landing page for SaaS startup" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    let job_id = json["jobId"].as_str().unwrap();
    assert!(job_id.starts_with("job-"));
    assert_eq!(json["status"], "processing");
    assert_eq!(json["message"], "Generation started");
    assert_eq!(json["statusUrl"], format!("/api/status/{job_id}"));
}

// ---------------------------------------------------------------------------
// Test: full lifecycle with a 5-image category
// ---------------------------------------------------------------------------

#[tokio::test]
async fn landing_page_job_completes_with_five_results() {
    let dirs = TestDirs::new().with_images("LandingPage", 5);
    let (app, _) = common::build_test_app(dirs.config());

    let response = post_json(
        app.clone(),
        "/api/generate",
        json!({ "textPrompt": "landing page for SaaS startup" }),
    )
    .await;
    let job_id = body_json(response).await["jobId"].as_str().unwrap().to_string();

    let first = body_json(get(app.clone(), &format!("/api/status/{job_id}")).await).await;
    assert_eq!(first["id"], job_id.as_str());
    let early = first["status"].as_str().unwrap();
    assert!(
        ["searching", "processing", "completed"].contains(&early),
        "unexpected early status {early}"
    );

    let done = poll_until_terminal(&app, &job_id).await;
    assert_eq!(done["status"], "completed");
    assert_eq!(done["progress"], 100);
    assert_eq!(done["category"], "landing page");
    assert_eq!(done["referenceImages"], 5);
    assert_eq!(done["errors"], json!([]));
    assert_eq!(done["input"]["textPrompt"], "landing page for SaaS startup");

    let results = done["results"].as_array().unwrap();
    assert_eq!(results.len(), 5);
    for (i, result) in results.iter().enumerate() {
        assert_eq!(result["prompt"], "landing page for SaaS startup");
        assert_eq!(result["index"], i);
        assert_eq!(result["status"], "completed");
        assert_eq!(result["provider"], "local-images");
        assert!(result["metadata"]["style"].is_string());
        assert_eq!(result["metadata"]["format"], "png");
        assert_eq!(
            result["generated_image_url"],
            format!("/images/LandingPage/shot%20{i}.png")
        );
    }
}

// ---------------------------------------------------------------------------
// Test: result URLs resolve through the image route
// ---------------------------------------------------------------------------

#[tokio::test]
async fn result_urls_are_served() {
    let dirs = TestDirs::new().with_images("InteriorDesign", 2);
    let (app, _) = common::build_test_app(dirs.config());

    let response = post_json(
        app.clone(),
        "/api/generate",
        json!({ "textPrompt": "cozy interior design" }),
    )
    .await;
    let job_id = body_json(response).await["jobId"].as_str().unwrap().to_string();
    let done = poll_until_terminal(&app, &job_id).await;

    let url = done["results"][0]["generated_image_url"].as_str().unwrap();
    let response = get(app, url).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"\x89PNG fake");
}

// ---------------------------------------------------------------------------
// Test: mock-ai mode generates one placeholder per reference
// ---------------------------------------------------------------------------

#[tokio::test]
async fn mock_ai_mode_completes_with_generated_results() {
    let dirs = TestDirs::new().with_images("LandingPage", 3);
    let mut config = dirs.config();
    config.pipeline_mode = PipelineMode::MockAi;
    let (app, orchestrator) = common::build_test_app(config);
    assert_eq!(orchestrator.mode(), PipelineMode::MockAi);

    let response = post_json(
        app.clone(),
        "/api/generate",
        json!({ "textPrompt": "landing page for a bakery", "colors": "#f4a261" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let job_id = body_json(response).await["jobId"].as_str().unwrap().to_string();

    let done = poll_until_terminal(&app, &job_id).await;
    assert_eq!(done["status"], "completed");
    assert_eq!(done["referenceImages"], 3);
    assert_eq!(done["errors"], json!([]));

    let results = done["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    for result in results {
        assert_eq!(result["provider"], "mock-ai");
        assert_eq!(result["prompt"], "landing page for a bakery");
        assert!(result["enhancedPrompt"]
            .as_str()
            .unwrap()
            .contains("color palette: #f4a261"));
        assert!(result["generated_image_url"]
            .as_str()
            .unwrap()
            .starts_with("https://picsum.photos/seed/"));
    }
}

// ---------------------------------------------------------------------------
// Test: empty category directory fails the job
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_images_fail_the_job() {
    let dirs = TestDirs::new();
    let (app, _) = common::build_test_app(dirs.config());

    let response = post_json(app.clone(), "/api/generate", json!({ "textPrompt": "landing page" })).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let job_id = body_json(response).await["jobId"].as_str().unwrap().to_string();

    let done = poll_until_terminal(&app, &job_id).await;
    assert_eq!(done["status"], "failed");
    assert_eq!(done["results"], json!([]));
    assert!(!done["errors"].as_array().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Test: empty prompt is rejected and no job is created
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_prompt_returns_400_without_creating_job() {
    let dirs = TestDirs::new().with_images("LandingPage", 1);
    let (app, orchestrator) = common::build_test_app(dirs.config());

    for body in [json!({ "textPrompt": "" }), json!({ "textPrompt": "   " }), json!({})] {
        let response = post_json(app.clone(), "/api/generate", body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["code"], "VALIDATION_ERROR");
        assert_eq!(json["error"], "textPrompt is required");
    }

    assert!(orchestrator.store().is_empty().await);
}

// ---------------------------------------------------------------------------
// Test: legacy `text` field is accepted
// ---------------------------------------------------------------------------

#[tokio::test]
async fn text_field_is_accepted_as_prompt() {
    let dirs = TestDirs::new().with_images("LandingPage", 1);
    let (app, _) = common::build_test_app(dirs.config());

    let response = post_json(app.clone(), "/api/generate", json!({ "text": "landing page" })).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let job_id = body_json(response).await["jobId"].as_str().unwrap().to_string();

    let done = poll_until_terminal(&app, &job_id).await;
    assert_eq!(done["input"]["textPrompt"], "landing page");
}

// ---------------------------------------------------------------------------
// Test: malformed JSON is a 400
// ---------------------------------------------------------------------------

#[tokio::test]
async fn malformed_json_returns_400() {
    let dirs = TestDirs::new();
    let (app, orchestrator) = common::build_test_app(dirs.config());

    let response = post_raw(app, "/api/generate", "application/json", "{not json").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
    assert!(orchestrator.store().is_empty().await);
}

// ---------------------------------------------------------------------------
// Test: urlencoded form submission with colors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn urlencoded_submission_normalizes_colors() {
    let dirs = TestDirs::new().with_images("LandingPage", 1);
    let (app, _) = common::build_test_app(dirs.config());

    let response = post_raw(
        app.clone(),
        "/api/generate",
        "application/x-www-form-urlencoded",
        "textPrompt=landing+page&colors=%23fff%2C+%23000",
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let job_id = body_json(response).await["jobId"].as_str().unwrap().to_string();

    let job = poll_until_terminal(&app, &job_id).await;
    assert_eq!(job["input"]["colors"], json!(["#fff", "#000"]));
}

// ---------------------------------------------------------------------------
// Test: multipart submission stores uploads and records attachment URLs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn multipart_submission_saves_uploads() {
    let dirs = TestDirs::new().with_images("LandingPage", 1);
    let (app, _) = common::build_test_app(dirs.config());

    let body = multipart_body(&[
        ("textPrompt", None, "landing page for a bakery"),
        ("colors", None, "#f4a261"),
        ("brandImages", Some("Logo.PNG"), "logo-bytes"),
        ("brandImages", Some(""), ""),
    ]);
    let response = post_raw(app.clone(), "/api/generate", &multipart_content_type(), body).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let job_id = body_json(response).await["jobId"].as_str().unwrap().to_string();

    let job = poll_until_terminal(&app, &job_id).await;
    assert_eq!(job["input"]["textPrompt"], "landing page for a bakery");
    assert_eq!(job["input"]["colors"], json!(["#f4a261"]));

    let attachments = job["input"]["attachments"].as_array().unwrap();
    assert_eq!(attachments.len(), 1);
    let url = attachments[0].as_str().unwrap();
    let name = url.strip_prefix("/uploads/").unwrap();
    assert!(name.starts_with("brandImages-"));
    assert!(name.ends_with(".png"));
    assert_eq!(std::fs::read(dirs.upload_path(name)).unwrap(), b"logo-bytes");

    let response = get(app, url).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/png");
    assert_eq!(body_bytes(response).await, b"logo-bytes");
}

// ---------------------------------------------------------------------------
// Test: multipart without a prompt stores nothing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn multipart_without_prompt_stores_no_files() {
    let dirs = TestDirs::new();
    let (app, orchestrator) = common::build_test_app(dirs.config());

    let body = multipart_body(&[("brandImages", Some("logo.png"), "logo-bytes")]);
    let response = post_raw(app, "/api/generate", &multipart_content_type(), body).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
    assert!(orchestrator.store().is_empty().await);
    assert_eq!(std::fs::read_dir(dirs.uploads.path()).unwrap().count(), 0);
}

// ---------------------------------------------------------------------------
// Test: unknown job id returns 404
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_job_returns_404() {
    let dirs = TestDirs::new();
    let (app, _) = common::build_test_app(dirs.config());

    let response = get(app, "/api/status/job-does-not-exist").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], "Job not found: job-does-not-exist");
}

// ---------------------------------------------------------------------------
// Test: concurrent submissions get distinct ids and their own results
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submissions_do_not_interfere() {
    let dirs = TestDirs::new().with_images("LandingPage", 3);
    let (app, _) = common::build_test_app(dirs.config());

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let app = app.clone();
            tokio::spawn(async move {
                let prompt = format!("landing page variant {i}");
                let response =
                    post_json(app, "/api/generate", json!({ "textPrompt": prompt.clone() })).await;
                assert_eq!(response.status(), StatusCode::ACCEPTED);
                let job_id = body_json(response).await["jobId"].as_str().unwrap().to_string();
                (job_id, prompt)
            })
        })
        .collect();

    let mut submitted = Vec::new();
    for handle in handles {
        submitted.push(handle.await.unwrap());
    }

    let ids: HashSet<_> = submitted.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(ids.len(), 10);

    for (job_id, prompt) in &submitted {
        let done = poll_until_terminal(&app, job_id).await;
        assert_eq!(done["status"], "completed");
        for result in done["results"].as_array().unwrap() {
            assert_eq!(result["prompt"], prompt.as_str());
        }
    }
}
