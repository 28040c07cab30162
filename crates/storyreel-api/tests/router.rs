//! HTTP-level tests of the API router with fake generative services.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use storyreel_api::{create_router, ApiConfig, AppState};
use storyreel_ml_client::{
    AudioGenerator, ImageGenerator, MlClientResult, StoryGenerator,
};
use storyreel_models::{AssetStatus, StoryStatus, StoryStatusView, StoryStructure};
use storyreel_state::JobStore;
use storyreel_storage::{BlobStore, StorageResult};
use storyreel_worker::{Generators, StoryPipeline, UsageBudget, UsageLimits, WorkerConfig};
use tower::ServiceExt;

struct FakeStory;

#[async_trait]
impl StoryGenerator for FakeStory {
    async fn generate_story_structure(
        &self,
        _document_text: &str,
        _grade_level: &str,
        _style: &str,
    ) -> MlClientResult<StoryStructure> {
        Ok(StoryStructure {
            title: "Photosynthesis".to_string(),
            scenes: vec![
                "Leaves catch sunlight.".to_string(),
                "Roots drink water.".to_string(),
            ],
        })
    }
}

struct FakeImage;

#[async_trait]
impl ImageGenerator for FakeImage {
    async fn generate_image(&self, _prompt: &str) -> MlClientResult<Vec<u8>> {
        Ok(vec![0x89, b'P', b'N', b'G'])
    }
}

struct FakeAudio;

#[async_trait]
impl AudioGenerator for FakeAudio {
    async fn generate_audio(&self, text: &str, _voice: &str) -> MlClientResult<Vec<u8>> {
        Ok(text.as_bytes().to_vec())
    }
}

#[derive(Default)]
struct MemoryBlobs {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobs {
    fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobs {
    async fn put(&self, key: &str, data: Vec<u8>, _content_type: &str) -> StorageResult<String> {
        self.objects.lock().unwrap().insert(key.to_string(), data);
        Ok(format!("mem://{}", key))
    }

    async fn delete_prefix(&self, prefix: &str) -> StorageResult<u32> {
        let mut objects = self.objects.lock().unwrap();
        let before = objects.len();
        objects.retain(|key, _| !key.starts_with(prefix));
        Ok((before - objects.len()) as u32)
    }

    async fn check_connectivity(&self) -> StorageResult<()> {
        Ok(())
    }
}

fn test_app(config: ApiConfig, limits: UsageLimits) -> (Router, Arc<MemoryBlobs>) {
    let worker_config = WorkerConfig {
        retry_max_attempts: 2,
        retry_base_delay: Duration::from_millis(1),
        ..WorkerConfig::default()
    };
    let blobs = Arc::new(MemoryBlobs::default());
    let pipeline = StoryPipeline::new(
        &worker_config,
        Arc::new(JobStore::in_memory()),
        Generators {
            story: Arc::new(FakeStory),
            image: Arc::new(FakeImage),
            audio: Arc::new(FakeAudio),
        },
        blobs.clone(),
        Arc::new(UsageBudget::new(limits)),
    );
    let state = AppState::from_pipeline(config, pipeline, blobs.clone());
    (create_router(state, None), blobs)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn submit(app: &Router) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/jobs",
        Some(serde_json::json!({ "document_text": "Plants turn light into sugar." })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "pending");
    body["story_id"].as_str().unwrap().to_string()
}

async fn wait_for_completion(app: &Router, story_id: &str) -> StoryStatusView {
    for _ in 0..200 {
        let uri = format!("/api/jobs/{}/status", story_id);
        let (status, body) = send(app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        let view: StoryStatusView = serde_json::from_value(body).unwrap();
        if view.status == StoryStatus::Completed || view.status == StoryStatus::Failed {
            return view;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("story {} did not finish", story_id);
}

#[tokio::test]
async fn test_submit_then_poll_until_completed() {
    let (app, blobs) = test_app(ApiConfig::default(), UsageLimits::default());
    let story_id = submit(&app).await;

    let view = wait_for_completion(&app, &story_id).await;
    assert_eq!(view.status, StoryStatus::Completed);
    assert_eq!(view.title, "Photosynthesis");
    assert_eq!(view.total_scenes, 2);
    assert_eq!(view.completed_scenes, 2);
    for (position, scene) in view.scenes.iter().enumerate() {
        assert_eq!(scene.index as usize, position);
        assert_eq!(scene.image_status, AssetStatus::Completed);
        assert_eq!(scene.audio_status, AssetStatus::Completed);
        assert!(scene.image_url.as_deref().unwrap().ends_with("image.png"));
    }
    assert_eq!(blobs.len(), 4);

    let uri = format!("/api/jobs/{}/scenes/1", story_id);
    let (status, scene) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(scene["index"], 1);
    assert_eq!(scene["text"], "Roots drink water.");
}

#[tokio::test]
async fn test_unknown_story_and_scene_are_not_found() {
    let (app, _) = test_app(ApiConfig::default(), UsageLimits::default());

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/jobs/00000000-0000-4000-8000-000000000000/status",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "story_not_found");

    let story_id = submit(&app).await;
    wait_for_completion(&app, &story_id).await;
    let uri = format!("/api/jobs/{}/scenes/7", story_id);
    let (status, body) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "scene_not_found");
}

#[tokio::test]
async fn test_malformed_story_id_is_rejected() {
    let (app, _) = test_app(ApiConfig::default(), UsageLimits::default());
    let (status, _) = send(&app, Method::GET, "/api/jobs/bad.id/status", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_blank_and_oversized_documents_are_rejected() {
    let config = ApiConfig {
        max_document_chars: 10,
        ..ApiConfig::default()
    };
    let (app, _) = test_app(config, UsageLimits::default());

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/jobs",
        Some(serde_json::json!({ "document_text": "   \n " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/jobs",
        Some(serde_json::json!({ "document_text": "far more than ten characters" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::POST, "/api/jobs", Some(serde_json::json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_removes_story_and_media() {
    let (app, blobs) = test_app(ApiConfig::default(), UsageLimits::default());
    let story_id = submit(&app).await;
    wait_for_completion(&app, &story_id).await;
    assert_eq!(blobs.len(), 4);

    let (status, _) = send(&app, Method::DELETE, &format!("/api/jobs/{}", story_id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(blobs.len(), 0);

    let status_uri = format!("/api/jobs/{}/status", story_id);
    let (status, _) = send(&app, Method::GET, &status_uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::DELETE, &format!("/api/jobs/{}", story_id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_usage_reports_calls_against_limits() {
    let limits = UsageLimits {
        text: Some(5),
        image: None,
        audio: None,
    };
    let (app, _) = test_app(ApiConfig::default(), limits);
    let story_id = submit(&app).await;
    wait_for_completion(&app, &story_id).await;

    let (status, body) = send(&app, Method::GET, "/api/usage", None).await;
    assert_eq!(status, StatusCode::OK);
    let capabilities = body["capabilities"].as_array().unwrap();
    let text = capabilities
        .iter()
        .find(|c| c["capability"] == "text")
        .unwrap();
    assert_eq!(text["used"], 1);
    assert_eq!(text["limit"], 5);
    let image = capabilities
        .iter()
        .find(|c| c["capability"] == "image")
        .unwrap();
    assert_eq!(image["used"], 2);
}

#[tokio::test]
async fn test_health_and_ready() {
    let (app, _) = test_app(ApiConfig::default(), UsageLimits::default());

    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, Method::GET, "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
    assert_eq!(body["checks"]["state_store"]["status"], "ok");
}

#[tokio::test]
async fn test_local_media_is_served() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("stories/abc/scene_000")).unwrap();
    std::fs::write(dir.path().join("stories/abc/scene_000/image.png"), b"png").unwrap();

    let config = ApiConfig {
        media_dir: Some(dir.path().to_path_buf()),
        ..ApiConfig::default()
    };
    let (app, _) = test_app(config, UsageLimits::default());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/media/stories/abc/scene_000/image.png")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"png");
}
