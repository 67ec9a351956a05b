//! Shared test helpers for integration tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::Value;
use tokio::sync::watch;
use tower::ServiceExt;

use cardwall_api::{AppState, build_app};
use cardwall_core::config::{AppConfig, ExecutionMode};
use cardwall_core::traits::catalog::CardCatalog;
use cardwall_database::{MemoryCardCatalog, MemoryJobStore};
use cardwall_service::JobService;
use cardwall_storage::{LocalStorageProvider, TempFileArea};
use cardwall_worker::jobs::default_registry;
use cardwall_worker::{
    Executor, InlineExecutor, JobProcessor, JobQueue, QueuedExecutor, WorkerRunner,
};

const MULTIPART_BOUNDARY: &str = "cardwall-test-boundary";

/// Test application backed by the in-memory store and a temp directory.
pub struct TestApp {
    /// The Axum router for making test requests
    pub router: Router,
    /// Card catalog, for seeding and assertions
    pub catalog: Arc<MemoryCardCatalog>,
    /// Job store, for direct assertions
    pub store: Arc<MemoryJobStore>,
    worker: Mutex<Option<WorkerRunner>>,
    shutdown: watch::Sender<bool>,
    _data_dir: tempfile::TempDir,
}

impl TestApp {
    /// Jobs run inside the submitting request.
    pub async fn inline() -> Self {
        Self::new(ExecutionMode::Inline).await
    }

    /// Jobs go through the named queues; the worker starts on
    /// [`TestApp::start_worker`].
    pub async fn queued() -> Self {
        Self::new(ExecutionMode::Queued).await
    }

    async fn new(mode: ExecutionMode) -> Self {
        let data_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut config = AppConfig::default();
        config.storage.data_root = data_dir.path().display().to_string();
        config.storage.max_upload_size_bytes = 64 * 1024;
        config.worker.execution_mode = mode;
        config.worker.concurrency = 2;

        let provider = LocalStorageProvider::new(&config.storage.data_root)
            .await
            .expect("Failed to init storage");
        let files = TempFileArea::new(Arc::new(provider));
        let store = Arc::new(MemoryJobStore::new());
        let catalog = Arc::new(MemoryCardCatalog::new());
        catalog.add_project("alpha");
        catalog.add_project("beta");
        catalog.add_program("release", &["alpha", "beta"]);

        let shared_catalog: Arc<dyn CardCatalog> = catalog.clone();
        let processor = Arc::new(JobProcessor::new(
            store.clone(),
            files.clone(),
            default_registry(Arc::clone(&shared_catalog)),
        ));

        let mut worker = None;
        let executor: Arc<dyn Executor> = match mode {
            ExecutionMode::Inline => Arc::new(InlineExecutor::new(processor)),
            ExecutionMode::Queued => {
                let queue = Arc::new(JobQueue::new(16));
                worker = Some(WorkerRunner::new(
                    Arc::clone(&queue),
                    processor,
                    store.clone(),
                    config.worker.clone(),
                    "test-worker".to_string(),
                ));
                Arc::new(QueuedExecutor::new(queue))
            }
        };

        let job_service = Arc::new(JobService::new(
            store.clone(),
            shared_catalog,
            files,
            executor,
            config.jobs.clone(),
            config.storage.max_upload_size_bytes,
        ));
        let router = build_app(AppState::new(Arc::new(config), job_service));

        Self {
            router,
            catalog,
            store,
            worker: Mutex::new(worker),
            shutdown: watch::channel(false).0,
            _data_dir: data_dir,
        }
    }

    /// Start consuming the queues. Does nothing for inline apps.
    pub fn start_worker(&self) {
        let runner = self.worker.lock().expect("worker lock poisoned").take();
        if let Some(runner) = runner {
            let cancel = self.shutdown.subscribe();
            tokio::spawn(async move {
                let _ = runner.run(cancel).await;
            });
        }
    }

    /// Send a JSON request, acting as `user` when given.
    pub async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        user: Option<&str>,
    ) -> TestResponse {
        let body_str = body
            .map(|b| serde_json::to_string(&b).expect("Failed to serialize body"))
            .unwrap_or_default();

        let mut req = Request::builder()
            .method(method)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(user) = user {
            req = req.header("x-cardwall-user", user);
        }
        let req = req
            .body(Body::from(body_str))
            .expect("Failed to build request");

        self.send(req).await
    }

    /// Submit a multipart upload to `/api/jobs/upload`.
    pub async fn upload(
        &self,
        user: &str,
        kind: &str,
        project: &str,
        file: Option<(&str, &[u8])>,
    ) -> TestResponse {
        let mut body = Vec::new();
        for (name, value) in [("kind", kind), ("project", project)] {
            body.extend_from_slice(
                format!(
                    "--{MULTIPART_BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((file_name, data)) = file {
            body.extend_from_slice(
                format!(
                    "--{MULTIPART_BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}--\r\n").as_bytes());

        let req = Request::builder()
            .method("POST")
            .uri("/api/jobs/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}"),
            )
            .header("x-cardwall-user", user)
            .body(Body::from(body))
            .expect("Failed to build request");

        self.send(req).await
    }

    /// Poll until the job's view is final.
    pub async fn wait_for_final_view(&self, poll_url: &str, user: &str) -> Value {
        for _ in 0..100 {
            let response = self.request("GET", poll_url, None, Some(user)).await;
            assert_eq!(response.status, StatusCode::OK);
            let view = response.body["data"].clone();
            if view["state"] != "in_progress" {
                return view;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("job behind {poll_url} did not finish");
    }

    async fn send(&self, req: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let body_bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("Failed to read body");
        let body: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

        TestResponse {
            status,
            headers,
            body,
            raw: body_bytes.to_vec(),
        }
    }
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Response headers
    pub headers: axum::http::HeaderMap,
    /// Parsed JSON body, `Null` when the body is not JSON
    pub body: Value,
    /// Raw body bytes
    pub raw: Vec<u8>,
}

/// A fresh user id.
pub fn new_user() -> String {
    uuid::Uuid::new_v4().to_string()
}
