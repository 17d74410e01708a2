// tests/providers_http.rs
//
// HTTP-level tests for the actor and web-scrape providers against in-process
// fakes of their remote APIs (axum on 127.0.0.1:0).
//
// Covered:
// - actor: READY -> RUNNING -> SUCCEEDED with rows, dataset read once
// - actor: SUCCEEDED with an empty dataset is an empty result
// - actor: 402 on run start maps to PaymentRequired
// - actor: a run stuck in RUNNING ends as Timeout within max_wait
// - web scrape: processing -> completed with rows, failed job, 404 on poll

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use manufacturer_sourcing::acquire::poll::PollPolicy;
use manufacturer_sourcing::acquire::providers::{ActorProvider, WebScrapeProvider};
use manufacturer_sourcing::acquire::types::{FetchOptions, ProviderError, SupplierProvider};

/// Scripted remote API. Status polls walk `statuses`; the last one repeats.
#[derive(Clone)]
struct Fake {
    start_status: StatusCode,
    poll_status: StatusCode,
    statuses: Arc<Vec<&'static str>>,
    rows: Arc<Value>,
    polls: Arc<AtomicUsize>,
    item_reads: Arc<AtomicUsize>,
    start_body: Arc<Mutex<Option<Value>>>,
}

impl Fake {
    fn new(statuses: Vec<&'static str>, rows: Value) -> Self {
        Self {
            start_status: StatusCode::OK,
            poll_status: StatusCode::OK,
            statuses: Arc::new(statuses),
            rows: Arc::new(rows),
            polls: Arc::new(AtomicUsize::new(0)),
            item_reads: Arc::new(AtomicUsize::new(0)),
            start_body: Arc::new(Mutex::new(None)),
        }
    }

    fn next_status(&self) -> &'static str {
        let n = self.polls.fetch_add(1, Ordering::SeqCst);
        self.statuses[n.min(self.statuses.len() - 1)]
    }

    fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    fn item_reads(&self) -> usize {
        self.item_reads.load(Ordering::SeqCst)
    }
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fake api");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fake api server");
    });
    format!("http://{addr}")
}

fn fast(max_wait_ms: u64) -> PollPolicy {
    PollPolicy {
        interval: Duration::from_millis(5),
        max_wait: Duration::from_millis(max_wait_ms),
    }
}

fn supplier_rows(n: usize) -> Value {
    Value::Array(
        (0..n)
            .map(|i| json!({ "companyName": format!("Supplier {i} Co., Ltd."), "address": "Ningbo, Zhejiang" }))
            .collect(),
    )
}

// ---------- actor API ----------

async fn actor_start(State(f): State<Fake>, Path(_actor): Path<String>, Json(input): Json<Value>) -> Response {
    *f.start_body.lock().unwrap() = Some(input);
    if f.start_status != StatusCode::OK {
        return (f.start_status, "monthly usage hard limit exceeded").into_response();
    }
    Json(json!({ "data": { "id": "run-1", "status": "READY", "defaultDatasetId": "ds-1" } })).into_response()
}

async fn actor_run(State(f): State<Fake>, Path(_run): Path<String>) -> Response {
    if f.poll_status != StatusCode::OK {
        return (f.poll_status, "run not found").into_response();
    }
    let status = f.next_status();
    Json(json!({ "data": { "id": "run-1", "status": status, "defaultDatasetId": "ds-1" } })).into_response()
}

async fn actor_items(State(f): State<Fake>, Path(_ds): Path<String>) -> Json<Value> {
    f.item_reads.fetch_add(1, Ordering::SeqCst);
    Json((*f.rows).clone())
}

async fn actor_provider(fake: &Fake, policy: PollPolicy) -> ActorProvider {
    let app = Router::new()
        .route("/acts/{actor}/runs", post(actor_start))
        .route("/actor-runs/{run}", get(actor_run))
        .route("/datasets/{ds}/items", get(actor_items))
        .with_state(fake.clone());
    let base = serve(app).await;
    ActorProvider::new(&base, "token".into(), "supplier-scraper".into(), policy)
}

#[tokio::test]
async fn actor_run_polls_to_success_and_reads_dataset_once() {
    let fake = Fake::new(vec!["READY", "RUNNING", "SUCCEEDED"], supplier_rows(3));
    let p = actor_provider(&fake, fast(2_000)).await;

    let opts = FetchOptions {
        location: Some("Zhejiang".into()),
        max_items: 2,
    };
    let rows = p.fetch("ball valves", &opts).await.expect("rows");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["companyName"], "Supplier 0 Co., Ltd.");
    assert_eq!(fake.polls(), 3);
    assert_eq!(fake.item_reads(), 1);

    let input = fake.start_body.lock().unwrap().clone().expect("run input");
    assert_eq!(input["search"], "ball valves");
    assert_eq!(input["location"], "Zhejiang");
    assert_eq!(input["maxItems"], 2);
}

#[tokio::test]
async fn actor_success_with_empty_dataset_is_empty() {
    let fake = Fake::new(vec!["RUNNING", "SUCCEEDED"], json!([]));
    let p = actor_provider(&fake, fast(2_000)).await;

    let rows = p.fetch("ball valves", &FetchOptions::default()).await.expect("empty ok");
    assert!(rows.is_empty());
    assert_eq!(fake.item_reads(), 1);
}

#[tokio::test]
async fn actor_quota_on_start_is_payment_required() {
    let mut fake = Fake::new(vec!["SUCCEEDED"], supplier_rows(1));
    fake.start_status = StatusCode::PAYMENT_REQUIRED;
    let p = actor_provider(&fake, fast(2_000)).await;

    let err = p.fetch("ball valves", &FetchOptions::default()).await.unwrap_err();
    assert!(matches!(err, ProviderError::PaymentRequired(_)), "got {err:?}");
    assert!(err.is_recoverable());
    assert_eq!(fake.polls(), 0);
}

#[tokio::test]
async fn actor_run_stuck_running_times_out() {
    let fake = Fake::new(vec!["RUNNING"], supplier_rows(2));
    let p = actor_provider(&fake, fast(60)).await;

    let t0 = Instant::now();
    let err = p.fetch("ball valves", &FetchOptions::default()).await.unwrap_err();
    assert!(matches!(err, ProviderError::Timeout), "got {err:?}");
    assert!(t0.elapsed() < Duration::from_secs(2));
    assert!(fake.polls() >= 2);
    // Never read items from a run that did not finish.
    assert_eq!(fake.item_reads(), 0);
}

#[tokio::test]
async fn actor_missing_run_maps_to_not_found() {
    let mut fake = Fake::new(vec!["RUNNING"], json!([]));
    fake.poll_status = StatusCode::NOT_FOUND;
    let p = actor_provider(&fake, fast(2_000)).await;

    let err = p.fetch("ball valves", &FetchOptions::default()).await.unwrap_err();
    assert!(matches!(err, ProviderError::NotFound(_)), "got {err:?}");
}

// ---------- extract API ----------

async fn extract_start(State(f): State<Fake>, Json(body): Json<Value>) -> Response {
    *f.start_body.lock().unwrap() = Some(body);
    if f.start_status != StatusCode::OK {
        return (f.start_status, "insufficient credits").into_response();
    }
    Json(json!({ "success": true, "id": "job-1" })).into_response()
}

async fn extract_status(State(f): State<Fake>, Path(_id): Path<String>) -> Response {
    if f.poll_status != StatusCode::OK {
        return (f.poll_status, "job not found").into_response();
    }
    let status = f.next_status();
    let data = if status == "completed" {
        json!({ "suppliers": (*f.rows).clone() })
    } else {
        Value::Null
    };
    Json(json!({ "status": status, "data": data })).into_response()
}

async fn scrape_provider(fake: &Fake, policy: PollPolicy) -> WebScrapeProvider {
    let app = Router::new()
        .route("/v1/extract", post(extract_start))
        .route("/v1/extract/{id}", get(extract_status))
        .with_state(fake.clone());
    let base = serve(app).await;
    WebScrapeProvider::new(
        &base,
        "key".into(),
        "https://dir.test/search/{query}.html".into(),
        policy,
    )
}

#[tokio::test]
async fn extract_job_polls_to_completion() {
    let fake = Fake::new(vec!["processing", "processing", "completed"], supplier_rows(4));
    let p = scrape_provider(&fake, fast(2_000)).await;

    let opts = FetchOptions {
        location: Some("Ningbo".into()),
        max_items: 3,
    };
    let rows = p.fetch("ball valves", &opts).await.expect("rows");
    assert_eq!(rows.len(), 3);
    assert_eq!(fake.polls(), 3);

    let body = fake.start_body.lock().unwrap().clone().expect("extract body");
    assert_eq!(body["urls"][0], "https://dir.test/search/ball-valves.html");
    assert!(body["prompt"].as_str().unwrap().contains("Ningbo"));
}

#[tokio::test]
async fn extract_job_completed_without_rows_is_empty() {
    let fake = Fake::new(vec!["completed"], json!([]));
    let p = scrape_provider(&fake, fast(2_000)).await;
    let rows = p.fetch("ball valves", &FetchOptions::default()).await.expect("empty ok");
    assert!(rows.is_empty());
}

#[tokio::test]
async fn extract_job_failure_is_not_recoverable() {
    let fake = Fake::new(vec!["processing", "failed"], json!([]));
    let p = scrape_provider(&fake, fast(2_000)).await;
    let err = p.fetch("ball valves", &FetchOptions::default()).await.unwrap_err();
    assert!(matches!(err, ProviderError::JobFailed(_)), "got {err:?}");
    assert!(!err.is_recoverable());
}

#[tokio::test]
async fn extract_quota_on_start_is_payment_required() {
    let mut fake = Fake::new(vec!["completed"], supplier_rows(1));
    fake.start_status = StatusCode::PAYMENT_REQUIRED;
    let p = scrape_provider(&fake, fast(2_000)).await;
    let err = p.fetch("ball valves", &FetchOptions::default()).await.unwrap_err();
    assert!(matches!(err, ProviderError::PaymentRequired(_)), "got {err:?}");
}
