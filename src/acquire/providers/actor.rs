//! Structured-scrape provider backed by a hosted scraper actor.
//!
//! Flow: start an actor run, poll the run status until it ends, then read
//! the run's dataset items as raw records.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::acquire::poll::{poll_until_done, JobSnapshot, JobState, PollPolicy, RemoteJob};
use crate::acquire::types::{FetchOptions, ProviderError, SupplierProvider};
use crate::model::{ProviderKind, RawProviderRecord};

#[derive(Debug, Clone, Deserialize)]
struct ApiResponse<T> {
    data: T,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunData {
    id: String,
    status: String,
    default_dataset_id: Option<String>,
}

/// Map an actor run status string into the polling state machine.
pub fn run_state(status: &str) -> JobState {
    match status.to_ascii_uppercase().as_str() {
        "READY" => JobState::Pending,
        "SUCCEEDED" => JobState::Succeeded,
        "FAILED" | "ABORTING" | "ABORTED" => JobState::Failed,
        "TIMING-OUT" | "TIMED-OUT" => JobState::TimedOut,
        _ => JobState::Running,
    }
}

pub struct ActorProvider {
    http: reqwest::Client,
    base_url: String,
    token: String,
    actor_id: String,
    policy: PollPolicy,
}

impl ActorProvider {
    pub fn new(base_url: &str, token: String, actor_id: String, policy: PollPolicy) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            actor_id,
            policy,
        }
    }

    async fn start_run(&self, query: &str, opts: &FetchOptions) -> Result<RunData, ProviderError> {
        let url = format!("{}/acts/{}/runs", self.base_url, self.actor_id);
        let input = json!({
            "search": query,
            "location": opts.location,
            "maxItems": opts.max_items,
        });
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&input)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), body));
        }
        let api: ApiResponse<RunData> = resp.json().await?;
        Ok(api.data)
    }
}

struct ActorRun<'a> {
    provider: &'a ActorProvider,
    run_id: String,
    limit: usize,
}

impl ActorRun<'_> {
    async fn get_json(&self, url: &str) -> Result<Value, ProviderError> {
        let resp = self
            .provider
            .http
            .get(url)
            .bearer_auth(&self.provider.token)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), body));
        }
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl<'a> RemoteJob for ActorRun<'a> {
    async fn snapshot(&self) -> Result<JobSnapshot, ProviderError> {
        let base = &self.provider.base_url;
        let run_url = format!("{}/actor-runs/{}", base, self.run_id);
        let run: ApiResponse<RunData> = serde_json::from_value(self.get_json(&run_url).await?)
            .map_err(|e| ProviderError::Parse(e.to_string()))?;
        let state = run_state(&run.data.status);

        // Dataset items are only read once the run has stopped.
        let records = match &run.data.default_dataset_id {
            Some(ds) if state.is_terminal() => {
                let items_url = format!(
                    "{}/datasets/{}/items?format=json&clean=true&limit={}",
                    base, ds, self.limit
                );
                dataset_records(self.get_json(&items_url).await?)
            }
            _ => Vec::new(),
        };
        tracing::debug!(target: "acquire", run_id = %self.run_id, status = %run.data.status, rows = records.len(), "actor run polled");
        Ok(JobSnapshot { state, records })
    }
}

/// Keep only object rows from a dataset listing.
fn dataset_records(v: Value) -> Vec<RawProviderRecord> {
    match v {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|it| match it {
                Value::Object(o) => Some(o),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[async_trait]
impl SupplierProvider for ActorProvider {
    async fn fetch(
        &self,
        query: &str,
        opts: &FetchOptions,
    ) -> Result<Vec<RawProviderRecord>, ProviderError> {
        if self.token.is_empty() || self.actor_id.is_empty() {
            return Err(ProviderError::Config("actor token or id missing".into()));
        }

        let run = self.start_run(query, opts).await?;
        tracing::info!(target: "acquire", run_id = %run.id, status = %run.status, "actor run started");

        let job = ActorRun {
            provider: self,
            run_id: run.id.clone(),
            limit: opts.max_items.max(1),
        };
        let outcome = poll_until_done(&job, self.policy).await?;
        let mut rows = outcome.into_records(&format!("actor run {}", run.id))?;
        rows.truncate(opts.max_items.max(1));
        Ok(rows)
    }

    fn name(&self) -> &'static str {
        "actor"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Primary
    }
}
