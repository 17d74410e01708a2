//! Generic web-scrape provider: submits an LLM-backed extract job for a
//! supplier directory search page and polls it for structured rows.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::acquire::poll::{poll_until_done, JobSnapshot, JobState, PollPolicy, RemoteJob};
use crate::acquire::types::{FetchOptions, ProviderError, SupplierProvider};
use crate::model::{ProviderKind, RawProviderRecord};

const EXTRACT_PROMPT: &str = "Extract every supplier or manufacturer listed on the page. \
For each one return company name, main products, location/address, contact phone and email, \
whether it operates its own factory, certifications, price range, and the supplier profile URL.";

#[derive(Debug, Deserialize)]
struct StartResp {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResp {
    #[serde(default)]
    status: String,
    #[serde(default)]
    data: Value,
}

pub fn extract_state(status: &str) -> JobState {
    match status.to_ascii_lowercase().as_str() {
        "pending" | "queued" => JobState::Pending,
        "completed" => JobState::Succeeded,
        "failed" | "cancelled" => JobState::Failed,
        _ => JobState::Running,
    }
}

/// Turn a search phrase into a URL path slug ("LED strip 5050" -> "LED-strip-5050").
pub fn slugify(query: &str) -> String {
    query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Rows live under a few possible keys depending on the extraction schema.
pub fn extracted_rows(data: &Value) -> Vec<RawProviderRecord> {
    let list = match data {
        Value::Array(_) => Some(data),
        Value::Object(o) => ["suppliers", "manufacturers", "companies", "results"]
            .iter()
            .find_map(|k| o.get(*k).filter(|v| v.is_array())),
        _ => None,
    };
    list.and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|it| it.as_object().cloned())
                .collect()
        })
        .unwrap_or_default()
}

pub struct WebScrapeProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    search_url_template: String,
    policy: PollPolicy,
}

impl WebScrapeProvider {
    pub fn new(base_url: &str, api_key: String, search_url_template: String, policy: PollPolicy) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            search_url_template,
            policy,
        }
    }

    pub fn search_url(&self, query: &str) -> String {
        self.search_url_template.replace("{query}", &slugify(query))
    }

    async fn start(&self, query: &str, opts: &FetchOptions) -> Result<String, ProviderError> {
        let mut prompt = EXTRACT_PROMPT.to_string();
        if let Some(loc) = &opts.location {
            prompt.push_str(&format!(" Prefer suppliers located in {loc}."));
        }
        let body = json!({
            "urls": [self.search_url(query)],
            "prompt": prompt,
            "schema": {
                "type": "object",
                "properties": {
                    "suppliers": { "type": "array", "items": { "type": "object" } }
                }
            }
        });
        let resp = self
            .http
            .post(format!("{}/v1/extract", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), text));
        }
        let started: StartResp = resp.json().await?;
        match (started.success, started.id) {
            (true, Some(id)) => Ok(id),
            _ => Err(ProviderError::Parse(
                started.error.unwrap_or_else(|| "extract job not accepted".into()),
            )),
        }
    }
}

struct ExtractJob<'a> {
    provider: &'a WebScrapeProvider,
    id: String,
}

#[async_trait]
impl<'a> RemoteJob for ExtractJob<'a> {
    async fn snapshot(&self) -> Result<JobSnapshot, ProviderError> {
        let resp = self
            .provider
            .http
            .get(format!("{}/v1/extract/{}", self.provider.base_url, self.id))
            .bearer_auth(&self.provider.api_key)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), text));
        }
        let body: StatusResp = resp.json().await?;
        Ok(JobSnapshot {
            state: extract_state(&body.status),
            records: extracted_rows(&body.data),
        })
    }
}

#[async_trait]
impl SupplierProvider for WebScrapeProvider {
    async fn fetch(
        &self,
        query: &str,
        opts: &FetchOptions,
    ) -> Result<Vec<RawProviderRecord>, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::Config("web scrape api key missing".into()));
        }
        let id = self.start(query, opts).await?;
        tracing::info!(target: "acquire", job_id = %id, "extract job started");

        let job = ExtractJob { provider: self, id };
        let outcome = poll_until_done(&job, self.policy).await?;
        let mut rows = outcome.into_records(&format!("extract job {}", job.id))?;
        if opts.max_items > 0 {
            rows.truncate(opts.max_items);
        }
        Ok(rows)
    }

    fn name(&self) -> &'static str {
        "web_scrape"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Secondary
    }

    fn incremental(&self) -> bool {
        true
    }
}
