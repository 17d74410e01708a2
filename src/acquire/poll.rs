//! Bounded polling of asynchronous remote jobs.
//!
//! `Pending -> Running -> {Succeeded, Failed, TimedOut}`. Polling stops as
//! soon as rows appear or a terminal state is reached; the wait budget turns
//! a job that never finishes into `TimedOut`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::time::Instant;

use super::types::ProviderError;
use crate::model::RawProviderRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed,
    TimedOut,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed | JobState::TimedOut)
    }
}

#[derive(Debug, Clone)]
pub struct JobSnapshot {
    pub state: JobState,
    pub records: Vec<RawProviderRecord>,
}

/// One observable remote job (actor run, extract job, ...).
#[async_trait]
pub trait RemoteJob: Send + Sync {
    async fn snapshot(&self) -> Result<JobSnapshot, ProviderError>;
}

#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_wait: Duration,
}

#[derive(Debug, Clone)]
pub struct PollOutcome {
    pub state: JobState,
    pub records: Vec<RawProviderRecord>,
    pub polls: u32,
}

impl PollOutcome {
    /// Rows if any, otherwise the error that should drive fallback.
    /// `Succeeded` with zero rows is a plain empty result.
    pub fn into_records(self, job: &str) -> Result<Vec<RawProviderRecord>, ProviderError> {
        if !self.records.is_empty() {
            return Ok(self.records);
        }
        match self.state {
            JobState::TimedOut => Err(ProviderError::Timeout),
            JobState::Failed => Err(ProviderError::JobFailed(job.to_string())),
            _ => Ok(Vec::new()),
        }
    }
}

pub async fn poll_until_done<J>(job: &J, policy: PollPolicy) -> Result<PollOutcome, ProviderError>
where
    J: RemoteJob + ?Sized,
{
    let started = Instant::now();
    let mut polls = 0u32;

    loop {
        let snap = job.snapshot().await?;
        polls += 1;

        if !snap.records.is_empty() || snap.state.is_terminal() {
            tracing::debug!(target: "acquire", state = ?snap.state, rows = snap.records.len(), polls, "job poll finished");
            return Ok(PollOutcome {
                state: snap.state,
                records: snap.records,
                polls,
            });
        }

        if started.elapsed() + policy.interval > policy.max_wait {
            tracing::warn!(target: "acquire", polls, last_state = ?snap.state, "job exceeded wait budget");
            return Ok(PollOutcome {
                state: JobState::TimedOut,
                records: Vec::new(),
                polls,
            });
        }

        tokio::time::sleep(policy.interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    /// Replays a fixed script of states; the last one repeats forever.
    struct Scripted {
        script: Mutex<Vec<(JobState, usize)>>,
    }

    impl Scripted {
        fn new(mut s: Vec<(JobState, usize)>) -> Self {
            s.reverse();
            Self {
                script: Mutex::new(s),
            }
        }
    }

    #[async_trait]
    impl RemoteJob for Scripted {
        async fn snapshot(&self) -> Result<JobSnapshot, ProviderError> {
            let mut s = self.script.lock().unwrap();
            let (state, rows) = if s.len() > 1 { s.pop().unwrap() } else { s[0] };
            let records = (0..rows)
                .map(|i| json!({ "name": format!("r{i}") }).as_object().cloned().unwrap())
                .collect();
            Ok(JobSnapshot { state, records })
        }
    }

    fn fast() -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(1),
            max_wait: Duration::from_millis(500),
        }
    }

    #[tokio::test]
    async fn stops_when_rows_appear_before_terminal() {
        let job = Scripted::new(vec![
            (JobState::Pending, 0),
            (JobState::Running, 0),
            (JobState::Running, 3),
        ]);
        let out = poll_until_done(&job, fast()).await.unwrap();
        assert_eq!(out.state, JobState::Running);
        assert_eq!(out.records.len(), 3);
        assert_eq!(out.polls, 3);
    }

    #[tokio::test]
    async fn succeeded_with_no_rows_is_empty_not_error() {
        let job = Scripted::new(vec![(JobState::Running, 0), (JobState::Succeeded, 0)]);
        let out = poll_until_done(&job, fast()).await.unwrap();
        assert_eq!(out.state, JobState::Succeeded);
        assert!(out.into_records("run").unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_job_maps_to_error() {
        let job = Scripted::new(vec![(JobState::Failed, 0)]);
        let out = poll_until_done(&job, fast()).await.unwrap();
        assert!(matches!(out.into_records("run"), Err(ProviderError::JobFailed(_))));
    }

    #[tokio::test]
    async fn never_finishing_job_times_out() {
        let job = Scripted::new(vec![(JobState::Running, 0)]);
        let policy = PollPolicy {
            interval: Duration::from_millis(5),
            max_wait: Duration::from_millis(30),
        };
        let out = poll_until_done(&job, policy).await.unwrap();
        assert_eq!(out.state, JobState::TimedOut);
        assert!(out.polls >= 2);
        assert!(matches!(out.into_records("run"), Err(ProviderError::Timeout)));
    }
}
