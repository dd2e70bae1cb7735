//! Job completion poller
//!
//! The core state machine: repeatedly query the cluster until the job
//! reaches a terminal state or the wall-clock budget elapses. Two
//! independent signal sources are reconciled through an explicit decision
//! table — the condition flags are the more precise signal and win, the raw
//! counters are the fallback when the condition query is degraded or
//! unsupported by the orchestrator version. Any verdict from either source
//! is authoritative and short-circuits further waiting.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use super::client::ClusterError;
use super::{ClusterClient, JobConditionSnapshot, JobStatusSnapshot};

/// Fixed timing budget for one poll run.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Maximum wall-clock wait before giving up
    pub max_wait: Duration,
    /// Sleep between poll iterations
    pub interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_secs(10 * 60),
            interval: Duration::from_secs(5),
        }
    }
}

/// Which signal source produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Conditions,
    StatusCount,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Conditions => write!(f, "conditions"),
            Signal::StatusCount => write!(f, "status count"),
        }
    }
}

/// Outcome of one poll iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Succeeded(Signal),
    Failed(Signal),
    Pending,
}

/// Terminal poll failures.
#[derive(Error, Debug)]
pub enum PollError {
    #[error("job {job} timed out after {}s", waited.as_secs())]
    TimedOut { job: String, waited: Duration },

    #[error("job {job} failed (via {signal})\njob details:\n{details}")]
    JobFailed {
        job: String,
        signal: Signal,
        details: String,
    },

    #[error("polling job {job} aborted: {source}")]
    Query {
        job: String,
        #[source]
        source: ClusterError,
    },
}

// ============================================================================
// Pure decision table (no I/O)
// ============================================================================

/// Reconcile the two signal sources. First matching row wins:
///
/// | conditions        | counters       | verdict              |
/// |-------------------|----------------|----------------------|
/// | complete          | —              | Succeeded (conditions)|
/// | failed            | —              | Failed (conditions)  |
/// | —                 | succeeded > 0  | Succeeded (counters) |
/// | —                 | failed > 0     | Failed (counters)    |
/// | —                 | —              | Pending              |
pub fn decide(conditions: Option<JobConditionSnapshot>, status: JobStatusSnapshot) -> Verdict {
    match conditions {
        Some(c) if c.complete => Verdict::Succeeded(Signal::Conditions),
        Some(c) if c.failed => Verdict::Failed(Signal::Conditions),
        _ if status.succeeded > 0 => Verdict::Succeeded(Signal::StatusCount),
        _ if status.failed > 0 => Verdict::Failed(Signal::StatusCount),
        _ => Verdict::Pending,
    }
}

// ============================================================================
// Status source seam
// ============================================================================

/// Where the poller reads job state from. Implemented by [`ClusterClient`];
/// tests substitute scripted sources.
#[async_trait]
pub trait JobStatusSource: Send + Sync {
    async fn status_counts(&self, job: &str) -> Result<JobStatusSnapshot, ClusterError>;
    async fn conditions(&self, job: &str) -> Result<JobConditionSnapshot, ClusterError>;
    async fn describe(&self, job: &str) -> String;
}

#[async_trait]
impl JobStatusSource for ClusterClient {
    async fn status_counts(&self, job: &str) -> Result<JobStatusSnapshot, ClusterError> {
        ClusterClient::status_counts(self, job).await
    }

    async fn conditions(&self, job: &str) -> Result<JobConditionSnapshot, ClusterError> {
        ClusterClient::conditions(self, job).await
    }

    async fn describe(&self, job: &str) -> String {
        ClusterClient::describe(self, job).await
    }
}

// ============================================================================
// Poll loop
// ============================================================================

/// Poll until the job is terminal.
///
/// Per iteration: check the wall-clock budget, fetch the mandatory counter
/// snapshot (any failure, including NotFound, is a hard stop), fetch the
/// condition snapshot (a failure only degrades this iteration), then apply
/// the decision table. Failure verdicts attach the best-effort describe
/// output. Nothing fetched here outlives the iteration.
pub async fn wait_for_completion<S>(
    source: &S,
    job: &str,
    config: &PollerConfig,
) -> Result<(), PollError>
where
    S: JobStatusSource + ?Sized,
{
    let start = Instant::now();
    info!("waiting for job {} to complete", job);

    loop {
        if start.elapsed() >= config.max_wait {
            return Err(PollError::TimedOut {
                job: job.to_string(),
                waited: config.max_wait,
            });
        }

        let status = source.status_counts(job).await.map_err(|e| PollError::Query {
            job: job.to_string(),
            source: e,
        })?;

        let conditions = match source.conditions(job).await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                debug!("condition query degraded for job {}: {}", job, e);
                None
            }
        };

        match decide(conditions, status) {
            Verdict::Succeeded(signal) => {
                info!("job {} completed successfully (via {})", job, signal);
                return Ok(());
            }
            Verdict::Failed(signal) => {
                let details = source.describe(job).await;
                return Err(PollError::JobFailed {
                    job: job.to_string(),
                    signal,
                    details,
                });
            }
            Verdict::Pending => {
                if conditions.is_none() && status == JobStatusSnapshot::default() {
                    info!("job {} is pending or in unknown state, continuing to wait", job);
                } else {
                    info!("job {} is still running (active: {})", job, status.active);
                }
            }
        }

        sleep(config.interval).await;
    }
}
