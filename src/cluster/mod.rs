//! Cluster access and job completion tracking
//!
//! `client` wraps every remote call through the external kubectl binary;
//! `poller` is the completion state machine that reconciles the two
//! independent status signals until the job is terminal.

pub mod client;
pub mod poller;

use serde::{Deserialize, Serialize};

/// Raw success/failure/active counters for a job. Re-fetched every poll,
/// never merged across polls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct JobStatusSnapshot {
    pub succeeded: u32,
    pub failed: u32,
    pub active: u32,
}

/// Job condition flags, independently fetched and allowed to disagree with
/// the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct JobConditionSnapshot {
    pub complete: bool,
    pub failed: bool,
}

pub use client::{ClusterClient, ClusterError};
pub use poller::{wait_for_completion, JobStatusSource, PollError, PollerConfig};
