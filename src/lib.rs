//! hostbuilder — provision per-subdomain hosting build jobs on a cloud
//! container cluster.
//!
//! One incoming trigger event yields one workload: the manifest is rendered
//! from an embedded template, submitted through the external `kubectl`
//! binary, and polled until the job reaches a terminal state. The IAM token
//! is obtained once at startup and shared read-only across requests.

pub mod auth;
pub mod cli;
pub mod cluster;
pub mod config;
pub mod manifest;
pub mod orchestrator;
pub mod server;
