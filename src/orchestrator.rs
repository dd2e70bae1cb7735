//! Per-request provisioning pipeline
//!
//! Wires the renderer, cluster client, and completion poller together for
//! one request: render → submit → poll. The first failing step aborts the
//! request; completed steps are never retried, and exactly one workload is
//! submitted per request.

use std::path::Path;

use thiserror::Error;
use tracing::{info, instrument};

use crate::cluster::{wait_for_completion, ClusterClient, ClusterError, PollerConfig};
use crate::config::Settings;
use crate::manifest::{self, HostingDetail, TemplateError, DEBUG_MANIFEST_PATH};

/// Failures of one provisioning request, wrapped per failing step.
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("manifest rendering failed: {0}")]
    Template(#[from] TemplateError),

    #[error("workload submission failed: {0}")]
    Submit(#[source] ClusterError),

    #[error(transparent)]
    Poll(#[from] crate::cluster::PollError),
}

/// Run one provisioning request to a terminal outcome.
#[instrument(skip_all, fields(subdomain = %detail.subdomain, job = %detail.job_name()))]
pub async fn provision(
    settings: &Settings,
    token: &str,
    detail: &HostingDetail,
    poller: &PollerConfig,
) -> Result<(), ProvisionError> {
    let job_name = detail.job_name();

    let rendered = manifest::render(detail, settings)?;
    if settings.print_out_file {
        manifest::write_debug_file(Path::new(DEBUG_MANIFEST_PATH), &rendered);
    }

    let client = ClusterClient::new(settings, token);
    client.apply(&rendered).await.map_err(ProvisionError::Submit)?;
    info!("workload {} submitted", job_name);

    wait_for_completion(&client, &job_name, poller).await?;
    info!("hosting build for {} finished", detail.subdomain);

    Ok(())
}
