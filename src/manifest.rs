//! Job manifest rendering
//!
//! Turns a typed provisioning request plus static configuration into the
//! serialized workload manifest submitted to the cluster. Rendering is a
//! pure substitution of `{{PLACEHOLDER}}` keys in the embedded template; an
//! unresolved placeholder is a programmer/config error and aborts the
//! request.

use std::collections::HashMap;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Settings;

/// Embedded batch job template.
pub const JOB_TEMPLATE: &str = include_str!("../templates/hostingbuilder.yaml");

/// Default path the rendered manifest is mirrored to when debug output is on.
pub const DEBUG_MANIFEST_PATH: &str = "./debug-hostingbuilder-job.yaml";

/// Site theme selected by the requester.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    TwentyTwentyTwo,
    TwentyTwentyFour,
    TwentyTwentyFive,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::TwentyTwentyTwo => "twentytwentytwo",
            Theme::TwentyTwentyFour => "twentytwentyfour",
            Theme::TwentyTwentyFive => "twentytwentyfive",
        }
    }
}

/// One provisioning request, immutable once received.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HostingDetail {
    pub subdomain: String,
    pub theme: Theme,
    pub email: String,
}

impl HostingDetail {
    /// Deterministic job name for this request.
    ///
    /// Two concurrent requests for the same subdomain collide here; the
    /// submission layer does not deduplicate them.
    pub fn job_name(&self) -> String {
        format!("hb-{}", self.subdomain)
    }
}

/// Errors from manifest rendering.
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("template references undefined placeholder {{{{{0}}}}}")]
    UnresolvedPlaceholder(String),

    #[error("template is malformed near: {0}")]
    Malformed(String),
}

// ============================================================================
// Pure rendering (no I/O)
// ============================================================================

/// Substitution values for one request.
pub fn substitutions(detail: &HostingDetail, settings: &Settings) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    vars.insert("BUILDER_IMAGE".to_string(), settings.builder_image.clone());
    vars.insert(
        "IMAGE_PULL_POLICY".to_string(),
        settings.image_pull_policy.clone(),
    );
    vars.insert("JOB_NAME".to_string(), detail.job_name());
    vars.insert("NAMESPACE".to_string(), settings.namespace.clone());
    vars.insert("LXD_HOST".to_string(), settings.lxd_host.clone());
    vars.insert("ANSIBLE_USER".to_string(), settings.ansible_user.clone());
    vars.insert(
        "ANSIBLE_PASSWORD".to_string(),
        settings.ansible_password.clone(),
    );
    vars.insert("SUBDOMAIN".to_string(), detail.subdomain.clone());
    vars.insert("EMAIL".to_string(), detail.email.clone());
    vars.insert("WORDPRESS_THEME".to_string(), detail.theme.as_str().to_string());
    vars.insert("DB_ROOT_HOST".to_string(), settings.db_root_host.clone());
    vars.insert("DB_ROOT_USER".to_string(), settings.db_root_user.clone());
    vars.insert(
        "DB_ROOT_PASSWORD".to_string(),
        settings.db_root_password.clone(),
    );
    vars.insert("ACCESS_KEY".to_string(), settings.access_key.clone());
    vars.insert("SECRET_KEY".to_string(), settings.secret_key.clone());
    vars.insert("TOPIC_URN".to_string(), settings.topic_urn.clone());
    vars
}

/// Substitute `{{KEY}}` placeholders in a template.
///
/// Every placeholder must have a value; deterministic for a fixed template
/// and value map.
pub fn render_template(
    template: &str,
    vars: &HashMap<String, String>,
) -> Result<String, TemplateError> {
    let pattern = Regex::new(r"\{\{([A-Z0-9_]+)\}\}").unwrap();

    let mut missing: Option<String> = None;
    let rendered = pattern
        .replace_all(template, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            match vars.get(name) {
                Some(value) => value.clone(),
                None => {
                    if missing.is_none() {
                        missing = Some(name.to_string());
                    }
                    String::new()
                }
            }
        })
        .to_string();

    if let Some(name) = missing {
        return Err(TemplateError::UnresolvedPlaceholder(name));
    }

    // A stray opener that the placeholder pattern did not consume means the
    // template itself is broken.
    if let Some(pos) = rendered.find("{{") {
        let end = (pos + 24).min(rendered.len());
        return Err(TemplateError::Malformed(rendered[pos..end].to_string()));
    }

    Ok(rendered)
}

/// Render the workload manifest for one request.
pub fn render(detail: &HostingDetail, settings: &Settings) -> Result<Vec<u8>, TemplateError> {
    let vars = substitutions(detail, settings);
    render_template(JOB_TEMPLATE, &vars).map(String::into_bytes)
}

// ============================================================================
// I/O - debug mirror
// ============================================================================

/// Mirror the rendered manifest to a local file for inspection.
///
/// Best effort: a write failure is logged and swallowed so it can never
/// affect the request outcome.
pub fn write_debug_file(path: &Path, manifest: &[u8]) {
    match std::fs::write(path, manifest) {
        Ok(()) => info!("debug manifest written to {}", path.display()),
        Err(e) => warn!("failed to write debug manifest {}: {}", path.display(), e),
    }
}
