//! Credential exchange
//!
//! Exchanges the long-lived access/secret key pair for a short-lived cluster
//! bearer token by invoking the external IAM authenticator binary. Runs once
//! at process startup; there is no retry at this layer — a failure is fatal
//! and `main` decides the exit.

use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use crate::config::Settings;

/// Errors from the token exchange.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("failed to launch authenticator {path}: {source}")]
    Spawn {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("authenticator exited with {status}: {output}")]
    Rejected { status: String, output: String },

    #[error("authenticator returned an empty token")]
    EmptyToken,
}

// ============================================================================
// Pure argument construction (no I/O)
// ============================================================================

/// Build the authenticator command line for a token request.
pub fn token_args(settings: &Settings) -> Vec<String> {
    vec![
        "token".to_string(),
        "--iam-endpoint=https://iam.myhuaweicloud.com".to_string(),
        "--insecure-skip-tls-verify=true".to_string(),
        "--cache=false".to_string(),
        "--token-only=true".to_string(),
        format!("--project-name={}", settings.project_name),
        format!("--ak={}", settings.access_key),
        format!("--sk={}", settings.secret_key),
    ]
}

// ============================================================================
// I/O
// ============================================================================

/// Obtain a bearer token for the cluster API.
///
/// The token is the trimmed stdout of the authenticator; any non-zero exit
/// surfaces the combined diagnostic output.
pub async fn obtain_token(settings: &Settings) -> Result<String, AuthError> {
    let binary = settings.authenticator_binary();
    debug!("requesting cluster token via {}", binary.display());

    let output = Command::new(&binary)
        .args(token_args(settings))
        .output()
        .await
        .map_err(|source| AuthError::Spawn {
            path: binary.display().to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(AuthError::Rejected {
            status: output.status.to_string(),
            output: combined_output(&output),
        });
    }

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() {
        return Err(AuthError::EmptyToken);
    }

    Ok(token)
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let mut combined = stdout.trim().to_string();
    if !stderr.trim().is_empty() {
        if !combined.is_empty() {
            combined.push('\n');
        }
        combined.push_str(stderr.trim());
    }
    combined
}
