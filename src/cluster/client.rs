//! kubectl-backed cluster client
//!
//! Every remote call is a spawn-and-wait on the external kubectl binary,
//! bounded by a per-call timeout. Query output parsing is defensive: the
//! remote tool interleaves warning lines with the jsonpath payload, so the
//! parsers locate the last line matching the expected shape and ignore the
//! rest.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::{JobConditionSnapshot, JobStatusSnapshot};
use crate::config::Settings;

/// Errors from cluster access.
#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("failed to launch {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("manifest apply rejected ({status}): {output}")]
    Submit { status: String, output: String },

    #[error("job {job} not found or was deleted")]
    NotFound { job: String },

    #[error("{operation} for job {job} failed ({status}): {output}")]
    Query {
        operation: &'static str,
        job: String,
        status: String,
        output: String,
    },

    #[error("{operation} did not finish within {}s", limit.as_secs())]
    CallTimedOut {
        operation: &'static str,
        limit: Duration,
    },
}

// ============================================================================
// Pure argument construction (no I/O)
// ============================================================================

/// Common kubectl flags for every call against the cluster endpoint.
pub fn base_args(server: &str, token: &str) -> Vec<String> {
    vec![
        format!("--token={}", token),
        format!("--server={}", server),
        "--insecure-skip-tls-verify=true".to_string(),
        "--v=0".to_string(),
    ]
}

/// `kubectl apply` reading the manifest from stdin.
pub fn apply_args() -> Vec<String> {
    vec!["apply".to_string(), "-f".to_string(), "-".to_string()]
}

/// jsonpath query for the three status counters.
pub fn status_query_args(job: &str, namespace: &str) -> Vec<String> {
    vec![
        "get".to_string(),
        format!("job/{}", job),
        format!("--namespace={}", namespace),
        "-o".to_string(),
        "jsonpath={.status.succeeded},{.status.failed},{.status.active}".to_string(),
    ]
}

/// jsonpath query for the Complete/Failed condition flags.
pub fn condition_query_args(job: &str, namespace: &str) -> Vec<String> {
    vec![
        "get".to_string(),
        format!("job/{}", job),
        format!("--namespace={}", namespace),
        "-o".to_string(),
        "jsonpath={.status.conditions[?(@.type==\"Complete\")].status},{.status.conditions[?(@.type==\"Failed\")].status}"
            .to_string(),
    ]
}

/// Verbose job detail for failure reports.
pub fn describe_args(job: &str, namespace: &str) -> Vec<String> {
    vec![
        "describe".to_string(),
        format!("job/{}", job),
        format!("--namespace={}", namespace),
    ]
}

// ============================================================================
// Pure output parsing (no I/O)
// ============================================================================

/// Substring that marks a known client-side discovery warning line.
const NOISE_MARKER: &str = "memcache";

fn is_noise(line: &str) -> bool {
    line.starts_with('E') || line.contains(NOISE_MARKER)
}

/// Locate the counter payload: the last line that holds comma-separated
/// values and is not a warning/error line. Falls back to the trimmed raw
/// output when no clean line is found.
pub fn extract_data_line(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| line.contains(',') && !is_noise(line))
        .unwrap_or(trimmed)
}

/// Locate the condition payload with the same exclusion rules; a bare
/// single-condition response without a comma is still accepted.
pub fn extract_condition_line(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| {
            (line.contains("True") || line.contains("False") || line.contains(','))
                && !is_noise(line)
        })
        .unwrap_or(trimmed)
}

/// Parse a single counter field; empty, placeholder, or malformed fields
/// default to zero rather than failing the call.
fn parse_count(field: Option<&str>) -> u32 {
    match field.map(str::trim) {
        Some("") | Some("<none>") | None => 0,
        Some(value) => value.parse().unwrap_or(0),
    }
}

/// Parse the succeeded/failed/active counters out of raw query output.
pub fn parse_status_counts(raw: &str) -> JobStatusSnapshot {
    let line = extract_data_line(raw);
    let mut fields = line.split(',');
    JobStatusSnapshot {
        succeeded: parse_count(fields.next()),
        failed: parse_count(fields.next()),
        active: parse_count(fields.next()),
    }
}

/// Parse the Complete/Failed flags; a flag is set only when its field
/// textually equals "True" after trimming. Responses that do not carry both
/// fields are treated as no signal at all.
pub fn parse_conditions(raw: &str) -> JobConditionSnapshot {
    let line = extract_condition_line(raw);
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() < 2 {
        return JobConditionSnapshot::default();
    }
    JobConditionSnapshot {
        complete: fields[0].trim() == "True",
        failed: fields[1].trim() == "True",
    }
}

/// Whether diagnostic output reports the job as missing rather than a
/// transient query failure.
pub fn indicates_not_found(output: &str) -> bool {
    output.contains("NotFound") || output.contains("not found")
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

// ============================================================================
// I/O
// ============================================================================

/// Client for one cluster endpoint, holding the process-scoped token.
#[derive(Debug, Clone)]
pub struct ClusterClient {
    kubectl: PathBuf,
    server: String,
    token: String,
    namespace: String,
    call_timeout: Duration,
}

impl ClusterClient {
    pub fn new(settings: &Settings, token: impl Into<String>) -> Self {
        Self {
            kubectl: settings.kubectl_binary(),
            server: settings.api_server(),
            token: token.into(),
            namespace: settings.namespace.clone(),
            call_timeout: settings.call_timeout,
        }
    }

    /// Submit a rendered manifest through the apply endpoint.
    pub async fn apply(&self, manifest: &[u8]) -> Result<(), ClusterError> {
        let output = self.run("apply", apply_args(), Some(manifest)).await?;

        if !output.status.success() {
            return Err(ClusterError::Submit {
                status: output.status.to_string(),
                output: combined_output(&output),
            });
        }

        debug!("apply: {}", String::from_utf8_lossy(&output.stdout).trim());
        Ok(())
    }

    /// Fetch the raw status counters for a job.
    pub async fn status_counts(&self, job: &str) -> Result<JobStatusSnapshot, ClusterError> {
        let output = self
            .run("status query", status_query_args(job, &self.namespace), None)
            .await?;

        if !output.status.success() {
            return Err(self.query_error("status query", job, &output));
        }

        Ok(parse_status_counts(&String::from_utf8_lossy(&output.stdout)))
    }

    /// Fetch the Complete/Failed condition flags for a job.
    pub async fn conditions(&self, job: &str) -> Result<JobConditionSnapshot, ClusterError> {
        let output = self
            .run(
                "condition query",
                condition_query_args(job, &self.namespace),
                None,
            )
            .await?;

        if !output.status.success() {
            return Err(self.query_error("condition query", job, &output));
        }

        Ok(parse_conditions(&String::from_utf8_lossy(&output.stdout)))
    }

    /// Best-effort verbose job detail for failure reports. Failures are
    /// swallowed and yield an empty diagnostic.
    pub async fn describe(&self, job: &str) -> String {
        match self.run("describe", describe_args(job, &self.namespace), None).await {
            Ok(output) => combined_output(&output),
            Err(e) => {
                warn!("describe for job {} unavailable: {}", job, e);
                String::new()
            }
        }
    }

    fn spawn_error(&self, source: std::io::Error) -> ClusterError {
        ClusterError::Spawn {
            binary: self.kubectl.display().to_string(),
            source,
        }
    }

    fn query_error(
        &self,
        operation: &'static str,
        job: &str,
        output: &std::process::Output,
    ) -> ClusterError {
        let combined = combined_output(output);
        if indicates_not_found(&combined) {
            ClusterError::NotFound { job: job.to_string() }
        } else {
            ClusterError::Query {
                operation,
                job: job.to_string(),
                status: output.status.to_string(),
                output: combined,
            }
        }
    }

    /// Spawn kubectl with the common flags plus `args`, optionally piping
    /// `stdin_data`, bounded by the per-call timeout.
    async fn run(
        &self,
        operation: &'static str,
        args: Vec<String>,
        stdin_data: Option<&[u8]>,
    ) -> Result<std::process::Output, ClusterError> {
        let mut command = Command::new(&self.kubectl);
        command
            .args(base_args(&self.server, &self.token))
            .args(&args)
            .stdin(if stdin_data.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // A call that outlives its timeout must not leave the process behind.
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| self.spawn_error(e))?;

        if let Some(data) = stdin_data {
            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| self.spawn_error(std::io::Error::other("stdin not captured")))?;
            stdin
                .write_all(data)
                .await
                .map_err(|e| self.spawn_error(e))?;
            drop(stdin);
        }

        match timeout(self.call_timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| self.spawn_error(e)),
            Err(_) => Err(ClusterError::CallTimedOut {
                operation,
                limit: self.call_timeout,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_args_carry_token_and_server() {
        let args = base_args("https://cci.region.example.com", "tok-123");
        assert_eq!(args[0], "--token=tok-123");
        assert_eq!(args[1], "--server=https://cci.region.example.com");
        assert!(args.contains(&"--v=0".to_string()));
    }

    #[test]
    fn test_status_query_args_shape() {
        let args = status_query_args("hb-acme", "default");
        assert_eq!(args[0], "get");
        assert_eq!(args[1], "job/hb-acme");
        assert!(args.contains(&"--namespace=default".to_string()));
        assert!(args
            .last()
            .unwrap()
            .contains("{.status.succeeded},{.status.failed},{.status.active}"));
    }

    #[test]
    fn test_condition_query_args_shape() {
        let args = condition_query_args("hb-acme", "default");
        assert!(args.last().unwrap().contains(r#"@.type=="Complete""#));
        assert!(args.last().unwrap().contains(r#"@.type=="Failed""#));
    }

    #[test]
    fn test_extract_data_line_skips_noise() {
        let raw = "E0101 12:00:00 warn something\n5,0,1";
        assert_eq!(extract_data_line(raw), "5,0,1");
    }

    #[test]
    fn test_extract_data_line_skips_memcache_lines() {
        let raw = "couldn't get resource list, memcache.go:287\n1,0,0";
        assert_eq!(extract_data_line(raw), "1,0,0");
    }

    #[test]
    fn test_extract_data_line_fallback() {
        // No clean comma line: fall back to the trimmed raw output.
        assert_eq!(extract_data_line("  plain output  "), "plain output");
    }

    #[test]
    fn test_parse_status_counts_with_noise() {
        let snapshot = parse_status_counts("E0101 warn\n5,0,1");
        assert_eq!(
            snapshot,
            JobStatusSnapshot { succeeded: 5, failed: 0, active: 1 }
        );
    }

    #[test]
    fn test_parse_status_counts_placeholders_default_to_zero() {
        assert_eq!(parse_status_counts("<none>,,1"), JobStatusSnapshot {
            succeeded: 0,
            failed: 0,
            active: 1,
        });
        assert_eq!(parse_status_counts(","), JobStatusSnapshot::default());
        assert_eq!(parse_status_counts(""), JobStatusSnapshot::default());
    }

    #[test]
    fn test_parse_conditions_complete() {
        let snapshot = parse_conditions("True,False");
        assert!(snapshot.complete);
        assert!(!snapshot.failed);
    }

    #[test]
    fn test_parse_conditions_failed() {
        let snapshot = parse_conditions("False,True");
        assert!(!snapshot.complete);
        assert!(snapshot.failed);
    }

    #[test]
    fn test_parse_conditions_malformed_input() {
        assert_eq!(parse_conditions("garbage"), JobConditionSnapshot::default());
        assert_eq!(parse_conditions(""), JobConditionSnapshot::default());
        // A single field is no signal either, even when it reads "True".
        assert_eq!(parse_conditions("True"), JobConditionSnapshot::default());
    }

    #[test]
    fn test_parse_conditions_skips_error_lines() {
        let snapshot = parse_conditions("E0101 discovery failed\nTrue,False");
        assert!(snapshot.complete);
        assert!(!snapshot.failed);
    }

    #[test]
    fn test_indicates_not_found() {
        assert!(indicates_not_found(
            r#"Error from server (NotFound): jobs.batch "hb-acme" not found"#
        ));
        assert!(indicates_not_found("job hb-acme not found"));
        assert!(!indicates_not_found("connection refused"));
    }
}
