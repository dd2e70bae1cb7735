use clap::{ArgAction, Parser};
use std::path::PathBuf;

use crate::config::Settings;

#[derive(Parser, Debug)]
#[command(name = "hostbuilder")]
#[command(about = "Provision per-subdomain hosting build jobs on a cloud container cluster")]
#[command(version)]
pub struct Args {
    /// Enable verbose logging output (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Path to a .env file with cluster credentials and settings
    #[arg(long, value_name = "FILE")]
    pub env_file: Option<PathBuf>,

    /// Bind address for the trigger endpoint
    #[arg(long, value_name = "ADDR", default_value = "0.0.0.0")]
    pub bind_addr: String,

    /// Listen port for the trigger endpoint
    #[arg(short, long, default_value = "8080")]
    pub port: u16,

    /// Dry-run mode: print the resolved configuration and exit
    #[arg(long)]
    pub dry_run: bool,
}

// ============================================================================
// Pure display logic (no I/O - returns formatted strings)
// ============================================================================

fn presence(value: &str) -> &'static str {
    if value.is_empty() {
        "(unset)"
    } else {
        "(set)"
    }
}

/// Format the dry-run configuration summary. Credentials are reduced to
/// set/unset so the output is safe to paste into an issue.
pub fn format_dry_run(settings: &Settings) -> String {
    let mut output = String::new();

    output.push_str("hostbuilder v0.1.0 - Dry Run Mode\n\n");
    output.push_str("Cluster:\n");
    output.push_str(&format!("  API server:     {}\n", settings.api_server()));
    output.push_str(&format!("  Namespace:      {}\n", settings.namespace));
    output.push_str(&format!(
        "  Authenticator:  {}\n",
        settings.authenticator_binary().display()
    ));
    output.push_str(&format!(
        "  kubectl:        {}\n",
        settings.kubectl_binary().display()
    ));
    output.push_str(&format!(
        "  Call timeout:   {}s\n",
        settings.call_timeout.as_secs()
    ));
    output.push('\n');

    output.push_str("Build job:\n");
    output.push_str(&format!("  Image:          {}\n", settings.builder_image));
    output.push_str(&format!("  Pull policy:    {}\n", settings.image_pull_policy));
    output.push_str(&format!("  Target host:    {}\n", settings.lxd_host));
    output.push_str(&format!("  Topic URN:      {}\n", settings.topic_urn));
    output.push_str(&format!(
        "  Debug manifest: {}\n",
        if settings.print_out_file { "on" } else { "off" }
    ));
    output.push('\n');

    output.push_str("Credentials:\n");
    output.push_str(&format!("  Access key:     {}\n", presence(&settings.access_key)));
    output.push_str(&format!("  Secret key:     {}\n", presence(&settings.secret_key)));
    output.push_str(&format!(
        "  Ansible:        {} / {}\n",
        settings.ansible_user,
        presence(&settings.ansible_password)
    ));
    output.push_str(&format!(
        "  DB root:        {}@{} {}\n",
        settings.db_root_user,
        settings.db_root_host,
        presence(&settings.db_root_password)
    ));

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_settings;

    #[test]
    fn test_format_dry_run_redacts_credentials() {
        let settings = test_settings();
        let output = format_dry_run(&settings);

        assert!(output.contains("https://cci.ap-southeast-4.myhuaweicloud.com"));
        assert!(output.contains("Access key:     (set)"));
        assert!(!output.contains("SK"));
        assert!(!output.contains("db-pass"));
    }

    #[test]
    fn test_format_dry_run_marks_missing_credentials() {
        let mut settings = test_settings();
        settings.secret_key.clear();
        let output = format_dry_run(&settings);
        assert!(output.contains("Secret key:     (unset)"));
    }
}
