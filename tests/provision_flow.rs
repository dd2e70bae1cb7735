//! End-to-end provisioning flow against scripted fake cluster binaries.
//!
//! A fake kubectl records every invocation and plays back canned responses:
//! the status query stays pending for two polls and the condition query
//! reports Complete on the third. A fake authenticator hands out a fixed
//! token.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use tempfile::TempDir;

use hostbuilder::auth::{self, AuthError};
use hostbuilder::cluster::PollerConfig;
use hostbuilder::config::Settings;
use hostbuilder::manifest::{HostingDetail, Theme};
use hostbuilder::orchestrator::{provision, ProvisionError};

const FAKE_AUTHENTICATOR: &str = r#"#!/bin/sh
echo "test-token-123"
"#;

const FAILING_AUTHENTICATOR: &str = r#"#!/bin/sh
echo "ak/sk rejected by IAM" >&2
exit 2
"#;

const FAKE_KUBECTL: &str = r#"#!/bin/sh
DIR=__DIR__
echo "$*" >> "$DIR/calls.log"
case "$*" in
  *"apply -f"*)
    cat > "$DIR/applied.yaml"
    echo "job.batch/hb-acme created"
    ;;
  *succeeded*)
    n=$(cat "$DIR/polls" 2>/dev/null || echo 0)
    n=$((n+1))
    echo "$n" > "$DIR/polls"
    echo "E0101 12:00:00 discovery warning"
    echo ",,1"
    ;;
  *conditions*)
    n=$(cat "$DIR/polls" 2>/dev/null || echo 0)
    if [ "$n" -ge 3 ]; then
      echo "True,False"
    else
      echo "False,False"
    fi
    ;;
  *describe*)
    echo "Name: hb-acme"
    ;;
esac
exit 0
"#;

const REJECTING_KUBECTL: &str = r#"#!/bin/sh
DIR=__DIR__
echo "$*" >> "$DIR/calls.log"
case "$*" in
  *"apply -f"*)
    echo "Error from server (Forbidden): jobs.batch is forbidden" >&2
    exit 1
    ;;
esac
exit 0
"#;

fn write_script(dir: &Path, name: &str, template: &str) -> Result<()> {
    let path = dir.join(name);
    let content = template.replace("__DIR__", &dir.to_string_lossy());
    std::fs::write(&path, content)?;
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
    Ok(())
}

fn settings_for(dir: &Path) -> Settings {
    Settings {
        builder_image: "registry.example.com/hostingbuilder:latest".to_string(),
        image_pull_policy: "IfNotPresent".to_string(),
        access_key: "AK".to_string(),
        secret_key: "SK".to_string(),
        project_name: "ap-southeast-4".to_string(),
        dependency_path: dir.to_string_lossy().into_owned(),
        print_out_file: false,
        namespace: "default".to_string(),
        authenticator_path: Some(dir.join("cci-iam-authenticator").to_string_lossy().into_owned()),
        kubectl_path: Some(dir.join("kubectl").to_string_lossy().into_owned()),
        lxd_host: "lxd.internal".to_string(),
        ansible_user: "root".to_string(),
        ansible_password: "ansible-pass".to_string(),
        db_root_host: "db.internal".to_string(),
        db_root_user: "root".to_string(),
        db_root_password: "db-pass".to_string(),
        topic_urn: "urn:smn:region:123:hosting".to_string(),
        call_timeout: Duration::from_secs(10),
    }
}

fn quick_poller() -> PollerConfig {
    PollerConfig {
        max_wait: Duration::from_secs(30),
        interval: Duration::from_millis(20),
    }
}

fn acme_request() -> HostingDetail {
    HostingDetail {
        subdomain: "acme".to_string(),
        theme: Theme::TwentyTwentyFour,
        email: "a@b.com".to_string(),
    }
}

#[tokio::test]
async fn provisions_to_completion_on_third_poll() -> Result<()> {
    let dir = TempDir::new()?;
    write_script(dir.path(), "cci-iam-authenticator", FAKE_AUTHENTICATOR)?;
    write_script(dir.path(), "kubectl", FAKE_KUBECTL)?;
    let settings = settings_for(dir.path());

    let token = auth::obtain_token(&settings).await?;
    assert_eq!(token, "test-token-123");

    provision(&settings, &token, &acme_request(), &quick_poller()).await?;

    // The submitted manifest carried the derived job name and request fields.
    let applied = std::fs::read_to_string(dir.path().join("applied.yaml"))?;
    assert!(applied.contains("name: hb-acme"));
    assert!(applied.contains(r#"value: "a@b.com""#));
    assert!(applied.contains(r#"value: "twentytwentyfour""#));

    // Exactly one submission, then polling until the third iteration.
    let calls = std::fs::read_to_string(dir.path().join("calls.log"))?;
    assert_eq!(calls.matches("apply -f").count(), 1);
    assert_eq!(std::fs::read_to_string(dir.path().join("polls"))?.trim(), "3");

    // The bearer token reached every kubectl call.
    assert!(calls.lines().all(|line| line.contains("--token=test-token-123")));

    Ok(())
}

#[tokio::test]
async fn rejected_submission_stops_before_polling() -> Result<()> {
    let dir = TempDir::new()?;
    write_script(dir.path(), "cci-iam-authenticator", FAKE_AUTHENTICATOR)?;
    write_script(dir.path(), "kubectl", REJECTING_KUBECTL)?;
    let settings = settings_for(dir.path());

    let token = auth::obtain_token(&settings).await?;
    let err = provision(&settings, &token, &acme_request(), &quick_poller())
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::Submit(_)));
    assert!(err.to_string().contains("Forbidden"));

    // Submission failed, so no status query was ever issued.
    let calls = std::fs::read_to_string(dir.path().join("calls.log"))?;
    assert_eq!(calls.lines().count(), 1);
    assert!(!calls.contains(" get "));

    Ok(())
}

#[tokio::test]
async fn startup_token_exchange_failure_is_surfaced() -> Result<()> {
    let dir = TempDir::new()?;
    write_script(dir.path(), "cci-iam-authenticator", FAILING_AUTHENTICATOR)?;
    let settings = settings_for(dir.path());

    let err = auth::obtain_token(&settings).await.unwrap_err();
    match err {
        AuthError::Rejected { output, .. } => assert!(output.contains("ak/sk rejected")),
        other => panic!("unexpected error: {other}"),
    }

    Ok(())
}
