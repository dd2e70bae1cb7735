//! Startup configuration
//!
//! All process-wide settings are read from the environment exactly once at
//! startup into an immutable [`Settings`] snapshot that is passed by
//! reference to every component. Component logic never reads ambient
//! environment state.

use std::path::PathBuf;
use std::time::Duration;

/// Immutable configuration snapshot, built once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Container image run by the build job
    pub builder_image: String,
    /// Image pull policy written into the manifest
    pub image_pull_policy: String,
    /// Cloud access key (token exchange + build job credentials)
    pub access_key: String,
    /// Cloud secret key
    pub secret_key: String,
    /// Project/region identifier; also selects the cluster endpoint
    pub project_name: String,
    /// Directory holding the bundled external binaries
    pub dependency_path: String,
    /// Mirror rendered manifests to a local debug file
    pub print_out_file: bool,
    /// Namespace the job is created in
    pub namespace: String,
    /// Optional override for the IAM authenticator binary
    pub authenticator_path: Option<String>,
    /// Optional override for the kubectl binary
    pub kubectl_path: Option<String>,
    /// Target host the build job provisions on
    pub lxd_host: String,
    /// Operator credentials handed to the build job
    pub ansible_user: String,
    pub ansible_password: String,
    /// Database root credentials handed to the build job
    pub db_root_host: String,
    pub db_root_user: String,
    pub db_root_password: String,
    /// Notification topic the build job publishes completion to
    pub topic_urn: String,
    /// Upper bound on any single external cluster call
    pub call_timeout: Duration,
}

/// Read an environment variable, falling back to a default when unset.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

impl Settings {
    /// Build the configuration snapshot from the process environment.
    pub fn from_env() -> Self {
        Self {
            builder_image: env_or(
                "HOSTING_BUILDER_IMAGE",
                "swr.ap-southeast-4.myhuaweicloud.com/demo-huawei/hostingbuilder:latest",
            ),
            image_pull_policy: env_or("IMAGE_PULL_POLICY", "IfNotPresent"),
            access_key: env_or("ACCESS_KEY", ""),
            secret_key: env_or("SECRET_KEY", ""),
            project_name: env_or("PROJECT_NAME", "ap-southeast-4"),
            dependency_path: env_or("DEPENDENCY_PATH", "./code"),
            print_out_file: env_or("PRINT_OUT_FILE", "false").parse().unwrap_or(false),
            namespace: env_or("K8S_NAMESPACE", "default"),
            authenticator_path: env_opt("CCI_IAM_AUTHENTICATOR_PATH"),
            kubectl_path: env_opt("KUBECTL_PATH"),
            lxd_host: env_or("LXD_HOST", ""),
            ansible_user: env_or("ANSIBLE_USER", "root"),
            ansible_password: env_or("ANSIBLE_PASSWORD", ""),
            db_root_host: env_or("DB_ROOT_HOST", "localhost"),
            db_root_user: env_or("DB_ROOT_USER", "root"),
            db_root_password: env_or("DB_ROOT_PASSWORD", ""),
            topic_urn: env_or("TOPIC_URN", ""),
            call_timeout: Duration::from_secs(
                env_or("CLUSTER_CALL_TIMEOUT_SECS", "30").parse().unwrap_or(30),
            ),
        }
    }

    /// API endpoint of the cluster orchestrator for this project.
    pub fn api_server(&self) -> String {
        format!("https://cci.{}.myhuaweicloud.com", self.project_name)
    }

    /// Resolved path to the IAM authenticator binary.
    pub fn authenticator_binary(&self) -> PathBuf {
        resolve_binary(
            self.authenticator_path.as_deref(),
            &self.dependency_path,
            "cci-iam-authenticator",
        )
    }

    /// Resolved path to the kubectl binary.
    pub fn kubectl_binary(&self) -> PathBuf {
        resolve_binary(self.kubectl_path.as_deref(), &self.dependency_path, "kubectl")
    }
}

/// Pick the explicit override when present, otherwise look inside the
/// dependency directory. `~` is expanded in either case.
fn resolve_binary(explicit: Option<&str>, dependency_path: &str, name: &str) -> PathBuf {
    let raw = match explicit {
        Some(path) => path.to_string(),
        None => format!("{}/{}", dependency_path, name),
    };
    PathBuf::from(shellexpand::tilde(&raw).as_ref())
}

/// Fixed settings snapshot for unit tests across the crate.
#[cfg(test)]
pub(crate) fn test_settings() -> Settings {
    Settings {
        builder_image: "registry.example.com/hostingbuilder:latest".to_string(),
        image_pull_policy: "IfNotPresent".to_string(),
        access_key: "AK".to_string(),
        secret_key: "SK".to_string(),
        project_name: "ap-southeast-4".to_string(),
        dependency_path: "./code".to_string(),
        print_out_file: false,
        namespace: "default".to_string(),
        authenticator_path: None,
        kubectl_path: None,
        lxd_host: "lxd.internal".to_string(),
        ansible_user: "root".to_string(),
        ansible_password: "ansible-pass".to_string(),
        db_root_host: "db.internal".to_string(),
        db_root_user: "root".to_string(),
        db_root_password: "db-pass".to_string(),
        topic_urn: "urn:smn:region:123:hosting".to_string(),
        call_timeout: Duration::from_secs(30),
    }
}
