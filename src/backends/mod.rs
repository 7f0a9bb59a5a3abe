//! Terraform state backends with advisory locking.

pub mod local;
pub mod s3;

pub use local::LocalBackend;
pub use s3::S3Backend;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use thiserror::Error;

use crate::resources::validation::FieldError;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Invalid {backend} backend configuration: {source}")]
    InvalidConfig {
        backend: &'static str,
        source: FieldError,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("AWS request failed: {0}")]
    Aws(String),
}

/// Contents of a held lock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockInfo {
    pub id: String,
    pub info: Value,
    pub created: DateTime<Utc>,
    pub pid: u32,
}

impl LockInfo {
    pub fn new(id: &str, info: Value) -> Self {
        Self {
            id: id.to_string(),
            info,
            created: Utc::now(),
            pid: std::process::id(),
        }
    }
}

#[async_trait]
pub trait StateBackend: Send + Sync {
    /// Create whatever storage the backend needs (directories, bucket, lock table).
    async fn initialize(&self) -> Result<(), BackendError>;

    async fn configured(&self) -> bool;

    /// Try once to take the lock. `false` when it is held elsewhere or the
    /// request failed.
    async fn lock(&self, lock_id: &str, info: Value) -> bool;

    async fn unlock(&self, lock_id: &str) -> bool;

    async fn locked(&self) -> bool;

    async fn lock_info(&self) -> Option<LockInfo>;

    /// `{"<kind>": {...}}` for the `terraform.backend` block.
    fn terraform_block(&self) -> Value;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    pub key: String,
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamodb_table: Option<String>,
    pub encrypt: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalConfig {
    pub path: PathBuf,
}

/// Fully resolved backend settings for one template workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    S3(S3Config),
    Local(LocalConfig),
}

impl BackendConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            BackendConfig::S3(_) => "s3",
            BackendConfig::Local(_) => "local",
        }
    }

    /// Body of `terraform.backend.<kind>`.
    pub fn terraform_config(&self) -> Value {
        match self {
            BackendConfig::S3(config) => {
                let mut body = json!({
                    "bucket": config.bucket,
                    "key": config.key,
                    "region": config.region,
                    "encrypt": config.encrypt,
                });
                if let Some(table) = &config.dynamodb_table {
                    body["dynamodb_table"] = json!(table);
                }
                body
            }
            BackendConfig::Local(config) => json!({ "path": config.path }),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            BackendConfig::S3(config) => format!(
                "s3://{}/{} ({}{})",
                config.bucket,
                config.key,
                config.region,
                config
                    .dynamodb_table
                    .as_ref()
                    .map(|t| format!(", lock table {}", t))
                    .unwrap_or_default()
            ),
            BackendConfig::Local(config) => format!("local {}", config.path.display()),
        }
    }
}

/// Build the backend for `config`. S3 settings are validated before any
/// AWS client is created.
pub async fn create(config: &BackendConfig) -> Result<Box<dyn StateBackend>, BackendError> {
    match config {
        BackendConfig::S3(s3) => Ok(Box::new(S3Backend::new(s3.clone()).await?)),
        BackendConfig::Local(local) => Ok(Box::new(LocalBackend::new(&local.path))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terraform_config() {
        let s3 = BackendConfig::S3(S3Config {
            bucket: "my-bucket".to_string(),
            key: "pangea/dev/net/terraform.tfstate".to_string(),
            region: "us-east-1".to_string(),
            dynamodb_table: Some("locks".to_string()),
            encrypt: true,
        });
        assert_eq!(s3.kind(), "s3");
        let body = s3.terraform_config();
        assert_eq!(body["bucket"], "my-bucket");
        assert_eq!(body["dynamodb_table"], "locks");
        assert_eq!(body["encrypt"], true);
        assert!(s3.describe().contains("lock table locks"));

        let local = BackendConfig::Local(LocalConfig {
            path: PathBuf::from("/tmp/state/terraform.tfstate"),
        });
        assert_eq!(local.kind(), "local");
        assert_eq!(local.terraform_config()["path"], "/tmp/state/terraform.tfstate");
    }

    #[test]
    fn test_lock_info_records_owner() {
        let info = LockInfo::new("abc", json!({"operation": "plan"}));
        assert_eq!(info.pid, std::process::id());
        let round = serde_json::to_value(&info).unwrap();
        assert_eq!(round["id"], "abc");
        assert_eq!(round["info"]["operation"], "plan");
    }
}
