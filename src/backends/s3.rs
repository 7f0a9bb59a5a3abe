use super::{BackendError, BackendConfig, LockInfo, S3Config, StateBackend};
use crate::resources::validation::{self, FieldError};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, BillingMode, KeySchemaElement, KeyType,
    ScalarAttributeType,
};
use aws_sdk_s3::types::{
    BucketLocationConstraint, BucketVersioningStatus, CreateBucketConfiguration,
    VersioningConfiguration,
};
use serde_json::Value;

const LOCK_KEY_ATTRIBUTE: &str = "LockID";
const LOCK_INFO_ATTRIBUTE: &str = "Info";
const LOCK_KEY_PREFIX: &str = "pangea";

/// State in an S3 bucket, locked through an optional DynamoDB table.
///
/// Terraform locks the same table under `<bucket>/<key>` (plus a
/// `<bucket>/<key>-md5` digest item) while a command runs, so Pangea's own
/// item lives under a `pangea/` prefix Terraform never writes.
pub struct S3Backend {
    config: S3Config,
    s3: aws_sdk_s3::Client,
    dynamodb: aws_sdk_dynamodb::Client,
}

impl S3Backend {
    pub async fn new(config: S3Config) -> Result<Self, BackendError> {
        Self::validate(&config)?;

        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;

        Ok(Self {
            s3: aws_sdk_s3::Client::new(&shared),
            dynamodb: aws_sdk_dynamodb::Client::new(&shared),
            config,
        })
    }

    pub fn validate(config: &S3Config) -> Result<(), BackendError> {
        let invalid = |source| BackendError::InvalidConfig {
            backend: "s3",
            source,
        };
        validation::s3_bucket_name("bucket", &config.bucket).map_err(invalid)?;
        validation::aws_region("region", &config.region).map_err(invalid)?;
        validation::not_blank("key", &config.key).map_err(invalid)?;
        if config.key.starts_with('/') {
            return Err(invalid(FieldError::new("key", "must not start with '/'")));
        }
        if let Some(table) = &config.dynamodb_table {
            validation::not_blank("dynamodb_table", table).map_err(invalid)?;
        }
        Ok(())
    }

    pub fn config(&self) -> &S3Config {
        &self.config
    }

    fn lock_key(&self) -> String {
        lock_key(&self.config)
    }

    async fn bucket_exists(&self) -> Result<bool, BackendError> {
        match self.s3.head_bucket().bucket(&self.config.bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(false),
            Err(e) => Err(BackendError::Aws(DisplayErrorContext(&e).to_string())),
        }
    }

    async fn create_bucket(&self) -> Result<(), BackendError> {
        let mut request = self.s3.create_bucket().bucket(&self.config.bucket);
        // us-east-1 rejects an explicit location constraint.
        if self.config.region != "us-east-1" {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.config.region.as_str()))
                    .build(),
            );
        }
        request
            .send()
            .await
            .map_err(|e| BackendError::Aws(DisplayErrorContext(&e).to_string()))?;
        tracing::info!(bucket = %self.config.bucket, "created state bucket");
        Ok(())
    }

    async fn enable_versioning(&self) -> Result<(), BackendError> {
        self.s3
            .put_bucket_versioning()
            .bucket(&self.config.bucket)
            .versioning_configuration(
                VersioningConfiguration::builder()
                    .status(BucketVersioningStatus::Enabled)
                    .build(),
            )
            .send()
            .await
            .map_err(|e| BackendError::Aws(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }

    async fn ensure_lock_table(&self, table: &str) -> Result<(), BackendError> {
        match self.dynamodb.describe_table().table_name(table).send().await {
            Ok(_) => return Ok(()),
            Err(e)
                if e
                    .as_service_error()
                    .is_some_and(|se| se.is_resource_not_found_exception()) => {}
            Err(e) => return Err(BackendError::Aws(DisplayErrorContext(&e).to_string())),
        }

        let aws_error = |e: aws_sdk_dynamodb::error::BuildError| BackendError::Aws(e.to_string());
        self.dynamodb
            .create_table()
            .table_name(table)
            .attribute_definitions(
                AttributeDefinition::builder()
                    .attribute_name(LOCK_KEY_ATTRIBUTE)
                    .attribute_type(ScalarAttributeType::S)
                    .build()
                    .map_err(aws_error)?,
            )
            .key_schema(
                KeySchemaElement::builder()
                    .attribute_name(LOCK_KEY_ATTRIBUTE)
                    .key_type(KeyType::Hash)
                    .build()
                    .map_err(aws_error)?,
            )
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await
            .map_err(|e| BackendError::Aws(DisplayErrorContext(&e).to_string()))?;
        tracing::info!(table, "created lock table");
        Ok(())
    }

    /// Raw `Info` attribute of the current lock item.
    async fn lock_item(&self, table: &str) -> Result<Option<String>, BackendError> {
        let output = self
            .dynamodb
            .get_item()
            .table_name(table)
            .key(LOCK_KEY_ATTRIBUTE, AttributeValue::S(self.lock_key()))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| BackendError::Aws(DisplayErrorContext(&e).to_string()))?;

        Ok(output
            .item()
            .and_then(|item| item.get(LOCK_INFO_ATTRIBUTE))
            .and_then(|value| value.as_s().ok())
            .cloned())
    }
}

#[async_trait]
impl StateBackend for S3Backend {
    async fn initialize(&self) -> Result<(), BackendError> {
        if !self.bucket_exists().await? {
            self.create_bucket().await?;
        }
        self.enable_versioning().await?;
        if let Some(table) = &self.config.dynamodb_table {
            self.ensure_lock_table(table).await?;
        }
        Ok(())
    }

    async fn configured(&self) -> bool {
        match self.bucket_exists().await {
            Ok(exists) => exists,
            Err(e) => {
                tracing::warn!(bucket = %self.config.bucket, "{}", e);
                false
            }
        }
    }

    async fn lock(&self, lock_id: &str, info: Value) -> bool {
        let Some(table) = &self.config.dynamodb_table else {
            tracing::debug!("no lock table configured, skipping lock");
            return true;
        };
        let info = match serde_json::to_string(&LockInfo::new(lock_id, info)) {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!("failed to encode lock info: {}", e);
                return false;
            }
        };

        let result = self
            .dynamodb
            .put_item()
            .table_name(table)
            .item(LOCK_KEY_ATTRIBUTE, AttributeValue::S(self.lock_key()))
            .item(LOCK_INFO_ATTRIBUTE, AttributeValue::S(info))
            .condition_expression("attribute_not_exists(LockID)")
            .send()
            .await;

        match result {
            Ok(_) => true,
            Err(e)
                if e
                    .as_service_error()
                    .is_some_and(|se| se.is_conditional_check_failed_exception()) =>
            {
                tracing::debug!(key = %self.lock_key(), "state already locked");
                false
            }
            Err(e) => {
                tracing::warn!(table = %table, "failed to acquire lock: {}", DisplayErrorContext(&e));
                false
            }
        }
    }

    async fn unlock(&self, lock_id: &str) -> bool {
        let Some(table) = &self.config.dynamodb_table else {
            return true;
        };
        let raw = match self.lock_item(table).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return false,
            Err(e) => {
                tracing::warn!(table = %table, "{}", e);
                return false;
            }
        };
        let owner = serde_json::from_str::<LockInfo>(&raw).map(|info| info.id);
        if owner.as_deref().ok() != Some(lock_id) {
            tracing::warn!(key = %self.lock_key(), "lock is held under a different id");
            return false;
        }

        let result = self
            .dynamodb
            .delete_item()
            .table_name(table)
            .key(LOCK_KEY_ATTRIBUTE, AttributeValue::S(self.lock_key()))
            .condition_expression("Info = :info")
            .expression_attribute_values(":info", AttributeValue::S(raw))
            .send()
            .await;

        match result {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(table = %table, "failed to release lock: {}", DisplayErrorContext(&e));
                false
            }
        }
    }

    async fn locked(&self) -> bool {
        let Some(table) = &self.config.dynamodb_table else {
            return false;
        };
        match self.lock_item(table).await {
            Ok(item) => item.is_some(),
            Err(e) => {
                tracing::warn!(table = %table, "{}", e);
                false
            }
        }
    }

    async fn lock_info(&self) -> Option<LockInfo> {
        let table = self.config.dynamodb_table.as_ref()?;
        match self.lock_item(table).await {
            Ok(item) => item.and_then(|raw| serde_json::from_str(&raw).ok()),
            Err(e) => {
                tracing::warn!(table = %table, "{}", e);
                None
            }
        }
    }

    fn terraform_block(&self) -> Value {
        let config = BackendConfig::S3(self.config.clone());
        serde_json::json!({ "s3": config.terraform_config() })
    }
}

/// DynamoDB hash key of Pangea's lock item for `config`'s state.
fn lock_key(config: &S3Config) -> String {
    format!("{}/{}/{}", LOCK_KEY_PREFIX, config.bucket, config.key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(bucket: &str, region: &str) -> S3Config {
        S3Config {
            bucket: bucket.to_string(),
            key: "pangea/default/app/terraform.tfstate".to_string(),
            region: region.to_string(),
            dynamodb_table: None,
            encrypt: true,
        }
    }

    #[test]
    fn test_validate_accepts_good_config() {
        assert!(S3Backend::validate(&config("my-bucket", "us-east-1")).is_ok());
        assert!(S3Backend::validate(&config("state.example.com", "us-gov-west-1")).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_bucket() {
        let err = S3Backend::validate(&config("BadBucket!", "us-east-1")).unwrap_err();
        assert!(matches!(
            err,
            BackendError::InvalidConfig { backend: "s3", ref source } if source.field == "bucket"
        ));
    }

    #[test]
    fn test_lock_key_differs_from_terraform_items() {
        let config = config("my-bucket", "us-east-1");
        let key = lock_key(&config);
        assert_eq!(key, "pangea/my-bucket/pangea/default/app/terraform.tfstate");
        assert_ne!(key, format!("{}/{}", config.bucket, config.key));
        assert_ne!(key, format!("{}/{}-md5", config.bucket, config.key));
    }

    #[test]
    fn test_validate_rejects_bad_region() {
        let err = S3Backend::validate(&config("my-bucket", "notaregion")).unwrap_err();
        assert!(err.to_string().contains("region"));
    }

    #[test]
    fn test_validate_rejects_bad_key() {
        let mut bad = config("my-bucket", "us-east-1");
        bad.key = "/absolute/terraform.tfstate".to_string();
        assert!(S3Backend::validate(&bad).is_err());
        bad.key = "  ".to_string();
        assert!(S3Backend::validate(&bad).is_err());
    }

    #[tokio::test]
    async fn test_invalid_config_fails_before_client_setup() {
        assert!(S3Backend::new(config("BadBucket!", "us-east-1")).await.is_err());
    }
}
