use super::Tags;
use crate::resources::validation::{self, FieldResult};
use crate::resources::{ResourceAttributes, ResourceError, ResourceReference};
use crate::synthesizer::Synthesizer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct S3BucketAttributes {
    pub bucket: String,
    #[serde(default)]
    pub force_destroy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_lock_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,
}

impl ResourceAttributes for S3BucketAttributes {
    const RESOURCE_TYPE: &'static str = "aws_s3_bucket";
    const OUTPUTS: &'static [&'static str] = &[
        "id",
        "arn",
        "bucket",
        "bucket_domain_name",
        "bucket_regional_domain_name",
        "hosted_zone_id",
        "region",
    ];

    fn validate(&self) -> FieldResult {
        if validation::is_interpolated(&self.bucket) {
            return Ok(());
        }
        validation::s3_bucket_name("bucket", &self.bucket)
    }
}

pub fn aws_s3_bucket(
    synth: &mut Synthesizer,
    name: &str,
    attributes: Value,
) -> Result<ResourceReference, ResourceError> {
    synth.declare(name, S3BucketAttributes::from_value(attributes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bucket_defaults_and_override() {
        let mut synth = Synthesizer::new();
        let bucket = aws_s3_bucket(&mut synth, "logs", json!({"bucket": "my-logs-bucket"})).unwrap();
        assert_eq!(bucket.attributes()["force_destroy"], false);

        let bucket = aws_s3_bucket(
            &mut synth,
            "scratch",
            json!({"bucket": "my-scratch-bucket", "force_destroy": true, "tags": {"team": "infra"}}),
        )
        .unwrap();
        assert_eq!(bucket.attributes()["force_destroy"], true);
        assert_eq!(bucket.attributes()["tags"]["team"], "infra");
    }

    #[test]
    fn test_bucket_name_rules() {
        let mut synth = Synthesizer::new();
        let err = aws_s3_bucket(&mut synth, "bad", json!({"bucket": "BadBucket!"})).unwrap_err();
        assert!(err.to_string().contains("not a valid S3 bucket name"));

        assert!(aws_s3_bucket(&mut synth, "computed", json!({"bucket": "${var.bucket}"})).is_ok());
    }
}
