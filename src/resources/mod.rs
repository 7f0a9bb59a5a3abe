//! Resource functions: validate an attribute mapping, emit the Terraform
//! block into a [`Synthesizer`], return a [`ResourceReference`].

pub mod aws;
pub mod cloudflare;
pub mod reference;
pub mod validation;

use crate::synthesizer::Synthesizer;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub use reference::ResourceReference;
use validation::FieldResult;

#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("Invalid {resource} attributes: {message}")]
    Validation { resource: String, message: String },

    #[error("Duplicate declaration: {0}")]
    Duplicate(String),

    #[error("Unsupported resource type: {0}")]
    UnknownType(String),
}

impl ResourceError {
    pub fn validation(resource: &str, message: impl std::fmt::Display) -> Self {
        ResourceError::Validation {
            resource: resource.to_string(),
            message: message.to_string(),
        }
    }
}

/// Typed attribute schema of one Terraform resource type.
///
/// Deserialization enforces required fields, unknown fields and enum values;
/// `validate` covers formats, ranges and cross-field rules. The serialized
/// form is the Terraform JSON body of the resource.
pub trait ResourceAttributes: Serialize + DeserializeOwned {
    const RESOURCE_TYPE: &'static str;
    const OUTPUTS: &'static [&'static str];

    fn validate(&self) -> FieldResult {
        Ok(())
    }

    fn from_value(value: Value) -> Result<Self, ResourceError> {
        serde_json::from_value(value)
            .map_err(|e| ResourceError::validation(Self::RESOURCE_TYPE, e))
    }
}

pub(crate) fn default_true() -> bool {
    true
}

pub type ResourceFn =
    fn(&mut Synthesizer, &str, Value) -> Result<ResourceReference, ResourceError>;

const REGISTRY: &[(&str, ResourceFn)] = &[
    ("aws_vpc", aws::aws_vpc),
    ("aws_subnet", aws::aws_subnet),
    ("aws_security_group", aws::aws_security_group),
    ("aws_instance", aws::aws_instance),
    ("aws_customer_gateway", aws::aws_customer_gateway),
    ("aws_s3_bucket", aws::aws_s3_bucket),
    ("aws_dynamodb_table", aws::aws_dynamodb_table),
    ("aws_route53_zone", aws::aws_route53_zone),
    ("aws_route53_record", aws::aws_route53_record),
    ("aws_iam_saml_provider", aws::aws_iam_saml_provider),
    (
        "aws_iam_openid_connect_provider",
        aws::aws_iam_openid_connect_provider,
    ),
    ("aws_sfn_activity", aws::aws_sfn_activity),
    ("cloudflare_zone", cloudflare::cloudflare_zone),
    ("cloudflare_record", cloudflare::cloudflare_record),
    (
        "cloudflare_load_balancer_monitor",
        cloudflare::cloudflare_load_balancer_monitor,
    ),
    (
        "cloudflare_load_balancer_pool",
        cloudflare::cloudflare_load_balancer_pool,
    ),
    ("cloudflare_load_balancer", cloudflare::cloudflare_load_balancer),
];

/// Look up the resource function for a Terraform type.
pub fn lookup(resource_type: &str) -> Option<ResourceFn> {
    REGISTRY
        .iter()
        .find(|(name, _)| *name == resource_type)
        .map(|(_, function)| *function)
}

/// Dispatch to the resource function registered for `resource_type`.
pub fn declare(
    synth: &mut Synthesizer,
    resource_type: &str,
    name: &str,
    attributes: Value,
) -> Result<ResourceReference, ResourceError> {
    let function =
        lookup(resource_type).ok_or_else(|| ResourceError::UnknownType(resource_type.to_string()))?;
    function(synth, name, attributes)
}

pub fn supported_types() -> Vec<&'static str> {
    REGISTRY.iter().map(|(name, _)| *name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_registry_dispatch() {
        let mut synth = Synthesizer::new();
        let vpc = declare(&mut synth, "aws_vpc", "main", json!({"cidr_block": "10.0.0.0/16"}))
            .unwrap();
        assert_eq!(vpc.address(), "aws_vpc.main");
        assert_eq!(synth.resource_count(), 1);
    }

    #[test]
    fn test_registry_unknown_type() {
        let mut synth = Synthesizer::new();
        let err = declare(&mut synth, "aws_unicorn", "x", json!({})).unwrap_err();
        assert!(matches!(err, ResourceError::UnknownType(ref t) if t == "aws_unicorn"));
    }

    #[test]
    fn test_supported_types_are_unique() {
        let types = supported_types();
        let mut deduped = types.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(types.len(), deduped.len());
        assert!(types.contains(&"cloudflare_load_balancer_monitor"));
    }
}
