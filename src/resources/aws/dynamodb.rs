use super::Tags;
use crate::resources::validation::{self, FieldError, FieldResult};
use crate::resources::{ResourceAttributes, ResourceError, ResourceReference};
use crate::synthesizer::Synthesizer;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

static TABLE_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_.-]{3,255}$").expect("Invalid table name regex"));

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingMode {
    Provisioned,
    #[default]
    PayPerRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeType {
    S,
    N,
    B,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamViewType {
    KeysOnly,
    NewImage,
    OldImage,
    NewAndOldImages,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableAttribute {
    pub name: String,
    #[serde(rename = "type")]
    pub attribute_type: AttributeType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableTtl {
    pub attribute_name: String,
    #[serde(default = "crate::resources::default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PointInTimeRecovery {
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DynamoDbTableAttributes {
    pub name: String,
    #[serde(default)]
    pub billing_mode: BillingMode,
    pub hash_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_key: Option<String>,
    pub attribute: Vec<TableAttribute>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_capacity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_capacity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_view_type: Option<StreamViewType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<TableTtl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point_in_time_recovery: Option<PointInTimeRecovery>,
    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,
}

impl DynamoDbTableAttributes {
    fn declares(&self, key: &str) -> bool {
        self.attribute.iter().any(|attribute| attribute.name == key)
    }
}

impl ResourceAttributes for DynamoDbTableAttributes {
    const RESOURCE_TYPE: &'static str = "aws_dynamodb_table";
    const OUTPUTS: &'static [&'static str] = &["id", "arn", "name", "stream_arn", "stream_label"];

    fn validate(&self) -> FieldResult {
        validation::matches(
            "name",
            &self.name,
            &TABLE_NAME_REGEX,
            "a valid table name (3-255 of a-z A-Z 0-9 _ . -)",
        )?;
        validation::non_empty("attribute", &self.attribute)?;

        if !self.declares(&self.hash_key) {
            return Err(FieldError::new(
                "hash_key",
                format!("'{}' is not declared in attribute", self.hash_key),
            ));
        }
        if let Some(range_key) = &self.range_key {
            if !self.declares(range_key) {
                return Err(FieldError::new(
                    "range_key",
                    format!("'{}' is not declared in attribute", range_key),
                ));
            }
        }

        match self.billing_mode {
            BillingMode::Provisioned => {
                if self.read_capacity.is_none() || self.write_capacity.is_none() {
                    return Err(FieldError::new(
                        "billing_mode",
                        "PROVISIONED requires read_capacity and write_capacity",
                    ));
                }
            }
            BillingMode::PayPerRequest => {
                if self.read_capacity.is_some() || self.write_capacity.is_some() {
                    return Err(FieldError::new(
                        "billing_mode",
                        "PAY_PER_REQUEST does not accept read_capacity or write_capacity",
                    ));
                }
            }
        }

        if self.stream_enabled == Some(true) && self.stream_view_type.is_none() {
            return Err(FieldError::new(
                "stream_view_type",
                "is required when stream_enabled is true",
            ));
        }
        Ok(())
    }
}

pub fn aws_dynamodb_table(
    synth: &mut Synthesizer,
    name: &str,
    attributes: Value,
) -> Result<ResourceReference, ResourceError> {
    synth.declare(name, DynamoDbTableAttributes::from_value(attributes)?)
}
