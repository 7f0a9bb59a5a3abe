use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Handle returned by every resource function.
///
/// Holds the validated attributes as emitted and the interpolation strings
/// (`${type.name.attr}`) other resources use to refer to computed fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceReference {
    resource_type: String,
    name: String,
    attributes: Value,
    outputs: BTreeMap<String, String>,
}

impl ResourceReference {
    pub fn new(resource_type: &str, name: &str, attributes: Value, outputs: &[&str]) -> Self {
        let outputs = outputs
            .iter()
            .map(|output| {
                (
                    output.to_string(),
                    interpolation(resource_type, name, output),
                )
            })
            .collect();

        Self {
            resource_type: resource_type.to_string(),
            name: name.to_string(),
            attributes,
            outputs,
        }
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `type.name`, the address Terraform prints in plans.
    pub fn address(&self) -> String {
        format!("{}.{}", self.resource_type, self.name)
    }

    pub fn attributes(&self) -> &Value {
        &self.attributes
    }

    pub fn outputs(&self) -> &BTreeMap<String, String> {
        &self.outputs
    }

    pub fn output(&self, name: &str) -> Option<&str> {
        self.outputs.get(name).map(String::as_str)
    }

    pub fn id(&self) -> Option<&str> {
        self.output("id")
    }

    pub fn arn(&self) -> Option<&str> {
        self.output("arn")
    }
}

pub fn interpolation(resource_type: &str, name: &str, attribute: &str) -> String {
    format!("${{{}.{}.{}}}", resource_type, name, attribute)
}
