//! Builder for one Terraform JSON configuration document.

use crate::resources::validation;
use crate::resources::{ResourceAttributes, ResourceError, ResourceReference};
use serde_json::{json, Map, Value};

/// Provider source addresses emitted under `terraform.required_providers`.
const PROVIDER_SOURCES: &[(&str, &str)] = &[
    ("aws", "hashicorp/aws"),
    ("cloudflare", "cloudflare/cloudflare"),
];

#[derive(Debug, Default)]
pub struct Synthesizer {
    backend: Option<(String, Value)>,
    providers: Map<String, Value>,
    resources: Map<String, Value>,
    outputs: Map<String, Value>,
    references: Vec<ResourceReference>,
}

impl Synthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the `terraform.backend.<kind>` block. The last call wins.
    pub fn backend(&mut self, kind: &str, config: Value) {
        self.backend = Some((kind.to_string(), config));
    }

    pub fn provider(&mut self, name: &str, config: Value) {
        self.providers.insert(name.to_string(), config);
    }

    /// Validate `attributes`, emit `resource.<type>.<name>` and return the
    /// reference exposing its outputs.
    pub fn declare<A: ResourceAttributes>(
        &mut self,
        name: &str,
        attributes: A,
    ) -> Result<ResourceReference, ResourceError> {
        validation::resource_name(name)
            .map_err(|e| ResourceError::validation(A::RESOURCE_TYPE, e))?;
        attributes
            .validate()
            .map_err(|e| ResourceError::validation(A::RESOURCE_TYPE, e))?;

        let body = serde_json::to_value(&attributes)
            .map_err(|e| ResourceError::validation(A::RESOURCE_TYPE, e))?;

        let blocks = self
            .resources
            .entry(A::RESOURCE_TYPE.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        let Some(blocks) = blocks.as_object_mut() else {
            return Err(ResourceError::validation(
                A::RESOURCE_TYPE,
                "resource table is not an object",
            ));
        };
        if blocks.contains_key(name) {
            return Err(ResourceError::Duplicate(format!(
                "{}.{}",
                A::RESOURCE_TYPE,
                name
            )));
        }
        blocks.insert(name.to_string(), body.clone());

        tracing::debug!(resource_type = A::RESOURCE_TYPE, name, "declared resource");

        let reference = ResourceReference::new(A::RESOURCE_TYPE, name, body, A::OUTPUTS);
        self.references.push(reference.clone());
        Ok(reference)
    }

    pub fn output(
        &mut self,
        name: &str,
        value: Value,
        description: Option<&str>,
        sensitive: bool,
    ) -> Result<(), ResourceError> {
        validation::resource_name(name).map_err(|e| ResourceError::validation("output", e))?;
        if self.outputs.contains_key(name) {
            return Err(ResourceError::Duplicate(format!("output.{}", name)));
        }

        let mut block = Map::new();
        block.insert("value".to_string(), value);
        if let Some(description) = description {
            block.insert("description".to_string(), json!(description));
        }
        if sensitive {
            block.insert("sensitive".to_string(), json!(true));
        }
        self.outputs.insert(name.to_string(), Value::Object(block));
        Ok(())
    }

    pub fn reference(&self, address: &str) -> Option<&ResourceReference> {
        self.references.iter().find(|r| r.address() == address)
    }

    pub fn references(&self) -> &[ResourceReference] {
        &self.references
    }

    pub fn resource_count(&self) -> usize {
        self.references.len()
    }

    /// Render the document. Empty sections are omitted.
    pub fn synthesize(&self) -> Value {
        let mut document = Map::new();

        let mut terraform = Map::new();
        if let Some((kind, config)) = &self.backend {
            terraform.insert("backend".to_string(), json!({ kind.as_str(): config }));
        }
        let required = self.required_providers();
        if !required.is_empty() {
            terraform.insert("required_providers".to_string(), Value::Object(required));
        }
        if !terraform.is_empty() {
            document.insert("terraform".to_string(), Value::Object(terraform));
        }

        if !self.providers.is_empty() {
            document.insert("provider".to_string(), Value::Object(self.providers.clone()));
        }
        if !self.resources.is_empty() {
            document.insert("resource".to_string(), Value::Object(self.resources.clone()));
        }
        if !self.outputs.is_empty() {
            document.insert("output".to_string(), Value::Object(self.outputs.clone()));
        }

        Value::Object(document)
    }

    fn required_providers(&self) -> Map<String, Value> {
        let mut required = Map::new();
        let used = self
            .resources
            .keys()
            .map(|resource_type| provider_prefix(resource_type))
            .chain(self.providers.keys().map(String::as_str));

        for prefix in used {
            if let Some((name, source)) = PROVIDER_SOURCES.iter().find(|(name, _)| *name == prefix)
            {
                required
                    .entry(name.to_string())
                    .or_insert_with(|| json!({ "source": source }));
            }
        }
        required
    }
}

fn provider_prefix(resource_type: &str) -> &str {
    resource_type.split('_').next().unwrap_or(resource_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::aws;

    #[test]
    fn test_synthesize_document() {
        let mut synth = Synthesizer::new();
        synth.backend("local", json!({"path": "terraform.tfstate"}));
        synth.provider("aws", json!({"region": "us-east-1"}));
        let vpc = aws::aws_vpc(&mut synth, "main", json!({"cidr_block": "10.0.0.0/16"})).unwrap();
        synth
            .output("vpc_id", json!(vpc.id().unwrap()), Some("VPC id"), false)
            .unwrap();

        let document = synth.synthesize();
        assert_eq!(
            document["terraform"]["backend"]["local"]["path"],
            "terraform.tfstate"
        );
        assert_eq!(
            document["terraform"]["required_providers"]["aws"]["source"],
            "hashicorp/aws"
        );
        assert_eq!(document["provider"]["aws"]["region"], "us-east-1");
        assert_eq!(
            document["resource"]["aws_vpc"]["main"]["cidr_block"],
            "10.0.0.0/16"
        );
        assert_eq!(document["output"]["vpc_id"]["value"], "${aws_vpc.main.id}");
        assert_eq!(document["output"]["vpc_id"]["description"], "VPC id");
    }

    #[test]
    fn test_duplicate_resource_rejected() {
        let mut synth = Synthesizer::new();
        aws::aws_vpc(&mut synth, "main", json!({"cidr_block": "10.0.0.0/16"})).unwrap();
        let err = aws::aws_vpc(&mut synth, "main", json!({"cidr_block": "10.1.0.0/16"}))
            .unwrap_err();
        assert!(matches!(err, ResourceError::Duplicate(ref a) if a == "aws_vpc.main"));
        assert_eq!(synth.resource_count(), 1);
    }

    #[test]
    fn test_invalid_resource_name_rejected() {
        let mut synth = Synthesizer::new();
        let err = aws::aws_vpc(&mut synth, "9lives", json!({"cidr_block": "10.0.0.0/16"}))
            .unwrap_err();
        assert!(matches!(err, ResourceError::Validation { .. }));
    }

    #[test]
    fn test_empty_document() {
        assert_eq!(Synthesizer::new().synthesize(), json!({}));
    }

    #[test]
    fn test_lookup_reference() {
        let mut synth = Synthesizer::new();
        aws::aws_sfn_activity(&mut synth, "worker", json!({"name": "worker-activity"})).unwrap();
        let reference = synth.reference("aws_sfn_activity.worker").unwrap();
        assert_eq!(reference.id(), Some("${aws_sfn_activity.worker.id}"));
        assert!(synth.reference("aws_sfn_activity.other").is_none());
    }
}
