use super::Tags;
use crate::resources::validation::{self, FieldResult};
use crate::resources::{ResourceAttributes, ResourceError, ResourceReference};
use crate::synthesizer::Synthesizer;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

static ACTIVITY_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_-]{1,80}$").expect("Invalid activity name regex"));

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SfnActivityAttributes {
    pub name: String,
    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,
}

impl ResourceAttributes for SfnActivityAttributes {
    const RESOURCE_TYPE: &'static str = "aws_sfn_activity";
    const OUTPUTS: &'static [&'static str] = &["id", "arn", "name", "creation_date"];

    fn validate(&self) -> FieldResult {
        validation::matches(
            "name",
            &self.name,
            &ACTIVITY_NAME_REGEX,
            "a valid activity name (1-80 of a-z A-Z 0-9 _ -)",
        )
    }
}

pub fn aws_sfn_activity(
    synth: &mut Synthesizer,
    name: &str,
    attributes: Value,
) -> Result<ResourceReference, ResourceError> {
    synth.declare(name, SfnActivityAttributes::from_value(attributes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_activity() {
        let mut synth = Synthesizer::new();
        let activity =
            aws_sfn_activity(&mut synth, "worker", json!({"name": "image-resize"})).unwrap();
        assert_eq!(activity.output("creation_date"), Some("${aws_sfn_activity.worker.creation_date}"));

        let too_long = "a".repeat(81);
        assert!(aws_sfn_activity(&mut synth, "long", json!({"name": too_long})).is_err());
        assert!(aws_sfn_activity(&mut synth, "dots", json!({"name": "has.dots"})).is_err());
    }
}
