use super::Tags;
use crate::resources::validation::{self, FieldError, FieldResult};
use crate::resources::{ResourceAttributes, ResourceError, ResourceReference};
use crate::synthesizer::Synthesizer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ZoneVpc {
    pub vpc_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc_region: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Route53ZoneAttributes {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default)]
    pub force_destroy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegation_set_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vpc: Vec<ZoneVpc>,
    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,
}

impl ResourceAttributes for Route53ZoneAttributes {
    const RESOURCE_TYPE: &'static str = "aws_route53_zone";
    const OUTPUTS: &'static [&'static str] = &["id", "zone_id", "arn", "name_servers", "primary_name_server"];

    fn validate(&self) -> FieldResult {
        validation::domain_name("name", &self.name)?;
        if !self.vpc.is_empty() && self.delegation_set_id.is_some() {
            return Err(FieldError::new(
                "delegation_set_id",
                "cannot be combined with vpc (private zones)",
            ));
        }
        for vpc in &self.vpc {
            if let Some(region) = &vpc.vpc_region {
                validation::aws_region("vpc.vpc_region", region)?;
            }
        }
        Ok(())
    }
}

pub fn aws_route53_zone(
    synth: &mut Synthesizer,
    name: &str,
    attributes: Value,
) -> Result<ResourceReference, ResourceError> {
    synth.declare(name, Route53ZoneAttributes::from_value(attributes)?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    A,
    Aaaa,
    Cname,
    Mx,
    Ns,
    Ptr,
    Soa,
    Spf,
    Srv,
    Txt,
    Caa,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordAlias {
    pub name: String,
    pub zone_id: String,
    #[serde(default)]
    pub evaluate_target_health: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Route53RecordAttributes {
    pub zone_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: RecordType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub records: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<RecordAlias>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_overwrite: Option<bool>,
}

impl ResourceAttributes for Route53RecordAttributes {
    const RESOURCE_TYPE: &'static str = "aws_route53_record";
    const OUTPUTS: &'static [&'static str] = &["id", "name", "fqdn"];

    fn validate(&self) -> FieldResult {
        validation::not_blank("zone_id", &self.zone_id)?;
        validation::not_blank("name", &self.name)?;

        match (&self.alias, self.records.is_empty()) {
            (Some(_), false) => Err(FieldError::new(
                "alias",
                "cannot be combined with records",
            )),
            (Some(_), true) if self.ttl.is_some() => {
                Err(FieldError::new("ttl", "cannot be set on alias records"))
            }
            (Some(alias), true) => {
                validation::not_blank("alias.name", &alias.name)?;
                validation::not_blank("alias.zone_id", &alias.zone_id)
            }
            (None, true) => Err(FieldError::new(
                "records",
                "either records (with ttl) or alias is required",
            )),
            (None, false) if self.ttl.is_none() => {
                Err(FieldError::new("ttl", "is required for non-alias records"))
            }
            (None, false) => {
                if self.record_type == RecordType::A {
                    for record in &self.records {
                        validation::ipv4("records", record)?;
                    }
                }
                Ok(())
            }
        }
    }
}

pub fn aws_route53_record(
    synth: &mut Synthesizer,
    name: &str,
    attributes: Value,
) -> Result<ResourceReference, ResourceError> {
    synth.declare(name, Route53RecordAttributes::from_value(attributes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_zone_and_record() {
        let mut synth = Synthesizer::new();
        let zone = aws_route53_zone(&mut synth, "primary", json!({"name": "example.com"})).unwrap();
        assert_eq!(zone.attributes()["force_destroy"], false);

        let record = aws_route53_record(
            &mut synth,
            "www",
            json!({
                "zone_id": zone.output("zone_id"),
                "name": "www.example.com",
                "type": "A",
                "ttl": 300,
                "records": ["192.0.2.10"]
            }),
        )
        .unwrap();
        assert_eq!(record.attributes()["zone_id"], "${aws_route53_zone.primary.zone_id}");
        assert_eq!(record.attributes()["type"], "A");
        assert_eq!(record.output("fqdn"), Some("${aws_route53_record.www.fqdn}"));
    }

    #[test]
    fn test_zone_rejects_bad_domain() {
        let mut synth = Synthesizer::new();
        assert!(aws_route53_zone(&mut synth, "bad", json!({"name": "not a domain"})).is_err());
    }

    #[test]
    fn test_record_alias_rules() {
        let mut synth = Synthesizer::new();
        let alias = json!({"name": "lb.example.com", "zone_id": "Z123"});

        assert!(aws_route53_record(
            &mut synth,
            "apex",
            json!({"zone_id": "Z1", "name": "example.com", "type": "A", "alias": alias}),
        )
        .is_ok());

        let err = aws_route53_record(
            &mut synth,
            "both",
            json!({"zone_id": "Z1", "name": "x.example.com", "type": "A", "alias": alias, "records": ["192.0.2.1"], "ttl": 60}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("alias"));

        let err = aws_route53_record(
            &mut synth,
            "neither",
            json!({"zone_id": "Z1", "name": "x.example.com", "type": "A"}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("records"));

        let err = aws_route53_record(
            &mut synth,
            "nottl",
            json!({"zone_id": "Z1", "name": "x.example.com", "type": "TXT", "records": ["hello"]}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("ttl"));
    }

    #[test]
    fn test_record_type_enum() {
        let mut synth = Synthesizer::new();
        let err = aws_route53_record(
            &mut synth,
            "weird",
            json!({"zone_id": "Z1", "name": "x.example.com", "type": "AXFR", "records": ["a"], "ttl": 60}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown variant"));

        let record = aws_route53_record(
            &mut synth,
            "mail",
            json!({"zone_id": "Z1", "name": "example.com", "type": "MX", "records": ["10 mx.example.com"], "ttl": 3600}),
        )
        .unwrap();
        assert_eq!(record.attributes()["type"], "MX");
    }
}
