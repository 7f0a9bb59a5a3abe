use super::identifier;
use crate::resources::validation::{self, FieldError, FieldResult};
use crate::resources::{ResourceAttributes, ResourceError, ResourceReference};
use crate::synthesizer::Synthesizer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// TTL value Cloudflare treats as "automatic".
const AUTOMATIC_TTL: u32 = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZonePlan {
    #[default]
    Free,
    Pro,
    Business,
    Enterprise,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneType {
    #[default]
    Full,
    Partial,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ZoneAttributes {
    pub zone: String,
    pub account_id: String,
    #[serde(default)]
    pub plan: ZonePlan,
    #[serde(default, rename = "type")]
    pub zone_type: ZoneType,
    #[serde(default)]
    pub paused: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jump_start: Option<bool>,
}

impl ResourceAttributes for ZoneAttributes {
    const RESOURCE_TYPE: &'static str = "cloudflare_zone";
    const OUTPUTS: &'static [&'static str] =
        &["id", "name_servers", "status", "verification_key", "vanity_name_servers"];

    fn validate(&self) -> FieldResult {
        validation::domain_name("zone", &self.zone)?;
        identifier("account_id", &self.account_id)
    }
}

pub fn cloudflare_zone(
    synth: &mut Synthesizer,
    name: &str,
    attributes: Value,
) -> Result<ResourceReference, ResourceError> {
    synth.declare(name, ZoneAttributes::from_value(attributes)?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    A,
    Aaaa,
    Cname,
    Mx,
    Txt,
    Ns,
    Srv,
    Caa,
    Ptr,
}

impl RecordType {
    fn proxiable(self) -> bool {
        matches!(self, RecordType::A | RecordType::Aaaa | RecordType::Cname)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordAttributes {
    pub zone_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub value: String,
    #[serde(default = "automatic_ttl")]
    pub ttl: u32,
    #[serde(default)]
    pub proxied: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

fn automatic_ttl() -> u32 {
    AUTOMATIC_TTL
}

impl ResourceAttributes for RecordAttributes {
    const RESOURCE_TYPE: &'static str = "cloudflare_record";
    const OUTPUTS: &'static [&'static str] = &["id", "hostname", "created_on", "modified_on"];

    fn validate(&self) -> FieldResult {
        identifier("zone_id", &self.zone_id)?;
        validation::not_blank("name", &self.name)?;
        validation::not_blank("value", &self.value)?;

        if self.ttl != AUTOMATIC_TTL {
            validation::in_range("ttl", self.ttl, 60, 86400)?;
        }
        if self.proxied {
            if !self.record_type.proxiable() {
                return Err(FieldError::new(
                    "proxied",
                    "only A, AAAA and CNAME records can be proxied",
                ));
            }
            if self.ttl != AUTOMATIC_TTL {
                return Err(FieldError::new("ttl", "must be 1 (automatic) when proxied"));
            }
        }

        match self.record_type {
            RecordType::Mx if self.priority.is_none() => {
                Err(FieldError::new("priority", "is required for MX records"))
            }
            RecordType::A => validation::ipv4("value", &self.value),
            _ => Ok(()),
        }
    }
}

pub fn cloudflare_record(
    synth: &mut Synthesizer,
    name: &str,
    attributes: Value,
) -> Result<ResourceReference, ResourceError> {
    synth.declare(name, RecordAttributes::from_value(attributes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ACCOUNT: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_zone_defaults() {
        let mut synth = Synthesizer::new();
        let zone = cloudflare_zone(
            &mut synth,
            "site",
            json!({"zone": "example.com", "account_id": ACCOUNT}),
        )
        .unwrap();
        assert_eq!(zone.attributes()["plan"], "free");
        assert_eq!(zone.attributes()["type"], "full");
        assert_eq!(zone.attributes()["paused"], false);

        let err = cloudflare_zone(
            &mut synth,
            "other",
            json!({"zone": "example.org", "account_id": ACCOUNT, "plan": "platinum"}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown variant"));
    }

    #[test]
    fn test_record_with_zone_reference() {
        let mut synth = Synthesizer::new();
        let zone = cloudflare_zone(
            &mut synth,
            "site",
            json!({"zone": "example.com", "account_id": ACCOUNT}),
        )
        .unwrap();
        let record = cloudflare_record(
            &mut synth,
            "www",
            json!({"zone_id": zone.id(), "name": "www", "type": "A", "value": "192.0.2.1", "proxied": true}),
        )
        .unwrap();
        assert_eq!(record.attributes()["zone_id"], "${cloudflare_zone.site.id}");
        assert_eq!(record.attributes()["ttl"], 1);
    }

    #[test]
    fn test_record_rules() {
        let mut synth = Synthesizer::new();
        let err = cloudflare_record(
            &mut synth,
            "txt",
            json!({"zone_id": ACCOUNT, "name": "x", "type": "TXT", "value": "v=spf1", "proxied": true}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("proxied"));

        let err = cloudflare_record(
            &mut synth,
            "ttl",
            json!({"zone_id": ACCOUNT, "name": "x", "type": "TXT", "value": "v", "ttl": 30}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("ttl"));

        let err = cloudflare_record(
            &mut synth,
            "mx",
            json!({"zone_id": ACCOUNT, "name": "@", "type": "MX", "value": "mx.example.com", "ttl": 3600}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("priority"));

        let err = cloudflare_record(
            &mut synth,
            "zone",
            json!({"zone_id": "short", "name": "x", "type": "A", "value": "192.0.2.1"}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("zone_id"));
    }
}
