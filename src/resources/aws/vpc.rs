use super::Tags;
use crate::resources::validation::{self, FieldError, FieldResult};
use crate::resources::{default_true, ResourceAttributes, ResourceError, ResourceReference};
use crate::synthesizer::Synthesizer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceTenancy {
    #[default]
    Default,
    Dedicated,
    Host,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VpcAttributes {
    pub cidr_block: String,
    #[serde(default)]
    pub instance_tenancy: InstanceTenancy,
    #[serde(default = "default_true")]
    pub enable_dns_support: bool,
    #[serde(default)]
    pub enable_dns_hostnames: bool,
    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,
}

impl ResourceAttributes for VpcAttributes {
    const RESOURCE_TYPE: &'static str = "aws_vpc";
    const OUTPUTS: &'static [&'static str] = &[
        "id",
        "arn",
        "cidr_block",
        "default_security_group_id",
        "default_route_table_id",
        "main_route_table_id",
        "owner_id",
    ];

    fn validate(&self) -> FieldResult {
        validation::ipv4_cidr("cidr_block", &self.cidr_block)
    }
}

pub fn aws_vpc(
    synth: &mut Synthesizer,
    name: &str,
    attributes: Value,
) -> Result<ResourceReference, ResourceError> {
    synth.declare(name, VpcAttributes::from_value(attributes)?)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubnetAttributes {
    pub vpc_id: String,
    pub cidr_block: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
    #[serde(default)]
    pub map_public_ip_on_launch: bool,
    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,
}

impl ResourceAttributes for SubnetAttributes {
    const RESOURCE_TYPE: &'static str = "aws_subnet";
    const OUTPUTS: &'static [&'static str] =
        &["id", "arn", "availability_zone", "availability_zone_id", "cidr_block", "vpc_id"];

    fn validate(&self) -> FieldResult {
        validation::not_blank("vpc_id", &self.vpc_id)?;
        validation::ipv4_cidr("cidr_block", &self.cidr_block)
    }
}

pub fn aws_subnet(
    synth: &mut Synthesizer,
    name: &str,
    attributes: Value,
) -> Result<ResourceReference, ResourceError> {
    synth.declare(name, SubnetAttributes::from_value(attributes)?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleProtocol {
    #[serde(rename = "tcp")]
    Tcp,
    #[serde(rename = "udp")]
    Udp,
    #[serde(rename = "icmp")]
    Icmp,
    #[serde(rename = "-1")]
    All,
    #[serde(rename = "all")]
    AllNamed,
}

/// Inline ingress/egress rule. Terraform's JSON syntax for these nested
/// blocks wants every argument present, so list fields default to empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecurityGroupRule {
    pub from_port: i32,
    pub to_port: i32,
    pub protocol: RuleProtocol,
    #[serde(default)]
    pub cidr_blocks: Vec<String>,
    #[serde(default)]
    pub ipv6_cidr_blocks: Vec<String>,
    #[serde(default)]
    pub prefix_list_ids: Vec<String>,
    #[serde(default)]
    pub security_groups: Vec<String>,
    #[serde(default, rename = "self")]
    pub self_reference: bool,
    #[serde(default)]
    pub description: String,
}

impl SecurityGroupRule {
    fn validate(&self, field: &str) -> FieldResult {
        validation::in_range(&format!("{}.from_port", field), self.from_port, -1, 65535)?;
        validation::in_range(&format!("{}.to_port", field), self.to_port, -1, 65535)?;
        if self.from_port > self.to_port {
            return Err(FieldError::new(
                field,
                format!(
                    "from_port {} is greater than to_port {}",
                    self.from_port, self.to_port
                ),
            ));
        }
        for cidr in &self.cidr_blocks {
            validation::ipv4_cidr(&format!("{}.cidr_blocks", field), cidr)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecurityGroupAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default = "default_description")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ingress: Vec<SecurityGroupRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub egress: Vec<SecurityGroupRule>,
    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,
}

fn default_description() -> String {
    "Managed by Pangea".to_string()
}

impl ResourceAttributes for SecurityGroupAttributes {
    const RESOURCE_TYPE: &'static str = "aws_security_group";
    const OUTPUTS: &'static [&'static str] = &["id", "arn", "name", "owner_id", "vpc_id"];

    fn validate(&self) -> FieldResult {
        if let Some(name) = &self.name {
            validation::not_blank("name", name)?;
            if name.len() > 255 {
                return Err(FieldError::new("name", "must be at most 255 characters"));
            }
        }
        for (index, rule) in self.ingress.iter().enumerate() {
            rule.validate(&format!("ingress[{}]", index))?;
        }
        for (index, rule) in self.egress.iter().enumerate() {
            rule.validate(&format!("egress[{}]", index))?;
        }
        Ok(())
    }
}

pub fn aws_security_group(
    synth: &mut Synthesizer,
    name: &str,
    attributes: Value,
) -> Result<ResourceReference, ResourceError> {
    synth.declare(name, SecurityGroupAttributes::from_value(attributes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_vpc_defaults() {
        let mut synth = Synthesizer::new();
        let vpc = aws_vpc(&mut synth, "main", json!({"cidr_block": "10.0.0.0/16"})).unwrap();
        let attrs = vpc.attributes();
        assert_eq!(attrs["instance_tenancy"], "default");
        assert_eq!(attrs["enable_dns_support"], true);
        assert_eq!(attrs["enable_dns_hostnames"], false);
        assert!(attrs.get("tags").is_none());
    }

    #[test]
    fn test_vpc_overrides_and_enum() {
        let mut synth = Synthesizer::new();
        let vpc = aws_vpc(
            &mut synth,
            "main",
            json!({"cidr_block": "10.0.0.0/16", "instance_tenancy": "dedicated", "enable_dns_hostnames": true}),
        )
        .unwrap();
        assert_eq!(vpc.attributes()["instance_tenancy"], "dedicated");
        assert_eq!(vpc.attributes()["enable_dns_hostnames"], true);

        let err = aws_vpc(
            &mut synth,
            "other",
            json!({"cidr_block": "10.0.0.0/16", "instance_tenancy": "shared"}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown variant"));
    }

    #[test]
    fn test_vpc_missing_and_unknown_fields() {
        let mut synth = Synthesizer::new();
        let err = aws_vpc(&mut synth, "main", json!({})).unwrap_err();
        assert!(err.to_string().contains("missing field `cidr_block`"));

        let err = aws_vpc(
            &mut synth,
            "main",
            json!({"cidr_block": "10.0.0.0/16", "colour": "blue"}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown field"));

        let err = aws_vpc(&mut synth, "main", json!({"cidr_block": "10.0.0.0/40"})).unwrap_err();
        assert!(err.to_string().contains("cidr_block"));
    }

    #[test]
    fn test_subnet_with_reference() {
        let mut synth = Synthesizer::new();
        let vpc = aws_vpc(&mut synth, "main", json!({"cidr_block": "10.0.0.0/16"})).unwrap();
        let subnet = aws_subnet(
            &mut synth,
            "public",
            json!({"vpc_id": vpc.id(), "cidr_block": "10.0.1.0/24", "map_public_ip_on_launch": true}),
        )
        .unwrap();
        assert_eq!(subnet.attributes()["vpc_id"], "${aws_vpc.main.id}");
        assert_eq!(subnet.output("availability_zone"), Some("${aws_subnet.public.availability_zone}"));
    }

    #[test]
    fn test_security_group_rules() {
        let mut synth = Synthesizer::new();
        let sg = aws_security_group(
            &mut synth,
            "web",
            json!({
                "name": "web",
                "ingress": [{"from_port": 443, "to_port": 443, "protocol": "tcp", "cidr_blocks": ["0.0.0.0/0"]}],
                "egress": [{"from_port": 0, "to_port": 0, "protocol": "-1", "cidr_blocks": ["0.0.0.0/0"]}]
            }),
        )
        .unwrap();
        let attrs = sg.attributes();
        assert_eq!(attrs["description"], "Managed by Pangea");
        assert_eq!(attrs["ingress"][0]["self"], false);
        assert_eq!(attrs["egress"][0]["protocol"], "-1");

        let err = aws_security_group(
            &mut synth,
            "bad",
            json!({"ingress": [{"from_port": 443, "to_port": 80, "protocol": "tcp"}]}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("greater than to_port"));

        let err = aws_security_group(
            &mut synth,
            "bad2",
            json!({"ingress": [{"from_port": 1, "to_port": 2, "protocol": "sctp"}]}),
        )
        .unwrap_err();
        assert!(matches!(err, ResourceError::Validation { .. }));
    }
}
