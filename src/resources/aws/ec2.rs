use super::Tags;
use crate::resources::validation::{self, FieldError, FieldResult};
use crate::resources::{default_true, ResourceAttributes, ResourceError, ResourceReference};
use crate::synthesizer::Synthesizer;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

static AMI_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ami-[0-9a-f]{8,17}$").expect("Invalid AMI regex"));

static INSTANCE_TYPE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z][a-z0-9-]*\.[a-z0-9]+$").expect("Invalid instance type regex")
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeType {
    Gp2,
    #[default]
    Gp3,
    Io1,
    Io2,
    St1,
    Sc1,
    Standard,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RootBlockDevice {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_size: Option<u32>,
    #[serde(default)]
    pub volume_type: VolumeType,
    #[serde(default = "default_true")]
    pub encrypted: bool,
    #[serde(default = "default_true")]
    pub delete_on_termination: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iops: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstanceAttributes {
    pub ami: String,
    pub instance_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vpc_security_group_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub associate_public_ip_address: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iam_instance_profile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
    #[serde(default)]
    pub monitoring: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_block_device: Option<RootBlockDevice>,
    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,
}

impl ResourceAttributes for InstanceAttributes {
    const RESOURCE_TYPE: &'static str = "aws_instance";
    const OUTPUTS: &'static [&'static str] = &[
        "id",
        "arn",
        "public_ip",
        "private_ip",
        "public_dns",
        "private_dns",
        "primary_network_interface_id",
    ];

    fn validate(&self) -> FieldResult {
        validation::matches("ami", &self.ami, &AMI_REGEX, "a valid AMI id (ami-xxxxxxxx)")?;
        validation::matches(
            "instance_type",
            &self.instance_type,
            &INSTANCE_TYPE_REGEX,
            "a valid instance type (family.size)",
        )?;

        if let Some(device) = &self.root_block_device {
            if let Some(size) = device.volume_size {
                validation::in_range("root_block_device.volume_size", size, 1, 16384)?;
            }
            let provisioned = matches!(device.volume_type, VolumeType::Io1 | VolumeType::Io2);
            if provisioned && device.iops.is_none() {
                return Err(FieldError::new(
                    "root_block_device.iops",
                    "is required for io1/io2 volumes",
                ));
            }
        }
        Ok(())
    }
}

pub fn aws_instance(
    synth: &mut Synthesizer,
    name: &str,
    attributes: Value,
) -> Result<ResourceReference, ResourceError> {
    synth.declare(name, InstanceAttributes::from_value(attributes)?)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GatewayType {
    #[default]
    #[serde(rename = "ipsec.1")]
    Ipsec1,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CustomerGatewayAttributes {
    pub bgp_asn: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, rename = "type")]
    pub gateway_type: GatewayType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,
}

impl ResourceAttributes for CustomerGatewayAttributes {
    const RESOURCE_TYPE: &'static str = "aws_customer_gateway";
    const OUTPUTS: &'static [&'static str] = &["id", "arn", "bgp_asn", "ip_address", "type"];

    fn validate(&self) -> FieldResult {
        validation::bgp_asn("bgp_asn", self.bgp_asn)?;

        match (&self.ip_address, &self.certificate_arn) {
            (None, None) => Err(FieldError::new(
                "ip_address",
                "either ip_address or certificate_arn is required",
            )),
            (ip_address, certificate_arn) => {
                if let Some(ip_address) = ip_address {
                    validation::ipv4("ip_address", ip_address)?;
                }
                if let Some(arn) = certificate_arn {
                    validation::arn("certificate_arn", arn)?;
                }
                Ok(())
            }
        }
    }
}

pub fn aws_customer_gateway(
    synth: &mut Synthesizer,
    name: &str,
    attributes: Value,
) -> Result<ResourceReference, ResourceError> {
    synth.declare(name, CustomerGatewayAttributes::from_value(attributes)?)
}
