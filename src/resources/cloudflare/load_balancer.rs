use super::identifier;
use crate::resources::validation::{self, FieldError, FieldResult};
use crate::resources::{default_true, ResourceAttributes, ResourceError, ResourceReference};
use crate::synthesizer::Synthesizer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorType {
    #[default]
    Http,
    Https,
    Tcp,
    UdpIcmp,
    IcmpPing,
    Smtp,
}

impl MonitorType {
    fn is_http(self) -> bool {
        matches!(self, MonitorType::Http | MonitorType::Https)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorHeader {
    pub header: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorAttributes {
    pub account_id: String,
    #[serde(default, rename = "type")]
    pub monitor_type: MonitorType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_codes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_body: Option<String>,
    #[serde(default = "default_interval")]
    pub interval: u32,
    #[serde(default = "default_timeout")]
    pub timeout: u32,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_redirects: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_insecure: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub header: Vec<MonitorHeader>,
}

fn default_interval() -> u32 {
    60
}

fn default_timeout() -> u32 {
    5
}

fn default_retries() -> u32 {
    2
}

impl ResourceAttributes for MonitorAttributes {
    const RESOURCE_TYPE: &'static str = "cloudflare_load_balancer_monitor";
    const OUTPUTS: &'static [&'static str] = &["id", "created_on", "modified_on"];

    fn validate(&self) -> FieldResult {
        identifier("account_id", &self.account_id)?;
        validation::in_range("interval", self.interval, 5, 3600)?;
        validation::in_range("timeout", self.timeout, 1, 10)?;
        validation::in_range("retries", self.retries, 0, 5)?;
        if self.timeout >= self.interval {
            return Err(FieldError::new("timeout", "must be less than interval"));
        }

        if self.monitor_type.is_http() {
            if self.expected_codes.is_none() {
                return Err(FieldError::new(
                    "expected_codes",
                    "is required for http and https monitors",
                ));
            }
        } else {
            let http_only = [
                ("method", self.method.is_some()),
                ("path", self.path.is_some()),
                ("expected_codes", self.expected_codes.is_some()),
                ("expected_body", self.expected_body.is_some()),
                ("follow_redirects", self.follow_redirects.is_some()),
                ("allow_insecure", self.allow_insecure.is_some()),
                ("header", !self.header.is_empty()),
            ];
            if let Some((field, _)) = http_only.iter().find(|(_, set)| *set) {
                return Err(FieldError::new(
                    *field,
                    "only applies to http and https monitors",
                ));
            }
        }
        Ok(())
    }
}

pub fn cloudflare_load_balancer_monitor(
    synth: &mut Synthesizer,
    name: &str,
    attributes: Value,
) -> Result<ResourceReference, ResourceError> {
    synth.declare(name, MonitorAttributes::from_value(attributes)?)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolOrigin {
    pub name: String,
    pub address: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolAttributes {
    pub account_id: String,
    pub name: String,
    pub origins: Vec<PoolOrigin>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_minimum_origins")]
    pub minimum_origins: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_email: Option<String>,
}

fn default_minimum_origins() -> u32 {
    1
}

impl ResourceAttributes for PoolAttributes {
    const RESOURCE_TYPE: &'static str = "cloudflare_load_balancer_pool";
    const OUTPUTS: &'static [&'static str] = &["id", "created_on", "modified_on"];

    fn validate(&self) -> FieldResult {
        identifier("account_id", &self.account_id)?;
        validation::not_blank("name", &self.name)?;
        validation::non_empty("origins", &self.origins)?;

        for origin in &self.origins {
            validation::not_blank("origins.name", &origin.name)?;
            validation::not_blank("origins.address", &origin.address)?;
            validation::in_range("origins.weight", origin.weight, 0.0, 1.0)?;
        }

        let origin_count = self.origins.len() as u32;
        if self.minimum_origins > origin_count {
            return Err(FieldError::new(
                "minimum_origins",
                format!(
                    "{} exceeds the number of origins ({})",
                    self.minimum_origins, origin_count
                ),
            ));
        }
        Ok(())
    }
}

pub fn cloudflare_load_balancer_pool(
    synth: &mut Synthesizer,
    name: &str,
    attributes: Value,
) -> Result<ResourceReference, ResourceError> {
    synth.declare(name, PoolAttributes::from_value(attributes)?)
}

/// The empty string selects Cloudflare's default behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SteeringPolicy {
    Off,
    Geo,
    Random,
    DynamicLatency,
    Proximity,
    LeastOutstandingRequests,
    LeastConnections,
    #[default]
    #[serde(rename = "")]
    Unset,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionAffinity {
    None,
    Cookie,
    IpCookie,
    Header,
    #[default]
    #[serde(rename = "")]
    Unset,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoadBalancerAttributes {
    pub zone_id: String,
    pub name: String,
    pub default_pool_ids: Vec<String>,
    pub fallback_pool_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub proxied: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    #[serde(default)]
    pub steering_policy: SteeringPolicy,
    #[serde(default)]
    pub session_affinity: SessionAffinity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_affinity_ttl: Option<u32>,
}

impl ResourceAttributes for LoadBalancerAttributes {
    const RESOURCE_TYPE: &'static str = "cloudflare_load_balancer";
    const OUTPUTS: &'static [&'static str] = &["id", "created_on", "modified_on"];

    fn validate(&self) -> FieldResult {
        identifier("zone_id", &self.zone_id)?;
        validation::not_blank("name", &self.name)?;
        validation::non_empty("default_pool_ids", &self.default_pool_ids)?;
        validation::not_blank("fallback_pool_id", &self.fallback_pool_id)?;

        if self.proxied && self.ttl.is_some() {
            return Err(FieldError::new("ttl", "cannot be set on proxied load balancers"));
        }
        if let Some(ttl) = self.session_affinity_ttl {
            validation::in_range("session_affinity_ttl", ttl, 1800, 604800)?;
            if matches!(self.session_affinity, SessionAffinity::None | SessionAffinity::Unset) {
                return Err(FieldError::new(
                    "session_affinity_ttl",
                    "requires session_affinity to be enabled",
                ));
            }
        }
        Ok(())
    }
}

pub fn cloudflare_load_balancer(
    synth: &mut Synthesizer,
    name: &str,
    attributes: Value,
) -> Result<ResourceReference, ResourceError> {
    synth.declare(name, LoadBalancerAttributes::from_value(attributes)?)
}
