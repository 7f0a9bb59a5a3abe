use super::Tags;
use crate::resources::validation::{self, FieldError, FieldResult};
use crate::resources::{ResourceAttributes, ResourceError, ResourceReference};
use crate::synthesizer::Synthesizer;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

static SAML_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w+=,.@-]{1,128}$").expect("Invalid SAML provider name regex"));

/// AWS accepts at most five certificate thumbprints per OIDC provider.
const MAX_THUMBPRINTS: usize = 5;
const MAX_CLIENT_IDS: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SamlProviderAttributes {
    pub name: String,
    pub saml_metadata_document: String,
    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,
}

impl ResourceAttributes for SamlProviderAttributes {
    const RESOURCE_TYPE: &'static str = "aws_iam_saml_provider";
    const OUTPUTS: &'static [&'static str] = &["id", "arn", "valid_until"];

    fn validate(&self) -> FieldResult {
        validation::matches(
            "name",
            &self.name,
            &SAML_NAME_REGEX,
            "a valid SAML provider name (1-128 of letters, digits, +=,.@_-)",
        )?;

        let document = &self.saml_metadata_document;
        // file()/templatefile() calls resolve at plan time.
        if validation::is_interpolated(document) {
            return Ok(());
        }
        if !document.contains("EntityDescriptor") {
            return Err(FieldError::new(
                "saml_metadata_document",
                "does not look like SAML metadata (no EntityDescriptor element)",
            ));
        }
        if document.len() > 10_000_000 {
            return Err(FieldError::new(
                "saml_metadata_document",
                "exceeds the 10MB IAM limit",
            ));
        }
        Ok(())
    }
}

pub fn aws_iam_saml_provider(
    synth: &mut Synthesizer,
    name: &str,
    attributes: Value,
) -> Result<ResourceReference, ResourceError> {
    synth.declare(name, SamlProviderAttributes::from_value(attributes)?)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpenIdConnectProviderAttributes {
    pub url: String,
    pub client_id_list: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub thumbprint_list: Vec<String>,
    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,
}

impl ResourceAttributes for OpenIdConnectProviderAttributes {
    const RESOURCE_TYPE: &'static str = "aws_iam_openid_connect_provider";
    const OUTPUTS: &'static [&'static str] = &["id", "arn", "url"];

    fn validate(&self) -> FieldResult {
        if !validation::is_interpolated(&self.url) {
            let Some(host) = self.url.strip_prefix("https://") else {
                return Err(FieldError::new("url", "must start with https://"));
            };
            if host.is_empty() || host.contains(' ') {
                return Err(FieldError::new(
                    "url",
                    format!("'{}' is not a valid issuer URL", self.url),
                ));
            }
        }

        validation::non_empty("client_id_list", &self.client_id_list)?;
        if self.client_id_list.len() > MAX_CLIENT_IDS {
            return Err(FieldError::new(
                "client_id_list",
                format!("accepts at most {} entries", MAX_CLIENT_IDS),
            ));
        }
        for client_id in &self.client_id_list {
            validation::not_blank("client_id_list", client_id)?;
        }

        if self.thumbprint_list.len() > MAX_THUMBPRINTS {
            return Err(FieldError::new(
                "thumbprint_list",
                format!("accepts at most {} thumbprints", MAX_THUMBPRINTS),
            ));
        }
        for thumbprint in &self.thumbprint_list {
            validation::hex("thumbprint_list", thumbprint, 40)?;
        }
        Ok(())
    }
}

pub fn aws_iam_openid_connect_provider(
    synth: &mut Synthesizer,
    name: &str,
    attributes: Value,
) -> Result<ResourceReference, ResourceError> {
    synth.declare(name, OpenIdConnectProviderAttributes::from_value(attributes)?)
}
