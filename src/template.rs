//! Template files: named groups of resources compiled into one Terraform
//! JSON document each.

use crate::backends::BackendConfig;
use crate::config::{self, ConfigError};
use crate::resources::{self, ResourceError, ResourceReference};
use crate::synthesizer::Synthesizer;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

static REF_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{ref:([^}]+)\}").expect("Invalid reference regex"));

static INTERPOLATION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([a-z][a-z0-9_]*)\.([a-zA-Z_][a-zA-Z0-9_-]*)\.[^}]+\}")
        .expect("Invalid interpolation regex")
});

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Failed to read template file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse template file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Unsupported template file extension: {0} (expected .yml, .yaml or .json)")]
    UnsupportedFormat(PathBuf),

    #[error("Template file {0} defines no templates")]
    Empty(PathBuf),

    #[error("Unknown template '{0}'")]
    UnknownTemplate(String),

    #[error(transparent)]
    InvalidName(#[from] ConfigError),

    #[error("Template '{template}': {source}")]
    Resource {
        template: String,
        source: ResourceError,
    },

    #[error("Template '{template}': unresolved reference '{reference}'")]
    UnresolvedReference { template: String, reference: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceSpec {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    #[serde(default = "empty_object")]
    pub attributes: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputSpec {
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub sensitive: bool,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TemplateBody {
    #[serde(default)]
    providers: Map<String, Value>,
    #[serde(default)]
    resources: Vec<ResourceSpec>,
    #[serde(default)]
    outputs: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTemplateFile {
    templates: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct Template {
    pub name: String,
    pub providers: Map<String, Value>,
    pub resources: Vec<ResourceSpec>,
    pub outputs: Vec<(String, OutputSpec)>,
}

/// `from` references an output of `to`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ReferenceEdge {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    pub name: String,
    pub document: Value,
    pub references: Vec<ResourceReference>,
    pub edges: Vec<ReferenceEdge>,
}

#[derive(Debug, Clone)]
pub struct TemplateFile {
    path: PathBuf,
    templates: Vec<Template>,
}

impl TemplateFile {
    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        let content = std::fs::read_to_string(path).map_err(|source| TemplateError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        let raw: RawTemplateFile = match extension {
            "yml" | "yaml" => {
                serde_yaml::from_str::<RawTemplateFile>(&content).map_err(|e| e.to_string())
            }
            "json" => {
                serde_json::from_str::<RawTemplateFile>(&content).map_err(|e| e.to_string())
            }
            _ => return Err(TemplateError::UnsupportedFormat(path.to_path_buf())),
        }
        .map_err(|message| TemplateError::Parse {
            path: path.to_path_buf(),
            message,
        })?;

        Self::from_raw(path, raw)
    }

    fn from_raw(path: &Path, raw: RawTemplateFile) -> Result<Self, TemplateError> {
        let parse_error = |message: String| TemplateError::Parse {
            path: path.to_path_buf(),
            message,
        };

        let mut templates = Vec::with_capacity(raw.templates.len());
        for (name, body) in raw.templates {
            config::check_name("template", &name)?;
            let body: TemplateBody = match body {
                Value::Null => TemplateBody::default(),
                body => serde_json::from_value(body)
                    .map_err(|e| parse_error(format!("template '{}': {}", name, e)))?,
            };

            let mut outputs = Vec::with_capacity(body.outputs.len());
            for (output, spec) in body.outputs {
                let spec: OutputSpec = serde_json::from_value(spec).map_err(|e| {
                    parse_error(format!("template '{}' output '{}': {}", name, output, e))
                })?;
                outputs.push((output, spec));
            }

            templates.push(Template {
                name,
                providers: body.providers,
                resources: body.resources,
                outputs,
            });
        }

        if templates.is_empty() {
            return Err(TemplateError::Empty(path.to_path_buf()));
        }
        Ok(Self {
            path: path.to_path_buf(),
            templates,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    pub fn template(&self, name: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.name == name)
    }

    /// The named template, or all of them in file order.
    pub fn select(&self, name: Option<&str>) -> Result<Vec<&Template>, TemplateError> {
        match name {
            Some(name) => self
                .template(name)
                .map(|t| vec![t])
                .ok_or_else(|| TemplateError::UnknownTemplate(name.to_string())),
            None => Ok(self.templates.iter().collect()),
        }
    }

    pub fn compile(
        &self,
        name: &str,
        backend: Option<&BackendConfig>,
    ) -> Result<CompiledTemplate, TemplateError> {
        let template = self
            .template(name)
            .ok_or_else(|| TemplateError::UnknownTemplate(name.to_string()))?;
        template.compile(backend)
    }
}

impl Template {
    pub fn compile(&self, backend: Option<&BackendConfig>) -> Result<CompiledTemplate, TemplateError> {
        let mut synth = Synthesizer::new();
        if let Some(backend) = backend {
            synth.backend(backend.kind(), backend.terraform_config());
        }
        for (provider, config) in &self.providers {
            synth.provider(provider, config.clone());
        }

        let mut edges = BTreeSet::new();
        for spec in &self.resources {
            let address = format!("{}.{}", spec.resource_type, spec.name);
            let attributes = self.resolve(&synth, &spec.attributes)?;
            for to in dependencies(&synth, &attributes) {
                edges.insert(ReferenceEdge {
                    from: address.clone(),
                    to,
                });
            }
            resources::declare(&mut synth, &spec.resource_type, &spec.name, attributes)
                .map_err(|source| self.resource_error(source))?;
        }

        for (name, output) in &self.outputs {
            let value = self.resolve(&synth, &output.value)?;
            synth
                .output(name, value, output.description.as_deref(), output.sensitive)
                .map_err(|source| self.resource_error(source))?;
        }

        tracing::debug!(
            template = %self.name,
            resources = synth.resource_count(),
            "compiled template"
        );

        Ok(CompiledTemplate {
            name: self.name.clone(),
            document: synth.synthesize(),
            references: synth.references().to_vec(),
            edges: edges.into_iter().collect(),
        })
    }

    fn resource_error(&self, source: ResourceError) -> TemplateError {
        TemplateError::Resource {
            template: self.name.clone(),
            source,
        }
    }

    /// Replace `${ref:type.name.output}` with the interpolation string of a
    /// resource declared earlier in this template.
    fn resolve(&self, synth: &Synthesizer, value: &Value) -> Result<Value, TemplateError> {
        match value {
            Value::String(s) => self.resolve_str(synth, s).map(Value::String),
            Value::Array(items) => items
                .iter()
                .map(|item| self.resolve(synth, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::Object(map) => {
                let mut resolved = Map::with_capacity(map.len());
                for (key, item) in map {
                    resolved.insert(key.clone(), self.resolve(synth, item)?);
                }
                Ok(Value::Object(resolved))
            }
            other => Ok(other.clone()),
        }
    }

    fn resolve_str(&self, synth: &Synthesizer, input: &str) -> Result<String, TemplateError> {
        let mut output = String::with_capacity(input.len());
        let mut last = 0;
        for captures in REF_REGEX.captures_iter(input) {
            let (Some(whole), Some(target)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            let interpolation = lookup_output(synth, target.as_str()).ok_or_else(|| {
                TemplateError::UnresolvedReference {
                    template: self.name.clone(),
                    reference: target.as_str().to_string(),
                }
            })?;
            output.push_str(&input[last..whole.start()]);
            output.push_str(interpolation);
            last = whole.end();
        }
        output.push_str(&input[last..]);
        Ok(output)
    }
}

fn lookup_output<'a>(synth: &'a Synthesizer, target: &str) -> Option<&'a str> {
    let mut parts = target.trim().splitn(3, '.');
    let (resource_type, name, output) = (parts.next()?, parts.next()?, parts.next()?);
    synth
        .reference(&format!("{}.{}", resource_type, name))?
        .output(output)
}

/// Addresses of declared resources that `value` interpolates.
fn dependencies(synth: &Synthesizer, value: &Value) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    collect_dependencies(synth, value, &mut found);
    found
}

fn collect_dependencies(synth: &Synthesizer, value: &Value, found: &mut BTreeSet<String>) {
    match value {
        Value::String(s) => {
            for captures in INTERPOLATION_REGEX.captures_iter(s) {
                let address = format!("{}.{}", &captures[1], &captures[2]);
                if synth.reference(&address).is_some() {
                    found.insert(address);
                }
            }
        }
        Value::Array(items) => items
            .iter()
            .for_each(|item| collect_dependencies(synth, item, found)),
        Value::Object(map) => map
            .values()
            .for_each(|item| collect_dependencies(synth, item, found)),
        _ => {}
    }
}
