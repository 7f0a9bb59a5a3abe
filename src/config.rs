//! `pangea.yml` loading and namespace resolution.

use crate::backends::{BackendConfig, LocalConfig, S3Config};
use crate::resources::validation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_ENV_VAR: &str = "PANGEA_CONFIG";
pub const NAMESPACE_ENV_VAR: &str = "PANGEA_NAMESPACE";
pub const DEFAULT_NAMESPACE: &str = "default";

const CONFIG_FILE_NAMES: &[&str] = &["pangea.yml", "pangea.yaml"];
const STATE_FILE_NAME: &str = "terraform.tfstate";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("Unknown namespace '{0}'")]
    UnknownNamespace(String),

    #[error("Multiple namespaces configured ({0}); pass --namespace or set default_namespace")]
    AmbiguousNamespace(String),

    #[error("Could not determine the home directory")]
    NoHomeDirectory,

    #[error("Invalid {kind} name '{name}': use letters, digits, '_' and '-', starting with a letter or '_'")]
    InvalidName { kind: &'static str, name: String },
}

/// Namespace and template names become workspace directories, so both follow
/// the Terraform label rule and can never climb out of the workspace root.
pub fn check_name(kind: &'static str, name: &str) -> Result<(), ConfigError> {
    validation::resource_name(name).map_err(|_| ConfigError::InvalidName {
        kind,
        name: name.to_string(),
    })
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_namespace: Option<String>,
    #[serde(default)]
    pub namespaces: BTreeMap<String, Namespace>,
    #[serde(default)]
    pub terraform: TerraformConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TerraformConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Namespace {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub state: StateConfig,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

/// State section of a namespace as written in `pangea.yml`. Keys and paths
/// left out are derived per template by [`StateConfig::backend_config`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", deny_unknown_fields)]
pub enum StateConfig {
    S3 {
        bucket: String,
        #[serde(default)]
        key: Option<String>,
        region: String,
        #[serde(default)]
        dynamodb_table: Option<String>,
        #[serde(default = "crate::resources::default_true")]
        encrypt: bool,
    },
    Local {
        #[serde(default)]
        path: Option<PathBuf>,
    },
}

impl StateConfig {
    pub fn backend_config(&self, namespace: &str, template: &str, workspace: &Path) -> BackendConfig {
        match self {
            StateConfig::S3 {
                bucket,
                key,
                region,
                dynamodb_table,
                encrypt,
            } => BackendConfig::S3(S3Config {
                bucket: bucket.clone(),
                key: key.clone().unwrap_or_else(|| {
                    format!("pangea/{}/{}/{}", namespace, template, STATE_FILE_NAME)
                }),
                region: region.clone(),
                dynamodb_table: dynamodb_table.clone(),
                encrypt: *encrypt,
            }),
            StateConfig::Local { path } => BackendConfig::Local(LocalConfig {
                path: path
                    .clone()
                    .unwrap_or_else(|| workspace.join(STATE_FILE_NAME)),
            }),
        }
    }
}

/// A namespace picked for one command run.
#[derive(Debug, Clone)]
pub struct ResolvedNamespace {
    pub name: String,
    pub namespace: Namespace,
}

impl Config {
    /// Load the first config file found. `explicit` is the `--config`
    /// argument (or `PANGEA_CONFIG`) and must exist when given.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_path(path);
        }
        match Self::discover() {
            Some(path) => Self::from_path(&path),
            None => {
                tracing::debug!("no pangea.yml found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loading configuration");
        let config = Self::from_yaml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for name in self.namespaces.keys() {
            check_name("namespace", name)?;
        }
        Ok(())
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    fn discover() -> Option<PathBuf> {
        let local = CONFIG_FILE_NAMES.iter().map(PathBuf::from);
        let home = dirs::home_dir().map(|home| home.join(".pangea").join(CONFIG_FILE_NAMES[0]));
        local.chain(home).find(|candidate| candidate.is_file())
    }

    /// Pick the namespace for this run: the requested one, then
    /// `default_namespace`, then the only configured one. With no namespaces
    /// configured a local `default` namespace is used.
    pub fn resolve_namespace(&self, requested: Option<&str>) -> Result<ResolvedNamespace, ConfigError> {
        let name = match requested.or(self.default_namespace.as_deref()) {
            Some(name) => name.to_string(),
            None if self.namespaces.is_empty() => {
                return Ok(ResolvedNamespace {
                    name: DEFAULT_NAMESPACE.to_string(),
                    namespace: Namespace {
                        description: Some("Local state in the workspace directory".to_string()),
                        state: StateConfig::Local { path: None },
                        tags: BTreeMap::new(),
                    },
                });
            }
            None if self.namespaces.len() == 1 => self
                .namespaces
                .keys()
                .next()
                .cloned()
                .ok_or_else(|| ConfigError::UnknownNamespace(String::new()))?,
            None => {
                let names: Vec<&str> = self.namespaces.keys().map(String::as_str).collect();
                return Err(ConfigError::AmbiguousNamespace(names.join(", ")));
            }
        };

        if self.namespaces.is_empty() && name == DEFAULT_NAMESPACE {
            return self.resolve_namespace(None);
        }

        let namespace = self
            .namespaces
            .get(&name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownNamespace(name.clone()))?;
        Ok(ResolvedNamespace { name, namespace })
    }

    /// Configured root with a leading `~` expanded, else `~/.pangea/workspaces`.
    pub fn workspace_root(&self) -> Result<PathBuf, ConfigError> {
        let home = || dirs::home_dir().ok_or(ConfigError::NoHomeDirectory);
        match &self.terraform.workspace_root {
            Some(root) => match root.strip_prefix("~") {
                Ok(rest) => Ok(home()?.join(rest)),
                Err(_) => Ok(root.clone()),
            },
            None => Ok(home()?.join(".pangea").join("workspaces")),
        }
    }

    /// `<workspace_root>/<namespace>/<template>`
    pub fn workspace_dir(&self, namespace: &str, template: &str) -> Result<PathBuf, ConfigError> {
        check_name("namespace", namespace)?;
        check_name("template", template)?;
        Ok(self.workspace_root()?.join(namespace).join(template))
    }
}

/// Resource types whose synthesis fixtures are exercised, from
/// `synthesizer-tests.yaml`. An empty list enables every type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SynthesizerTests {
    #[serde(default)]
    pub enabled: Vec<String>,
}

impl SynthesizerTests {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn is_enabled(&self, resource_type: &str) -> bool {
        self.enabled.is_empty() || self.enabled.iter().any(|t| t == resource_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TWO_NAMESPACES: &str = r#"
default_namespace: staging
namespaces:
  staging:
    description: Staging account
    state:
      type: s3
      bucket: pangea-staging-state
      region: us-east-1
      dynamodb_table: pangea-locks
    tags:
      env: staging
  dev:
    state:
      type: local
terraform:
  binary: tofu
  workspace_root: /tmp/pangea-workspaces
"#;

    #[test]
    fn test_parse_config() {
        let config = Config::from_yaml(TWO_NAMESPACES).unwrap();
        assert_eq!(config.default_namespace.as_deref(), Some("staging"));
        assert_eq!(config.namespaces.len(), 2);
        assert_eq!(config.terraform.binary.as_deref(), Some("tofu"));

        let staging = &config.namespaces["staging"];
        assert_eq!(staging.tags["env"], "staging");
        assert!(matches!(
            staging.state,
            StateConfig::S3 { encrypt: true, key: None, .. }
        ));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(Config::from_yaml("namespaces: {}\nextra: 1\n").is_err());
        assert!(Config::from_yaml("namespaces:\n  a:\n    state:\n      type: gcs\n").is_err());
    }

    #[test]
    fn test_namespace_resolution_order() {
        let config = Config::from_yaml(TWO_NAMESPACES).unwrap();
        assert_eq!(config.resolve_namespace(Some("dev")).unwrap().name, "dev");
        assert_eq!(config.resolve_namespace(None).unwrap().name, "staging");
        assert!(matches!(
            config.resolve_namespace(Some("prod")),
            Err(ConfigError::UnknownNamespace(ref n)) if n == "prod"
        ));

        let mut no_default = config.clone();
        no_default.default_namespace = None;
        assert!(matches!(
            no_default.resolve_namespace(None),
            Err(ConfigError::AmbiguousNamespace(_))
        ));

        no_default.namespaces.remove("staging");
        assert_eq!(no_default.resolve_namespace(None).unwrap().name, "dev");
    }

    #[test]
    fn test_builtin_default_namespace() {
        let config = Config::default();
        let resolved = config.resolve_namespace(None).unwrap();
        assert_eq!(resolved.name, DEFAULT_NAMESPACE);
        assert_eq!(resolved.namespace.state, StateConfig::Local { path: None });
        assert_eq!(
            config.resolve_namespace(Some(DEFAULT_NAMESPACE)).unwrap().name,
            DEFAULT_NAMESPACE
        );
        assert!(config.resolve_namespace(Some("other")).is_err());
    }

    #[test]
    fn test_backend_config_defaults() {
        let config = Config::from_yaml(TWO_NAMESPACES).unwrap();
        let workspace = config.workspace_dir("staging", "network").unwrap();
        assert_eq!(workspace, PathBuf::from("/tmp/pangea-workspaces/staging/network"));

        match config.namespaces["staging"]
            .state
            .backend_config("staging", "network", &workspace)
        {
            BackendConfig::S3(s3) => {
                assert_eq!(s3.key, "pangea/staging/network/terraform.tfstate");
                assert_eq!(s3.dynamodb_table.as_deref(), Some("pangea-locks"));
            }
            other => panic!("expected s3 backend, got {:?}", other),
        }

        match config.namespaces["dev"]
            .state
            .backend_config("dev", "network", &workspace)
        {
            BackendConfig::Local(local) => {
                assert_eq!(local.path, workspace.join("terraform.tfstate"));
            }
            other => panic!("expected local backend, got {:?}", other),
        }
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pangea.yml");
        std::fs::write(&path, TWO_NAMESPACES).unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.namespaces.len(), 2);

        let missing = dir.path().join("missing.yml");
        assert!(matches!(
            Config::load(Some(&missing)),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_workspace_root_expands_home() {
        let config = Config::from_yaml("terraform:\n  workspace_root: ~/ws\n").unwrap();
        let root = config.workspace_root().unwrap();
        assert!(root.ends_with("ws"));
        assert!(!root.starts_with("~"));

        let config = Config::from_yaml("terraform:\n  workspace_root: /srv/ws\n").unwrap();
        assert_eq!(
            config.workspace_dir("dev", "network").unwrap(),
            PathBuf::from("/srv/ws/dev/network")
        );
    }

    #[test]
    fn test_path_escaping_names_rejected() {
        let config = Config::from_yaml("terraform:\n  workspace_root: /srv/ws\n").unwrap();
        for (namespace, template) in [("dev", "../x"), ("../x", "app"), ("dev", "a/b"), ("dev", "")] {
            let err = config.workspace_dir(namespace, template).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidName { .. }));
        }

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pangea.yml");
        std::fs::write(&path, "namespaces:\n  ../prod:\n    state:\n      type: local\n").unwrap();
        let err = Config::from_path(&path).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidName { kind: "namespace", ref name } if name == "../prod"
        ));
    }

    #[test]
    fn test_synthesizer_tests() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("synthesizer-tests.yaml");

        std::fs::write(&path, "enabled:\n  - aws_vpc\n  - cloudflare_zone\n").unwrap();
        let tests = SynthesizerTests::load(&path).unwrap();
        assert!(tests.is_enabled("aws_vpc"));
        assert!(!tests.is_enabled("aws_instance"));

        std::fs::write(&path, "enabled: []\n").unwrap();
        assert!(SynthesizerTests::load(&path).unwrap().is_enabled("aws_instance"));
    }
}
