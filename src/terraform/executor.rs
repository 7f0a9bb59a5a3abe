use crate::terraform::model::ExecutionResult;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;

/// Binaries probed on `PATH`, in order, when none is configured.
const DEFAULT_BINARIES: &[&str] = &["tofu", "terraform"];

pub const BINARY_ENV_VAR: &str = "PANGEA_TERRAFORM_BINARY";

#[derive(Error, Debug)]
pub enum TerraformError {
    #[error("Terraform binary not found: {0}")]
    BinaryNotFound(String),

    #[error("Failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Runs the external Terraform/OpenTofu binary inside one workspace directory.
#[derive(Debug, Clone)]
pub struct TerraformExecutor {
    binary: PathBuf,
    working_directory: PathBuf,
}

impl TerraformExecutor {
    pub fn new(binary: PathBuf, working_directory: PathBuf) -> Self {
        tracing::debug!(
            binary = %binary.display(),
            working_directory = %working_directory.display(),
            "TerraformExecutor initialized"
        );
        Self {
            binary,
            working_directory,
        }
    }

    /// Resolve the binary: explicit setting, then `PANGEA_TERRAFORM_BINARY`,
    /// then the first of `tofu`/`terraform` on `PATH`.
    pub fn locate_binary(configured: Option<&str>) -> Result<PathBuf, TerraformError> {
        let requested = configured
            .map(str::to_string)
            .or_else(|| std::env::var(BINARY_ENV_VAR).ok())
            .filter(|name| !name.trim().is_empty());

        if let Some(name) = requested {
            let path = PathBuf::from(&name);
            if path.is_absolute() {
                if path.exists() {
                    return Ok(path);
                }
                return Err(TerraformError::BinaryNotFound(name));
            }
            return which::which(&name).map_err(|_| TerraformError::BinaryNotFound(name));
        }

        DEFAULT_BINARIES
            .iter()
            .find_map(|name| which::which(name).ok())
            .ok_or_else(|| TerraformError::BinaryNotFound(DEFAULT_BINARIES.join(" or ")))
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    /// Run one subcommand and capture its output. A non-zero exit is a normal
    /// result, not an error.
    pub async fn run(&self, args: &[&str]) -> Result<ExecutionResult, TerraformError> {
        let command_line = format!("{} {}", self.binary.display(), args.join(" "));
        tracing::debug!(command = %command_line, "running terraform");

        let output = Command::new(&self.binary)
            .args(args)
            .current_dir(&self.working_directory)
            .env("TF_IN_AUTOMATION", "1")
            .output()
            .await
            .map_err(|source| TerraformError::Spawn {
                command: command_line.clone(),
                source,
            })?;

        let result = ExecutionResult {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        if result.success {
            tracing::debug!(command = %command_line, "terraform finished");
        } else {
            tracing::warn!(
                command = %command_line,
                exit_code = ?result.exit_code,
                "terraform exited with failure"
            );
        }

        Ok(result)
    }

    /// Run with the terminal attached so Terraform can prompt for approval.
    /// Nothing is captured.
    pub async fn run_interactive(&self, args: &[&str]) -> Result<ExecutionResult, TerraformError> {
        let command_line = format!("{} {}", self.binary.display(), args.join(" "));
        tracing::debug!(command = %command_line, "running terraform interactively");

        let status = Command::new(&self.binary)
            .args(args)
            .current_dir(&self.working_directory)
            .status()
            .await
            .map_err(|source| TerraformError::Spawn {
                command: command_line,
                source,
            })?;

        Ok(ExecutionResult {
            success: status.success(),
            exit_code: status.code(),
            stdout: String::new(),
            stderr: String::new(),
        })
    }

    pub async fn init(&self) -> Result<ExecutionResult, TerraformError> {
        self.run(&["init", "-input=false", "-no-color"]).await
    }

    pub async fn plan(&self) -> Result<ExecutionResult, TerraformError> {
        self.run(&["plan", "-input=false", "-no-color"]).await
    }

    pub async fn apply(&self, auto_approve: bool) -> Result<ExecutionResult, TerraformError> {
        if auto_approve {
            self.run(&["apply", "-input=false", "-no-color", "-auto-approve"])
                .await
        } else {
            self.run_interactive(&["apply", "-no-color"]).await
        }
    }

    pub async fn destroy(&self, auto_approve: bool) -> Result<ExecutionResult, TerraformError> {
        if auto_approve {
            self.run(&["destroy", "-input=false", "-no-color", "-auto-approve"])
                .await
        } else {
            self.run_interactive(&["destroy", "-no-color"]).await
        }
    }

    pub async fn version(&self) -> Result<ExecutionResult, TerraformError> {
        self.run(&["version", "-json"]).await
    }

    pub async fn validate(&self) -> Result<ExecutionResult, TerraformError> {
        self.run(&["validate", "-json", "-no-color"]).await
    }

    pub async fn output_json(&self) -> Result<ExecutionResult, TerraformError> {
        self.run(&["output", "-json"]).await
    }
}
