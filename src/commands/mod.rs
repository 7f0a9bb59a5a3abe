//! CLI commands. Each one runs its templates strictly one after another.

pub mod agent;
pub mod apply;
pub mod destroy;
pub mod inspect;
pub mod plan;

use crate::backends::{self, BackendConfig, StateBackend};
use crate::config::{Config, ResolvedNamespace};
use crate::template::{CompiledTemplate, Template, TemplateFile};
use crate::terraform::executor::TerraformExecutor;
use crate::terraform::model::ExecutionResult;
use crate::terraform::output_parser;
use anyhow::{bail, Context as _, Result};
use serde_json::{json, Value};
use std::future::Future;
use std::path::PathBuf;

pub const WORKSPACE_FILE: &str = "main.tf.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Plan,
    Apply,
    Destroy,
    Inspect,
    Agent,
}

impl CommandKind {
    pub fn name(self) -> &'static str {
        match self {
            CommandKind::Plan => "plan",
            CommandKind::Apply => "apply",
            CommandKind::Destroy => "destroy",
            CommandKind::Inspect => "inspect",
            CommandKind::Agent => "agent",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandOptions {
    pub template: Option<String>,
    pub json: bool,
    pub auto_approve: bool,
}

/// Everything a command needs, resolved once per invocation.
pub struct CommandContext {
    pub config: Config,
    pub namespace: ResolvedNamespace,
    pub file: TemplateFile,
    pub options: CommandOptions,
}

/// A template compiled and written to its workspace directory.
pub struct Workspace {
    pub template: String,
    pub directory: PathBuf,
    pub backend: BackendConfig,
    pub compiled: CompiledTemplate,
}

impl CommandContext {
    pub fn templates(&self) -> Result<Vec<&Template>> {
        Ok(self.file.select(self.options.template.as_deref())?)
    }

    pub fn workspace_dir(&self, template: &str) -> Result<PathBuf> {
        Ok(self.config.workspace_dir(&self.namespace.name, template)?)
    }

    pub fn backend_config(&self, template: &str) -> Result<BackendConfig> {
        let directory = self.workspace_dir(template)?;
        Ok(self
            .namespace
            .namespace
            .state
            .backend_config(&self.namespace.name, template, &directory))
    }

    /// Compile `template` and write `main.tf.json` into its workspace.
    pub fn prepare(&self, template: &Template) -> Result<Workspace> {
        let directory = self.workspace_dir(&template.name)?;
        let backend = self.backend_config(&template.name)?;
        let compiled = template.compile(Some(&backend))?;

        std::fs::create_dir_all(&directory)
            .with_context(|| format!("Failed to create workspace {}", directory.display()))?;
        let path = directory.join(WORKSPACE_FILE);
        let body = serde_json::to_string_pretty(&compiled.document)?;
        std::fs::write(&path, body)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!(template = %template.name, path = %path.display(), "wrote workspace");

        Ok(Workspace {
            template: template.name.clone(),
            directory,
            backend,
            compiled,
        })
    }

    pub fn executor(&self, workspace: &Workspace) -> Result<TerraformExecutor> {
        let binary = TerraformExecutor::locate_binary(self.config.terraform.binary.as_deref())?;
        Ok(TerraformExecutor::new(binary, workspace.directory.clone()))
    }

    /// Build and initialize the state backend of `workspace`.
    pub async fn backend(&self, workspace: &Workspace) -> Result<Box<dyn StateBackend>> {
        let backend = backends::create(&workspace.backend).await?;
        if !backend.configured().await {
            tracing::info!(backend = %workspace.backend.describe(), "initializing state backend");
            backend.initialize().await?;
        }
        Ok(backend)
    }

    pub fn lock_info(&self, command: CommandKind, template: &str) -> Value {
        json!({
            "operation": command.name(),
            "namespace": self.namespace.name,
            "template": template,
            "who": std::env::var("USER").unwrap_or_default(),
            "version": env!("CARGO_PKG_VERSION")
        })
    }
}

/// Take the state lock once, run `operation`, and release the lock whether
/// or not the operation succeeded.
pub async fn with_lock<T, F, Fut>(
    backend: &dyn StateBackend,
    info: Value,
    operation: F,
) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let lock_id = format!(
        "{}-{}",
        std::process::id(),
        chrono::Utc::now().timestamp_micros()
    );

    if !backend.lock(&lock_id, info).await {
        match backend.lock_info().await {
            Some(holder) => bail!(
                "state is locked (held by {} since {}, pid {})",
                holder.id,
                holder.created.to_rfc3339(),
                holder.pid
            ),
            None => bail!("state is locked"),
        }
    }
    tracing::debug!(lock_id = %lock_id, "state locked");

    let result = operation().await;

    if !backend.unlock(&lock_id).await {
        tracing::warn!(lock_id = %lock_id, "failed to release state lock");
    }
    result
}

/// `init` the workspace, failing with Terraform's own error text.
pub async fn init(executor: &TerraformExecutor) -> Result<()> {
    let version = executor.version().await?;
    let binary = executor.binary().display();
    match output_parser::parse_version_output(&version.stdout) {
        Some(version) => tracing::info!(%binary, %version, "terraform"),
        None => tracing::debug!(%binary, "unknown terraform version"),
    }

    let result = executor.init().await?;
    ensure_success("init", &result)
}

/// `validate` the written configuration.
pub async fn validate(executor: &TerraformExecutor) -> Result<()> {
    let result = executor.validate().await?;
    let summary = output_parser::parse_validate_output(&result.stdout);
    for message in &summary.messages {
        tracing::debug!("validate: {}", message);
    }
    if !summary.valid {
        bail!(
            "terraform validate found {} error(s): {}",
            summary.error_count,
            summary.messages.join("; ")
        );
    }
    Ok(())
}

pub fn ensure_success(step: &str, result: &ExecutionResult) -> Result<()> {
    if result.success {
        return Ok(());
    }
    bail!(
        "terraform {} failed: {}",
        step,
        output_parser::extract_terraform_error(&result.combined_output())
    )
}

/// Print the reports of one run as JSON or text.
pub fn emit(context: &CommandContext, reports: Vec<Value>) -> Result<()> {
    if context.options.json {
        let envelope = crate::formatters::OutputFormatter::envelope(
            &context.namespace.name,
            &context.file.path().display().to_string(),
            reports,
        );
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    } else {
        for report in &reports {
            print!("{}", crate::formatters::OutputFormatter::render_text(report));
        }
    }
    Ok(())
}

pub async fn run(command: CommandKind, context: &CommandContext) -> Result<()> {
    match command {
        CommandKind::Plan => plan::run(context).await,
        CommandKind::Apply => apply::run(context).await,
        CommandKind::Destroy => destroy::run(context).await,
        CommandKind::Inspect => inspect::run(context),
        CommandKind::Agent => agent::run(context),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::LocalBackend;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_with_lock_releases_after_failure() {
        let dir = TempDir::new().unwrap();
        let backend = LocalBackend::new(dir.path().join("terraform.tfstate"));

        let result: Result<()> = with_lock(&backend, json!({}), || async {
            bail!("terraform apply failed")
        })
        .await;
        assert!(result.is_err());
        assert!(!backend.locked().await);
    }

    #[tokio::test]
    async fn test_with_lock_refuses_when_held() {
        let dir = TempDir::new().unwrap();
        let backend = LocalBackend::new(dir.path().join("terraform.tfstate"));
        assert!(backend.lock("someone-else", json!({})).await);

        let ran = AtomicBool::new(false);
        let err = with_lock(&backend, json!({}), || async {
            ran.store(true, Ordering::SeqCst);
            Ok(())
        })
        .await
        .unwrap_err();

        assert!(err.to_string().starts_with("state is locked"));
        assert!(!ran.load(Ordering::SeqCst));
        assert!(backend.locked().await);
    }

    #[test]
    fn test_ensure_success_uses_terraform_error() {
        let failed = ExecutionResult {
            success: false,
            exit_code: Some(1),
            stdout: String::new(),
            stderr: "Error: Invalid provider configuration\n".to_string(),
        };
        let err = ensure_success("plan", &failed).unwrap_err();
        assert_eq!(
            err.to_string(),
            "terraform plan failed: Invalid provider configuration"
        );
    }
}
