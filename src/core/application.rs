use crate::commands::{self, CommandContext, CommandKind, CommandOptions};
use crate::config::Config;
use crate::template::TemplateFile;
use std::path::{Path, PathBuf};

/// Parsed command line of one run.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub command: CommandKind,
    pub file: PathBuf,
    pub config: Option<PathBuf>,
    pub namespace: Option<String>,
    pub template: Option<String>,
    pub json: bool,
    pub debug: bool,
    pub auto_approve: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ApplicationError {
    #[error("Template file not found: {0}")]
    FileNotFound(PathBuf),
}

pub struct Application {
    command: CommandKind,
    context: CommandContext,
}

fn absolute(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

impl Application {
    pub fn new(invocation: &Invocation) -> anyhow::Result<Self> {
        let config = match &invocation.config {
            Some(path) => {
                let path = absolute(path)?;
                tracing::info!(path = %path.display(), "using config file");
                Config::load(Some(&path))?
            }
            None => Config::load(None)?,
        };

        let namespace = config.resolve_namespace(invocation.namespace.as_deref())?;
        tracing::info!(namespace = %namespace.name, "resolved namespace");

        let file = absolute(&invocation.file)?;
        if !file.is_file() {
            return Err(ApplicationError::FileNotFound(file).into());
        }
        let file = TemplateFile::load(&file)?;
        tracing::debug!(
            path = %file.path().display(),
            templates = file.templates().len(),
            "loaded template file"
        );

        Ok(Self {
            command: invocation.command,
            context: CommandContext {
                config,
                namespace,
                file,
                options: CommandOptions {
                    template: invocation.template.clone(),
                    json: invocation.json,
                    auto_approve: invocation.auto_approve,
                },
            },
        })
    }

    pub fn context(&self) -> &CommandContext {
        &self.context
    }

    pub async fn execute(&self) -> anyhow::Result<()> {
        tracing::info!(command = self.command.name(), "running command");
        commands::run(self.command, &self.context).await
    }

    /// Run `invocation` to completion and return the process exit code.
    /// Errors are printed to stderr; `--debug` adds the cause chain.
    pub async fn run(invocation: Invocation) -> i32 {
        let result = match Self::new(&invocation) {
            Ok(app) => app.execute().await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("Error: {}", e);
                if invocation.debug {
                    for cause in e.chain().skip(1) {
                        eprintln!("  caused by: {}", cause);
                    }
                }
                1
            }
        }
    }
}
