use super::CommandContext;
use crate::formatters::OutputFormatter;
use anyhow::Result;
use serde_json::{json, Value};

/// Machine-readable description of every selected template. Compile errors
/// are reported per template instead of failing the command.
pub fn report(context: &CommandContext) -> Result<Value> {
    let mut templates = Vec::new();
    for template in context.templates()? {
        let backend = context.backend_config(&template.name)?;
        let compiled = template.compile(Some(&backend));
        if let Err(e) = &compiled {
            tracing::debug!(template = %template.name, "compile failed: {}", e);
        }
        templates.push(OutputFormatter::agent_template(
            &template.name,
            compiled.as_ref().map_err(|e| e.to_string()),
            &backend,
        ));
    }

    let valid = templates.iter().all(|t| t["valid"] == true);
    Ok(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "file": context.file.path().display().to_string(),
        "namespace": {
            "name": context.namespace.name,
            "description": context.namespace.namespace.description,
            "tags": context.namespace.namespace.tags
        },
        "valid": valid,
        "templates": templates
    }))
}

pub fn run(context: &CommandContext) -> Result<()> {
    let report = report(context)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
