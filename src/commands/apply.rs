use super::{init, with_lock, CommandContext, CommandKind};
use crate::formatters::OutputFormatter;
use crate::terraform::model::ApplySummary;
use crate::terraform::output_parser;
use anyhow::{bail, Result};

pub async fn run(context: &CommandContext) -> Result<()> {
    let auto_approve = context.options.auto_approve;
    let mut reports = Vec::new();

    for template in context.templates()? {
        let workspace = context.prepare(template)?;
        let executor = context.executor(&workspace)?;
        let backend = context.backend(&workspace).await?;

        let report = with_lock(
            backend.as_ref(),
            context.lock_info(CommandKind::Apply, &template.name),
            || async {
                init(&executor).await?;
                let result = executor.apply(auto_approve).await?;

                let summary = if auto_approve {
                    output_parser::parse_apply_output(&result.stdout)
                } else {
                    // Interactive runs are not captured.
                    ApplySummary {
                        success: result.success,
                        ..ApplySummary::default()
                    }
                };
                if !result.success {
                    bail!(
                        "apply failed for template '{}': {}",
                        workspace.template,
                        output_parser::extract_terraform_error(&result.combined_output())
                    );
                }

                let outputs = executor.output_json().await?;
                let outputs = if outputs.success {
                    serde_json::from_str(&outputs.stdout).ok()
                } else {
                    tracing::warn!(template = %workspace.template, "could not read outputs");
                    None
                };
                Ok(OutputFormatter::apply(&workspace.template, &summary, outputs))
            },
        )
        .await?;
        reports.push(report);
    }

    super::emit(context, reports)
}
