use super::{init, with_lock, CommandContext, CommandKind};
use crate::formatters::OutputFormatter;
use crate::terraform::model::DestroySummary;
use crate::terraform::output_parser;
use anyhow::{bail, Result};

pub async fn run(context: &CommandContext) -> Result<()> {
    let auto_approve = context.options.auto_approve;
    let mut reports = Vec::new();

    for template in context.templates()? {
        // Destroy runs against a freshly written configuration.
        let workspace = context.prepare(template)?;
        let executor = context.executor(&workspace)?;
        let backend = context.backend(&workspace).await?;

        let report = with_lock(
            backend.as_ref(),
            context.lock_info(CommandKind::Destroy, &template.name),
            || async {
                init(&executor).await?;
                let result = executor.destroy(auto_approve).await?;

                let summary = if auto_approve {
                    output_parser::parse_destroy_output(&result.stdout)
                } else {
                    DestroySummary {
                        success: result.success,
                        destroyed: None,
                    }
                };
                if !result.success {
                    bail!(
                        "destroy failed for template '{}': {}",
                        workspace.template,
                        output_parser::extract_terraform_error(&result.combined_output())
                    );
                }
                Ok(OutputFormatter::destroy(&workspace.template, &summary))
            },
        )
        .await?;
        reports.push(report);
    }

    super::emit(context, reports)
}
