use super::{ensure_success, init, validate, with_lock, CommandContext, CommandKind};
use crate::formatters::OutputFormatter;
use crate::terraform::output_parser;
use anyhow::Result;

pub async fn run(context: &CommandContext) -> Result<()> {
    let mut reports = Vec::new();

    for template in context.templates()? {
        let workspace = context.prepare(template)?;
        let executor = context.executor(&workspace)?;
        let backend = context.backend(&workspace).await?;

        let report = with_lock(
            backend.as_ref(),
            context.lock_info(CommandKind::Plan, &template.name),
            || async {
                init(&executor).await?;
                validate(&executor).await?;
                let result = executor.plan().await?;
                ensure_success("plan", &result)?;

                let changes = output_parser::parse_plan_output(&result.stdout);
                let summary = output_parser::parse_plan_summary(&result.stdout);
                tracing::info!(
                    template = %workspace.template,
                    changes = changes.total(),
                    "plan finished"
                );
                Ok(OutputFormatter::plan(&workspace.template, &changes, summary))
            },
        )
        .await?;
        reports.push(report);
    }

    super::emit(context, reports)
}
