use super::CommandContext;
use crate::formatters::OutputFormatter;
use anyhow::Result;

/// Compile without touching Terraform or the state backend.
pub fn run(context: &CommandContext) -> Result<()> {
    let mut reports = Vec::new();
    for template in context.templates()? {
        let backend = context.backend_config(&template.name)?;
        let compiled = template.compile(Some(&backend))?;
        reports.push(OutputFormatter::inspect(
            &compiled,
            &backend,
            context.options.json,
        ));
    }
    super::emit(context, reports)
}
