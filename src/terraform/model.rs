use serde::{Deserialize, Serialize};

/// Raw outcome of one Terraform/OpenTofu invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ExecutionResult {
    /// Combined output, stdout first. Terraform splits diagnostics across both.
    pub fn combined_output(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplySummary {
    pub success: bool,
    pub added: Option<u32>,
    pub changed: Option<u32>,
    pub destroyed: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestroySummary {
    pub success: bool,
    pub destroyed: Option<u32>,
}

/// Resource addresses grouped by the diff marker Terraform printed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanChanges {
    pub create: Vec<String>,
    pub update: Vec<String>,
    pub delete: Vec<String>,
    pub replace: Vec<String>,
}

impl PlanChanges {
    pub fn total(&self) -> usize {
        self.create.len() + self.update.len() + self.delete.len() + self.replace.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub add: u32,
    pub change: u32,
    pub destroy: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidateSummary {
    pub valid: bool,
    pub error_count: i32,
    pub warning_count: i32,
    pub messages: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TerraformValidateOutput {
    pub valid: bool,
    pub error_count: i32,
    pub warning_count: i32,
    #[serde(default)]
    pub diagnostics: Vec<TerraformDiagnostic>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TerraformDiagnostic {
    pub severity: String,
    pub summary: String,
    pub detail: Option<String>,
}

impl TerraformDiagnostic {
    pub fn message(&self) -> String {
        match self.detail.as_deref() {
            Some(detail) if !detail.is_empty() => {
                format!("{}: {} ({})", self.severity, self.summary, detail)
            }
            _ => format!("{}: {}", self.severity, self.summary),
        }
    }
}
