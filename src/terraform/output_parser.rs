//! Best-effort scraping of Terraform/OpenTofu CLI output.
//!
//! None of these functions fail: text that does not match yields empty lists,
//! missing counts or a generic message.

use crate::terraform::model::{
    ApplySummary, DestroySummary, PlanChanges, PlanSummary, TerraformDiagnostic,
    TerraformValidateOutput, ValidateSummary,
};
use once_cell::sync::Lazy;
use regex::Regex;

static APPLY_COUNTS_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+) added, (\d+) changed, (\d+) destroyed").expect("Invalid apply regex")
});

static DESTROY_COUNT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Resources: (\d+) destroyed").expect("Invalid destroy regex")
});

static PLAN_SUMMARY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Plan: (\d+) to add, (\d+) to change, (\d+) to destroy")
        .expect("Invalid plan summary regex")
});

static VERSION_LINE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^(?:Terraform|OpenTofu) v(\S+)").expect("Invalid version regex")
});

// Tried in order; the first capture wins.
static ERROR_REGEXES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [r"(?m)Error: (.+)$", r"(?m)│ Error: (.+)$", r"(?m)Failed to (.+)$"]
        .iter()
        .map(|pattern| Regex::new(pattern).expect("Invalid error regex"))
        .collect()
});

const ERROR_KEYWORDS: &[&str] = &["error", "failed", "invalid", "denied", "not found", "unable"];

const APPLY_MARKER: &str = "Apply complete!";
const DESTROY_MARKER: &str = "Destroy complete!";

/// Parse the trailing summary of `terraform apply`.
pub fn parse_apply_output(text: &str) -> ApplySummary {
    if !text.contains(APPLY_MARKER) {
        return ApplySummary::default();
    }

    match APPLY_COUNTS_REGEX.captures(text) {
        Some(captures) => ApplySummary {
            success: true,
            added: captures[1].parse().ok(),
            changed: captures[2].parse().ok(),
            destroyed: captures[3].parse().ok(),
        },
        None => ApplySummary {
            success: true,
            ..ApplySummary::default()
        },
    }
}

/// Parse the trailing summary of `terraform destroy`.
pub fn parse_destroy_output(text: &str) -> DestroySummary {
    if !text.contains(DESTROY_MARKER) {
        return DestroySummary::default();
    }

    DestroySummary {
        success: true,
        destroyed: DESTROY_COUNT_REGEX
            .captures(text)
            .and_then(|captures| captures[1].parse().ok()),
    }
}

/// Classify plan diff lines by their leading marker.
///
/// `+/-` and `-/+` are checked before the single-character markers so that
/// replacements are not counted as creations or deletions.
pub fn parse_plan_output(text: &str) -> PlanChanges {
    let mut changes = PlanChanges::default();

    for line in text.lines() {
        let line = line.trim_start();

        if let Some(rest) = line
            .strip_prefix("+/-")
            .or_else(|| line.strip_prefix("-/+"))
        {
            changes.replace.push(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix('+') {
            changes.create.push(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix('~') {
            changes.update.push(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix('-') {
            changes.delete.push(rest.trim().to_string());
        }
    }

    changes
}

/// Extract the `Plan: N to add, N to change, N to destroy` line.
pub fn parse_plan_summary(text: &str) -> Option<PlanSummary> {
    if let Some(captures) = PLAN_SUMMARY_REGEX.captures(text) {
        return Some(PlanSummary {
            add: captures[1].parse().ok()?,
            change: captures[2].parse().ok()?,
            destroy: captures[3].parse().ok()?,
        });
    }

    if text.contains("No changes.") {
        return Some(PlanSummary::default());
    }

    None
}

/// Extract the binary version from `version -json` or plain `version` output.
pub fn parse_version_output(text: &str) -> Option<String> {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(text) {
        if let Some(version) = json.get("terraform_version").and_then(|v| v.as_str()) {
            return Some(version.to_string());
        }
    }

    VERSION_LINE_REGEX
        .captures(text)
        .map(|captures| captures[1].to_string())
}

/// Decode `validate -json` output, falling back to the human-readable form.
pub fn parse_validate_output(text: &str) -> ValidateSummary {
    if let Ok(output) = serde_json::from_str::<TerraformValidateOutput>(text) {
        let messages = output
            .diagnostics
            .iter()
            .map(TerraformDiagnostic::message)
            .collect();
        return ValidateSummary {
            valid: output.valid,
            error_count: output.error_count,
            warning_count: output.warning_count,
            messages,
        };
    }

    let valid = text.contains("The configuration is valid");
    ValidateSummary {
        valid,
        error_count: if valid { 0 } else { 1 },
        warning_count: 0,
        messages: if valid {
            Vec::new()
        } else {
            vec![extract_terraform_error(text)]
        },
    }
}

/// Pull the most useful error message out of Terraform's output.
pub fn extract_terraform_error(text: &str) -> String {
    for regex in ERROR_REGEXES.iter() {
        if let Some(captures) = regex.captures(text) {
            return captures[1].trim().to_string();
        }
    }

    let keyword_lines: Vec<&str> = text
        .lines()
        .filter(|line| {
            let lower = line.to_lowercase();
            ERROR_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
        })
        .map(str::trim)
        .collect();
    if !keyword_lines.is_empty() {
        return keyword_lines.join("\n");
    }

    let non_empty: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    if non_empty.is_empty() {
        return "Unknown error occurred".to_string();
    }

    let start = non_empty.len().saturating_sub(5);
    non_empty[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_apply_output_with_counts() {
        let summary =
            parse_apply_output("Apply complete! Resources: 2 added, 1 changed, 0 destroyed.");
        assert!(summary.success);
        assert_eq!(summary.added, Some(2));
        assert_eq!(summary.changed, Some(1));
        assert_eq!(summary.destroyed, Some(0));
    }

    #[test]
    fn test_parse_apply_output_without_counts() {
        let summary = parse_apply_output("Apply complete!");
        assert!(summary.success);
        assert_eq!(summary.added, None);
        assert_eq!(summary.changed, None);
        assert_eq!(summary.destroyed, None);
    }

    #[test]
    fn test_parse_apply_output_failure() {
        let summary = parse_apply_output("Error: something broke");
        assert!(!summary.success);
        assert_eq!(summary.added, None);
    }

    #[test]
    fn test_parse_destroy_output() {
        let summary = parse_destroy_output("Destroy complete! Resources: 4 destroyed.");
        assert!(summary.success);
        assert_eq!(summary.destroyed, Some(4));

        assert!(!parse_destroy_output("nothing here").success);
    }

    #[test]
    fn test_parse_plan_output() {
        let changes = parse_plan_output("  + aws_instance.foo\n  - aws_instance.bar\n");
        assert_eq!(changes.create, vec!["aws_instance.foo"]);
        assert_eq!(changes.delete, vec!["aws_instance.bar"]);
        assert!(changes.update.is_empty());
        assert!(changes.replace.is_empty());
    }

    #[test]
    fn test_parse_plan_output_replace_and_update() {
        let text = "  ~ aws_vpc.main\n-/+ aws_subnet.a\n  +/- aws_subnet.b\nsome text\n";
        let changes = parse_plan_output(text);
        assert_eq!(changes.update, vec!["aws_vpc.main"]);
        assert_eq!(changes.replace, vec!["aws_subnet.a", "aws_subnet.b"]);
        assert!(changes.create.is_empty());
        assert!(changes.delete.is_empty());
        assert_eq!(changes.total(), 3);
    }

    #[test]
    fn test_parse_plan_summary() {
        let summary = parse_plan_summary("Plan: 3 to add, 0 to change, 1 to destroy.").unwrap();
        assert_eq!(summary.add, 3);
        assert_eq!(summary.change, 0);
        assert_eq!(summary.destroy, 1);

        let none = parse_plan_summary("No changes. Your infrastructure matches.").unwrap();
        assert_eq!(none.add, 0);

        assert!(parse_plan_summary("garbage").is_none());
    }

    #[test]
    fn test_parse_version_output() {
        assert_eq!(
            parse_version_output(r#"{"terraform_version":"1.6.2","platform":"linux_amd64"}"#),
            Some("1.6.2".to_string())
        );
        assert_eq!(
            parse_version_output("OpenTofu v1.7.1\non linux_amd64"),
            Some("1.7.1".to_string())
        );
        assert_eq!(parse_version_output("nothing"), None);
    }

    #[test]
    fn test_parse_validate_output_json() {
        let text = r#"{
            "valid": false,
            "error_count": 1,
            "warning_count": 0,
            "diagnostics": [
                {"severity": "error", "summary": "Missing required argument", "detail": "cidr_block is required"}
            ]
        }"#;
        let summary = parse_validate_output(text);
        assert!(!summary.valid);
        assert_eq!(summary.error_count, 1);
        assert_eq!(
            summary.messages,
            vec!["error: Missing required argument (cidr_block is required)"]
        );
    }

    #[test]
    fn test_parse_validate_output_text() {
        let summary = parse_validate_output("Success! The configuration is valid.");
        assert!(summary.valid);
        assert!(summary.messages.is_empty());
    }

    #[test]
    fn test_extract_error_prefers_error_line() {
        let text = "Initializing...\nError: No valid credential sources found\n\nmore";
        assert_eq!(
            extract_terraform_error(text),
            "No valid credential sources found"
        );
    }

    #[test]
    fn test_extract_error_indented_line() {
        let text = "Planning...\n  Error: Reference to undeclared resource\n";
        assert_eq!(
            extract_terraform_error(text),
            "Reference to undeclared resource"
        );
    }

    #[test]
    fn test_extract_error_box_drawing() {
        let text = "╷\n│ Error: Unsupported argument\n│\n╵";
        assert_eq!(extract_terraform_error(text), "Unsupported argument");
    }

    #[test]
    fn test_extract_error_failed_to() {
        let text = "something\nFailed to load plugin schemas\n";
        assert_eq!(extract_terraform_error(text), "load plugin schemas");
    }

    #[test]
    fn test_extract_error_keyword_fallback() {
        let text = "line one\nAccess Denied for bucket\nline three\nresource not found here";
        assert_eq!(
            extract_terraform_error(text),
            "Access Denied for bucket\nresource not found here"
        );
    }

    #[test]
    fn test_extract_error_last_lines_fallback() {
        let text = "a\nb\n\nc\nd\ne\nf\ng\n";
        assert_eq!(extract_terraform_error(text), "c\nd\ne\nf\ng");
        assert_eq!(extract_terraform_error("  \n"), "Unknown error occurred");
    }
}
