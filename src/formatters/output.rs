use crate::backends::BackendConfig;
use crate::template::CompiledTemplate;
use crate::terraform::model::{ApplySummary, DestroySummary, PlanChanges, PlanSummary};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Builds command reports as JSON and renders them for the terminal.
pub struct OutputFormatter;

impl OutputFormatter {
    pub fn plan(template: &str, changes: &PlanChanges, summary: Option<PlanSummary>) -> Value {
        json!({
            "command": "plan",
            "template": template,
            "changes": {
                "create": changes.create,
                "update": changes.update,
                "delete": changes.delete,
                "replace": changes.replace,
                "total": changes.total()
            },
            "summary": summary.map(|s| json!({
                "add": s.add,
                "change": s.change,
                "destroy": s.destroy
            }))
        })
    }

    /// `outputs` is the decoded `output -json` document, if it was read.
    pub fn apply(template: &str, summary: &ApplySummary, outputs: Option<Value>) -> Value {
        let outputs: Map<String, Value> = outputs
            .as_ref()
            .and_then(Value::as_object)
            .map(|outputs| {
                outputs
                    .iter()
                    .map(|(name, output)| {
                        let value = if output["sensitive"] == true {
                            json!("(sensitive)")
                        } else {
                            output["value"].clone()
                        };
                        (name.clone(), value)
                    })
                    .collect()
            })
            .unwrap_or_default();

        json!({
            "command": "apply",
            "template": template,
            "success": summary.success,
            "added": summary.added,
            "changed": summary.changed,
            "destroyed": summary.destroyed,
            "outputs": outputs
        })
    }

    pub fn destroy(template: &str, summary: &DestroySummary) -> Value {
        json!({
            "command": "destroy",
            "template": template,
            "success": summary.success,
            "destroyed": summary.destroyed
        })
    }

    pub fn inspect(
        compiled: &CompiledTemplate,
        backend: &BackendConfig,
        include_document: bool,
    ) -> Value {
        let mut report = json!({
            "command": "inspect",
            "template": compiled.name,
            "backend": backend.describe(),
            "resource_count": compiled.references.len(),
            "resources": compiled.references.iter().map(|reference| {
                json!({
                    "type": reference.resource_type(),
                    "name": reference.name(),
                    "address": reference.address(),
                    "outputs": reference.outputs()
                })
            }).collect::<Vec<_>>()
        });
        if include_document {
            report["document"] = compiled.document.clone();
        }
        report
    }

    /// Agent entry for one template. `compiled` carries the compile error
    /// message when compilation failed.
    pub fn agent_template(
        template: &str,
        compiled: Result<&CompiledTemplate, String>,
        backend: &BackendConfig,
    ) -> Value {
        let backend = json!({
            "type": backend.kind(),
            "description": backend.describe(),
            "config": backend.terraform_config()
        });

        match compiled {
            Ok(compiled) => {
                let mut providers: BTreeMap<&str, usize> = BTreeMap::new();
                for reference in &compiled.references {
                    let provider = reference
                        .resource_type()
                        .split('_')
                        .next()
                        .unwrap_or_default();
                    *providers.entry(provider).or_default() += 1;
                }
                json!({
                    "name": template,
                    "valid": true,
                    "error": Value::Null,
                    "resource_count": compiled.references.len(),
                    "providers": providers,
                    "resources": compiled.references.iter().map(|r| r.address()).collect::<Vec<_>>(),
                    "references": compiled.edges,
                    "backend": backend
                })
            }
            Err(error) => json!({
                "name": template,
                "valid": false,
                "error": error,
                "resource_count": 0,
                "providers": {},
                "resources": [],
                "references": [],
                "backend": backend
            }),
        }
    }

    /// Wrap per-template reports of one run.
    pub fn envelope(namespace: &str, file: &str, templates: Vec<Value>) -> Value {
        json!({
            "namespace": namespace,
            "file": file,
            "templates": templates
        })
    }

    /// Human-readable rendering of one report built above.
    pub fn render_text(report: &Value) -> String {
        let mut out = String::new();
        let template = report["template"].as_str().unwrap_or_default();

        match report["command"].as_str().unwrap_or_default() {
            "plan" => {
                let _ = writeln!(out, "Template {}:", template);
                let changes = &report["changes"];
                for (key, symbol) in [("create", "+"), ("update", "~"), ("replace", "-/+"), ("delete", "-")] {
                    for address in changes[key].as_array().into_iter().flatten() {
                        let _ = writeln!(out, "  {} {}", symbol, address.as_str().unwrap_or_default());
                    }
                }
                match report["summary"].as_object() {
                    Some(summary) => {
                        let _ = writeln!(
                            out,
                            "Plan: {} to add, {} to change, {} to destroy.",
                            summary["add"], summary["change"], summary["destroy"]
                        );
                    }
                    None if changes["total"] == 0 => {
                        let _ = writeln!(out, "No changes.");
                    }
                    None => {}
                }
            }
            "apply" => {
                let status = if report["success"] == true { "complete" } else { "failed" };
                let _ = write!(out, "Template {}: apply {}", template, status);
                if report["added"].is_number() {
                    let _ = write!(
                        out,
                        " ({} added, {} changed, {} destroyed)",
                        report["added"], report["changed"], report["destroyed"]
                    );
                }
                out.push('\n');
                for (name, value) in report["outputs"].as_object().into_iter().flatten() {
                    let _ = writeln!(out, "  {} = {}", name, value);
                }
            }
            "destroy" => {
                let status = if report["success"] == true { "complete" } else { "failed" };
                let _ = write!(out, "Template {}: destroy {}", template, status);
                if report["destroyed"].is_number() {
                    let _ = write!(out, " ({} destroyed)", report["destroyed"]);
                }
                out.push('\n');
            }
            "inspect" => {
                let _ = writeln!(
                    out,
                    "Template {} ({} resources)",
                    template, report["resource_count"]
                );
                let _ = writeln!(out, "  backend: {}", report["backend"].as_str().unwrap_or_default());
                for resource in report["resources"].as_array().into_iter().flatten() {
                    let _ = writeln!(out, "  {}", resource["address"].as_str().unwrap_or_default());
                    let outputs: Vec<&str> = resource["outputs"]
                        .as_object()
                        .map(|o| o.keys().map(String::as_str).collect())
                        .unwrap_or_default();
                    if !outputs.is_empty() {
                        let _ = writeln!(out, "    outputs: {}", outputs.join(", "));
                    }
                }
            }
            _ => {
                let _ = writeln!(
                    out,
                    "{}",
                    serde_json::to_string_pretty(report).unwrap_or_default()
                );
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::LocalConfig;
    use crate::resources::ResourceReference;
    use crate::template::ReferenceEdge;
    use std::path::PathBuf;

    fn local_backend() -> BackendConfig {
        BackendConfig::Local(LocalConfig {
            path: PathBuf::from("/tmp/ws/terraform.tfstate"),
        })
    }

    fn compiled() -> CompiledTemplate {
        CompiledTemplate {
            name: "network".to_string(),
            document: json!({"resource": {}}),
            references: vec![
                ResourceReference::new("aws_vpc", "main", json!({}), &["id", "arn"]),
                ResourceReference::new("aws_subnet", "public", json!({}), &["id"]),
                ResourceReference::new("cloudflare_zone", "site", json!({}), &["id"]),
            ],
            edges: vec![ReferenceEdge {
                from: "aws_subnet.public".to_string(),
                to: "aws_vpc.main".to_string(),
            }],
        }
    }

    #[test]
    fn test_plan_report() {
        let changes = PlanChanges {
            create: vec!["aws_vpc.main".to_string()],
            ..Default::default()
        };
        let report = OutputFormatter::plan(
            "network",
            &changes,
            Some(PlanSummary { add: 1, change: 0, destroy: 0 }),
        );
        assert_eq!(report["changes"]["create"][0], "aws_vpc.main");
        assert_eq!(report["changes"]["total"], 1);
        assert_eq!(report["summary"]["add"], 1);

        let text = OutputFormatter::render_text(&report);
        assert!(text.contains("  + aws_vpc.main"));
        assert!(text.contains("Plan: 1 to add, 0 to change, 0 to destroy."));
    }

    #[test]
    fn test_apply_and_destroy_reports() {
        let apply = OutputFormatter::apply(
            "network",
            &ApplySummary {
                success: true,
                added: Some(2),
                changed: Some(1),
                destroyed: Some(0),
            },
            Some(json!({
                "vpc_id": {"value": "vpc-123", "type": "string", "sensitive": false},
                "token": {"value": "secret", "type": "string", "sensitive": true}
            })),
        );
        assert_eq!(apply["added"], 2);
        assert_eq!(apply["outputs"]["vpc_id"], "vpc-123");
        assert_eq!(apply["outputs"]["token"], "(sensitive)");
        assert_eq!(
            OutputFormatter::render_text(&apply),
            "Template network: apply complete (2 added, 1 changed, 0 destroyed)\n  vpc_id = \"vpc-123\"\n  token = \"(sensitive)\"\n"
        );

        let destroy = OutputFormatter::destroy(
            "network",
            &DestroySummary {
                success: false,
                destroyed: None,
            },
        );
        assert_eq!(destroy["destroyed"], Value::Null);
        assert_eq!(
            OutputFormatter::render_text(&destroy),
            "Template network: destroy failed\n"
        );
    }

    #[test]
    fn test_inspect_report() {
        let report = OutputFormatter::inspect(&compiled(), &local_backend(), false);
        assert_eq!(report["resource_count"], 3);
        assert_eq!(report["resources"][0]["address"], "aws_vpc.main");
        assert_eq!(report["resources"][0]["outputs"]["arn"], "${aws_vpc.main.arn}");
        assert!(report.get("document").is_none());

        let with_document = OutputFormatter::inspect(&compiled(), &local_backend(), true);
        assert!(with_document["document"]["resource"].is_object());

        let text = OutputFormatter::render_text(&report);
        assert!(text.contains("Template network (3 resources)"));
        assert!(text.contains("outputs: arn, id"));
    }

    #[test]
    fn test_agent_template() {
        let template = compiled();
        let report = OutputFormatter::agent_template("network", Ok(&template), &local_backend());
        assert_eq!(report["valid"], true);
        assert_eq!(report["providers"]["aws"], 2);
        assert_eq!(report["providers"]["cloudflare"], 1);
        assert_eq!(report["references"][0]["to"], "aws_vpc.main");
        assert_eq!(report["backend"]["type"], "local");

        let failed = OutputFormatter::agent_template(
            "broken",
            Err("bad cidr".to_string()),
            &local_backend(),
        );
        assert_eq!(failed["valid"], false);
        assert_eq!(failed["error"], "bad cidr");
        assert_eq!(failed["resource_count"], 0);
    }
}
