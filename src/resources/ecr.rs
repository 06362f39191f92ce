//! ECR repository handler.

use crate::core::construct::Stack;
use crate::core::error::Result;
use crate::core::intrinsics::{self, get_att, join, reference, select, split};
use crate::core::types::{CfnResource, LifecycleRule, RepositorySpec, TagStatus};
use serde_json::{json, Value};

/// A declared repository.
#[derive(Debug, Clone)]
pub struct Repository {
    pub logical_id: String,
}

impl Repository {
    pub fn arn(&self) -> Value {
        get_att(&self.logical_id, "Arn")
    }

    pub fn name(&self) -> Value {
        reference(&self.logical_id)
    }

    /// `<account>.dkr.ecr.<region>.<url suffix>/<name>:<tag>`, with account
    /// and region taken from the repository ARN.
    pub fn image_uri(&self, tag: &str) -> Value {
        let arn_parts = || split(":", self.arn());
        join(
            "",
            vec![
                select(4, arn_parts()),
                json!(".dkr.ecr."),
                select(3, arn_parts()),
                json!("."),
                reference(intrinsics::AWS_URL_SUFFIX),
                json!("/"),
                self.name(),
                json!(format!(":{}", tag)),
            ],
        )
    }
}

/// Render lifecycle rules as the policy document ECR expects, ordered by
/// priority.
pub fn lifecycle_policy_text(rules: &[LifecycleRule]) -> String {
    let mut sorted: Vec<&LifecycleRule> = rules.iter().collect();
    sorted.sort_by_key(|r| r.rule_priority);

    let rendered: Vec<Value> = sorted.into_iter().map(render_rule).collect();
    json!({ "rules": rendered }).to_string()
}

fn render_rule(rule: &LifecycleRule) -> Value {
    let mut selection = serde_json::Map::new();
    selection.insert("tagStatus".into(), json!(rule.tag_status.to_string()));
    if rule.tag_status == TagStatus::Tagged {
        selection.insert("tagPrefixList".into(), json!(rule.tag_prefix_list));
    }
    match (rule.max_image_count, rule.max_image_age_days) {
        (Some(count), _) => {
            selection.insert("countType".into(), json!("imageCountMoreThan"));
            selection.insert("countNumber".into(), json!(count));
        }
        (None, Some(days)) => {
            selection.insert("countType".into(), json!("sinceImagePushed"));
            selection.insert("countNumber".into(), json!(days));
            selection.insert("countUnit".into(), json!("days"));
        }
        (None, None) => {}
    }

    let mut out = serde_json::Map::new();
    out.insert("rulePriority".into(), json!(rule.rule_priority));
    if let Some(ref d) = rule.description {
        out.insert("description".into(), json!(d));
    }
    out.insert("selection".into(), Value::Object(selection));
    out.insert("action".into(), json!({ "type": "expire" }));
    Value::Object(out)
}

/// Declare the repository in `stack`.
pub fn declare(stack: &mut Stack, spec: &RepositorySpec) -> Result<Repository> {
    let mut resource = CfnResource::new("AWS::ECR::Repository")
        .prop("RepositoryName", json!(spec.name))
        .prop(
            "ImageScanningConfiguration",
            json!({ "ScanOnPush": spec.image_scan_on_push }),
        );
    if !spec.lifecycle_rules.is_empty() {
        resource = resource.prop(
            "LifecyclePolicy",
            json!({ "LifecyclePolicyText": lifecycle_policy_text(&spec.lifecycle_rules) }),
        );
    }
    let logical_id = stack.add(&[spec.id.as_str(), "Resource"], resource.removal(spec.removal_policy))?;
    Ok(Repository { logical_id })
}
