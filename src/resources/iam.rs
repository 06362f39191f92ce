//! IAM roles and inline policies.

use crate::core::construct::Stack;
use crate::core::error::Result;
use crate::core::intrinsics::{get_att, reference};
use crate::core::types::CfnResource;
use serde_json::{json, Value};

const POLICY_VERSION: &str = "2012-10-17";

/// One `Allow` statement.
#[derive(Debug, Clone)]
pub struct PolicyStatement {
    pub actions: Vec<String>,
    pub resources: Vec<Value>,
    pub condition: Option<Value>,
}

impl PolicyStatement {
    pub fn allow(actions: &[&str], resources: Vec<Value>) -> Self {
        Self {
            actions: actions.iter().map(|a| a.to_string()).collect(),
            resources,
            condition: None,
        }
    }

    pub fn with_condition(mut self, condition: Value) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn to_json(&self) -> Value {
        let mut out = serde_json::Map::new();
        out.insert("Action".into(), one_or_many(self.actions.iter().map(|a| json!(a)).collect()));
        if let Some(ref c) = self.condition {
            out.insert("Condition".into(), c.clone());
        }
        out.insert("Effect".into(), json!("Allow"));
        out.insert("Resource".into(), one_or_many(self.resources.clone()));
        Value::Object(out)
    }
}

fn one_or_many(mut items: Vec<Value>) -> Value {
    if items.len() == 1 {
        items.remove(0)
    } else {
        Value::Array(items)
    }
}

/// Render statements as a policy document.
pub fn policy_document(statements: &[PolicyStatement]) -> Value {
    json!({
        "Statement": statements.iter().map(PolicyStatement::to_json).collect::<Vec<_>>(),
        "Version": POLICY_VERSION,
    })
}

/// A declared role.
#[derive(Debug, Clone)]
pub struct Role {
    pub logical_id: String,
}

impl Role {
    pub fn arn(&self) -> Value {
        get_att(&self.logical_id, "Arn")
    }
}

/// Declare a role assumable by an AWS service principal.
pub fn service_role(stack: &mut Stack, path: &[&str], service: &str) -> Result<Role> {
    let resource = CfnResource::new("AWS::IAM::Role").prop(
        "AssumeRolePolicyDocument",
        json!({
            "Statement": [{
                "Action": "sts:AssumeRole",
                "Effect": "Allow",
                "Principal": { "Service": service },
            }],
            "Version": POLICY_VERSION,
        }),
    );
    let logical_id = stack.add(path, resource)?;
    Ok(Role { logical_id })
}

/// Attach an inline policy to `role`. The policy name is its logical ID.
pub fn attach_policy(
    stack: &mut Stack,
    path: &[&str],
    role: &Role,
    statements: &[PolicyStatement],
) -> Result<String> {
    let policy_name = stack.logical_id(path);
    let resource = CfnResource::new("AWS::IAM::Policy")
        .prop("PolicyDocument", policy_document(statements))
        .prop("PolicyName", json!(policy_name))
        .prop("Roles", json!([reference(&role.logical_id)]));
    stack.add(path, resource)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iam_statement_single_values_collapse() {
        let s = PolicyStatement::allow(&["ecr:GetAuthorizationToken"], vec![json!("*")]);
        assert_eq!(
            s.to_json(),
            json!({"Action": "ecr:GetAuthorizationToken", "Effect": "Allow", "Resource": "*"})
        );
    }

    #[test]
    fn test_iam_statement_lists_and_condition() {
        let s = PolicyStatement::allow(&["a:One", "a:Two"], vec![json!("x"), json!("y")])
            .with_condition(json!({"ArnEquals": {"ecs:cluster": "c"}}));
        let v = s.to_json();
        assert_eq!(v["Action"], json!(["a:One", "a:Two"]));
        assert_eq!(v["Resource"], json!(["x", "y"]));
        assert_eq!(v["Condition"]["ArnEquals"]["ecs:cluster"], "c");
    }

    #[test]
    fn test_iam_role_and_policy() {
        let mut stack = Stack::new("s", None);
        let role = service_role(&mut stack, &["Task", "Role"], "ecs-tasks.amazonaws.com").unwrap();
        let pid = attach_policy(
            &mut stack,
            &["Task", "Role", "DefaultPolicy"],
            &role,
            &[PolicyStatement::allow(&["logs:PutLogEvents"], vec![json!("*")])],
        )
        .unwrap();

        let r = &stack.resources()[&role.logical_id];
        assert_eq!(
            r.properties["AssumeRolePolicyDocument"]["Statement"][0]["Principal"]["Service"],
            "ecs-tasks.amazonaws.com"
        );
        let p = &stack.resources()[&pid];
        assert_eq!(p.properties["PolicyName"], json!(pid));
        assert_eq!(p.properties["Roles"][0], json!({"Ref": role.logical_id}));
        assert_eq!(p.properties["PolicyDocument"]["Version"], "2012-10-17");
    }
}
