//! CloudFormation intrinsic functions and pseudo parameters as JSON values.

use serde_json::{json, Value};

pub const AWS_REGION: &str = "AWS::Region";
pub const AWS_ACCOUNT_ID: &str = "AWS::AccountId";
pub const AWS_PARTITION: &str = "AWS::Partition";
pub const AWS_URL_SUFFIX: &str = "AWS::URLSuffix";

/// `{"Ref": id}` for a logical ID or pseudo parameter.
pub fn reference(id: &str) -> Value {
    json!({ "Ref": id })
}

/// `{"Fn::GetAtt": [id, attr]}`.
pub fn get_att(id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [id, attribute] })
}

/// `{"Fn::Join": [delimiter, parts]}`.
pub fn join(delimiter: &str, parts: Vec<Value>) -> Value {
    json!({ "Fn::Join": [delimiter, parts] })
}

/// `{"Fn::Select": [index, list]}`.
pub fn select(index: usize, list: Value) -> Value {
    json!({ "Fn::Select": [index, list] })
}

/// `{"Fn::Split": [delimiter, source]}`.
pub fn split(delimiter: &str, source: Value) -> Value {
    json!({ "Fn::Split": [delimiter, source] })
}

/// `{"Fn::GetAZs": ""}`: zones of the deploying region.
pub fn get_azs() -> Value {
    json!({ "Fn::GetAZs": "" })
}

/// `arn:<partition>:<service>:<region>:<account>:<resource>` in the deploying
/// account and region.
pub fn arn_in_stack(service: &str, resource: &str) -> Value {
    join(
        "",
        vec![
            json!("arn:"),
            reference(AWS_PARTITION),
            json!(format!(":{}:", service)),
            reference(AWS_REGION),
            json!(":"),
            reference(AWS_ACCOUNT_ID),
            json!(format!(":{}", resource)),
        ],
    )
}

/// Every logical ID referenced from a value via `Ref` or `Fn::GetAtt`.
/// Pseudo parameters (`AWS::*`) are skipped.
pub fn referenced_ids(value: &Value) -> Vec<String> {
    let mut out = Vec::new();
    collect_refs(value, &mut out);
    out
}

fn collect_refs(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(id)) = map.get("Ref") {
                if !id.starts_with("AWS::") {
                    out.push(id.clone());
                }
            }
            if let Some(Value::Array(args)) = map.get("Fn::GetAtt") {
                if let Some(Value::String(id)) = args.first() {
                    out.push(id.clone());
                }
            }
            for v in map.values() {
                collect_refs(v, out);
            }
        }
        Value::Array(items) => {
            for v in items {
                collect_refs(v, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intrinsics_shapes() {
        assert_eq!(reference("Repo"), json!({"Ref": "Repo"}));
        assert_eq!(get_att("Repo", "Arn"), json!({"Fn::GetAtt": ["Repo", "Arn"]}));
        assert_eq!(
            select(1, get_azs()),
            json!({"Fn::Select": [1, {"Fn::GetAZs": ""}]})
        );
    }

    #[test]
    fn test_intrinsics_arn_in_stack() {
        let arn = arn_in_stack("ssm", "parameter/insta_user");
        let parts = &arn["Fn::Join"][1];
        assert_eq!(parts[0], "arn:");
        assert_eq!(parts[2], ":ssm:");
        assert_eq!(parts[6], ":parameter/insta_user");
    }

    #[test]
    fn test_intrinsics_referenced_ids_skip_pseudo() {
        let v = json!({
            "Image": join("", vec![get_att("Repo", "Arn"), reference(AWS_URL_SUFFIX)]),
            "Logs": {"Group": reference("LogGroup")},
        });
        let ids = referenced_ids(&v);
        assert_eq!(ids, vec!["Repo", "LogGroup"]);
    }
}
