//! Construct tree: a stack collects resources under path-derived logical IDs.
//!
//! A logical ID is the readable concatenation of the construct path plus an
//! 8-character BLAKE3 suffix of the full path, so renaming a construct always
//! yields a new ID and two paths never collide by concatenation alone.

use super::error::{MusabiError, Result};
use super::types::{CfnOutput, CfnResource, Template};
use crate::tripwire::hasher;
use indexmap::IndexMap;
use serde_json::Value;

/// Path segments that don't contribute to the readable part of an ID.
const HIDDEN_SEGMENTS: [&str; 2] = ["Resource", "Default"];

/// Longest logical ID the template format accepts.
const MAX_LOGICAL_ID: usize = 255;

const SUFFIX_LEN: usize = 8;

/// A stack under construction.
#[derive(Debug, Clone)]
pub struct Stack {
    name: String,
    description: Option<String>,
    resources: IndexMap<String, CfnResource>,
    outputs: IndexMap<String, CfnOutput>,
}

impl Stack {
    pub fn new(name: &str, description: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            description,
            resources: IndexMap::new(),
            outputs: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Logical ID for a construct path below this stack.
    pub fn logical_id(&self, path: &[&str]) -> String {
        let full_path = std::iter::once(self.name.as_str())
            .chain(path.iter().copied())
            .collect::<Vec<_>>()
            .join("/");

        let mut readable = String::new();
        let mut previous: Option<&str> = None;
        for segment in path {
            if HIDDEN_SEGMENTS.contains(segment) || previous == Some(*segment) {
                continue;
            }
            readable.extend(segment.chars().filter(|c| c.is_ascii_alphanumeric()));
            previous = Some(*segment);
        }
        readable.truncate(MAX_LOGICAL_ID - SUFFIX_LEN);

        let suffix = hasher::short_hash(&full_path, SUFFIX_LEN).to_ascii_uppercase();
        format!("{}{}", readable, suffix)
    }

    /// Add a resource at `path`; returns its logical ID.
    pub fn add(&mut self, path: &[&str], resource: CfnResource) -> Result<String> {
        let id = self.logical_id(path);
        if self.resources.contains_key(&id) {
            return Err(MusabiError::DuplicateLogicalId(path.join("/")));
        }
        tracing::debug!(logical_id = %id, resource_type = %resource.resource_type, "resource added");
        self.resources.insert(id.clone(), resource);
        Ok(id)
    }

    /// Add a stack output. Output IDs are used verbatim.
    pub fn add_output(&mut self, id: &str, value: Value, description: Option<&str>) {
        self.outputs.insert(
            id.to_string(),
            CfnOutput {
                value,
                description: description.map(str::to_string),
            },
        );
    }

    pub fn resources(&self) -> &IndexMap<String, CfnResource> {
        &self.resources
    }

    /// Render the CloudFormation template.
    pub fn to_template(&self) -> Template {
        Template {
            format_version: "2010-09-09".to_string(),
            description: self.description.clone(),
            resources: self.resources.clone(),
            outputs: self.outputs.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construct_logical_id_readable_part() {
        let stack = Stack::new("musabiStack", None);
        let id = stack.logical_id(&["musabiRepository", "Resource"]);
        assert!(id.starts_with("musabiRepository"));
        assert_eq!(id.len(), "musabiRepository".len() + SUFFIX_LEN);
        assert!(id[id.len() - SUFFIX_LEN..]
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn test_construct_logical_id_deterministic_and_path_sensitive() {
        let a = Stack::new("s", None);
        let b = Stack::new("t", None);
        assert_eq!(a.logical_id(&["X", "Y"]), a.logical_id(&["X", "Y"]));
        assert_ne!(a.logical_id(&["X", "Y"]), b.logical_id(&["X", "Y"]));
        // Same concatenation, different paths
        assert_ne!(a.logical_id(&["AB", "C"]), a.logical_id(&["A", "BC"]));
    }

    #[test]
    fn test_construct_logical_id_strips_symbols_and_repeats() {
        let stack = Stack::new("s", None);
        let id = stack.logical_id(&["Vpc", "Vpc", "public-subnet_1", "Default"]);
        assert!(id.starts_with("Vpcpublicsubnet1"));
    }

    #[test]
    fn test_construct_duplicate_rejected() {
        let mut stack = Stack::new("s", None);
        stack
            .add(&["Repo"], CfnResource::new("AWS::ECR::Repository"))
            .unwrap();
        let err = stack
            .add(&["Repo"], CfnResource::new("AWS::ECR::Repository"))
            .unwrap_err();
        assert!(matches!(err, MusabiError::DuplicateLogicalId(_)));
    }

    #[test]
    fn test_construct_template_preserves_order() {
        let mut stack = Stack::new("s", Some("demo".into()));
        let b = stack.add(&["B"], CfnResource::new("AWS::Logs::LogGroup")).unwrap();
        let a = stack.add(&["A"], CfnResource::new("AWS::ECS::Cluster")).unwrap();
        stack.add_output("Out", serde_json::json!("x"), None);
        let t = stack.to_template();
        let keys: Vec<_> = t.resources.keys().cloned().collect();
        assert_eq!(keys, vec![b, a]);
        assert_eq!(t.format_version, "2010-09-09");
        assert_eq!(t.description.as_deref(), Some("demo"));
        assert_eq!(t.outputs.len(), 1);
    }
}
