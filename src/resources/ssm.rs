//! Imported secure-string parameters used as container secrets.
//!
//! Imports add nothing to the template; the parameter is referenced by ARN
//! and resolved by the execution platform when the task starts.

use crate::core::intrinsics::arn_in_stack;
use crate::core::types::SecretRef;
use serde_json::Value;

/// A secure-string parameter that already exists in the parameter store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecureParameter {
    pub parameter_name: String,
    pub version: u32,
}

impl SecureParameter {
    pub fn import(secret: &SecretRef) -> Self {
        Self {
            parameter_name: secret.parameter_name.clone(),
            version: secret.version,
        }
    }

    /// Parameter ARN in the deploying account and region. Hierarchical names
    /// already carry their leading slash.
    pub fn arn(&self) -> Value {
        let resource = if self.parameter_name.starts_with('/') {
            format!("parameter{}", self.parameter_name)
        } else {
            format!("parameter/{}", self.parameter_name)
        };
        arn_in_stack("ssm", &resource)
    }
}
