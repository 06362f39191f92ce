//! CloudWatch log group handler and the `awslogs` driver options.

use crate::core::construct::Stack;
use crate::core::error::Result;
use crate::core::intrinsics::{self, get_att, reference};
use crate::core::types::{CfnResource, LogGroupSpec};
use serde_json::{json, Value};

/// A declared log group plus the stream prefix containers log under.
#[derive(Debug, Clone)]
pub struct LogGroup {
    pub logical_id: String,
    pub stream_prefix: String,
}

impl LogGroup {
    pub fn arn(&self) -> Value {
        get_att(&self.logical_id, "Arn")
    }

    pub fn name(&self) -> Value {
        reference(&self.logical_id)
    }

    /// Container `LogConfiguration` shipping to this group.
    pub fn log_configuration(&self) -> Value {
        json!({
            "LogDriver": "awslogs",
            "Options": {
                "awslogs-group": self.name(),
                "awslogs-stream-prefix": self.stream_prefix,
                "awslogs-region": reference(intrinsics::AWS_REGION),
            }
        })
    }
}

/// Declare the log group in `stack`.
pub fn declare(stack: &mut Stack, spec: &LogGroupSpec) -> Result<LogGroup> {
    let mut resource =
        CfnResource::new("AWS::Logs::LogGroup").prop("LogGroupName", json!(spec.log_group_name));
    if let Some(days) = spec.retention.days() {
        resource = resource.prop("RetentionInDays", json!(days));
    }
    let logical_id = stack.add(&[spec.id.as_str(), "Resource"], resource.removal(spec.removal_policy))?;
    Ok(LogGroup {
        logical_id,
        stream_prefix: spec.stream_prefix.clone(),
    })
}
