//! Synthesis: turn a validated stack declaration into a template.
//!
//! Declaration is linear. Each step hands the handle it declared to the
//! next step, and the finished template is resolved once so a dangling
//! reference or cycle never reaches disk.

use super::construct::Stack;
use super::error::Result;
use super::intrinsics::get_att;
use super::parser;
use super::resolver;
use super::types::{StackConfig, Template};
use crate::resources::ecs::ContainerInputs;
use crate::resources::ssm::SecureParameter;
use crate::resources::{ecr, events, logs};
use serde_json::json;

/// Validate `config` and synthesize its template.
pub fn synthesize(config: &StackConfig) -> Result<Template> {
    parser::check(config)?;

    let mut stack = Stack::new(&config.stack, config.description.clone());

    let repository = ecr::declare(&mut stack, &config.repository)?;
    let image = &config.task.image;
    let log_group = logs::declare(&mut stack, &image.logging)?;
    let secrets: Vec<(String, SecureParameter)> = image
        .secrets
        .iter()
        .map(|(env, secret)| (env.clone(), SecureParameter::import(secret)))
        .collect();

    let inputs = ContainerInputs {
        options: image,
        repository: &repository,
        log_group: &log_group,
        secrets: &secrets,
    };
    let scheduled = events::declare(&mut stack, &config.task, &config.network, &inputs)?;

    stack.add_output(
        "RepositoryUri",
        repository.image_uri(&image.image_tag),
        Some("Image the scheduled task runs"),
    );
    stack.add_output("LogGroupName", log_group.name(), None);
    stack.add_output("ClusterName", scheduled.cluster.name(), None);
    stack.add_output(
        "ScheduleExpression",
        json!(scheduled.schedule_expression),
        None,
    );
    stack.add_output(
        "TaskDefinitionArn",
        scheduled.task_definition.arn(),
        None,
    );
    stack.add_output(
        "RuleArn",
        get_att(&scheduled.rule_logical_id, "Arn"),
        None,
    );

    let template = stack.to_template();
    let order = resolver::build_execution_order(&template)?;
    tracing::info!(
        stack = %config.stack,
        resources = order.len(),
        "synthesized template"
    );
    Ok(template)
}
