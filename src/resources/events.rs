//! Scheduled Fargate task: an EventBridge rule that runs a task definition
//! on a cluster at every firing of a schedule.

use super::ecs::{self, Cluster, ContainerInputs, TaskDefinition};
use super::iam::{self, PolicyStatement};
use super::network::{self, Network};
use crate::core::construct::Stack;
use crate::core::error::Result;
use crate::core::schedule;
use crate::core::types::{CfnResource, NetworkConfig, ScheduledTaskSpec};
use serde_json::{json, Value};

const EVENTS_PRINCIPAL: &str = "events.amazonaws.com";

/// Everything the pattern declared.
#[derive(Debug, Clone)]
pub struct ScheduledFargateTask {
    pub rule_logical_id: String,
    pub schedule_expression: String,
    pub cluster: Cluster,
    pub task_definition: TaskDefinition,
    pub network: Network,
}

/// Declare the scheduled task and everything it runs on.
pub fn declare(
    stack: &mut Stack,
    spec: &ScheduledTaskSpec,
    network_config: &NetworkConfig,
    container: &ContainerInputs,
) -> Result<ScheduledFargateTask> {
    let scope = spec.id.as_str();
    let schedule_expression = schedule::expression(&spec.schedule)?;

    let network = network::declare(stack, scope, network_config)?;
    let cluster = ecs::declare_cluster(stack, scope)?;
    let task_definition = ecs::declare_task_definition(stack, scope, container)?;

    let events_role = iam::service_role(
        stack,
        &[scope, "ScheduledTaskDef", "EventsRole", "Resource"],
        EVENTS_PRINCIPAL,
    )?;
    iam::attach_policy(
        stack,
        &[scope, "ScheduledTaskDef", "EventsRole", "DefaultPolicy", "Resource"],
        &events_role,
        &[
            PolicyStatement::allow(&["ecs:RunTask"], vec![task_definition.arn()])
                .with_condition(json!({ "ArnEquals": { "ecs:cluster": cluster.arn() } })),
            PolicyStatement::allow(
                &["iam:PassRole"],
                vec![
                    task_definition.execution_role.arn(),
                    task_definition.task_role.arn(),
                ],
            ),
        ],
    )?;

    let rule = CfnResource::new("AWS::Events::Rule")
        .prop("ScheduleExpression", json!(schedule_expression))
        .prop(
            "State",
            json!(if spec.enabled { "ENABLED" } else { "DISABLED" }),
        )
        .prop(
            "Targets",
            json!([target(&cluster, &task_definition, &network, spec, events_role.arn())]),
        );
    let rule_logical_id = stack.add(&[scope, "ScheduledEventRule", "Resource"], rule)?;

    tracing::info!(
        rule = %rule_logical_id,
        schedule = %schedule_expression,
        "scheduled task declared"
    );
    Ok(ScheduledFargateTask {
        rule_logical_id,
        schedule_expression,
        cluster,
        task_definition,
        network,
    })
}

fn target(
    cluster: &Cluster,
    task_definition: &TaskDefinition,
    network: &Network,
    spec: &ScheduledTaskSpec,
    role_arn: Value,
) -> Value {
    json!({
        "Arn": cluster.arn(),
        "EcsParameters": {
            "LaunchType": "FARGATE",
            "NetworkConfiguration": {
                "AwsVpcConfiguration": network.awsvpc_configuration(),
            },
            "TaskCount": spec.desired_task_count,
            "TaskDefinitionArn": task_definition.arn(),
        },
        "Id": "Target0",
        "Input": "{}",
        "RoleArn": role_arn,
    })
}
