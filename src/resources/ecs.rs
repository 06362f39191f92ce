//! ECS cluster and Fargate task definition handlers.

use super::ecr::Repository;
use super::iam::{self, PolicyStatement, Role};
use super::logs::LogGroup;
use super::ssm::SecureParameter;
use crate::core::construct::Stack;
use crate::core::error::Result;
use crate::core::intrinsics::{get_att, reference};
use crate::core::types::{CfnResource, TaskImageOptions};
use serde_json::{json, Value};

const ECS_TASKS_PRINCIPAL: &str = "ecs-tasks.amazonaws.com";

/// Valid Fargate memory sizes (MiB) for a CPU size, or `None` for an
/// unsupported CPU value.
pub fn fargate_memory_options(cpu: u32) -> Option<Vec<u32>> {
    let range = |lo: u32, hi: u32| (lo..=hi).step_by(1024).collect::<Vec<_>>();
    match cpu {
        256 => Some(vec![512, 1024, 2048]),
        512 => Some(range(1024, 4096)),
        1024 => Some(range(2048, 8192)),
        2048 => Some(range(4096, 16384)),
        4096 => Some(range(8192, 30720)),
        _ => None,
    }
}

/// A declared cluster.
#[derive(Debug, Clone)]
pub struct Cluster {
    pub logical_id: String,
}

impl Cluster {
    pub fn arn(&self) -> Value {
        get_att(&self.logical_id, "Arn")
    }

    pub fn name(&self) -> Value {
        reference(&self.logical_id)
    }
}

/// Declare an empty cluster under `scope`.
pub fn declare_cluster(stack: &mut Stack, scope: &str) -> Result<Cluster> {
    let logical_id = stack.add(&[scope, "Cluster", "Resource"], CfnResource::new("AWS::ECS::Cluster"))?;
    Ok(Cluster { logical_id })
}

/// A declared task definition and the roles it runs under.
#[derive(Debug, Clone)]
pub struct TaskDefinition {
    pub logical_id: String,
    pub task_role: Role,
    pub execution_role: Role,
}

impl TaskDefinition {
    pub fn arn(&self) -> Value {
        reference(&self.logical_id)
    }
}

/// Everything a container definition is wired from.
pub struct ContainerInputs<'a> {
    pub options: &'a TaskImageOptions,
    pub repository: &'a Repository,
    pub log_group: &'a LogGroup,
    pub secrets: &'a [(String, SecureParameter)],
}

/// Render the single container definition of the task.
pub fn container_definition(inputs: &ContainerInputs) -> Value {
    let opts = inputs.options;
    let mut def = serde_json::Map::new();
    def.insert("Essential".into(), json!(true));
    def.insert("Image".into(), inputs.repository.image_uri(&opts.image_tag));
    def.insert("LogConfiguration".into(), inputs.log_group.log_configuration());
    def.insert("Name".into(), json!(opts.container_name));
    if !opts.environment.is_empty() {
        let env: Vec<Value> = opts
            .environment
            .iter()
            .map(|(k, v)| json!({ "Name": k, "Value": v }))
            .collect();
        def.insert("Environment".into(), json!(env));
    }
    if !inputs.secrets.is_empty() {
        let secrets: Vec<Value> = inputs
            .secrets
            .iter()
            .map(|(name, param)| json!({ "Name": name, "ValueFrom": param.arn() }))
            .collect();
        def.insert("Secrets".into(), json!(secrets));
    }
    Value::Object(def)
}

/// Statements the execution role needs to pull the image, ship logs, and
/// read secrets.
fn execution_statements(inputs: &ContainerInputs) -> Vec<PolicyStatement> {
    let mut statements = vec![
        PolicyStatement::allow(
            &[
                "ecr:BatchCheckLayerAvailability",
                "ecr:GetDownloadUrlForLayer",
                "ecr:BatchGetImage",
            ],
            vec![inputs.repository.arn()],
        ),
        PolicyStatement::allow(&["ecr:GetAuthorizationToken"], vec![json!("*")]),
        PolicyStatement::allow(
            &["logs:CreateLogStream", "logs:PutLogEvents"],
            vec![inputs.log_group.arn()],
        ),
    ];
    for (_, param) in inputs.secrets {
        statements.push(PolicyStatement::allow(
            &[
                "ssm:DescribeParameters",
                "ssm:GetParameters",
                "ssm:GetParameter",
                "ssm:GetParameterHistory",
            ],
            vec![param.arn()],
        ));
    }
    statements
}

/// Declare a Fargate task definition under `scope` together with its task
/// role, execution role, and execution policy.
pub fn declare_task_definition(
    stack: &mut Stack,
    scope: &str,
    inputs: &ContainerInputs,
) -> Result<TaskDefinition> {
    let task_role = iam::service_role(
        stack,
        &[scope, "ScheduledTaskDef", "TaskRole", "Resource"],
        ECS_TASKS_PRINCIPAL,
    )?;
    let execution_role = iam::service_role(
        stack,
        &[scope, "ScheduledTaskDef", "ExecutionRole", "Resource"],
        ECS_TASKS_PRINCIPAL,
    )?;
    iam::attach_policy(
        stack,
        &[scope, "ScheduledTaskDef", "ExecutionRole", "DefaultPolicy", "Resource"],
        &execution_role,
        &execution_statements(inputs),
    )?;

    let path = [scope, "ScheduledTaskDef", "Resource"];
    let family: String = format!("{}{}", stack.name(), stack.logical_id(&path))
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    let resource = CfnResource::new("AWS::ECS::TaskDefinition")
        .prop("ContainerDefinitions", json!([container_definition(inputs)]))
        .prop("Cpu", json!(inputs.options.cpu.to_string()))
        .prop("ExecutionRoleArn", execution_role.arn())
        .prop("Family", json!(family))
        .prop("Memory", json!(inputs.options.memory_limit_mib.to_string()))
        .prop("NetworkMode", json!("awsvpc"))
        .prop("RequiresCompatibilities", json!(["FARGATE"]))
        .prop("TaskRoleArn", task_role.arn());
    let logical_id = stack.add(&path, resource)?;

    Ok(TaskDefinition {
        logical_id,
        task_role,
        execution_role,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::SecretRef;

    fn inputs_fixture() -> (TaskImageOptions, Repository, LogGroup, Vec<(String, SecureParameter)>) {
        let options = TaskImageOptions::default();
        let secrets = options
            .secrets
            .iter()
            .map(|(k, v)| (k.clone(), SecureParameter::import(v)))
            .collect();
        (
            options,
            Repository {
                logical_id: "Repo".into(),
            },
            LogGroup {
                logical_id: "Logs".into(),
                stream_prefix: "musabi".into(),
            },
            secrets,
        )
    }

    #[test]
    fn test_ecs_fargate_memory_options() {
        assert_eq!(fargate_memory_options(256), Some(vec![512, 1024, 2048]));
        let m = fargate_memory_options(2048).unwrap();
        assert_eq!(m.first(), Some(&4096));
        assert_eq!(m.last(), Some(&16384));
        assert!(m.contains(&4096));
        assert!(fargate_memory_options(4096).unwrap().contains(&30720));
        assert!(fargate_memory_options(300).is_none());
    }

    #[test]
    fn test_ecs_container_definition_secrets_and_no_env() {
        let (options, repo, lg, secrets) = inputs_fixture();
        let def = container_definition(&ContainerInputs {
            options: &options,
            repository: &repo,
            log_group: &lg,
            secrets: &secrets,
        });
        assert_eq!(def["Name"], "ScheduledContainer");
        assert_eq!(def["Essential"], true);
        assert!(def.get("Environment").is_none());
        let s = def["Secrets"].as_array().unwrap();
        assert_eq!(s.len(), 2);
        assert_eq!(s[0]["Name"], "INSTA_USER");
        assert_eq!(s[1]["Name"], "INSTA_PASSWORD");
        assert_eq!(
            s[1]["ValueFrom"]["Fn::Join"][1][6],
            ":parameter/insta_password"
        );
    }

    #[test]
    fn test_ecs_container_definition_environment() {
        let (mut options, repo, lg, _) = inputs_fixture();
        options.environment.insert("MODE".into(), "daily".into());
        let def = container_definition(&ContainerInputs {
            options: &options,
            repository: &repo,
            log_group: &lg,
            secrets: &[],
        });
        assert_eq!(def["Environment"], json!([{"Name": "MODE", "Value": "daily"}]));
        assert!(def.get("Secrets").is_none());
    }

    #[test]
    fn test_ecs_task_definition_resources() {
        let (options, repo, lg, secrets) = inputs_fixture();
        let mut stack = Stack::new("musabiStack", None);
        let td = declare_task_definition(
            &mut stack,
            "musabiScheduledTask",
            &ContainerInputs {
                options: &options,
                repository: &repo,
                log_group: &lg,
                secrets: &secrets,
            },
        )
        .unwrap();

        let r = &stack.resources()[&td.logical_id];
        assert_eq!(r.properties["Cpu"], "2048");
        assert_eq!(r.properties["Memory"], "4096");
        assert_eq!(r.properties["NetworkMode"], "awsvpc");
        assert_eq!(r.properties["RequiresCompatibilities"], json!(["FARGATE"]));
        assert_eq!(
            r.properties["ExecutionRoleArn"],
            get_att(&td.execution_role.logical_id, "Arn")
        );

        let policy = stack
            .resources()
            .values()
            .find(|r| r.resource_type == "AWS::IAM::Policy")
            .unwrap();
        let statements = policy.properties["PolicyDocument"]["Statement"]
            .as_array()
            .unwrap();
        // image pull, auth token, logs, one per secret
        assert_eq!(statements.len(), 5);
        assert_eq!(statements[1]["Resource"], "*");
    }

    #[test]
    fn test_ecs_hierarchical_secret_arn() {
        let param = SecureParameter::import(&SecretRef {
            id: String::new(),
            parameter_name: "/app/token".into(),
            version: 3,
        });
        assert_eq!(param.arn()["Fn::Join"][1][6], ":parameter/app/token");
    }
}
