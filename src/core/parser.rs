//! YAML parsing and validation of a stack declaration.
//!
//! Validation collects every violation instead of stopping at the first:
//! - version must be "1.0"
//! - names must be legal for the resources they become
//! - lifecycle rules must be well-formed and unambiguous
//! - the schedule must render to a valid expression
//! - CPU/memory must be a Fargate-supported pair
//! - secrets must not shadow static environment variables
//! - the network must be synthesizable or fully imported

use super::error::{MusabiError, Result};
use super::schedule;
use super::types::*;
use crate::resources::{ecs, network};
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

static STACK_NAME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9-]{0,127}$").ok());
static REPOSITORY_NAME: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^(?:[a-z0-9]+(?:[._-][a-z0-9]+)*/)*[a-z0-9]+(?:[._-][a-z0-9]+)*$").ok()
});
static ENV_VAR: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").ok());
static LOG_GROUP_NAME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_\-/.#]{1,512}$").ok());

fn matches(pattern: &LazyLock<Option<Regex>>, value: &str) -> bool {
    Option::as_ref(pattern).is_some_and(|re| re.is_match(value))
}

/// Validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Parse a stack declaration file from disk.
pub fn parse_config_file(path: &Path) -> Result<StackConfig> {
    let content = std::fs::read_to_string(path).map_err(|source| MusabiError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_config(&content)
}

/// Parse a stack declaration from a string. An empty document is the
/// built-in declaration.
pub fn parse_config(yaml: &str) -> Result<StackConfig> {
    if yaml.trim().is_empty() {
        return Ok(StackConfig::default());
    }
    Ok(serde_yaml_ng::from_str(yaml)?)
}

/// `Err(Validation)` carrying every violation, or `Ok` for a clean config.
pub fn check(config: &StackConfig) -> Result<()> {
    let errors = validate_config(config);
    if errors.is_empty() {
        return Ok(());
    }
    Err(MusabiError::Validation(
        errors.into_iter().map(|e| e.message).collect(),
    ))
}

/// Validate a parsed config. Returns a list of errors (empty = valid).
pub fn validate_config(config: &StackConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut push = |message: String| errors.push(ValidationError { message });

    if config.version != "1.0" {
        push(format!("version must be \"1.0\", got \"{}\"", config.version));
    }
    if !matches(&STACK_NAME, &config.stack) {
        push(format!(
            "stack name '{}' must start with a letter and contain only letters, digits, and hyphens",
            config.stack
        ));
    }

    validate_repository(&config.repository, &mut push);
    validate_task(&config.task, &mut push);
    validate_network(&config.network, &mut push);

    let mut ids = HashSet::new();
    let construct_ids = [
        config.repository.id.as_str(),
        config.task.id.as_str(),
        config.task.image.logging.id.as_str(),
    ];
    for id in construct_ids {
        if id.is_empty() {
            push("construct IDs must not be empty".to_string());
        } else if !ids.insert(id) {
            push(format!("construct ID '{}' is used twice", id));
        }
    }
    // Secret imports without an ID add no construct.
    for secret in config.task.image.secrets.values() {
        let id = secret.id.as_str();
        if !id.is_empty() && !ids.insert(id) {
            push(format!("construct ID '{}' is used twice", id));
        }
    }

    errors
}

fn validate_repository(repo: &RepositorySpec, push: &mut impl FnMut(String)) {
    if !(2..=256).contains(&repo.name.len()) || !matches(&REPOSITORY_NAME, &repo.name) {
        push(format!(
            "repository name '{}' must be 2-256 lowercase characters, digits, and . _ - / separators",
            repo.name
        ));
    }
    if repo.removal_policy == RemovalPolicy::Snapshot {
        push("repository removal_policy cannot be snapshot".to_string());
    }

    let mut priorities = HashSet::new();
    let max_priority = repo.lifecycle_rules.iter().map(|r| r.rule_priority).max();
    for rule in &repo.lifecycle_rules {
        let p = rule.rule_priority;
        if p == 0 {
            push("lifecycle rule_priority must be at least 1".to_string());
        }
        if !priorities.insert(p) {
            push(format!("lifecycle rule_priority {} is used twice", p));
        }
        match (rule.max_image_count, rule.max_image_age_days) {
            (Some(_), Some(_)) | (None, None) => push(format!(
                "lifecycle rule {} needs exactly one of max_image_count and max_image_age_days",
                p
            )),
            (Some(0), None) | (None, Some(0)) => {
                push(format!("lifecycle rule {} must keep at least 1", p))
            }
            _ => {}
        }
        match rule.tag_status {
            TagStatus::Tagged if rule.tag_prefix_list.is_empty() => push(format!(
                "lifecycle rule {} is tagged but has no tag_prefix_list",
                p
            )),
            TagStatus::Any | TagStatus::Untagged if !rule.tag_prefix_list.is_empty() => push(
                format!("lifecycle rule {} has tag_prefix_list but is not tagged", p),
            ),
            TagStatus::Any if Some(p) != max_priority => push(format!(
                "lifecycle rule {} selects any tag and must have the highest rule_priority",
                p
            )),
            _ => {}
        }
    }
}

fn validate_task(task: &ScheduledTaskSpec, push: &mut impl FnMut(String)) {
    if let Err(e) = schedule::expression(&task.schedule) {
        push(e.to_string());
    }
    if task.desired_task_count == 0 {
        push("desired_task_count must be at least 1".to_string());
    }

    let image = &task.image;
    if image.container_name.is_empty() {
        push("container_name must not be empty".to_string());
    }
    if image.image_tag.is_empty() {
        push("image_tag must not be empty".to_string());
    }
    match ecs::fargate_memory_options(image.cpu) {
        None => push(format!(
            "cpu {} is not a Fargate size (256, 512, 1024, 2048, 4096)",
            image.cpu
        )),
        Some(options) if !options.contains(&image.memory_limit_mib) => push(format!(
            "memory_limit_mib {} is not valid with cpu {} (allowed: {}-{})",
            image.memory_limit_mib,
            image.cpu,
            options.first().copied().unwrap_or_default(),
            options.last().copied().unwrap_or_default()
        )),
        Some(_) => {}
    }

    for name in image.environment.keys() {
        if !matches(&ENV_VAR, name) {
            push(format!("environment variable name '{}' is invalid", name));
        }
    }
    for (name, secret) in &image.secrets {
        if !matches(&ENV_VAR, name) {
            push(format!("secret variable name '{}' is invalid", name));
        }
        if image.environment.contains_key(name) {
            push(format!("'{}' is both an environment variable and a secret", name));
        }
        if secret.parameter_name.is_empty() {
            push(format!("secret '{}' has no parameter_name", name));
        }
        if secret.version == 0 {
            push(format!("secret '{}' version must be at least 1", name));
        }
    }

    let logging = &image.logging;
    if !matches(&LOG_GROUP_NAME, &logging.log_group_name) {
        push(format!("log group name '{}' is invalid", logging.log_group_name));
    }
    if logging.stream_prefix.is_empty() {
        push("stream_prefix must not be empty".to_string());
    }
    if logging.removal_policy == RemovalPolicy::Snapshot {
        push("log group removal_policy cannot be snapshot".to_string());
    }
}

fn validate_network(net: &NetworkConfig, push: &mut impl FnMut(String)) {
    if net.is_imported() {
        if net.vpc_id.as_deref().is_none_or(str::is_empty) {
            push("imported subnet_ids need a vpc_id".to_string());
        }
        return;
    }
    if !(1..=6).contains(&net.max_azs) {
        push(format!("max_azs must be 1-6, got {}", net.max_azs));
        return;
    }
    match network::parse_cidr(&net.cidr) {
        Ok((_, prefix)) if !(16..=24).contains(&prefix) => push(format!(
            "VPC cidr '{}' must have a prefix between /16 and /24",
            net.cidr
        )),
        Ok(_) => {
            if let Err(e) = network::split_cidr(&net.cidr, net.max_azs) {
                push(e.to_string());
            }
        }
        Err(e) => push(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(config: &StackConfig) -> Vec<String> {
        validate_config(config).into_iter().map(|e| e.message).collect()
    }

    #[test]
    fn test_parser_default_is_valid() {
        let errors = messages(&StackConfig::default());
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
    }

    #[test]
    fn test_parser_empty_document_is_default() {
        assert_eq!(parse_config("").unwrap(), StackConfig::default());
        assert_eq!(parse_config("  \n").unwrap(), StackConfig::default());
    }

    #[test]
    fn test_parser_parse_valid() {
        let yaml = r#"
version: "1.0"
stack: nightly
repository:
  name: team/nightly-job
task:
  schedule:
    cron: { minute: "30", hour: "1" }
  image:
    cpu: 512
    memory_limit_mib: 2048
    environment: { MODE: batch }
"#;
        let config = parse_config(yaml).unwrap();
        assert_eq!(config.stack, "nightly");
        assert!(messages(&config).is_empty());
    }

    #[test]
    fn test_parser_bad_version() {
        let config = parse_config("version: \"2.0\"\n").unwrap();
        assert!(messages(&config).iter().any(|e| e.contains("version")));
    }

    #[test]
    fn test_parser_bad_names() {
        let mut config = StackConfig::default();
        config.stack = "9lives".into();
        config.repository.name = "Musabi".into();
        config.task.image.logging.log_group_name = "bad name".into();
        let errors = messages(&config);
        assert_eq!(errors.len(), 3, "{:?}", errors);
    }

    #[test]
    fn test_parser_lifecycle_rule_problems() {
        let mut config = StackConfig::default();
        config.repository.lifecycle_rules = vec![
            LifecycleRule::default(),
            LifecycleRule {
                description: None,
                rule_priority: 2,
                tag_status: TagStatus::Tagged,
                tag_prefix_list: vec![],
                max_image_count: Some(3),
                max_image_age_days: Some(7),
            },
        ];
        let errors = messages(&config);
        assert!(errors.iter().any(|e| e.contains("exactly one of")));
        assert!(errors.iter().any(|e| e.contains("no tag_prefix_list")));
        assert!(errors.iter().any(|e| e.contains("highest rule_priority")));
    }

    #[test]
    fn test_parser_lifecycle_duplicate_priority_and_zero_count() {
        let mut config = StackConfig::default();
        let mut rule = LifecycleRule::default();
        rule.max_image_count = Some(0);
        config.repository.lifecycle_rules = vec![rule.clone(), rule];
        let errors = messages(&config);
        assert!(errors.iter().any(|e| e.contains("used twice")));
        assert!(errors.iter().any(|e| e.contains("at least 1")));
    }

    #[test]
    fn test_parser_snapshot_rejected() {
        let mut config = StackConfig::default();
        config.repository.removal_policy = RemovalPolicy::Snapshot;
        config.task.image.logging.removal_policy = RemovalPolicy::Snapshot;
        assert_eq!(messages(&config).len(), 2);
    }

    #[test]
    fn test_parser_fargate_pairs() {
        let mut config = StackConfig::default();
        config.task.image.memory_limit_mib = 2048;
        assert!(messages(&config)
            .iter()
            .any(|e| e.contains("not valid with cpu 2048")));

        config.task.image.cpu = 3000;
        assert!(messages(&config).iter().any(|e| e.contains("not a Fargate size")));
    }

    #[test]
    fn test_parser_bad_schedule() {
        let yaml = "task:\n  schedule:\n    cron: { minute: '61', hour: '3' }\n";
        let config = parse_config(yaml).unwrap();
        assert!(messages(&config).iter().any(|e| e.contains("minute")));
    }

    #[test]
    fn test_parser_secret_problems() {
        let mut config = StackConfig::default();
        config
            .task
            .image
            .environment
            .insert("INSTA_USER".into(), "plain".into());
        config.task.image.secrets.insert(
            "9BAD".into(),
            SecretRef {
                id: String::new(),
                parameter_name: String::new(),
                version: 0,
            },
        );
        let errors = messages(&config);
        assert!(errors.iter().any(|e| e.contains("both an environment variable")));
        assert!(errors.iter().any(|e| e.contains("'9BAD' is invalid")));
        assert!(errors.iter().any(|e| e.contains("no parameter_name")));
        assert!(errors.iter().any(|e| e.contains("version must be")));
    }

    #[test]
    fn test_parser_network_problems() {
        let mut config = StackConfig::default();
        config.network.cidr = "10.0.0.0/8".into();
        assert!(messages(&config).iter().any(|e| e.contains("/16 and /24")));

        config.network.cidr = "10.0.0.0/24".into();
        config.network.max_azs = 7;
        assert!(messages(&config).iter().any(|e| e.contains("max_azs")));

        config.network.max_azs = 2;
        config.network.subnet_ids = vec!["subnet-1".into()];
        assert!(messages(&config).iter().any(|e| e.contains("vpc_id")));
    }

    #[test]
    fn test_parser_duplicate_construct_ids() {
        let mut config = StackConfig::default();
        config.task.image.logging.id = config.repository.id.clone();
        assert!(messages(&config).iter().any(|e| e.contains("used twice")));
    }

    #[test]
    fn test_parser_duplicate_secret_construct_ids() {
        let mut config = StackConfig::default();
        let user_id = config.task.image.secrets["INSTA_USER"].id.clone();
        config.task.image.secrets["INSTA_PASSWORD"].id = user_id.clone();
        let errors = messages(&config);
        assert!(errors
            .iter()
            .any(|e| e.contains(&format!("construct ID '{}' is used twice", user_id))));

        let mut config = StackConfig::default();
        config.task.image.secrets["INSTA_USER"].id = config.repository.id.clone();
        assert!(messages(&config).iter().any(|e| e.contains("used twice")));
    }

    #[test]
    fn test_parser_check_collects_all() {
        let mut config = StackConfig::default();
        config.version = "0.9".into();
        config.task.desired_task_count = 0;
        match check(&config) {
            Err(MusabiError::Validation(errs)) => assert_eq!(errs.len(), 2),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_parser_parse_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("musabi.yaml");
        std::fs::write(&path, "stack: fromFile\n").unwrap();
        let config = parse_config_file(&path).unwrap();
        assert_eq!(config.stack, "fromFile");
        check(&config).unwrap();
    }

    #[test]
    fn test_parser_missing_file() {
        let err = parse_config_file(Path::new("/nonexistent/musabi.yaml")).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }

    #[test]
    fn test_parser_parse_invalid_yaml() {
        let result = parse_config("not: [valid: yaml: {{");
        assert!(matches!(result, Err(MusabiError::Yaml(_))));
    }
}
