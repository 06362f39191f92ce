//! Stack declaration schema, synthesized template types, lock and plan types.
//!
//! Every declaration type implements `Default` as the musabi stack itself, so
//! `StackConfig::default()` is the literal declaration and a YAML file only
//! has to name what it changes.

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Top-level musabi.yaml
// ============================================================================

/// Root declaration of one stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct StackConfig {
    /// Schema version (must be "1.0")
    pub version: String,

    /// Stack name, also the construct path root
    pub stack: String,

    /// Optional template description
    pub description: Option<String>,

    /// Image registry
    pub repository: RepositorySpec,

    /// Scheduled task and its image configuration
    pub task: ScheduledTaskSpec,

    /// Where the task runs
    pub network: NetworkConfig,

    /// Lock file / provenance behavior
    pub policy: Policy,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            stack: "musabiStack".to_string(),
            description: None,
            repository: RepositorySpec::default(),
            task: ScheduledTaskSpec::default(),
            network: NetworkConfig::default(),
            policy: Policy::default(),
        }
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Removal behavior of a resource when its stack is deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RemovalPolicy {
    #[default]
    Destroy,
    Retain,
    Snapshot,
}

impl RemovalPolicy {
    /// Template-level policy attribute value.
    pub fn deletion_policy(self) -> DeletionPolicy {
        match self {
            Self::Destroy => DeletionPolicy::Delete,
            Self::Retain => DeletionPolicy::Retain,
            Self::Snapshot => DeletionPolicy::Snapshot,
        }
    }
}

impl fmt::Display for RemovalPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Destroy => write!(f, "destroy"),
            Self::Retain => write!(f, "retain"),
            Self::Snapshot => write!(f, "snapshot"),
        }
    }
}

/// Container image repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct RepositorySpec {
    /// Construct ID inside the stack
    pub id: String,

    /// Physical repository name
    pub name: String,

    /// Scan images on push
    pub image_scan_on_push: bool,

    /// Image retention rules
    pub lifecycle_rules: Vec<LifecycleRule>,

    /// Teardown behavior
    pub removal_policy: RemovalPolicy,
}

impl Default for RepositorySpec {
    fn default() -> Self {
        Self {
            id: "musabiRepository".to_string(),
            name: "musabi".to_string(),
            image_scan_on_push: false,
            lifecycle_rules: vec![LifecycleRule::default()],
            removal_policy: RemovalPolicy::Destroy,
        }
    }
}

/// Which images a lifecycle rule selects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TagStatus {
    #[default]
    Any,
    Tagged,
    Untagged,
}

impl fmt::Display for TagStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "any"),
            Self::Tagged => write!(f, "tagged"),
            Self::Untagged => write!(f, "untagged"),
        }
    }
}

/// One image retention rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct LifecycleRule {
    /// Free-form description
    #[serde(default)]
    pub description: Option<String>,

    /// Evaluation priority (lower runs first)
    pub rule_priority: u32,

    /// Tag selector
    #[serde(default)]
    pub tag_status: TagStatus,

    /// Tag prefixes, required for `tagged`
    #[serde(default)]
    pub tag_prefix_list: Vec<String>,

    /// Keep at most this many images
    #[serde(default)]
    pub max_image_count: Option<u32>,

    /// Expire images older than this many days
    #[serde(default)]
    pub max_image_age_days: Option<u32>,
}

impl Default for LifecycleRule {
    fn default() -> Self {
        Self {
            description: Some("Keep only one image.".to_string()),
            rule_priority: 1,
            tag_status: TagStatus::Any,
            tag_prefix_list: Vec::new(),
            max_image_count: Some(1),
            max_image_age_days: None,
        }
    }
}

// ============================================================================
// Schedule
// ============================================================================

/// Recurring trigger for the task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Schedule {
    Cron(CronOptions),
    Rate { value: u32, unit: RateUnit },
    Expression(String),
}

impl Default for Schedule {
    fn default() -> Self {
        Self::Cron(CronOptions {
            minute: Some("0".to_string()),
            hour: Some("3".to_string()),
            ..CronOptions::default()
        })
    }
}

/// Cron fields; unset fields default the way the six-field AWS form expects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct CronOptions {
    pub minute: Option<String>,
    pub hour: Option<String>,
    pub day: Option<String>,
    pub month: Option<String>,
    pub week_day: Option<String>,
    pub year: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RateUnit {
    Minutes,
    Hours,
    Days,
}

// ============================================================================
// Task
// ============================================================================

/// Scheduled Fargate task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct ScheduledTaskSpec {
    /// Construct ID inside the stack
    pub id: String,

    /// When the task fires
    #[serde(with = "serde_yaml_ng::with::singleton_map")]
    #[schemars(with = "Schedule")]
    pub schedule: Schedule,

    /// Rule state (ENABLED / DISABLED)
    pub enabled: bool,

    /// Tasks started per firing
    pub desired_task_count: u32,

    /// Container configuration
    pub image: TaskImageOptions,
}

impl Default for ScheduledTaskSpec {
    fn default() -> Self {
        Self {
            id: "musabiScheduledTask".to_string(),
            schedule: Schedule::default(),
            enabled: true,
            desired_task_count: 1,
            image: TaskImageOptions::default(),
        }
    }
}

/// Container image, resources, environment, secrets, and logging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct TaskImageOptions {
    /// Container name inside the task definition
    pub container_name: String,

    /// Tag of the repository image to run
    pub image_tag: String,

    /// CPU units
    pub cpu: u32,

    /// Memory in MiB
    pub memory_limit_mib: u32,

    /// Static environment variables
    pub environment: IndexMap<String, String>,

    /// Env var name → secure parameter
    pub secrets: IndexMap<String, SecretRef>,

    /// Log shipping
    pub logging: LogGroupSpec,
}

impl Default for TaskImageOptions {
    fn default() -> Self {
        let mut secrets = IndexMap::new();
        secrets.insert(
            "INSTA_USER".to_string(),
            SecretRef {
                id: "musabiInstaUser".to_string(),
                parameter_name: "insta_user".to_string(),
                version: 1,
            },
        );
        secrets.insert(
            "INSTA_PASSWORD".to_string(),
            SecretRef {
                id: "musabiInstaPass".to_string(),
                parameter_name: "insta_password".to_string(),
                version: 1,
            },
        );
        Self {
            container_name: "ScheduledContainer".to_string(),
            image_tag: "latest".to_string(),
            cpu: 2048,
            memory_limit_mib: 4096,
            environment: IndexMap::new(),
            secrets,
            logging: LogGroupSpec::default(),
        }
    }
}

/// Secure string parameter injected as an environment variable at task start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SecretRef {
    /// Construct ID of the parameter import
    #[serde(default)]
    pub id: String,

    /// Parameter store name
    pub parameter_name: String,

    /// Parameter version
    #[serde(default = "default_version")]
    pub version: u32,
}

fn default_version() -> u32 {
    1
}

/// Log destination of the container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct LogGroupSpec {
    /// Construct ID inside the stack
    pub id: String,

    /// Physical log group name
    pub log_group_name: String,

    /// awslogs stream prefix
    pub stream_prefix: String,

    /// How long events are kept
    pub retention: RetentionDays,

    /// Teardown behavior
    pub removal_policy: RemovalPolicy,
}

impl Default for LogGroupSpec {
    fn default() -> Self {
        Self {
            id: "musabiLogGroup".to_string(),
            log_group_name: "musabi".to_string(),
            stream_prefix: "musabi".to_string(),
            retention: RetentionDays::OneWeek,
            removal_policy: RemovalPolicy::Destroy,
        }
    }
}

/// Retention windows accepted by CloudWatch Logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RetentionDays {
    OneDay,
    ThreeDays,
    FiveDays,
    #[default]
    OneWeek,
    TwoWeeks,
    OneMonth,
    TwoMonths,
    ThreeMonths,
    FourMonths,
    FiveMonths,
    SixMonths,
    OneYear,
    ThirteenMonths,
    EighteenMonths,
    TwoYears,
    FiveYears,
    TenYears,
    Infinite,
}

impl RetentionDays {
    /// Number of days, `None` for never-expire.
    pub fn days(self) -> Option<u32> {
        match self {
            Self::OneDay => Some(1),
            Self::ThreeDays => Some(3),
            Self::FiveDays => Some(5),
            Self::OneWeek => Some(7),
            Self::TwoWeeks => Some(14),
            Self::OneMonth => Some(30),
            Self::TwoMonths => Some(60),
            Self::ThreeMonths => Some(90),
            Self::FourMonths => Some(120),
            Self::FiveMonths => Some(150),
            Self::SixMonths => Some(180),
            Self::OneYear => Some(365),
            Self::ThirteenMonths => Some(400),
            Self::EighteenMonths => Some(545),
            Self::TwoYears => Some(731),
            Self::FiveYears => Some(1827),
            Self::TenYears => Some(3653),
            Self::Infinite => None,
        }
    }
}

// ============================================================================
// Network
// ============================================================================

/// Networking for the task: synthesize a VPC, or import existing subnets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkConfig {
    /// Availability zones spanned by a synthesized VPC
    pub max_azs: u8,

    /// CIDR of a synthesized VPC
    pub cidr: String,

    /// Existing VPC (required with `subnet_ids`)
    pub vpc_id: Option<String>,

    /// Existing subnets; empty synthesizes a VPC
    pub subnet_ids: Vec<String>,

    /// Existing security groups; empty synthesizes one
    pub security_group_ids: Vec<String>,

    /// Public IP for the task ENI
    pub assign_public_ip: Option<bool>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            max_azs: 2,
            cidr: "10.0.0.0/16".to_string(),
            vpc_id: None,
            subnet_ids: Vec::new(),
            security_group_ids: Vec::new(),
            assign_public_ip: None,
        }
    }
}

impl NetworkConfig {
    /// True when subnets come from outside the stack.
    pub fn is_imported(&self) -> bool {
        !self.subnet_ids.is_empty()
    }
}

// ============================================================================
// Policy
// ============================================================================

/// Synthesis policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct Policy {
    /// Persist per-resource BLAKE3 hashes after synth
    pub lock_file: bool,

    /// Append provenance events on every synth
    pub tripwire: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            lock_file: true,
            tripwire: true,
        }
    }
}

// ============================================================================
// Synthesized template
// ============================================================================

/// A CloudFormation template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub resources: IndexMap<String, CfnResource>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub outputs: IndexMap<String, CfnOutput>,
}

/// One template resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnResource {
    #[serde(rename = "Type")]
    pub resource_type: String,

    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub properties: serde_json::Map<String, serde_json::Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_replace_policy: Option<DeletionPolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<DeletionPolicy>,
}

impl CfnResource {
    pub fn new(resource_type: &str) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            properties: serde_json::Map::new(),
            depends_on: Vec::new(),
            update_replace_policy: None,
            deletion_policy: None,
        }
    }

    /// Set a property, builder-style.
    pub fn prop(mut self, key: &str, value: serde_json::Value) -> Self {
        self.properties.insert(key.to_string(), value);
        self
    }

    /// Apply a removal policy to both teardown attributes.
    pub fn removal(mut self, policy: RemovalPolicy) -> Self {
        self.update_replace_policy = Some(policy.deletion_policy());
        self.deletion_policy = Some(policy.deletion_policy());
        self
    }

    pub fn depends_on(mut self, logical_id: &str) -> Self {
        self.depends_on.push(logical_id.to_string());
        self
    }
}

/// Template-level deletion attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeletionPolicy {
    Delete,
    Retain,
    Snapshot,
}

/// Template output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnOutput {
    pub value: serde_json::Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// ============================================================================
// State / Lock file
// ============================================================================

/// Per-stack lock written after synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackLock {
    /// Schema version
    pub schema: String,

    /// Stack name
    pub stack: String,

    /// When the lock was generated
    pub generated_at: String,

    /// Generator version
    pub generator: String,

    /// Template file written by the synth run
    pub template_file: String,

    /// BLAKE3 of the written template bytes
    pub template_hash: String,

    /// Per-resource hashes, in template order
    pub resources: IndexMap<String, ResourceLock>,
}

/// Per-resource lock entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLock {
    #[serde(rename = "type")]
    pub resource_type: String,

    /// BLAKE3 of the canonical JSON of the resource
    pub hash: String,
}

// ============================================================================
// Plan
// ============================================================================

/// Action the provisioning engine will take on a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanAction {
    Create,
    Update,
    Destroy,
    NoOp,
}

impl fmt::Display for PlanAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "CREATE"),
            Self::Update => write!(f, "UPDATE"),
            Self::Destroy => write!(f, "DESTROY"),
            Self::NoOp => write!(f, "NO-OP"),
        }
    }
}

/// A single planned change.
#[derive(Debug, Clone)]
pub struct PlannedChange {
    pub logical_id: String,
    pub resource_type: String,
    pub action: PlanAction,
    pub description: String,
}

/// Full plan for one stack.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub stack: String,
    pub changes: Vec<PlannedChange>,
    pub to_create: u32,
    pub to_update: u32,
    pub to_destroy: u32,
    pub unchanged: u32,
}

// ============================================================================
// Provenance events
// ============================================================================

/// Provenance event for the JSONL event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProvenanceEvent {
    SynthStarted {
        stack: String,
        run_id: String,
        musabi_version: String,
    },
    ResourceSynthesized {
        stack: String,
        logical_id: String,
        resource_type: String,
        hash: String,
    },
    SynthCompleted {
        stack: String,
        run_id: String,
        resources: u32,
        template_hash: String,
        total_seconds: f64,
    },
    SynthFailed {
        stack: String,
        run_id: String,
        error: String,
    },
    DriftDetected {
        stack: String,
        template_file: String,
        expected_hash: String,
        actual_hash: String,
    },
}

/// Timestamped event wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampedEvent {
    pub ts: String,
    #[serde(flatten)]
    pub event: ProvenanceEvent,
}
