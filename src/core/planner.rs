//! Plan generation: diff a synthesized template against the last lock.

use super::types::*;
use crate::tripwire::hasher;
use indexmap::IndexMap;

/// Generate an execution plan by comparing a template to lock state.
///
/// Resources are listed in `execution_order`; anything the lock knows that
/// the template no longer declares is appended as a destroy.
pub fn plan(
    template: &Template,
    stack: &str,
    execution_order: &[String],
    lock: Option<&StackLock>,
) -> ExecutionPlan {
    let mut changes = Vec::new();
    let mut to_create = 0u32;
    let mut to_update = 0u32;
    let mut to_destroy = 0u32;
    let mut unchanged = 0u32;

    for logical_id in execution_order {
        let resource = match template.resources.get(logical_id) {
            Some(r) => r,
            None => continue,
        };
        let action = determine_action(logical_id, resource, lock);
        match action {
            PlanAction::Create => to_create += 1,
            PlanAction::Update => to_update += 1,
            PlanAction::Destroy => to_destroy += 1,
            PlanAction::NoOp => unchanged += 1,
        }
        changes.push(PlannedChange {
            logical_id: logical_id.clone(),
            resource_type: resource.resource_type.clone(),
            description: describe_action(logical_id, &resource.resource_type, &action),
            action,
        });
    }

    if let Some(lock) = lock {
        for (logical_id, rl) in &lock.resources {
            if template.resources.contains_key(logical_id) {
                continue;
            }
            to_destroy += 1;
            changes.push(PlannedChange {
                logical_id: logical_id.clone(),
                resource_type: rl.resource_type.clone(),
                description: describe_action(logical_id, &rl.resource_type, &PlanAction::Destroy),
                action: PlanAction::Destroy,
            });
        }
    }

    tracing::debug!(stack, to_create, to_update, to_destroy, unchanged, "plan computed");
    ExecutionPlan {
        stack: stack.to_string(),
        changes,
        to_create,
        to_update,
        to_destroy,
        unchanged,
    }
}

fn determine_action(logical_id: &str, resource: &CfnResource, lock: Option<&StackLock>) -> PlanAction {
    let Some(rl) = lock.and_then(|l| l.resources.get(logical_id)) else {
        return PlanAction::Create;
    };
    if rl.resource_type != resource.resource_type {
        return PlanAction::Update;
    }
    if rl.hash == hash_resource(resource) {
        PlanAction::NoOp
    } else {
        PlanAction::Update
    }
}

/// BLAKE3 of the canonical JSON of one resource.
pub fn hash_resource(resource: &CfnResource) -> String {
    match serde_json::to_value(resource) {
        Ok(value) => hasher::hash_json(&value),
        // A resource is plain maps and strings; serialization cannot fail.
        Err(_) => hasher::hash_string(&resource.resource_type),
    }
}

/// Lock entries for every resource of a template, in template order.
pub fn resource_hashes(template: &Template) -> IndexMap<String, ResourceLock> {
    template
        .resources
        .iter()
        .map(|(id, r)| {
            (
                id.clone(),
                ResourceLock {
                    resource_type: r.resource_type.clone(),
                    hash: hash_resource(r),
                },
            )
        })
        .collect()
}

fn describe_action(logical_id: &str, resource_type: &str, action: &PlanAction) -> String {
    match action {
        PlanAction::Create => format!("{}: create {}", logical_id, resource_type),
        PlanAction::Update => format!("{}: update (properties changed)", logical_id),
        PlanAction::Destroy => format!("{}: destroy {}", logical_id, resource_type),
        PlanAction::NoOp => format!("{}: no changes", logical_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{resolver, synth};

    fn fixture() -> (Template, Vec<String>) {
        let t = synth::synthesize(&StackConfig::default()).unwrap();
        let order = resolver::build_execution_order(&t).unwrap();
        (t, order)
    }

    fn lock_for(template: &Template) -> StackLock {
        StackLock {
            schema: "1.0".to_string(),
            stack: "musabiStack".to_string(),
            generated_at: "2026-01-01T00:00:00Z".to_string(),
            generator: "musabi".to_string(),
            template_file: "cdk.out/musabiStack.template.json".to_string(),
            template_hash: "blake3:xxx".to_string(),
            resources: resource_hashes(template),
        }
    }

    #[test]
    fn test_planner_all_create() {
        let (t, order) = fixture();
        let plan = plan(&t, "musabiStack", &order, None);
        assert_eq!(plan.to_create as usize, t.resources.len());
        assert_eq!(plan.to_update + plan.to_destroy + plan.unchanged, 0);
        assert!(plan.changes.iter().all(|c| c.action == PlanAction::Create));
    }

    #[test]
    fn test_planner_all_unchanged() {
        let (t, order) = fixture();
        let lock = lock_for(&t);
        let plan = plan(&t, "musabiStack", &order, Some(&lock));
        assert_eq!(plan.unchanged as usize, t.resources.len());
        assert_eq!(plan.to_create, 0);
    }

    #[test]
    fn test_planner_update_on_hash_mismatch() {
        let (t, order) = fixture();
        let mut lock = lock_for(&t);
        let first = lock.resources.keys().next().unwrap().clone();
        lock.resources[&first].hash = "blake3:stale".to_string();
        let plan = plan(&t, "musabiStack", &order, Some(&lock));
        assert_eq!(plan.to_update, 1);
        let change = plan.changes.iter().find(|c| c.logical_id == first).unwrap();
        assert!(change.description.contains("update"));
    }

    #[test]
    fn test_planner_destroy_removed_resource() {
        let (t, order) = fixture();
        let mut lock = lock_for(&t);
        lock.resources.insert(
            "OldBucketABCDEF12".to_string(),
            ResourceLock {
                resource_type: "AWS::S3::Bucket".to_string(),
                hash: "blake3:xxx".to_string(),
            },
        );
        let plan = plan(&t, "musabiStack", &order, Some(&lock));
        assert_eq!(plan.to_destroy, 1);
        let last = plan.changes.last().unwrap();
        assert_eq!(last.action, PlanAction::Destroy);
        assert_eq!(last.logical_id, "OldBucketABCDEF12");
    }

    #[test]
    fn test_planner_follows_execution_order() {
        let (t, order) = fixture();
        let plan = plan(&t, "musabiStack", &order, None);
        let ids: Vec<&String> = plan.changes.iter().map(|c| &c.logical_id).collect();
        assert_eq!(ids, order.iter().collect::<Vec<_>>());
    }

    #[test]
    fn test_planner_hash_deterministic() {
        let r = CfnResource::new("AWS::ECS::Cluster");
        let h1 = hash_resource(&r);
        assert_eq!(h1, hash_resource(&r.clone()));
        assert!(h1.starts_with("blake3:"));
    }
}
