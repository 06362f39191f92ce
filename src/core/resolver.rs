//! Reference resolution and dependency DAG over a synthesized template.
//!
//! Edges come from `DependsOn` and from every `Ref` / `Fn::GetAtt` inside a
//! resource's properties. Dangling references are rejected. Topological
//! order uses Kahn's algorithm with deterministic (alphabetical) tie-breaking,
//! which is the order the provisioning engine is free to create resources in.

use super::error::{MusabiError, Result};
use super::intrinsics;
use super::types::Template;
use std::collections::{BTreeSet, HashMap, VecDeque};

/// Direct dependencies of each resource, validated against the template.
pub fn dependencies(template: &Template) -> Result<HashMap<String, BTreeSet<String>>> {
    let mut deps = HashMap::new();
    for (id, resource) in &template.resources {
        let mut edges = BTreeSet::new();
        let props = serde_json::Value::Object(resource.properties.clone());
        for target in intrinsics::referenced_ids(&props)
            .into_iter()
            .chain(resource.depends_on.iter().cloned())
        {
            if !template.resources.contains_key(&target) {
                return Err(MusabiError::UnknownReference {
                    from: id.clone(),
                    to: target,
                });
            }
            if &target == id {
                return Err(MusabiError::DependencyCycle(id.clone()));
            }
            edges.insert(target);
        }
        deps.insert(id.clone(), edges);
    }

    for (id, output) in &template.outputs {
        for target in intrinsics::referenced_ids(&output.value) {
            if !template.resources.contains_key(&target) {
                return Err(MusabiError::UnknownReference {
                    from: format!("output {}", id),
                    to: target,
                });
            }
        }
    }

    Ok(deps)
}

/// Build a creation order for the template's resources.
pub fn build_execution_order(template: &Template) -> Result<Vec<String>> {
    let deps = dependencies(template)?;

    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for (id, edges) in &deps {
        in_degree.insert(id.as_str(), edges.len());
        for dep in edges {
            dependents.entry(dep.as_str()).or_default().push(id.as_str());
        }
    }

    let mut ready: Vec<&str> = in_degree
        .iter()
        .filter(|(_, &d)| d == 0)
        .map(|(id, _)| *id)
        .collect();
    ready.sort_unstable();
    let mut queue: VecDeque<&str> = ready.into_iter().collect();

    let mut order = Vec::with_capacity(deps.len());
    while let Some(current) = queue.pop_front() {
        order.push(current.to_string());
        let mut next_ready = Vec::new();
        for &dependent in dependents.get(current).map(Vec::as_slice).unwrap_or_default() {
            if let Some(degree) = in_degree.get_mut(dependent) {
                *degree -= 1;
                if *degree == 0 {
                    next_ready.push(dependent);
                }
            }
        }
        next_ready.sort_unstable();
        queue.extend(next_ready);
    }

    if order.len() != deps.len() {
        let mut remaining: Vec<&str> = in_degree
            .iter()
            .filter(|(_, &d)| d > 0)
            .map(|(id, _)| *id)
            .collect();
        remaining.sort_unstable();
        return Err(MusabiError::DependencyCycle(remaining.join(", ")));
    }

    Ok(order)
}
