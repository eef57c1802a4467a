//! Differ - Compare desired state with current state
//!
//! Compares the desired attributes of a resource with the state read back
//! from the cloud. Attributes whose schema carries a diff suppressor are only
//! reported when the suppressor lets the difference through.

use std::collections::HashMap;

use crate::resource::{Resource, ResourceData, ResourceId, State, Value};
use crate::schema::ResourceSchema;

/// Result of a diff operation
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    /// Resource does not exist -> needs creation
    Create(Resource),
    /// Resource exists with differences -> needs update
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Resource exists with no differences -> no action needed
    NoChange(ResourceId),
    /// Resource exists but not in desired state -> needs deletion
    Delete(ResourceId),
}

impl Diff {
    /// Returns whether this Diff involves a change
    pub fn is_change(&self) -> bool {
        !matches!(self, Diff::NoChange(_))
    }
}

/// Compare desired state with current state to compute a Diff
pub fn diff(schema: Option<&ResourceSchema>, desired: &Resource, current: &State) -> Diff {
    if !current.exists {
        return Diff::Create(desired.clone());
    }

    let changed = find_changed_attributes(schema, &desired.data(), &current.attributes);

    if changed.is_empty() {
        Diff::NoChange(desired.id.clone())
    } else {
        Diff::Update {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
        }
    }
}

/// Compute Diffs for a set of resources
///
/// Existing states with no desired counterpart are reported as `Delete`.
pub fn diff_all(
    schemas: &HashMap<String, ResourceSchema>,
    desired: &[Resource],
    current_states: &HashMap<ResourceId, State>,
) -> Vec<Diff> {
    let mut diffs = Vec::new();

    for resource in desired {
        let current = current_states
            .get(&resource.id)
            .cloned()
            .unwrap_or_else(|| State::not_found(resource.id.clone()));

        diffs.push(diff(
            schemas.get(&resource.id.resource_type),
            resource,
            &current,
        ));
    }

    let mut orphaned: Vec<&ResourceId> = current_states
        .iter()
        .filter(|(id, state)| state.exists && !desired.iter().any(|r| &r.id == *id))
        .map(|(id, _)| id)
        .collect();
    orphaned.sort_by(|a, b| (&a.resource_type, &a.name).cmp(&(&b.resource_type, &b.name)));
    diffs.extend(orphaned.into_iter().map(|id| Diff::Delete(id.clone())));

    diffs
}

/// Find changed attributes between desired and current state
fn find_changed_attributes(
    schema: Option<&ResourceSchema>,
    desired: &ResourceData,
    current: &HashMap<String, Value>,
) -> Vec<String> {
    let mut changed = Vec::new();

    for (key, desired_value) in desired.attributes() {
        // Skip internal attributes (starting with _)
        if key.starts_with('_') {
            continue;
        }

        let current_value = current.get(key);
        if current_value == Some(desired_value) {
            continue;
        }

        let suppress = schema
            .and_then(|s| s.attributes.get(key))
            .and_then(|attr| attr.diff_suppress)
            .is_some_and(|suppress| {
                let old = current_value.map(Value::render).unwrap_or_default();
                suppress(key, &old, &desired_value.render(), desired)
            });

        if !suppress {
            changed.push(key.clone());
        }
    }

    changed.sort();
    changed
}
