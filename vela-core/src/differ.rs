//! Differ - per-attribute change detection
//!
//! Compares a desired `Resource` with the last-observed `State` to decide
//! whether an update is needed and which attributes drive it. Update
//! handlers use `has_change` to gate individual Modify/Update API calls.

use std::collections::HashMap;

use crate::resource::{Resource, ResourceId, State, Value};

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

/// Compare desired configuration with observed state to compute a Diff
pub fn diff(desired: &Resource, current: &State) -> Diff {
    if !current.exists {
        return Diff::Create(desired.clone());
    }

    let changed = find_changed_attributes(&desired.attributes, &current.attributes);

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

/// Find attributes of the desired configuration whose values differ from
/// the observed state.
///
/// Keys present only in the observed state are computed read-backs (ARNs,
/// statuses, provider-assigned IDs) and never count as changes.
pub fn find_changed_attributes(
    desired: &HashMap<String, Value>,
    current: &HashMap<String, Value>,
) -> Vec<String> {
    let mut changed: Vec<String> = desired
        .iter()
        .filter(|(key, desired_value)| match current.get(*key) {
            Some(current_value) => current_value != *desired_value,
            None => true,
        })
        .map(|(key, _)| key.clone())
        .collect();

    // HashMap iteration order is arbitrary; keep the report stable
    changed.sort();
    changed
}

/// Whether a single attribute differs between observed state and desired
/// configuration. Mirrors the per-attribute gating in update handlers.
pub fn has_change(from: &State, to: &Resource, key: &str) -> bool {
    match (from.attributes.get(key), to.attributes.get(key)) {
        (Some(a), Some(b)) => a != b,
        (None, None) => false,
        // Desired-only means a newly set attribute; observed-only is a
        // computed read-back and not a change.
        (None, Some(_)) => true,
        (Some(_), None) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_create_when_not_exists() {
        let desired = Resource::new("guardduty_detector", "main");
        let current = State::not_found(ResourceId::new("guardduty_detector", "main"));

        let result = diff(&desired, &current);
        assert!(matches!(result, Diff::Create(_)));
    }

    #[test]
    fn diff_no_change_when_same() {
        let desired = Resource::new("guardduty_detector", "main")
            .with_attribute("enable", Value::Bool(true));

        let mut attrs = HashMap::new();
        attrs.insert("enable".to_string(), Value::Bool(true));
        attrs.insert(
            "account_id".to_string(),
            Value::String("123456789012".to_string()),
        );
        let current = State::existing(ResourceId::new("guardduty_detector", "main"), attrs);

        // The computed account_id read-back does not count as a change
        let result = diff(&desired, &current);
        assert!(matches!(result, Diff::NoChange(_)));
    }

    #[test]
    fn diff_update_when_different() {
        let desired = Resource::new("elasticache_user", "app")
            .with_attribute("access_string", Value::String("on ~app::* +@read".to_string()))
            .with_attribute("user_id", Value::String("app-user".to_string()));

        let mut attrs = HashMap::new();
        attrs.insert(
            "access_string".to_string(),
            Value::String("on ~* +@all".to_string()),
        );
        attrs.insert("user_id".to_string(), Value::String("app-user".to_string()));
        let current = State::existing(ResourceId::new("elasticache_user", "app"), attrs);

        match diff(&desired, &current) {
            Diff::Update {
                changed_attributes, ..
            } => {
                assert_eq!(changed_attributes, vec!["access_string".to_string()]);
            }
            other => panic!("Expected Update, got {other:?}"),
        }
    }

    #[test]
    fn has_change_gates_single_attributes() {
        let desired = Resource::new("elasticache_user_group", "app")
            .with_attribute(
                "user_ids",
                Value::List(vec![
                    Value::String("default".to_string()),
                    Value::String("app-user".to_string()),
                ]),
            );

        let mut attrs = HashMap::new();
        attrs.insert(
            "user_ids".to_string(),
            Value::List(vec![Value::String("default".to_string())]),
        );
        attrs.insert(
            "arn".to_string(),
            Value::String("arn:aws:elasticache:us-west-2:123456789012:usergroup:app".to_string()),
        );
        let current = State::existing(ResourceId::new("elasticache_user_group", "app"), attrs);

        assert!(has_change(&current, &desired, "user_ids"));
        // Observed-only computed attribute
        assert!(!has_change(&current, &desired, "arn"));
        assert!(!has_change(&current, &desired, "tags"));
    }
}
