//! Tag handling shared by every service module.
//!
//! All services use the same model: the provider carries a set of default
//! tags that are merged under each resource's own tags, AWS-internal tags
//! (`aws:` key prefix) are never managed, and configured ignore rules are
//! applied before tags are compared or written back to state.

use std::collections::{BTreeMap, HashMap};

use vela_core::resource::Value;
use vela_core::schema::{AttributeSchema, AttributeType};

/// An ordered set of resource tags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagMap(BTreeMap<String, String>);

impl TagMap {
    pub fn new() -> TagMap {
        TagMap(BTreeMap::new())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    /// Reads a map-of-strings attribute value. Missing values and entries of
    /// other types produce an empty map rather than an error; the schema has
    /// already validated the shape by the time tags are expanded.
    pub fn from_value(value: Option<&Value>) -> TagMap {
        let mut tags = BTreeMap::new();
        if let Some(Value::Map(map)) = value {
            for (key, value) in map {
                if let Value::String(s) = value {
                    tags.insert(key.clone(), s.clone());
                }
            }
        }
        TagMap(tags)
    }

    pub fn to_value(&self) -> Value {
        Value::Map(
            self.0
                .iter()
                .map(|(key, value)| (key.clone(), Value::String(value.clone())))
                .collect(),
        )
    }

    /// Merges provider default tags with a resource's own tags. The
    /// resource's value wins when both define the same key.
    pub fn merge(defaults: &TagMap, tags: &TagMap) -> TagMap {
        let mut merged = defaults.0.clone();
        for (key, value) in &tags.0 {
            merged.insert(key.clone(), value.clone());
        }
        TagMap(merged)
    }

    /// Drops AWS-internal tags.
    pub fn ignore_aws(mut self) -> TagMap {
        self.0.retain(|key, _| !key.starts_with("aws:"));
        self
    }

    /// Drops tags matched by the provider's ignore configuration.
    pub fn ignore(mut self, config: &IgnoreTags) -> TagMap {
        self.0.retain(|key, _| !config.matches(key));
        self
    }

    /// Drops tags that exactly match a provider default, leaving only the
    /// tags the resource itself declares.
    pub fn remove_defaults(&self, defaults: &TagMap) -> TagMap {
        TagMap(
            self.0
                .iter()
                .filter(|(key, value)| defaults.0.get(*key) != Some(*value))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        )
    }

    /// Splits the transition from `old` to `new` into the tags to create or
    /// overwrite and the keys to remove.
    pub fn diff(old: &TagMap, new: &TagMap) -> (TagMap, Vec<String>) {
        let upsert = new
            .0
            .iter()
            .filter(|(key, value)| old.0.get(*key) != Some(*value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        let remove = old
            .0
            .keys()
            .filter(|key| !new.0.contains_key(*key))
            .cloned()
            .collect();
        (TagMap(upsert), remove)
    }

    /// The map shape taken by services whose tag APIs accept `HashMap`
    /// inputs (AppConfig, GuardDuty).
    pub fn as_map(&self) -> HashMap<String, String> {
        self.0
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

impl FromIterator<(String, String)> for TagMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> TagMap {
        TagMap(iter.into_iter().collect())
    }
}

/// Tag keys the provider is configured to leave unmanaged.
#[derive(Debug, Clone, Default)]
pub struct IgnoreTags {
    pub keys: Vec<String>,
    pub key_prefixes: Vec<String>,
}

impl IgnoreTags {
    pub fn matches(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
            || self.key_prefixes.iter().any(|prefix| key.starts_with(prefix))
    }
}

/// The configurable `tags` attribute carried by every taggable resource.
pub fn tags_schema() -> AttributeSchema {
    AttributeSchema::new("tags", AttributeType::Map(Box::new(AttributeType::String)))
        .optional()
        .with_description("Tags to assign to the resource")
}

/// The computed `tags_all` attribute: resource tags merged over the
/// provider's default tags.
pub fn tags_all_schema() -> AttributeSchema {
    AttributeSchema::new("tags_all", AttributeType::Map(Box::new(AttributeType::String))).computed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn tags(pairs: &[(&str, &str)]) -> TagMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn merge_prefers_resource_tags_over_defaults() {
        let defaults = tags(&[("Environment", "prod"), ("Team", "platform")]);
        let resource = tags(&[("Team", "data"), ("Name", "primary")]);

        let merged = TagMap::merge(&defaults, &resource);

        assert_eq!(merged.get("Environment"), Some("prod"));
        assert_eq!(merged.get("Team"), Some("data"));
        assert_eq!(merged.get("Name"), Some("primary"));
    }

    #[test]
    fn ignore_aws_drops_internal_keys() {
        let filtered = tags(&[("aws:cloudformation:stack-name", "s"), ("Name", "primary")])
            .ignore_aws();

        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.get("Name"), Some("primary"));
    }

    #[test]
    fn ignore_applies_exact_keys_and_prefixes() {
        let config = IgnoreTags {
            keys: vec!["Budget".to_string()],
            key_prefixes: vec!["kubernetes.io/".to_string()],
        };
        let filtered = tags(&[
            ("Budget", "infra"),
            ("kubernetes.io/cluster/main", "owned"),
            ("Name", "primary"),
        ])
        .ignore(&config);

        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.get("Name"), Some("primary"));
    }

    #[test]
    fn remove_defaults_keeps_overridden_values() {
        let defaults = tags(&[("Environment", "prod"), ("Team", "platform")]);
        let remote = tags(&[("Environment", "prod"), ("Team", "data"), ("Name", "primary")]);

        let own = remote.remove_defaults(&defaults);

        assert_eq!(own.get("Environment"), None);
        assert_eq!(own.get("Team"), Some("data"));
        assert_eq!(own.get("Name"), Some("primary"));
    }

    #[test]
    fn diff_splits_upserts_and_removals() {
        let old = tags(&[("Name", "primary"), ("Team", "platform"), ("Stage", "beta")]);
        let new = tags(&[("Name", "primary"), ("Team", "data"), ("Owner", "sre")]);

        let (upsert, mut remove) = TagMap::diff(&old, &new);
        remove.sort();

        assert_eq!(upsert.get("Team"), Some("data"));
        assert_eq!(upsert.get("Owner"), Some("sre"));
        assert_eq!(upsert.get("Name"), None);
        assert_eq!(remove, vec!["Stage".to_string()]);
    }

    #[test]
    fn from_value_skips_non_string_entries() {
        let mut map = HashMap::new();
        map.insert("Name".to_string(), Value::String("primary".to_string()));
        map.insert("Count".to_string(), Value::Int(3));
        let value = Value::Map(map);

        let tags = TagMap::from_value(Some(&value));

        assert_eq!(tags.len(), 1);
        assert_eq!(tags.get("Name"), Some("primary"));
    }

    #[test]
    fn to_value_round_trips_through_from_value() {
        let original = tags(&[("Name", "primary"), ("Team", "data")]);
        let restored = TagMap::from_value(Some(&original.to_value()));
        assert_eq!(original, restored);
    }
}
