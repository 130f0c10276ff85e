//! Resource - resources, their desired configuration, and observed state

use std::collections::HashMap;

/// Unique identifier for a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId {
    /// Resource type (e.g., "guardduty_detector", "elasticache_user_group")
    pub resource_type: String,
    /// Name given to this instance in configuration
    pub name: String,
}

impl ResourceId {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }
}

/// Attribute value of a resource
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Bool(bool),
    List(Vec<Value>),
    Map(HashMap<String, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// Desired configuration for a resource
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub id: ResourceId,
    pub attributes: HashMap<String, Value>,
    /// If true, this is a data source (read-only lookup) that won't be managed
    pub read_only: bool,
}

impl Resource {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ResourceId::new(resource_type, name),
            attributes: HashMap::new(),
            read_only: false,
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Returns true if this resource is a data source (read-only)
    pub fn is_data_source(&self) -> bool {
        self.read_only
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        attr_string(&self.attributes, key)
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        attr_int(&self.attributes, key)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        attr_bool(&self.attributes, key)
    }

    pub fn get_list(&self, key: &str) -> Option<&[Value]> {
        attr_list(&self.attributes, key)
    }

    pub fn get_map(&self, key: &str) -> Option<&HashMap<String, Value>> {
        attr_map(&self.attributes, key)
    }

    /// Collect the string items of a list attribute
    pub fn get_string_list(&self, key: &str) -> Option<Vec<String>> {
        attr_string_list(&self.attributes, key)
    }
}

/// Current state fetched from the remote API
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub id: ResourceId,
    /// Remote identifier assigned by the provider (e.g., a detector ID,
    /// or an encoded composite ID)
    pub identifier: Option<String>,
    pub attributes: HashMap<String, Value>,
    /// Whether the remote resource exists
    pub exists: bool,
}

impl State {
    pub fn not_found(id: ResourceId) -> Self {
        Self {
            id,
            identifier: None,
            attributes: HashMap::new(),
            exists: false,
        }
    }

    pub fn existing(id: ResourceId, attributes: HashMap<String, Value>) -> Self {
        Self {
            id,
            identifier: None,
            attributes,
            exists: true,
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        attr_string(&self.attributes, key)
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        attr_int(&self.attributes, key)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        attr_bool(&self.attributes, key)
    }

    pub fn get_list(&self, key: &str) -> Option<&[Value]> {
        attr_list(&self.attributes, key)
    }

    pub fn get_map(&self, key: &str) -> Option<&HashMap<String, Value>> {
        attr_map(&self.attributes, key)
    }

    pub fn get_string_list(&self, key: &str) -> Option<Vec<String>> {
        attr_string_list(&self.attributes, key)
    }
}

fn attr_string<'a>(attrs: &'a HashMap<String, Value>, key: &str) -> Option<&'a str> {
    match attrs.get(key) {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

fn attr_int(attrs: &HashMap<String, Value>, key: &str) -> Option<i64> {
    attrs.get(key).and_then(Value::as_int)
}

fn attr_bool(attrs: &HashMap<String, Value>, key: &str) -> Option<bool> {
    attrs.get(key).and_then(Value::as_bool)
}

fn attr_list<'a>(attrs: &'a HashMap<String, Value>, key: &str) -> Option<&'a [Value]> {
    match attrs.get(key) {
        Some(Value::List(items)) => Some(items),
        _ => None,
    }
}

fn attr_map<'a>(
    attrs: &'a HashMap<String, Value>,
    key: &str,
) -> Option<&'a HashMap<String, Value>> {
    match attrs.get(key) {
        Some(Value::Map(map)) => Some(map),
        _ => None,
    }
}

fn attr_string_list(attrs: &HashMap<String, Value>, key: &str) -> Option<Vec<String>> {
    match attrs.get(key) {
        Some(Value::List(items)) => Some(
            items
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect(),
        ),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_getters_match_value_variants() {
        let resource = Resource::new("elasticache_user", "app")
            .with_attribute("user_id", Value::String("app-user".to_string()))
            .with_attribute("no_password_required", Value::Bool(true))
            .with_attribute(
                "passwords",
                Value::List(vec![Value::String("hunter22hunter22".to_string())]),
            );

        assert_eq!(resource.get_string("user_id"), Some("app-user"));
        assert_eq!(resource.get_bool("no_password_required"), Some(true));
        assert_eq!(
            resource.get_string_list("passwords"),
            Some(vec!["hunter22hunter22".to_string()])
        );
        assert_eq!(resource.get_string("missing"), None);
        // Wrong type reads as absent
        assert_eq!(resource.get_int("user_id"), None);
    }

    #[test]
    fn state_not_found_has_no_identifier() {
        let state = State::not_found(ResourceId::new("directconnect_gateway", "main"));
        assert!(!state.exists);
        assert_eq!(state.identifier, None);
    }
}
