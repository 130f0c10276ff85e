//! Provider - trait abstracting resource operations
//!
//! A Provider implements the schema-and-CRUD contract for one infrastructure
//! backend. The hosting orchestrator owns planning, ordering, and state
//! persistence; it drives these operations one resource instance at a time.

use std::future::Future;
use std::pin::Pin;

use crate::resource::{Resource, ResourceId, State};
use crate::schema::ResourceSchema;

/// Error type for Provider operations
#[derive(Debug)]
pub struct ProviderError {
    pub message: String,
    pub resource_id: Option<ResourceId>,
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref id) = self.resource_id {
            write!(f, "[{}.{}] {}", id.resource_type, id.name, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|e| e.as_ref() as &dyn std::error::Error)
    }
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            resource_id: None,
            cause: None,
        }
    }

    pub fn for_resource(mut self, id: ResourceId) -> Self {
        self.resource_id = Some(id);
        self
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Return type for async operations
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Definition of resource types that a Provider can handle
pub trait ResourceType: Send + Sync {
    /// Resource type name (e.g., "guardduty_detector")
    fn name(&self) -> &'static str;

    /// Attribute schema for this resource type
    fn schema(&self) -> ResourceSchema;
}

/// Main Provider trait
///
/// Each infrastructure provider implements this trait. All operations are
/// async and involve side effects against the remote control plane.
pub trait Provider: Send + Sync {
    /// Name of this Provider (e.g., "aws")
    fn name(&self) -> &'static str;

    /// Managed resource types this Provider can handle
    fn resource_types(&self) -> Vec<Box<dyn ResourceType>>;

    /// Read-only data source types this Provider can handle
    fn data_source_types(&self) -> Vec<Box<dyn ResourceType>> {
        vec![]
    }

    /// Get the current state of a resource
    ///
    /// The identifier is the remote ID recorded at create time. Without one
    /// the resource was never created, and the result is `State::not_found`.
    /// A remote "not found" also yields `State::not_found` rather than an
    /// error: the resource is presumed deleted out-of-band.
    fn read(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> BoxFuture<'_, ProviderResult<State>>;

    /// Create a resource
    ///
    /// Returns State with identifier set to the remote ID (e.g., a detector
    /// ID, or an encoded composite ID)
    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>>;

    /// Update a resource in place
    ///
    /// Only called for attribute changes that do not force replacement;
    /// handlers gate each Modify/Update call on per-attribute change
    /// detection between `from` and `to`.
    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>>;

    /// Delete a resource
    ///
    /// A remote "not found" is success: the outcome (resource gone) already
    /// holds.
    fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>>;

    /// Read a data source
    ///
    /// Data sources are looked up from their configuration attributes
    /// (filters, IDs) rather than a stored identifier, so they get their
    /// own operation instead of `read`.
    fn read_data_source(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let id = resource.id.clone();
        Box::pin(async move {
            Err(ProviderError::new("Provider has no data sources").for_resource(id))
        })
    }
}

/// Provider implementation for Box<dyn Provider>
/// This enables dynamic dispatch for Providers
impl Provider for Box<dyn Provider> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        (**self).resource_types()
    }

    fn data_source_types(&self) -> Vec<Box<dyn ResourceType>> {
        (**self).data_source_types()
    }

    fn read(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).read(id, identifier)
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).create(resource)
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).update(id, identifier, from, to)
    }

    fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
        (**self).delete(id, identifier)
    }

    fn read_data_source(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).read_data_source(resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Value;

    // Mock Provider for testing
    struct MockProvider;

    impl Provider for MockProvider {
        fn name(&self) -> &'static str {
            "mock"
        }

        fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
            vec![]
        }

        fn read(
            &self,
            id: &ResourceId,
            identifier: Option<&str>,
        ) -> BoxFuture<'_, ProviderResult<State>> {
            let id = id.clone();
            let identifier = identifier.map(String::from);
            Box::pin(async move {
                match identifier {
                    Some(ident) => {
                        Ok(State::existing(id, Default::default()).with_identifier(ident))
                    }
                    None => Ok(State::not_found(id)),
                }
            })
        }

        fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
            let id = resource.id.clone();
            let attrs = resource.attributes.clone();
            Box::pin(async move { Ok(State::existing(id, attrs).with_identifier("mock-id-123")) })
        }

        fn update(
            &self,
            id: &ResourceId,
            identifier: &str,
            _from: &State,
            to: &Resource,
        ) -> BoxFuture<'_, ProviderResult<State>> {
            let id = id.clone();
            let identifier = identifier.to_string();
            let attrs = to.attributes.clone();
            Box::pin(async move { Ok(State::existing(id, attrs).with_identifier(identifier)) })
        }

        fn delete(&self, _id: &ResourceId, _identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
            Box::pin(async { Ok(()) })
        }

        fn read_data_source(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
            let id = resource.id.clone();
            let user_id = resource.get_string("user_id").map(String::from);
            Box::pin(async move {
                let user_id = user_id
                    .ok_or_else(|| ProviderError::new("user_id is required").for_resource(id.clone()))?;
                let attrs = std::collections::HashMap::from([(
                    "user_name".to_string(),
                    Value::String(format!("{user_id}-name")),
                )]);
                Ok(State::existing(id, attrs).with_identifier(user_id))
            })
        }
    }

    #[tokio::test]
    async fn mock_provider_read_without_identifier_is_not_found() {
        let provider = MockProvider;
        let id = ResourceId::new("test", "example");
        let state = provider.read(&id, None).await.unwrap();
        assert!(!state.exists);
    }

    #[tokio::test]
    async fn mock_provider_create_returns_existing() {
        let provider = MockProvider;
        let resource = Resource::new("test", "example");
        let state = provider.create(&resource).await.unwrap();
        assert!(state.exists);
        assert_eq!(state.identifier, Some("mock-id-123".to_string()));
    }

    #[tokio::test]
    async fn mock_provider_data_source_reads_by_attributes() {
        let provider = MockProvider;
        let resource = Resource::new("test_user", "lookup")
            .with_read_only(true)
            .with_attribute("user_id", Value::String("app-user".to_string()));
        let state = provider.read_data_source(&resource).await.unwrap();
        assert_eq!(state.get_string("user_name"), Some("app-user-name"));
    }

    #[tokio::test]
    async fn boxed_provider_forwards_operations() {
        let provider: Box<dyn Provider> = Box::new(MockProvider);
        let id = ResourceId::new("test", "example");
        let state = provider.read(&id, Some("remote-1")).await.unwrap();
        assert_eq!(state.identifier, Some("remote-1".to_string()));
        assert!(provider.data_source_types().is_empty());
    }

    #[test]
    fn provider_error_display_includes_resource() {
        let err = ProviderError::new("boom")
            .for_resource(ResourceId::new("guardduty_detector", "main"));
        assert_eq!(err.to_string(), "[guardduty_detector.main] boom");
        assert_eq!(ProviderError::new("boom").to_string(), "boom");
    }
}
