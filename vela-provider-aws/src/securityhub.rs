//! Security Hub standards subscriptions and the organization auto-enable
//! switch.
//!
//! Enabling a standard returns a subscription ARN that serves as the
//! identifier. Security Hub reports most "gone" conditions as an
//! InvalidAccessException because the service itself has been disabled
//! for the account. The organization configuration is an account
//! singleton that can only be written, never deleted.

use std::collections::HashMap;
use std::time::Duration;

use aws_sdk_securityhub::Client;
use aws_sdk_securityhub::types::{StandardsSubscription, StandardsSubscriptionRequest};
use tracing::{debug, info, warn};
use vela_core::provider::{ProviderError, ProviderResult, ResourceType};
use vela_core::resource::{Resource, ResourceId, State, Value};
use vela_core::schema::{AttributeSchema, AttributeType, ResourceSchema};
use vela_core::waiter::StateChange;

use crate::AwsProvider;
use crate::require_string;
use crate::validation;

const STANDARDS_TIMEOUT: Duration = Duration::from_secs(3 * 60);

pub struct StandardsSubscriptionType;

impl ResourceType for StandardsSubscriptionType {
    fn name(&self) -> &'static str {
        "securityhub_standards_subscription"
    }

    fn schema(&self) -> ResourceSchema {
        standards_subscription_schema()
    }
}

pub struct OrganizationConfigurationType;

impl ResourceType for OrganizationConfigurationType {
    fn name(&self) -> &'static str {
        "securityhub_organization_configuration"
    }

    fn schema(&self) -> ResourceSchema {
        organization_configuration_schema()
    }
}

pub fn standards_subscription_schema() -> ResourceSchema {
    ResourceSchema::new("securityhub_standards_subscription")
        .with_description("Subscribes the account to a Security Hub standard")
        .attribute(
            AttributeSchema::new("standards_arn", validation::arn_type())
                .required()
                .force_new(),
        )
}

pub fn organization_configuration_schema() -> ResourceSchema {
    ResourceSchema::new("securityhub_organization_configuration")
        .with_description("Whether new organization accounts get Security Hub automatically")
        .attribute(AttributeSchema::new("auto_enable", AttributeType::Bool).required())
}

impl AwsProvider {
    pub(crate) async fn create_securityhub_standards_subscription(
        &self,
        resource: &Resource,
    ) -> ProviderResult<State> {
        let id = &resource.id;
        let standards_arn = require_string(resource, "standards_arn")?;

        let request = StandardsSubscriptionRequest::builder()
            .standards_arn(standards_arn)
            .build()
            .map_err(|e| {
                ProviderError::new(format!("Invalid standards subscription request: {:?}", e))
                    .for_resource(id.clone())
            })?;

        debug!(standards_arn, "enabling Security Hub standard");
        let output = self
            .securityhub_client
            .batch_enable_standards()
            .standards_subscription_requests(request)
            .send()
            .await
            .map_err(|e| {
                ProviderError::new(format!(
                    "Failed to enable Security Hub standard ({}): {:?}",
                    standards_arn, e
                ))
                .for_resource(id.clone())
            })?;

        let subscription_arn = output
            .standards_subscriptions()
            .first()
            .map(|subscription| subscription.standards_subscription_arn().to_string())
            .ok_or_else(|| {
                ProviderError::new("BatchEnableStandards returned no subscriptions")
                    .for_resource(id.clone())
            })?;

        wait_standards_ready(&self.securityhub_client, &subscription_arn)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;

        let state = self
            .read_securityhub_standards_subscription(id, &subscription_arn)
            .await?;
        if !state.exists {
            return Err(ProviderError::new(format!(
                "Security Hub standards subscription ({subscription_arn}) disappeared after creation"
            ))
            .for_resource(id.clone()));
        }
        Ok(state)
    }

    pub(crate) async fn read_securityhub_standards_subscription(
        &self,
        id: &ResourceId,
        subscription_arn: &str,
    ) -> ProviderResult<State> {
        let Some(subscription) =
            find_standards_subscription(&self.securityhub_client, subscription_arn)
                .await
                .map_err(|e| e.for_resource(id.clone()))?
        else {
            warn!(
                subscription_arn,
                "Security Hub standards subscription not found, removing from state"
            );
            return Ok(State::not_found(id.clone()));
        };

        let mut attributes = HashMap::new();
        attributes.insert(
            "standards_arn".to_string(),
            Value::String(subscription.standards_arn().to_string()),
        );

        Ok(State::existing(id.clone(), attributes).with_identifier(subscription_arn))
    }

    pub(crate) async fn delete_securityhub_standards_subscription(
        &self,
        id: &ResourceId,
        subscription_arn: &str,
    ) -> ProviderResult<()> {
        debug!(subscription_arn, "disabling Security Hub standard");
        match self
            .securityhub_client
            .batch_disable_standards()
            .standards_subscription_arns(subscription_arn)
            .send()
            .await
        {
            Ok(_) => {}
            // Security Hub itself has already been disabled.
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_invalid_access_exception()) =>
            {
                return Ok(());
            }
            Err(e) => {
                return Err(ProviderError::new(format!(
                    "Failed to disable Security Hub standard ({}): {:?}",
                    subscription_arn, e
                ))
                .for_resource(id.clone()));
            }
        }

        wait_standards_deleted(&self.securityhub_client, subscription_arn)
            .await
            .map_err(|e| e.for_resource(id.clone()))
    }

    pub(crate) async fn create_securityhub_organization_configuration(
        &self,
        resource: &Resource,
    ) -> ProviderResult<State> {
        self.update_securityhub_organization_configuration(&resource.id, resource)
            .await
    }

    pub(crate) async fn read_securityhub_organization_configuration(
        &self,
        id: &ResourceId,
    ) -> ProviderResult<State> {
        let output = match self
            .securityhub_client
            .describe_organization_configuration()
            .send()
            .await
        {
            Ok(output) => output,
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_invalid_access_exception()) =>
            {
                warn!("Security Hub organization configuration not available, removing from state");
                return Ok(State::not_found(id.clone()));
            }
            Err(e) => {
                return Err(ProviderError::new(format!(
                    "Failed to describe Security Hub organization configuration: {:?}",
                    e
                ))
                .for_resource(id.clone()));
            }
        };

        let mut attributes = HashMap::new();
        attributes.insert(
            "auto_enable".to_string(),
            Value::Bool(output.auto_enable().unwrap_or_default()),
        );

        Ok(State::existing(id.clone(), attributes).with_identifier(self.account_id.clone()))
    }

    pub(crate) async fn update_securityhub_organization_configuration(
        &self,
        id: &ResourceId,
        to: &Resource,
    ) -> ProviderResult<State> {
        let auto_enable = to.get_bool("auto_enable").ok_or_else(|| {
            ProviderError::new("Missing required attribute 'auto_enable'").for_resource(id.clone())
        })?;

        debug!(auto_enable, "updating Security Hub organization configuration");
        self.securityhub_client
            .update_organization_configuration()
            .auto_enable(auto_enable)
            .send()
            .await
            .map_err(|e| {
                ProviderError::new(format!(
                    "Failed to update Security Hub organization configuration: {:?}",
                    e
                ))
                .for_resource(id.clone())
            })?;

        self.read_securityhub_organization_configuration(id).await
    }

    pub(crate) async fn delete_securityhub_organization_configuration(
        &self,
        _id: &ResourceId,
    ) -> ProviderResult<()> {
        warn!("Security Hub organization configuration cannot be deleted remotely, removing from state only");
        Ok(())
    }
}

pub(crate) async fn find_standards_subscription(
    client: &Client,
    subscription_arn: &str,
) -> ProviderResult<Option<StandardsSubscription>> {
    let output = match client
        .get_enabled_standards()
        .standards_subscription_arns(subscription_arn)
        .send()
        .await
    {
        Ok(output) => output,
        // Security Hub is not enabled for the account.
        Err(e)
            if e.as_service_error()
                .is_some_and(|se| se.is_invalid_access_exception()) =>
        {
            return Ok(None);
        }
        Err(e) => {
            return Err(ProviderError::new(format!(
                "Failed to read Security Hub standards subscription ({}): {:?}",
                subscription_arn, e
            )));
        }
    };

    Ok(output
        .standards_subscriptions()
        .iter()
        .find(|subscription| subscription.standards_subscription_arn() == subscription_arn)
        .cloned())
}

async fn wait_standards_ready(client: &Client, subscription_arn: &str) -> ProviderResult<()> {
    info!(subscription_arn, "waiting for Security Hub standard to be ready");
    StateChange::new(|| {
        let client = client.clone();
        let subscription_arn = subscription_arn.to_string();
        async move {
            Ok(find_standards_subscription(&client, &subscription_arn)
                .await?
                .map(|subscription| {
                    let status = subscription.standards_status().as_str().to_string();
                    (subscription, status)
                }))
        }
    })
    .pending(&["PENDING"])
    .target(&["READY"])
    .timeout(STANDARDS_TIMEOUT)
    .wait()
    .await?;
    Ok(())
}

async fn wait_standards_deleted(client: &Client, subscription_arn: &str) -> ProviderResult<()> {
    info!(subscription_arn, "waiting for Security Hub standard to be disabled");
    StateChange::new(|| {
        let client = client.clone();
        let subscription_arn = subscription_arn.to_string();
        async move {
            Ok(find_standards_subscription(&client, &subscription_arn)
                .await?
                .map(|subscription| {
                    let status = subscription.standards_status().as_str().to_string();
                    (subscription, status)
                }))
        }
    })
    .pending(&["PENDING", "READY", "DELETING"])
    .target(&[])
    .timeout(STANDARDS_TIMEOUT)
    .wait()
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_schema_validates_the_standards_arn() {
        let mut attributes = HashMap::new();
        attributes.insert(
            "standards_arn".to_string(),
            Value::String(
                "arn:aws:securityhub:us-west-2::standards/pci-dss/v/3.2.1".to_string(),
            ),
        );
        assert!(standards_subscription_schema().validate(&attributes).is_ok());

        attributes.insert(
            "standards_arn".to_string(),
            Value::String("not-an-arn".to_string()),
        );
        assert!(standards_subscription_schema().validate(&attributes).is_err());
    }

    #[test]
    fn changing_the_standard_replaces_the_subscription() {
        let schema = standards_subscription_schema();
        assert!(schema.requires_replacement(&["standards_arn".to_string()]));
    }

    #[test]
    fn organization_configuration_requires_auto_enable() {
        let schema = organization_configuration_schema();
        assert!(schema.validate(&HashMap::new()).is_err());

        let mut attributes = HashMap::new();
        attributes.insert("auto_enable".to_string(), Value::Bool(true));
        assert!(schema.validate(&attributes).is_ok());
    }
}
