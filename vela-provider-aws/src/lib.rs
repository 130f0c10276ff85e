//! AWS provider
//!
//! Schemas, CRUD handlers, and data sources for the supported AWS
//! services, dispatched per resource type. The per-service modules own
//! the API calls; this module owns the service clients, the connection
//! metadata (region, account ID, partition), and the tag plumbing shared
//! by every taggable resource.

pub mod appconfig;
pub mod arn;
pub mod directconnect;
pub mod ec2;
pub mod elasticache;
pub mod guardduty;
pub mod securityhub;
pub mod tags;
pub mod validation;

use std::collections::HashMap;

use aws_config::{BehaviorVersion, Region};
use aws_sdk_appconfig::Client as AppConfigClient;
use aws_sdk_directconnect::Client as DirectConnectClient;
use aws_sdk_ec2::Client as Ec2Client;
use aws_sdk_elasticache::Client as ElastiCacheClient;
use aws_sdk_guardduty::Client as GuardDutyClient;
use aws_sdk_securityhub::Client as SecurityHubClient;
use aws_sdk_sts::Client as StsClient;
use tracing::info;
use vela_core::provider::{BoxFuture, Provider, ProviderError, ProviderResult, ResourceType};
use vela_core::resource::{Resource, ResourceId, State, Value};

use crate::arn::Arn;
use crate::tags::{IgnoreTags, TagMap};

/// Provider-level settings shared by every resource handler.
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    /// Region override; falls back to the ambient AWS configuration.
    pub region: Option<String>,
    /// Tags applied to every taggable resource, underneath resource tags.
    pub default_tags: TagMap,
    /// Tag keys and key prefixes kept out of state entirely.
    pub ignore_tags: IgnoreTags,
}

/// Pre-built service clients for constructing a provider without touching
/// the ambient AWS configuration (tests point these at local endpoints).
pub struct AwsClients {
    pub appconfig: AppConfigClient,
    pub directconnect: DirectConnectClient,
    pub ec2: Ec2Client,
    pub elasticache: ElastiCacheClient,
    pub guardduty: GuardDutyClient,
    pub securityhub: SecurityHubClient,
}

/// AWS Provider
pub struct AwsProvider {
    appconfig_client: AppConfigClient,
    directconnect_client: DirectConnectClient,
    ec2_client: Ec2Client,
    elasticache_client: ElastiCacheClient,
    guardduty_client: GuardDutyClient,
    securityhub_client: SecurityHubClient,
    region: String,
    account_id: String,
    partition: String,
    default_tags: TagMap,
    ignore_tags: IgnoreTags,
}

impl AwsProvider {
    /// Create a provider from the ambient AWS configuration.
    ///
    /// Resolves the region, then calls STS GetCallerIdentity once so that
    /// constructed ARNs carry the right account ID.
    pub async fn new(config: ProviderConfig) -> ProviderResult<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let sdk_config = loader.load().await;

        let region = sdk_config
            .region()
            .map(|r| r.to_string())
            .ok_or_else(|| ProviderError::new("No AWS region configured"))?;

        let sts_client = StsClient::new(&sdk_config);
        let identity = sts_client
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| ProviderError::new(format!("Failed to get caller identity: {:?}", e)))?;
        let account_id = identity
            .account()
            .map(String::from)
            .ok_or_else(|| ProviderError::new("GetCallerIdentity returned no account ID"))?;

        info!(region, account_id, "initialized AWS provider");

        Ok(Self {
            appconfig_client: AppConfigClient::new(&sdk_config),
            directconnect_client: DirectConnectClient::new(&sdk_config),
            ec2_client: Ec2Client::new(&sdk_config),
            elasticache_client: ElastiCacheClient::new(&sdk_config),
            guardduty_client: GuardDutyClient::new(&sdk_config),
            securityhub_client: SecurityHubClient::new(&sdk_config),
            partition: arn::partition_for_region(&region).to_string(),
            region,
            account_id,
            default_tags: config.default_tags,
            ignore_tags: config.ignore_tags,
        })
    }

    /// Create with specific clients (for testing).
    pub fn with_clients(
        clients: AwsClients,
        region: impl Into<String>,
        account_id: impl Into<String>,
        config: ProviderConfig,
    ) -> Self {
        let region = region.into();
        Self {
            appconfig_client: clients.appconfig,
            directconnect_client: clients.directconnect,
            ec2_client: clients.ec2,
            elasticache_client: clients.elasticache,
            guardduty_client: clients.guardduty,
            securityhub_client: clients.securityhub,
            partition: arn::partition_for_region(&region).to_string(),
            region,
            account_id: account_id.into(),
            default_tags: config.default_tags,
            ignore_tags: config.ignore_tags,
        }
    }

    /// ARN of a resource owned by this account in this region.
    pub(crate) fn build_arn(&self, service: &str, resource: impl Into<String>) -> String {
        Arn {
            partition: self.partition.clone(),
            service: service.to_string(),
            region: self.region.clone(),
            account_id: self.account_id.clone(),
            resource: resource.into(),
        }
        .to_string()
    }

    /// Configured tags merged over the provider's default tags.
    pub(crate) fn merged_tags(&self, resource: &Resource) -> TagMap {
        let tags = TagMap::from_value(resource.attributes.get("tags"));
        TagMap::merge(&self.default_tags, &tags)
    }

    /// Store remote tags as the "tags" / "tags_all" attribute pair.
    ///
    /// "tags_all" carries the full effective set, "tags" only what the
    /// configuration owns: provider defaults, AWS-internal keys, and
    /// ignored keys are stripped out.
    pub(crate) fn insert_tag_attributes(
        &self,
        attributes: &mut HashMap<String, Value>,
        tags: TagMap,
    ) {
        let tags = tags.ignore_aws().ignore(&self.ignore_tags);
        attributes.insert(
            "tags".to_string(),
            tags.remove_defaults(&self.default_tags).to_value(),
        );
        attributes.insert("tags_all".to_string(), tags.to_value());
    }
}

/// Fetch a required string attribute, with a uniform error when absent.
pub(crate) fn require_string<'a>(resource: &'a Resource, key: &str) -> ProviderResult<&'a str> {
    resource.get_string(key).ok_or_else(|| {
        ProviderError::new(format!("Missing required attribute '{key}'"))
            .for_resource(resource.id.clone())
    })
}

/// Every managed resource type this provider serves.
pub fn resource_types() -> Vec<Box<dyn ResourceType>> {
    vec![
        Box::new(appconfig::ApplicationType),
        Box::new(appconfig::EnvironmentType),
        Box::new(appconfig::ConfigurationProfileType),
        Box::new(appconfig::DeploymentType),
        Box::new(directconnect::GatewayType),
        Box::new(elasticache::UserType),
        Box::new(elasticache::UserGroupType),
        Box::new(guardduty::DetectorType),
        Box::new(guardduty::FilterType),
        Box::new(securityhub::StandardsSubscriptionType),
        Box::new(securityhub::OrganizationConfigurationType),
    ]
}

/// Every data source this provider serves.
pub fn data_source_types() -> Vec<Box<dyn ResourceType>> {
    vec![
        Box::new(ec2::InstanceTypeOfferingsDataSource),
        Box::new(elasticache::UserDataSource),
    ]
}

impl Provider for AwsProvider {
    fn name(&self) -> &'static str {
        "aws"
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        resource_types()
    }

    fn data_source_types(&self) -> Vec<Box<dyn ResourceType>> {
        data_source_types()
    }

    fn read(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.map(String::from);
        Box::pin(async move {
            // Never created, so there is nothing to look up remotely.
            let Some(identifier) = identifier else {
                return Ok(State::not_found(id));
            };
            match id.resource_type.as_str() {
                "appconfig_application" => self.read_appconfig_application(&id, &identifier).await,
                "appconfig_environment" => self.read_appconfig_environment(&id, &identifier).await,
                "appconfig_configuration_profile" => {
                    self.read_appconfig_configuration_profile(&id, &identifier)
                        .await
                }
                "appconfig_deployment" => self.read_appconfig_deployment(&id, &identifier).await,
                "directconnect_gateway" => self.read_directconnect_gateway(&id, &identifier).await,
                "elasticache_user" => self.read_elasticache_user(&id, &identifier).await,
                "elasticache_user_group" => {
                    self.read_elasticache_user_group(&id, &identifier).await
                }
                "guardduty_detector" => self.read_guardduty_detector(&id, &identifier).await,
                "guardduty_filter" => self.read_guardduty_filter(&id, &identifier).await,
                "securityhub_standards_subscription" => {
                    self.read_securityhub_standards_subscription(&id, &identifier)
                        .await
                }
                "securityhub_organization_configuration" => {
                    self.read_securityhub_organization_configuration(&id).await
                }
                _ => Err(unknown_resource_type(&id)),
            }
        })
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move {
            match resource.id.resource_type.as_str() {
                "appconfig_application" => self.create_appconfig_application(&resource).await,
                "appconfig_environment" => self.create_appconfig_environment(&resource).await,
                "appconfig_configuration_profile" => {
                    self.create_appconfig_configuration_profile(&resource).await
                }
                "appconfig_deployment" => self.create_appconfig_deployment(&resource).await,
                "directconnect_gateway" => self.create_directconnect_gateway(&resource).await,
                "elasticache_user" => self.create_elasticache_user(&resource).await,
                "elasticache_user_group" => self.create_elasticache_user_group(&resource).await,
                "guardduty_detector" => self.create_guardduty_detector(&resource).await,
                "guardduty_filter" => self.create_guardduty_filter(&resource).await,
                "securityhub_standards_subscription" => {
                    self.create_securityhub_standards_subscription(&resource).await
                }
                "securityhub_organization_configuration" => {
                    self.create_securityhub_organization_configuration(&resource)
                        .await
                }
                _ => Err(unknown_resource_type(&resource.id)),
            }
        })
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let from = from.clone();
        let to = to.clone();
        Box::pin(async move {
            match id.resource_type.as_str() {
                "appconfig_application" => {
                    self.update_appconfig_application(&id, &identifier, &from, &to)
                        .await
                }
                "appconfig_environment" => {
                    self.update_appconfig_environment(&id, &identifier, &from, &to)
                        .await
                }
                "appconfig_configuration_profile" => {
                    self.update_appconfig_configuration_profile(&id, &identifier, &from, &to)
                        .await
                }
                "appconfig_deployment" => {
                    self.update_appconfig_deployment(&id, &identifier, &from, &to)
                        .await
                }
                "directconnect_gateway" => Err(ProviderError::new(
                    "Direct Connect gateways cannot be updated in place",
                )
                .for_resource(id.clone())),
                "elasticache_user" => {
                    self.update_elasticache_user(&id, &identifier, &from, &to)
                        .await
                }
                "elasticache_user_group" => {
                    self.update_elasticache_user_group(&id, &identifier, &from, &to)
                        .await
                }
                "guardduty_detector" => {
                    self.update_guardduty_detector(&id, &identifier, &from, &to)
                        .await
                }
                "guardduty_filter" => {
                    self.update_guardduty_filter(&id, &identifier, &from, &to)
                        .await
                }
                "securityhub_standards_subscription" => Err(ProviderError::new(
                    "Security Hub standards subscriptions cannot be updated in place",
                )
                .for_resource(id.clone())),
                "securityhub_organization_configuration" => {
                    self.update_securityhub_organization_configuration(&id, &to)
                        .await
                }
                _ => Err(unknown_resource_type(&id)),
            }
        })
    }

    fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        Box::pin(async move {
            match id.resource_type.as_str() {
                "appconfig_application" => {
                    self.delete_appconfig_application(&id, &identifier).await
                }
                "appconfig_environment" => {
                    self.delete_appconfig_environment(&id, &identifier).await
                }
                "appconfig_configuration_profile" => {
                    self.delete_appconfig_configuration_profile(&id, &identifier)
                        .await
                }
                "appconfig_deployment" => self.delete_appconfig_deployment(&id, &identifier).await,
                "directconnect_gateway" => {
                    self.delete_directconnect_gateway(&id, &identifier).await
                }
                "elasticache_user" => self.delete_elasticache_user(&id, &identifier).await,
                "elasticache_user_group" => {
                    self.delete_elasticache_user_group(&id, &identifier).await
                }
                "guardduty_detector" => self.delete_guardduty_detector(&id, &identifier).await,
                "guardduty_filter" => self.delete_guardduty_filter(&id, &identifier).await,
                "securityhub_standards_subscription" => {
                    self.delete_securityhub_standards_subscription(&id, &identifier)
                        .await
                }
                "securityhub_organization_configuration" => {
                    self.delete_securityhub_organization_configuration(&id).await
                }
                _ => Err(unknown_resource_type(&id)),
            }
        })
    }

    fn read_data_source(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move {
            match resource.id.resource_type.as_str() {
                "ec2_instance_type_offerings" => {
                    self.read_ec2_instance_type_offerings(&resource).await
                }
                "elasticache_user" => self.read_elasticache_user_data_source(&resource).await,
                _ => Err(ProviderError::new(format!(
                    "Unknown data source type: {}",
                    resource.id.resource_type
                ))
                .for_resource(resource.id.clone())),
            }
        })
    }
}

fn unknown_resource_type(id: &ResourceId) -> ProviderError {
    ProviderError::new(format!("Unknown resource type: {}", id.resource_type))
        .for_resource(id.clone())
}
