//! AppConfig applications, environments, configuration profiles, and
//! deployments.
//!
//! Environments and configuration profiles are scoped to an application and
//! carry composite identifiers (`EnvironmentID:ApplicationID` and
//! `ConfigurationProfileID:ApplicationID`). Deployments are immutable once
//! started: every input forces replacement, only tags can change in place,
//! and deleting one merely forgets it locally. AppConfig does not return
//! ARNs, so they are built from the connection metadata.

use std::collections::HashMap;
use std::time::Duration;

use aws_sdk_appconfig::Client;
use aws_sdk_appconfig::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_appconfig::operation::get_deployment::GetDeploymentOutput;
use aws_sdk_appconfig::types::{Monitor, Validator, ValidatorType};
use tracing::{debug, info, warn};
use vela_core::differ;
use vela_core::provider::{ProviderError, ProviderResult, ResourceType};
use vela_core::resource::{Resource, ResourceId, State, Value};
use vela_core::schema::{AttributeSchema, AttributeType, ResourceSchema};
use vela_core::waiter::StateChange;

use crate::AwsProvider;
use crate::require_string;
use crate::tags::{self, TagMap};
use crate::validation;

/// Time allowed for a started deployment to bake and complete.
const DEPLOYMENT_TIMEOUT: Duration = Duration::from_secs(20 * 60);

/// Composite identifier parse errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdFormatError {
    #[error("unexpected format of ID ({0:?}), expected EnvironmentID:ApplicationID")]
    Environment(String),
    #[error("unexpected format of ID ({0:?}), expected ConfigurationProfileID:ApplicationID")]
    ConfigurationProfile(String),
    #[error("unexpected format of ID ({0:?}), expected ApplicationID/EnvironmentID/DeploymentNumber")]
    Deployment(String),
    #[error("deployment number in ID ({0:?}) is not an integer")]
    DeploymentNumber(String),
}

pub struct ApplicationType;

impl ResourceType for ApplicationType {
    fn name(&self) -> &'static str {
        "appconfig_application"
    }

    fn schema(&self) -> ResourceSchema {
        application_schema()
    }
}

pub struct EnvironmentType;

impl ResourceType for EnvironmentType {
    fn name(&self) -> &'static str {
        "appconfig_environment"
    }

    fn schema(&self) -> ResourceSchema {
        environment_schema()
    }
}

pub struct ConfigurationProfileType;

impl ResourceType for ConfigurationProfileType {
    fn name(&self) -> &'static str {
        "appconfig_configuration_profile"
    }

    fn schema(&self) -> ResourceSchema {
        configuration_profile_schema()
    }
}

pub struct DeploymentType;

impl ResourceType for DeploymentType {
    fn name(&self) -> &'static str {
        "appconfig_deployment"
    }

    fn schema(&self) -> ResourceSchema {
        deployment_schema()
    }
}

pub fn application_schema() -> ResourceSchema {
    ResourceSchema::new("appconfig_application")
        .with_description("AppConfig application")
        .attribute(AttributeSchema::new("name", validation::name_type()).required())
        .attribute(AttributeSchema::new("description", validation::description_type()).optional())
        .attribute(AttributeSchema::new("arn", AttributeType::String).computed())
        .attribute(tags::tags_schema())
        .attribute(tags::tags_all_schema())
}

pub fn environment_schema() -> ResourceSchema {
    let monitor = ResourceSchema::new("monitor")
        .attribute(AttributeSchema::new("alarm_arn", validation::arn_type()).required())
        .attribute(AttributeSchema::new("alarm_role_arn", validation::arn_type()).optional());

    ResourceSchema::new("appconfig_environment")
        .with_description("AppConfig environment for an application")
        .attribute(
            AttributeSchema::new("application_id", validation::appconfig_id_type())
                .required()
                .force_new(),
        )
        .attribute(AttributeSchema::new("name", validation::name_type()).required())
        .attribute(AttributeSchema::new("description", validation::description_type()).optional())
        .attribute(
            AttributeSchema::new(
                "monitor",
                AttributeType::List(Box::new(AttributeType::Block(Box::new(monitor)))),
            )
            .optional()
            .max_items(5)
            .with_description("CloudWatch alarms monitored during deployments"),
        )
        .attribute(AttributeSchema::new("environment_id", AttributeType::String).computed())
        .attribute(AttributeSchema::new("state", AttributeType::String).computed())
        .attribute(AttributeSchema::new("arn", AttributeType::String).computed())
        .attribute(tags::tags_schema())
        .attribute(tags::tags_all_schema())
}

pub fn configuration_profile_schema() -> ResourceSchema {
    let validator = ResourceSchema::new("validator")
        .attribute(
            AttributeSchema::new("content", AttributeType::String)
                .optional()
                .sensitive(),
        )
        .attribute(
            AttributeSchema::new(
                "type",
                AttributeType::Enum(vec!["JSON_SCHEMA".to_string(), "LAMBDA".to_string()]),
            )
            .required(),
        );

    ResourceSchema::new("appconfig_configuration_profile")
        .with_description("AppConfig configuration profile for an application")
        .attribute(
            AttributeSchema::new("application_id", validation::appconfig_id_type())
                .required()
                .force_new(),
        )
        .attribute(AttributeSchema::new("name", validation::name_type()).required())
        .attribute(
            AttributeSchema::new("location_uri", validation::location_uri_type())
                .required()
                .force_new(),
        )
        .attribute(AttributeSchema::new("description", validation::description_type()).optional())
        .attribute(AttributeSchema::new("retrieval_role_arn", validation::arn_type()).optional())
        .attribute(
            AttributeSchema::new(
                "validator",
                AttributeType::List(Box::new(AttributeType::Block(Box::new(validator)))),
            )
            .optional()
            .max_items(2)
            .with_description("Validators run against configuration content"),
        )
        .attribute(
            AttributeSchema::new("configuration_profile_id", AttributeType::String).computed(),
        )
        .attribute(AttributeSchema::new("arn", AttributeType::String).computed())
        .attribute(tags::tags_schema())
        .attribute(tags::tags_all_schema())
}

pub fn deployment_schema() -> ResourceSchema {
    ResourceSchema::new("appconfig_deployment")
        .with_description("AppConfig configuration deployment")
        .attribute(
            AttributeSchema::new("application_id", validation::appconfig_id_type())
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("environment_id", validation::appconfig_id_type())
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("configuration_profile_id", validation::appconfig_id_type())
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("configuration_version", validation::configuration_version_type())
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("deployment_strategy_id", validation::deployment_strategy_id_type())
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("description", validation::description_type())
                .optional()
                .force_new(),
        )
        .attribute(AttributeSchema::new("deployment_number", AttributeType::Int).computed())
        .attribute(AttributeSchema::new("arn", AttributeType::String).computed())
        .attribute(tags::tags_schema())
        .attribute(tags::tags_all_schema())
}

pub(crate) fn parse_environment_id(identifier: &str) -> Result<(String, String), IdFormatError> {
    let parts: Vec<&str> = identifier.split(':').collect();
    match parts.as_slice() {
        [environment_id, application_id]
            if !environment_id.is_empty() && !application_id.is_empty() =>
        {
            Ok(((*environment_id).to_string(), (*application_id).to_string()))
        }
        _ => Err(IdFormatError::Environment(identifier.to_string())),
    }
}

pub(crate) fn parse_configuration_profile_id(
    identifier: &str,
) -> Result<(String, String), IdFormatError> {
    let parts: Vec<&str> = identifier.split(':').collect();
    match parts.as_slice() {
        [configuration_profile_id, application_id]
            if !configuration_profile_id.is_empty() && !application_id.is_empty() =>
        {
            Ok((
                (*configuration_profile_id).to_string(),
                (*application_id).to_string(),
            ))
        }
        _ => Err(IdFormatError::ConfigurationProfile(identifier.to_string())),
    }
}

pub(crate) fn parse_deployment_id(identifier: &str) -> Result<(String, String, i32), IdFormatError> {
    let parts: Vec<&str> = identifier.split('/').collect();
    let [application_id, environment_id, number] = parts.as_slice() else {
        return Err(IdFormatError::Deployment(identifier.to_string()));
    };
    if application_id.is_empty() || environment_id.is_empty() {
        return Err(IdFormatError::Deployment(identifier.to_string()));
    }
    let deployment_number = number
        .parse::<i32>()
        .map_err(|_| IdFormatError::DeploymentNumber(identifier.to_string()))?;
    Ok((
        (*application_id).to_string(),
        (*environment_id).to_string(),
        deployment_number,
    ))
}

fn is_not_found<E, R>(error: &SdkError<E, R>) -> bool
where
    E: ProvideErrorMetadata,
{
    error
        .as_service_error()
        .and_then(|e| e.code())
        .is_some_and(|code| code == "ResourceNotFoundException")
}

impl AwsProvider {
    pub(crate) async fn create_appconfig_application(
        &self,
        resource: &Resource,
    ) -> ProviderResult<State> {
        let id = &resource.id;
        let name = require_string(resource, "name")?;
        let tags = self.merged_tags(resource);

        let mut request = self.appconfig_client.create_application().name(name);
        if let Some(description) = resource.get_string("description") {
            request = request.description(description);
        }
        if !tags.is_empty() {
            request = request.set_tags(Some(tags.as_map()));
        }

        debug!(name, "creating AppConfig application");
        let output = request.send().await.map_err(|e| {
            ProviderError::new(format!("Failed to create AppConfig application: {:?}", e))
                .for_resource(id.clone())
        })?;

        let application_id = output.id().map(String::from).ok_or_else(|| {
            ProviderError::new("CreateApplication response had no application ID")
                .for_resource(id.clone())
        })?;

        let state = self.read_appconfig_application(id, &application_id).await?;
        if !state.exists {
            return Err(ProviderError::new(format!(
                "AppConfig application ({application_id}) disappeared after creation"
            ))
            .for_resource(id.clone()));
        }
        Ok(state)
    }

    pub(crate) async fn read_appconfig_application(
        &self,
        id: &ResourceId,
        application_id: &str,
    ) -> ProviderResult<State> {
        let output = match self
            .appconfig_client
            .get_application()
            .application_id(application_id)
            .send()
            .await
        {
            Ok(output) => output,
            Err(e) if is_not_found(&e) => {
                warn!(application_id, "AppConfig application not found, removing from state");
                return Ok(State::not_found(id.clone()));
            }
            Err(e) => {
                return Err(ProviderError::new(format!(
                    "Failed to get AppConfig application ({}): {:?}",
                    application_id, e
                ))
                .for_resource(id.clone()));
            }
        };

        let mut attributes = HashMap::new();
        if let Some(name) = output.name() {
            attributes.insert("name".to_string(), Value::String(name.to_string()));
        }
        if let Some(description) = output.description() {
            attributes.insert("description".to_string(), Value::String(description.to_string()));
        }

        let arn = self.build_arn("appconfig", format!("application/{application_id}"));
        attributes.insert("arn".to_string(), Value::String(arn.clone()));

        let tags = list_tags(&self.appconfig_client, &arn)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;
        self.insert_tag_attributes(&mut attributes, tags);

        Ok(State::existing(id.clone(), attributes).with_identifier(application_id))
    }

    pub(crate) async fn update_appconfig_application(
        &self,
        id: &ResourceId,
        application_id: &str,
        from: &State,
        to: &Resource,
    ) -> ProviderResult<State> {
        if differ::has_change(from, to, "name") || differ::has_change(from, to, "description") {
            let mut request = self
                .appconfig_client
                .update_application()
                .application_id(application_id);
            if differ::has_change(from, to, "name")
                && let Some(name) = to.get_string("name")
            {
                request = request.name(name);
            }
            if differ::has_change(from, to, "description") {
                request = request.description(to.get_string("description").unwrap_or_default());
            }
            debug!(application_id, "updating AppConfig application");
            request.send().await.map_err(|e| {
                ProviderError::new(format!(
                    "Failed to update AppConfig application ({}): {:?}",
                    application_id, e
                ))
                .for_resource(id.clone())
            })?;
        }

        let arn = self.build_arn("appconfig", format!("application/{application_id}"));
        self.update_appconfig_tags(id, &arn, from, to).await?;

        self.read_appconfig_application(id, application_id).await
    }

    pub(crate) async fn delete_appconfig_application(
        &self,
        id: &ResourceId,
        application_id: &str,
    ) -> ProviderResult<()> {
        debug!(application_id, "deleting AppConfig application");
        match self
            .appconfig_client
            .delete_application()
            .application_id(application_id)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(ProviderError::new(format!(
                "Failed to delete AppConfig application ({}): {:?}",
                application_id, e
            ))
            .for_resource(id.clone())),
        }
    }

    pub(crate) async fn create_appconfig_environment(
        &self,
        resource: &Resource,
    ) -> ProviderResult<State> {
        let id = &resource.id;
        let application_id = require_string(resource, "application_id")?;
        let name = require_string(resource, "name")?;
        let tags = self.merged_tags(resource);

        let mut request = self
            .appconfig_client
            .create_environment()
            .application_id(application_id)
            .name(name);
        if let Some(description) = resource.get_string("description") {
            request = request.description(description);
        }
        if let Some(monitors) = resource.get_list("monitor")
            && !monitors.is_empty()
        {
            let monitors = expand_monitors(monitors).map_err(|e| e.for_resource(id.clone()))?;
            request = request.set_monitors(Some(monitors));
        }
        if !tags.is_empty() {
            request = request.set_tags(Some(tags.as_map()));
        }

        debug!(application_id, name, "creating AppConfig environment");
        let output = request.send().await.map_err(|e| {
            ProviderError::new(format!(
                "Failed to create AppConfig environment for application ({}): {:?}",
                application_id, e
            ))
            .for_resource(id.clone())
        })?;

        let environment_id = output.id().map(String::from).ok_or_else(|| {
            ProviderError::new("CreateEnvironment response had no environment ID")
                .for_resource(id.clone())
        })?;
        let identifier = format!("{environment_id}:{application_id}");

        let state = self.read_appconfig_environment(id, &identifier).await?;
        if !state.exists {
            return Err(ProviderError::new(format!(
                "AppConfig environment ({identifier}) disappeared after creation"
            ))
            .for_resource(id.clone()));
        }
        Ok(state)
    }

    pub(crate) async fn read_appconfig_environment(
        &self,
        id: &ResourceId,
        identifier: &str,
    ) -> ProviderResult<State> {
        let (environment_id, application_id) = parse_environment_id(identifier)
            .map_err(|e| ProviderError::new(e.to_string()).for_resource(id.clone()))?;

        let output = match self
            .appconfig_client
            .get_environment()
            .application_id(&application_id)
            .environment_id(&environment_id)
            .send()
            .await
        {
            Ok(output) => output,
            Err(e) if is_not_found(&e) => {
                warn!(
                    environment_id,
                    application_id, "AppConfig environment not found, removing from state"
                );
                return Ok(State::not_found(id.clone()));
            }
            Err(e) => {
                return Err(ProviderError::new(format!(
                    "Failed to get AppConfig environment ({}) for application ({}): {:?}",
                    environment_id, application_id, e
                ))
                .for_resource(id.clone()));
            }
        };

        let mut attributes = HashMap::new();
        attributes.insert(
            "application_id".to_string(),
            Value::String(application_id.clone()),
        );
        attributes.insert(
            "environment_id".to_string(),
            Value::String(environment_id.clone()),
        );
        if let Some(name) = output.name() {
            attributes.insert("name".to_string(), Value::String(name.to_string()));
        }
        if let Some(description) = output.description() {
            attributes.insert("description".to_string(), Value::String(description.to_string()));
        }
        if let Some(state) = output.state() {
            attributes.insert("state".to_string(), Value::String(state.as_str().to_string()));
        }
        let monitors = output.monitors();
        if !monitors.is_empty() {
            attributes.insert("monitor".to_string(), flatten_monitors(monitors));
        }

        let arn = self.build_arn(
            "appconfig",
            format!("application/{application_id}/environment/{environment_id}"),
        );
        attributes.insert("arn".to_string(), Value::String(arn.clone()));

        let tags = list_tags(&self.appconfig_client, &arn)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;
        self.insert_tag_attributes(&mut attributes, tags);

        Ok(State::existing(id.clone(), attributes).with_identifier(identifier))
    }

    pub(crate) async fn update_appconfig_environment(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> ProviderResult<State> {
        let (environment_id, application_id) = parse_environment_id(identifier)
            .map_err(|e| ProviderError::new(e.to_string()).for_resource(id.clone()))?;

        if differ::has_change(from, to, "name")
            || differ::has_change(from, to, "description")
            || differ::has_change(from, to, "monitor")
        {
            let mut request = self
                .appconfig_client
                .update_environment()
                .application_id(&application_id)
                .environment_id(&environment_id);
            if differ::has_change(from, to, "name")
                && let Some(name) = to.get_string("name")
            {
                request = request.name(name);
            }
            if differ::has_change(from, to, "description") {
                request = request.description(to.get_string("description").unwrap_or_default());
            }
            if differ::has_change(from, to, "monitor") {
                let monitors = expand_monitors(to.get_list("monitor").unwrap_or_default())
                    .map_err(|e| e.for_resource(id.clone()))?;
                request = request.set_monitors(Some(monitors));
            }
            debug!(environment_id, application_id, "updating AppConfig environment");
            request.send().await.map_err(|e| {
                ProviderError::new(format!(
                    "Failed to update AppConfig environment ({}) for application ({}): {:?}",
                    environment_id, application_id, e
                ))
                .for_resource(id.clone())
            })?;
        }

        let arn = self.build_arn(
            "appconfig",
            format!("application/{application_id}/environment/{environment_id}"),
        );
        self.update_appconfig_tags(id, &arn, from, to).await?;

        self.read_appconfig_environment(id, identifier).await
    }

    pub(crate) async fn delete_appconfig_environment(
        &self,
        id: &ResourceId,
        identifier: &str,
    ) -> ProviderResult<()> {
        let (environment_id, application_id) = parse_environment_id(identifier)
            .map_err(|e| ProviderError::new(e.to_string()).for_resource(id.clone()))?;

        debug!(environment_id, application_id, "deleting AppConfig environment");
        match self
            .appconfig_client
            .delete_environment()
            .application_id(&application_id)
            .environment_id(&environment_id)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(ProviderError::new(format!(
                "Failed to delete AppConfig environment ({}) for application ({}): {:?}",
                environment_id, application_id, e
            ))
            .for_resource(id.clone())),
        }
    }

    pub(crate) async fn create_appconfig_configuration_profile(
        &self,
        resource: &Resource,
    ) -> ProviderResult<State> {
        let id = &resource.id;
        let application_id = require_string(resource, "application_id")?;
        let name = require_string(resource, "name")?;
        let location_uri = require_string(resource, "location_uri")?;
        let tags = self.merged_tags(resource);

        let mut request = self
            .appconfig_client
            .create_configuration_profile()
            .application_id(application_id)
            .name(name)
            .location_uri(location_uri);
        if let Some(description) = resource.get_string("description") {
            request = request.description(description);
        }
        if let Some(role_arn) = resource.get_string("retrieval_role_arn") {
            request = request.retrieval_role_arn(role_arn);
        }
        if let Some(validators) = resource.get_list("validator")
            && !validators.is_empty()
        {
            let validators =
                expand_validators(validators).map_err(|e| e.for_resource(id.clone()))?;
            request = request.set_validators(Some(validators));
        }
        if !tags.is_empty() {
            request = request.set_tags(Some(tags.as_map()));
        }

        debug!(application_id, name, "creating AppConfig configuration profile");
        let output = request.send().await.map_err(|e| {
            ProviderError::new(format!(
                "Failed to create AppConfig configuration profile for application ({}): {:?}",
                application_id, e
            ))
            .for_resource(id.clone())
        })?;

        let configuration_profile_id = output.id().map(String::from).ok_or_else(|| {
            ProviderError::new("CreateConfigurationProfile response had no profile ID")
                .for_resource(id.clone())
        })?;
        let identifier = format!("{configuration_profile_id}:{application_id}");

        let state = self
            .read_appconfig_configuration_profile(id, &identifier)
            .await?;
        if !state.exists {
            return Err(ProviderError::new(format!(
                "AppConfig configuration profile ({identifier}) disappeared after creation"
            ))
            .for_resource(id.clone()));
        }
        Ok(state)
    }

    pub(crate) async fn read_appconfig_configuration_profile(
        &self,
        id: &ResourceId,
        identifier: &str,
    ) -> ProviderResult<State> {
        let (configuration_profile_id, application_id) =
            parse_configuration_profile_id(identifier)
                .map_err(|e| ProviderError::new(e.to_string()).for_resource(id.clone()))?;

        let output = match self
            .appconfig_client
            .get_configuration_profile()
            .application_id(&application_id)
            .configuration_profile_id(&configuration_profile_id)
            .send()
            .await
        {
            Ok(output) => output,
            Err(e) if is_not_found(&e) => {
                warn!(
                    configuration_profile_id,
                    application_id, "AppConfig configuration profile not found, removing from state"
                );
                return Ok(State::not_found(id.clone()));
            }
            Err(e) => {
                return Err(ProviderError::new(format!(
                    "Failed to get AppConfig configuration profile ({}) for application ({}): {:?}",
                    configuration_profile_id, application_id, e
                ))
                .for_resource(id.clone()));
            }
        };

        let mut attributes = HashMap::new();
        attributes.insert(
            "application_id".to_string(),
            Value::String(application_id.clone()),
        );
        attributes.insert(
            "configuration_profile_id".to_string(),
            Value::String(configuration_profile_id.clone()),
        );
        if let Some(name) = output.name() {
            attributes.insert("name".to_string(), Value::String(name.to_string()));
        }
        if let Some(description) = output.description() {
            attributes.insert("description".to_string(), Value::String(description.to_string()));
        }
        if let Some(location_uri) = output.location_uri() {
            attributes.insert(
                "location_uri".to_string(),
                Value::String(location_uri.to_string()),
            );
        }
        if let Some(role_arn) = output.retrieval_role_arn() {
            attributes.insert(
                "retrieval_role_arn".to_string(),
                Value::String(role_arn.to_string()),
            );
        }
        let validators = output.validators();
        if !validators.is_empty() {
            attributes.insert("validator".to_string(), flatten_validators(validators));
        }

        let arn = self.build_arn(
            "appconfig",
            format!(
                "application/{application_id}/configurationprofile/{configuration_profile_id}"
            ),
        );
        attributes.insert("arn".to_string(), Value::String(arn.clone()));

        let tags = list_tags(&self.appconfig_client, &arn)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;
        self.insert_tag_attributes(&mut attributes, tags);

        Ok(State::existing(id.clone(), attributes).with_identifier(identifier))
    }

    pub(crate) async fn update_appconfig_configuration_profile(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> ProviderResult<State> {
        let (configuration_profile_id, application_id) =
            parse_configuration_profile_id(identifier)
                .map_err(|e| ProviderError::new(e.to_string()).for_resource(id.clone()))?;

        if differ::has_change(from, to, "name")
            || differ::has_change(from, to, "description")
            || differ::has_change(from, to, "retrieval_role_arn")
            || differ::has_change(from, to, "validator")
        {
            let mut request = self
                .appconfig_client
                .update_configuration_profile()
                .application_id(&application_id)
                .configuration_profile_id(&configuration_profile_id);
            if differ::has_change(from, to, "name")
                && let Some(name) = to.get_string("name")
            {
                request = request.name(name);
            }
            if differ::has_change(from, to, "description") {
                request = request.description(to.get_string("description").unwrap_or_default());
            }
            if differ::has_change(from, to, "retrieval_role_arn")
                && let Some(role_arn) = to.get_string("retrieval_role_arn")
            {
                request = request.retrieval_role_arn(role_arn);
            }
            if differ::has_change(from, to, "validator") {
                let validators = expand_validators(to.get_list("validator").unwrap_or_default())
                    .map_err(|e| e.for_resource(id.clone()))?;
                request = request.set_validators(Some(validators));
            }
            debug!(
                configuration_profile_id,
                application_id, "updating AppConfig configuration profile"
            );
            request.send().await.map_err(|e| {
                ProviderError::new(format!(
                    "Failed to update AppConfig configuration profile ({}) for application ({}): {:?}",
                    configuration_profile_id, application_id, e
                ))
                .for_resource(id.clone())
            })?;
        }

        let arn = self.build_arn(
            "appconfig",
            format!(
                "application/{application_id}/configurationprofile/{configuration_profile_id}"
            ),
        );
        self.update_appconfig_tags(id, &arn, from, to).await?;

        self.read_appconfig_configuration_profile(id, identifier)
            .await
    }

    pub(crate) async fn delete_appconfig_configuration_profile(
        &self,
        id: &ResourceId,
        identifier: &str,
    ) -> ProviderResult<()> {
        let (configuration_profile_id, application_id) =
            parse_configuration_profile_id(identifier)
                .map_err(|e| ProviderError::new(e.to_string()).for_resource(id.clone()))?;

        debug!(
            configuration_profile_id,
            application_id, "deleting AppConfig configuration profile"
        );
        match self
            .appconfig_client
            .delete_configuration_profile()
            .application_id(&application_id)
            .configuration_profile_id(&configuration_profile_id)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(ProviderError::new(format!(
                "Failed to delete AppConfig configuration profile ({}) for application ({}): {:?}",
                configuration_profile_id, application_id, e
            ))
            .for_resource(id.clone())),
        }
    }

    pub(crate) async fn create_appconfig_deployment(
        &self,
        resource: &Resource,
    ) -> ProviderResult<State> {
        let id = &resource.id;
        let application_id = require_string(resource, "application_id")?;
        let environment_id = require_string(resource, "environment_id")?;
        let configuration_profile_id = require_string(resource, "configuration_profile_id")?;
        let configuration_version = require_string(resource, "configuration_version")?;
        let deployment_strategy_id = require_string(resource, "deployment_strategy_id")?;
        let tags = self.merged_tags(resource);

        let mut request = self
            .appconfig_client
            .start_deployment()
            .application_id(application_id)
            .environment_id(environment_id)
            .configuration_profile_id(configuration_profile_id)
            .configuration_version(configuration_version)
            .deployment_strategy_id(deployment_strategy_id);
        if let Some(description) = resource.get_string("description") {
            request = request.description(description);
        }
        if !tags.is_empty() {
            request = request.set_tags(Some(tags.as_map()));
        }

        info!(application_id, environment_id, "starting AppConfig deployment");
        let output = request.send().await.map_err(|e| {
            ProviderError::new(format!("Failed to start AppConfig deployment: {:?}", e))
                .for_resource(id.clone())
        })?;

        let deployment_number = output.deployment_number();
        let identifier = format!("{application_id}/{environment_id}/{deployment_number}");

        wait_deployment_complete(
            &self.appconfig_client,
            application_id,
            environment_id,
            deployment_number,
        )
        .await
        .map_err(|e| e.for_resource(id.clone()))?;

        let state = self.read_appconfig_deployment(id, &identifier).await?;
        if !state.exists {
            return Err(ProviderError::new(format!(
                "AppConfig deployment ({identifier}) disappeared after creation"
            ))
            .for_resource(id.clone()));
        }
        Ok(state)
    }

    pub(crate) async fn read_appconfig_deployment(
        &self,
        id: &ResourceId,
        identifier: &str,
    ) -> ProviderResult<State> {
        let (application_id, environment_id, deployment_number) = parse_deployment_id(identifier)
            .map_err(|e| ProviderError::new(e.to_string()).for_resource(id.clone()))?;

        let output = match self
            .appconfig_client
            .get_deployment()
            .application_id(&application_id)
            .environment_id(&environment_id)
            .deployment_number(deployment_number)
            .send()
            .await
        {
            Ok(output) => output,
            Err(e) if is_not_found(&e) => {
                warn!(identifier, "AppConfig deployment not found, removing from state");
                return Ok(State::not_found(id.clone()));
            }
            Err(e) => {
                return Err(ProviderError::new(format!(
                    "Failed to get AppConfig deployment ({}): {:?}",
                    identifier, e
                ))
                .for_resource(id.clone()));
            }
        };

        let mut attributes = HashMap::new();
        attributes.insert(
            "application_id".to_string(),
            Value::String(application_id.clone()),
        );
        attributes.insert(
            "environment_id".to_string(),
            Value::String(environment_id.clone()),
        );
        attributes.insert(
            "deployment_number".to_string(),
            Value::Int(i64::from(output.deployment_number())),
        );
        if let Some(profile) = output.configuration_profile_id() {
            attributes.insert(
                "configuration_profile_id".to_string(),
                Value::String(profile.to_string()),
            );
        }
        if let Some(version) = output.configuration_version() {
            attributes.insert(
                "configuration_version".to_string(),
                Value::String(version.to_string()),
            );
        }
        if let Some(strategy) = output.deployment_strategy_id() {
            attributes.insert(
                "deployment_strategy_id".to_string(),
                Value::String(strategy.to_string()),
            );
        }
        if let Some(description) = output.description() {
            attributes.insert("description".to_string(), Value::String(description.to_string()));
        }

        let arn = self.build_arn(
            "appconfig",
            format!(
                "application/{application_id}/environment/{environment_id}/deployment/{deployment_number}"
            ),
        );
        attributes.insert("arn".to_string(), Value::String(arn.clone()));

        let tags = list_tags(&self.appconfig_client, &arn)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;
        self.insert_tag_attributes(&mut attributes, tags);

        Ok(State::existing(id.clone(), attributes).with_identifier(identifier))
    }

    pub(crate) async fn update_appconfig_deployment(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> ProviderResult<State> {
        let (application_id, environment_id, deployment_number) = parse_deployment_id(identifier)
            .map_err(|e| ProviderError::new(e.to_string()).for_resource(id.clone()))?;

        let arn = self.build_arn(
            "appconfig",
            format!(
                "application/{application_id}/environment/{environment_id}/deployment/{deployment_number}"
            ),
        );
        self.update_appconfig_tags(id, &arn, from, to).await?;

        self.read_appconfig_deployment(id, identifier).await
    }

    pub(crate) async fn delete_appconfig_deployment(
        &self,
        _id: &ResourceId,
        identifier: &str,
    ) -> ProviderResult<()> {
        warn!(
            identifier,
            "AppConfig deployments cannot be deleted remotely, removing from state only"
        );
        Ok(())
    }

    async fn update_appconfig_tags(
        &self,
        id: &ResourceId,
        arn: &str,
        from: &State,
        to: &Resource,
    ) -> ProviderResult<()> {
        let old = TagMap::from_value(from.attributes.get("tags_all"));
        let new = self.merged_tags(to);
        if old != new {
            update_tags(&self.appconfig_client, arn, &old, &new)
                .await
                .map_err(|e| e.for_resource(id.clone()))?;
        }
        Ok(())
    }
}

async fn list_tags(client: &Client, arn: &str) -> ProviderResult<TagMap> {
    let output = client
        .list_tags_for_resource()
        .resource_arn(arn)
        .send()
        .await
        .map_err(|e| ProviderError::new(format!("Failed to list tags for ({}): {:?}", arn, e)))?;

    let mut tags = TagMap::new();
    if let Some(map) = output.tags() {
        for (key, value) in map {
            tags.insert(key, value);
        }
    }
    Ok(tags)
}

async fn update_tags(client: &Client, arn: &str, old: &TagMap, new: &TagMap) -> ProviderResult<()> {
    let (upsert, remove) = TagMap::diff(old, new);
    if !remove.is_empty() {
        client
            .untag_resource()
            .resource_arn(arn)
            .set_tag_keys(Some(remove))
            .send()
            .await
            .map_err(|e| {
                ProviderError::new(format!("Failed to remove tags from ({}): {:?}", arn, e))
            })?;
    }
    if !upsert.is_empty() {
        client
            .tag_resource()
            .resource_arn(arn)
            .set_tags(Some(upsert.as_map()))
            .send()
            .await
            .map_err(|e| ProviderError::new(format!("Failed to tag ({}): {:?}", arn, e)))?;
    }
    Ok(())
}

async fn find_deployment(
    client: &Client,
    application_id: &str,
    environment_id: &str,
    deployment_number: i32,
) -> ProviderResult<Option<GetDeploymentOutput>> {
    match client
        .get_deployment()
        .application_id(application_id)
        .environment_id(environment_id)
        .deployment_number(deployment_number)
        .send()
        .await
    {
        Ok(output) => Ok(Some(output)),
        Err(e) if is_not_found(&e) => Ok(None),
        Err(e) => Err(ProviderError::new(format!(
            "Failed to get AppConfig deployment ({}/{}/{}): {:?}",
            application_id, environment_id, deployment_number, e
        ))),
    }
}

async fn wait_deployment_complete(
    client: &Client,
    application_id: &str,
    environment_id: &str,
    deployment_number: i32,
) -> ProviderResult<()> {
    info!(deployment_number, "waiting for AppConfig deployment to complete");
    StateChange::new(|| {
        let client = client.clone();
        let application_id = application_id.to_string();
        let environment_id = environment_id.to_string();
        async move {
            Ok(
                find_deployment(&client, &application_id, &environment_id, deployment_number)
                    .await?
                    .map(|deployment| {
                        let status = deployment
                            .state()
                            .map(|s| s.as_str().to_string())
                            .unwrap_or_default();
                        (deployment, status)
                    }),
            )
        }
    })
    .pending(&["BAKING", "DEPLOYING", "ROLLING_BACK", "VALIDATING"])
    .target(&["COMPLETE"])
    .timeout(DEPLOYMENT_TIMEOUT)
    .min_interval(Duration::from_secs(5))
    .wait()
    .await?;
    Ok(())
}

// The API needs an explicit empty list, not an absent one, to clear
// existing monitors on update.
fn expand_monitors(values: &[Value]) -> Result<Vec<Monitor>, ProviderError> {
    let mut monitors = Vec::new();
    for value in values {
        let Value::Map(map) = value else { continue };
        let mut builder = Monitor::builder();
        if let Some(Value::String(alarm_arn)) = map.get("alarm_arn") {
            builder = builder.alarm_arn(alarm_arn);
        }
        if let Some(Value::String(alarm_role_arn)) = map.get("alarm_role_arn") {
            builder = builder.alarm_role_arn(alarm_role_arn);
        }
        let monitor = builder
            .build()
            .map_err(|e| ProviderError::new(format!("Invalid monitor configuration: {}", e)))?;
        monitors.push(monitor);
    }
    Ok(monitors)
}

fn flatten_monitors(monitors: &[Monitor]) -> Value {
    Value::List(
        monitors
            .iter()
            .map(|monitor| {
                let mut map = HashMap::new();
                map.insert(
                    "alarm_arn".to_string(),
                    Value::String(monitor.alarm_arn().to_string()),
                );
                if let Some(alarm_role_arn) = monitor.alarm_role_arn() {
                    map.insert(
                        "alarm_role_arn".to_string(),
                        Value::String(alarm_role_arn.to_string()),
                    );
                }
                Value::Map(map)
            })
            .collect(),
    )
}

// The API requires content even when a validator has none, so an absent
// one is sent as the empty string.
fn expand_validators(values: &[Value]) -> Result<Vec<Validator>, ProviderError> {
    let mut validators = Vec::new();
    for value in values {
        let Value::Map(map) = value else { continue };
        let mut builder = Validator::builder();
        if let Some(Value::String(validator_type)) = map.get("type") {
            builder = builder.r#type(ValidatorType::from(validator_type.as_str()));
        }
        let content = match map.get("content") {
            Some(Value::String(content)) => content.as_str(),
            _ => "",
        };
        let validator = builder.content(content).build().map_err(|e| {
            ProviderError::new(format!("Invalid validator configuration: {}", e))
        })?;
        validators.push(validator);
    }
    Ok(validators)
}

fn flatten_validators(validators: &[Validator]) -> Value {
    Value::List(
        validators
            .iter()
            .map(|validator| {
                let mut map = HashMap::new();
                map.insert(
                    "type".to_string(),
                    Value::String(validator.r#type().as_str().to_string()),
                );
                map.insert(
                    "content".to_string(),
                    Value::String(validator.content().to_string()),
                );
                Value::Map(map)
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn application_schema_accepts_minimal_configuration() {
        let mut attributes = HashMap::new();
        attributes.insert("name".to_string(), Value::String("settings".to_string()));
        assert!(application_schema().validate(&attributes).is_ok());
    }

    #[test]
    fn application_schema_requires_a_name() {
        let attributes = HashMap::new();
        let errors = application_schema().validate(&attributes).unwrap_err();
        assert!(errors.iter().any(|e| e.to_string().contains("name")));
    }

    #[test]
    fn environment_monitors_are_validated_as_blocks() {
        let mut monitor = HashMap::new();
        monitor.insert(
            "alarm_arn".to_string(),
            Value::String("not-an-arn".to_string()),
        );

        let mut attributes = HashMap::new();
        attributes.insert("application_id".to_string(), Value::String("abc1234".to_string()));
        attributes.insert("name".to_string(), Value::String("prod".to_string()));
        attributes.insert("monitor".to_string(), Value::List(vec![Value::Map(monitor)]));

        assert!(environment_schema().validate(&attributes).is_err());
    }

    #[test]
    fn environment_allows_at_most_five_monitors() {
        let monitor = |n: usize| {
            let mut map = HashMap::new();
            map.insert(
                "alarm_arn".to_string(),
                Value::String(format!(
                    "arn:aws:cloudwatch:us-east-1:123456789012:alarm:alarm-{n}"
                )),
            );
            Value::Map(map)
        };

        let mut attributes = HashMap::new();
        attributes.insert("application_id".to_string(), Value::String("abc1234".to_string()));
        attributes.insert("name".to_string(), Value::String("prod".to_string()));
        attributes.insert(
            "monitor".to_string(),
            Value::List((0..6).map(monitor).collect()),
        );

        let errors = environment_schema().validate(&attributes).unwrap_err();
        assert!(errors.iter().any(|e| e.to_string().contains("at most 5")));
    }

    fn profile_attributes() -> HashMap<String, Value> {
        let mut attributes = HashMap::new();
        attributes.insert(
            "application_id".to_string(),
            Value::String("abc1234".to_string()),
        );
        attributes.insert(
            "name".to_string(),
            Value::String("feature-flags".to_string()),
        );
        attributes.insert("location_uri".to_string(), Value::String("hosted".to_string()));
        attributes
    }

    fn validator_value(validator_type: &str, content: Option<&str>) -> Value {
        let mut map = HashMap::new();
        map.insert(
            "type".to_string(),
            Value::String(validator_type.to_string()),
        );
        if let Some(content) = content {
            map.insert("content".to_string(), Value::String(content.to_string()));
        }
        Value::Map(map)
    }

    #[test]
    fn configuration_profile_schema_accepts_a_hosted_profile() {
        assert!(configuration_profile_schema()
            .validate(&profile_attributes())
            .is_ok());
    }

    #[test]
    fn configuration_profile_validator_types_are_checked() {
        let mut attributes = profile_attributes();
        attributes.insert(
            "validator".to_string(),
            Value::List(vec![validator_value("YAML_SCHEMA", None)]),
        );
        assert!(configuration_profile_schema().validate(&attributes).is_err());

        attributes.insert(
            "validator".to_string(),
            Value::List(vec![
                validator_value("JSON_SCHEMA", Some("{\"type\":\"object\"}")),
                validator_value(
                    "LAMBDA",
                    Some("arn:aws:lambda:us-east-1:123456789012:function:validate"),
                ),
            ]),
        );
        assert!(configuration_profile_schema().validate(&attributes).is_ok());
    }

    #[test]
    fn configuration_profile_allows_at_most_two_validators() {
        let mut attributes = profile_attributes();
        attributes.insert(
            "validator".to_string(),
            Value::List(vec![
                validator_value("JSON_SCHEMA", Some("{}")),
                validator_value("JSON_SCHEMA", Some("{}")),
                validator_value("JSON_SCHEMA", Some("{}")),
            ]),
        );

        let errors = configuration_profile_schema()
            .validate(&attributes)
            .unwrap_err();
        assert!(errors.iter().any(|e| e.to_string().contains("at most 2")));
    }

    #[test]
    fn configuration_profile_identity_forces_replacement() {
        let schema = configuration_profile_schema();
        assert!(schema.requires_replacement(&["application_id".to_string()]));
        assert!(schema.requires_replacement(&["location_uri".to_string()]));
        assert!(!schema.requires_replacement(&["name".to_string()]));
        assert!(!schema.requires_replacement(&["validator".to_string()]));
    }

    #[test]
    fn configuration_profile_ids_put_the_profile_first() {
        let (configuration_profile_id, application_id) =
            parse_configuration_profile_id("prof123:app1234").unwrap();
        assert_eq!(configuration_profile_id, "prof123");
        assert_eq!(application_id, "app1234");

        assert!(parse_configuration_profile_id("app1234").is_err());
        assert!(parse_configuration_profile_id(":app1234").is_err());
        assert!(matches!(
            parse_configuration_profile_id("prof123:app1234:extra"),
            Err(IdFormatError::ConfigurationProfile(_))
        ));
    }

    #[test]
    fn validators_expand_with_empty_content_and_flatten() {
        let validators = expand_validators(&[
            validator_value("JSON_SCHEMA", None),
            validator_value(
                "LAMBDA",
                Some("arn:aws:lambda:us-east-1:123456789012:function:validate"),
            ),
        ])
        .unwrap();
        assert_eq!(validators.len(), 2);
        assert_eq!(validators[0].r#type().as_str(), "JSON_SCHEMA");
        assert_eq!(validators[0].content(), "");

        let Value::List(items) = flatten_validators(&validators) else {
            panic!("expected a list");
        };
        assert_eq!(items.len(), 2);
        let Value::Map(first) = &items[0] else {
            panic!("expected a map");
        };
        assert_eq!(first.get("content"), Some(&Value::String(String::new())));
    }

    #[test]
    fn deployment_inputs_force_replacement() {
        let schema = deployment_schema();
        assert!(schema.requires_replacement(&["configuration_version".to_string()]));
        assert!(schema.requires_replacement(&["deployment_strategy_id".to_string()]));
        assert!(!schema.requires_replacement(&["tags".to_string()]));
    }

    #[test]
    fn environment_ids_split_into_environment_and_application() {
        let (environment_id, application_id) = parse_environment_id("env4567:app1234").unwrap();
        assert_eq!(environment_id, "env4567");
        assert_eq!(application_id, "app1234");

        assert!(parse_environment_id("app1234").is_err());
        assert!(parse_environment_id(":app1234").is_err());
        assert!(parse_environment_id("env4567:app1234:extra").is_err());
    }

    #[test]
    fn deployment_ids_carry_a_numeric_suffix() {
        let (application_id, environment_id, number) =
            parse_deployment_id("app1234/env4567/3").unwrap();
        assert_eq!(application_id, "app1234");
        assert_eq!(environment_id, "env4567");
        assert_eq!(number, 3);

        assert!(parse_deployment_id("app1234/env4567").is_err());
        assert!(matches!(
            parse_deployment_id("app1234/env4567/three"),
            Err(IdFormatError::DeploymentNumber(_))
        ));
    }

    #[test]
    fn monitors_expand_and_flatten() {
        let mut map = HashMap::new();
        map.insert(
            "alarm_arn".to_string(),
            Value::String("arn:aws:cloudwatch:us-east-1:123456789012:alarm:errors".to_string()),
        );
        map.insert(
            "alarm_role_arn".to_string(),
            Value::String("arn:aws:iam::123456789012:role/appconfig-monitor".to_string()),
        );

        let monitors = expand_monitors(&[Value::Map(map)]).unwrap();
        assert_eq!(monitors.len(), 1);
        assert_eq!(
            monitors[0].alarm_arn(),
            "arn:aws:cloudwatch:us-east-1:123456789012:alarm:errors"
        );

        let Value::List(items) = flatten_monitors(&monitors) else {
            panic!("expected a list");
        };
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn expanding_zero_monitors_yields_an_empty_list() {
        assert_eq!(expand_monitors(&[]).unwrap().len(), 0);
    }
}
