//! ElastiCache users and user groups, plus the user lookup data source.
//!
//! Both resources poll a status string through "creating"/"modifying" into
//! "active", and their deletes wait for the entry to disappear. The
//! ElastiCache tag APIs are only available in the standard AWS partition,
//! so every tag call is gated on it. The API reports the engine in
//! lowercase while configurations carry "REDIS"; reads normalize to
//! uppercase so the two never appear to differ.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use aws_sdk_elasticache::Client;
use aws_sdk_elasticache::types::{AuthenticationType, Tag, User, UserGroup};
use tracing::{debug, info, warn};
use vela_core::differ;
use vela_core::provider::{ProviderError, ProviderResult, ResourceType};
use vela_core::resource::{Resource, ResourceId, State, Value};
use vela_core::schema::{AttributeSchema, AttributeType, ResourceSchema};
use vela_core::waiter::StateChange;

use crate::AwsProvider;
use crate::require_string;
use crate::tags::{self, TagMap};

const USER_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const USER_GROUP_TIMEOUT: Duration = Duration::from_secs(20 * 60);

/// Statuses a user or user group passes through on its way to "active".
const PENDING_STATUSES: &[&str] = &["creating", "modifying"];

pub struct UserType;

impl ResourceType for UserType {
    fn name(&self) -> &'static str {
        "elasticache_user"
    }

    fn schema(&self) -> ResourceSchema {
        user_schema()
    }
}

pub struct UserGroupType;

impl ResourceType for UserGroupType {
    fn name(&self) -> &'static str {
        "elasticache_user_group"
    }

    fn schema(&self) -> ResourceSchema {
        user_group_schema()
    }
}

/// Read-only lookup of an existing user.
pub struct UserDataSource;

impl ResourceType for UserDataSource {
    fn name(&self) -> &'static str {
        "elasticache_user"
    }

    fn schema(&self) -> ResourceSchema {
        user_data_source_schema()
    }
}

pub fn user_schema() -> ResourceSchema {
    ResourceSchema::new("elasticache_user")
        .with_description("ElastiCache Redis user")
        .attribute(
            AttributeSchema::new("user_id", AttributeType::String)
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("user_name", AttributeType::String)
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("engine", AttributeType::Enum(vec!["REDIS".to_string()]))
                .required()
                .force_new(),
        )
        .attribute(AttributeSchema::new("access_string", AttributeType::String).required())
        .attribute(
            AttributeSchema::new("passwords", AttributeType::List(Box::new(AttributeType::String)))
                .optional()
                .force_new()
                .sensitive(),
        )
        .attribute(
            AttributeSchema::new("no_password_required", AttributeType::Bool)
                .optional()
                .force_new()
                .with_default(Value::Bool(false)),
        )
        .attribute(AttributeSchema::new("arn", AttributeType::String).computed())
        .attribute(tags::tags_schema())
        .attribute(tags::tags_all_schema())
}

pub fn user_group_schema() -> ResourceSchema {
    ResourceSchema::new("elasticache_user_group")
        .with_description("ElastiCache user group")
        .attribute(
            AttributeSchema::new("user_group_id", AttributeType::String)
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("engine", AttributeType::Enum(vec!["REDIS".to_string()]))
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("user_ids", AttributeType::List(Box::new(AttributeType::String)))
                .optional(),
        )
        .attribute(AttributeSchema::new("arn", AttributeType::String).computed())
        .attribute(tags::tags_schema())
        .attribute(tags::tags_all_schema())
}

pub fn user_data_source_schema() -> ResourceSchema {
    ResourceSchema::new("elasticache_user")
        .with_description("Looks up an existing ElastiCache user by ID")
        .attribute(AttributeSchema::new("user_id", AttributeType::String).required())
        .attribute(AttributeSchema::new("user_name", AttributeType::String).computed())
        .attribute(AttributeSchema::new("access_string", AttributeType::String).computed())
        .attribute(AttributeSchema::new("engine", AttributeType::String).computed())
        .attribute(AttributeSchema::new("no_password_required", AttributeType::Bool).computed())
        .attribute(AttributeSchema::new("arn", AttributeType::String).computed())
}

impl AwsProvider {
    pub(crate) async fn create_elasticache_user(
        &self,
        resource: &Resource,
    ) -> ProviderResult<State> {
        let id = &resource.id;
        let user_id = require_string(resource, "user_id")?;
        let user_name = require_string(resource, "user_name")?;
        let engine = require_string(resource, "engine")?;
        let access_string = require_string(resource, "access_string")?;
        let tags = self.merged_tags(resource);

        let mut request = self
            .elasticache_client
            .create_user()
            .user_id(user_id)
            .user_name(user_name)
            .engine(engine)
            .access_string(access_string);
        if let Some(passwords) = resource.get_string_list("passwords")
            && !passwords.is_empty()
        {
            request = request.set_passwords(Some(passwords));
        }
        if resource.get_bool("no_password_required").unwrap_or(false) {
            request = request.no_password_required(true);
        }
        // Tags are only supported in the standard AWS partition.
        if !tags.is_empty() && self.partition == "aws" {
            request = request.set_tags(Some(expand_tags(&tags)));
        }

        debug!(user_id, "creating ElastiCache user");
        let output = request.send().await.map_err(|e| {
            ProviderError::new(format!("Failed to create ElastiCache user: {:?}", e))
                .for_resource(id.clone())
        })?;

        let user_id = output
            .user_id()
            .map(String::from)
            .unwrap_or_else(|| user_id.to_string());

        wait_user_active(&self.elasticache_client, &user_id)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;

        let mut state = self.read_elasticache_user(id, &user_id).await?;
        if !state.exists {
            return Err(ProviderError::new(format!(
                "ElastiCache user ({user_id}) disappeared after creation"
            ))
            .for_resource(id.clone()));
        }
        carry_passwords(&mut state, resource);
        Ok(state)
    }

    pub(crate) async fn read_elasticache_user(
        &self,
        id: &ResourceId,
        user_id: &str,
    ) -> ProviderResult<State> {
        let Some(user) = find_user(&self.elasticache_client, user_id)
            .await
            .map_err(|e| e.for_resource(id.clone()))?
        else {
            warn!(user_id, "ElastiCache user not found, removing from state");
            return Ok(State::not_found(id.clone()));
        };

        let mut attributes = HashMap::new();
        attributes.insert("user_id".to_string(), Value::String(user_id.to_string()));
        if let Some(user_name) = user.user_name() {
            attributes.insert("user_name".to_string(), Value::String(user_name.to_string()));
        }
        if let Some(access_string) = user.access_string() {
            attributes.insert(
                "access_string".to_string(),
                Value::String(access_string.to_string()),
            );
        }
        if let Some(engine) = user.engine() {
            attributes.insert("engine".to_string(), Value::String(engine.to_uppercase()));
        }
        attributes.insert(
            "no_password_required".to_string(),
            Value::Bool(has_no_password(&user)),
        );

        if let Some(arn) = user.arn() {
            attributes.insert("arn".to_string(), Value::String(arn.to_string()));
            // Tags are only supported in the standard AWS partition.
            if self.partition == "aws" {
                let tags = list_tags(&self.elasticache_client, arn)
                    .await
                    .map_err(|e| e.for_resource(id.clone()))?;
                self.insert_tag_attributes(&mut attributes, tags);
            }
        }

        Ok(State::existing(id.clone(), attributes).with_identifier(user_id))
    }

    pub(crate) async fn update_elasticache_user(
        &self,
        id: &ResourceId,
        user_id: &str,
        from: &State,
        to: &Resource,
    ) -> ProviderResult<State> {
        if differ::has_change(from, to, "access_string") {
            let access_string = require_string(to, "access_string")?;
            debug!(user_id, "modifying ElastiCache user");
            self.elasticache_client
                .modify_user()
                .user_id(user_id)
                .access_string(access_string)
                .send()
                .await
                .map_err(|e| {
                    ProviderError::new(format!(
                        "Failed to modify ElastiCache user ({}): {:?}",
                        user_id, e
                    ))
                    .for_resource(id.clone())
                })?;

            wait_user_active(&self.elasticache_client, user_id)
                .await
                .map_err(|e| e.for_resource(id.clone()))?;
        }

        let old_tags = TagMap::from_value(from.attributes.get("tags_all"));
        let new_tags = self.merged_tags(to);
        if old_tags != new_tags {
            // Tags are only supported in the standard AWS partition.
            if self.partition != "aws" {
                warn!(user_id, "skipping ElastiCache tag update outside the standard AWS partition");
            } else if let Some(arn) = from.get_string("arn") {
                update_tags(&self.elasticache_client, arn, &old_tags, &new_tags)
                    .await
                    .map_err(|e| e.for_resource(id.clone()))?;
            } else {
                return Err(ProviderError::new(format!(
                    "Cannot update tags for ElastiCache user ({user_id}): no ARN in state"
                ))
                .for_resource(id.clone()));
            }
        }

        let mut state = self.read_elasticache_user(id, user_id).await?;
        carry_passwords(&mut state, to);
        Ok(state)
    }

    pub(crate) async fn delete_elasticache_user(
        &self,
        id: &ResourceId,
        user_id: &str,
    ) -> ProviderResult<()> {
        debug!(user_id, "deleting ElastiCache user");
        match self
            .elasticache_client
            .delete_user()
            .user_id(user_id)
            .send()
            .await
        {
            Ok(_) => {}
            Err(e) if e.as_service_error().is_some_and(|se| se.is_user_not_found_fault()) => {
                return Ok(());
            }
            // Already being deleted; fall through to the disappearance wait.
            Err(e) if e.as_service_error().is_some_and(|se| se.is_invalid_user_state_fault()) => {}
            Err(e) => {
                return Err(ProviderError::new(format!(
                    "Failed to delete ElastiCache user ({}): {:?}",
                    user_id, e
                ))
                .for_resource(id.clone()));
            }
        }

        wait_user_deleted(&self.elasticache_client, user_id)
            .await
            .map_err(|e| e.for_resource(id.clone()))
    }

    pub(crate) async fn create_elasticache_user_group(
        &self,
        resource: &Resource,
    ) -> ProviderResult<State> {
        let id = &resource.id;
        let user_group_id = require_string(resource, "user_group_id")?;
        let engine = require_string(resource, "engine")?;
        let tags = self.merged_tags(resource);

        let mut request = self
            .elasticache_client
            .create_user_group()
            .user_group_id(user_group_id)
            .engine(engine);
        if let Some(user_ids) = resource.get_string_list("user_ids")
            && !user_ids.is_empty()
        {
            request = request.set_user_ids(Some(user_ids));
        }
        // Tags are only supported in the standard AWS partition.
        if !tags.is_empty() && self.partition == "aws" {
            request = request.set_tags(Some(expand_tags(&tags)));
        }

        debug!(user_group_id, "creating ElastiCache user group");
        let output = request.send().await.map_err(|e| {
            ProviderError::new(format!("Failed to create ElastiCache user group: {:?}", e))
                .for_resource(id.clone())
        })?;

        let user_group_id = output
            .user_group_id()
            .map(String::from)
            .unwrap_or_else(|| user_group_id.to_string());

        wait_user_group_active(&self.elasticache_client, &user_group_id)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;

        let state = self.read_elasticache_user_group(id, &user_group_id).await?;
        if !state.exists {
            return Err(ProviderError::new(format!(
                "ElastiCache user group ({user_group_id}) disappeared after creation"
            ))
            .for_resource(id.clone()));
        }
        Ok(state)
    }

    pub(crate) async fn read_elasticache_user_group(
        &self,
        id: &ResourceId,
        user_group_id: &str,
    ) -> ProviderResult<State> {
        let Some(group) = find_user_group(&self.elasticache_client, user_group_id)
            .await
            .map_err(|e| e.for_resource(id.clone()))?
        else {
            debug!(user_group_id, "ElastiCache user group not found, removing from state");
            return Ok(State::not_found(id.clone()));
        };

        let mut attributes = HashMap::new();
        attributes.insert(
            "user_group_id".to_string(),
            Value::String(user_group_id.to_string()),
        );
        if let Some(engine) = group.engine() {
            attributes.insert("engine".to_string(), Value::String(engine.to_uppercase()));
        }
        attributes.insert(
            "user_ids".to_string(),
            Value::List(
                group
                    .user_ids()
                    .iter()
                    .map(|user_id| Value::String(user_id.clone()))
                    .collect(),
            ),
        );

        if let Some(arn) = group.arn() {
            attributes.insert("arn".to_string(), Value::String(arn.to_string()));
            // Tags are only supported in the standard AWS partition.
            if self.partition == "aws" {
                let tags = list_tags(&self.elasticache_client, arn)
                    .await
                    .map_err(|e| e.for_resource(id.clone()))?;
                self.insert_tag_attributes(&mut attributes, tags);
            }
        }

        Ok(State::existing(id.clone(), attributes).with_identifier(user_group_id))
    }

    pub(crate) async fn update_elasticache_user_group(
        &self,
        id: &ResourceId,
        user_group_id: &str,
        from: &State,
        to: &Resource,
    ) -> ProviderResult<State> {
        if differ::has_change(from, to, "user_ids") {
            let old = from.get_string_list("user_ids").unwrap_or_default();
            let new = to.get_string_list("user_ids").unwrap_or_default();
            let (user_ids_to_add, user_ids_to_remove) = user_id_changes(&old, &new);

            if !user_ids_to_add.is_empty() || !user_ids_to_remove.is_empty() {
                let mut request = self
                    .elasticache_client
                    .modify_user_group()
                    .user_group_id(user_group_id);
                if !user_ids_to_add.is_empty() {
                    request = request.set_user_ids_to_add(Some(user_ids_to_add));
                }
                if !user_ids_to_remove.is_empty() {
                    request = request.set_user_ids_to_remove(Some(user_ids_to_remove));
                }

                debug!(user_group_id, "modifying ElastiCache user group");
                request.send().await.map_err(|e| {
                    ProviderError::new(format!(
                        "Failed to modify ElastiCache user group ({}): {:?}",
                        user_group_id, e
                    ))
                    .for_resource(id.clone())
                })?;

                wait_user_group_active(&self.elasticache_client, user_group_id)
                    .await
                    .map_err(|e| e.for_resource(id.clone()))?;
            }
        }

        let old_tags = TagMap::from_value(from.attributes.get("tags_all"));
        let new_tags = self.merged_tags(to);
        if old_tags != new_tags {
            // Tags are only supported in the standard AWS partition.
            if self.partition != "aws" {
                warn!(
                    user_group_id,
                    "skipping ElastiCache tag update outside the standard AWS partition"
                );
            } else if let Some(arn) = from.get_string("arn") {
                update_tags(&self.elasticache_client, arn, &old_tags, &new_tags)
                    .await
                    .map_err(|e| e.for_resource(id.clone()))?;
            } else {
                return Err(ProviderError::new(format!(
                    "Cannot update tags for ElastiCache user group ({user_group_id}): no ARN in state"
                ))
                .for_resource(id.clone()));
            }
        }

        self.read_elasticache_user_group(id, user_group_id).await
    }

    pub(crate) async fn delete_elasticache_user_group(
        &self,
        id: &ResourceId,
        user_group_id: &str,
    ) -> ProviderResult<()> {
        debug!(user_group_id, "deleting ElastiCache user group");
        match self
            .elasticache_client
            .delete_user_group()
            .user_group_id(user_group_id)
            .send()
            .await
        {
            Ok(_) => {}
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_user_group_not_found_fault()) =>
            {
                return Ok(());
            }
            // Already being deleted; fall through to the disappearance wait.
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_invalid_user_group_state_fault()) => {}
            Err(e) => {
                return Err(ProviderError::new(format!(
                    "Failed to delete ElastiCache user group ({}): {:?}",
                    user_group_id, e
                ))
                .for_resource(id.clone()));
            }
        }

        wait_user_group_deleted(&self.elasticache_client, user_group_id)
            .await
            .map_err(|e| e.for_resource(id.clone()))
    }

    pub(crate) async fn read_elasticache_user_data_source(
        &self,
        resource: &Resource,
    ) -> ProviderResult<State> {
        let id = &resource.id;
        let user_id = require_string(resource, "user_id")?;

        let user = find_user(&self.elasticache_client, user_id)
            .await
            .map_err(|e| e.for_resource(id.clone()))?
            .ok_or_else(|| {
                ProviderError::new(format!("ElastiCache user ({user_id}) not found"))
                    .for_resource(id.clone())
            })?;

        let mut attributes = HashMap::new();
        attributes.insert("user_id".to_string(), Value::String(user_id.to_string()));
        if let Some(user_name) = user.user_name() {
            attributes.insert("user_name".to_string(), Value::String(user_name.to_string()));
        }
        if let Some(access_string) = user.access_string() {
            attributes.insert(
                "access_string".to_string(),
                Value::String(access_string.to_string()),
            );
        }
        if let Some(engine) = user.engine() {
            attributes.insert("engine".to_string(), Value::String(engine.to_uppercase()));
        }
        attributes.insert(
            "no_password_required".to_string(),
            Value::Bool(has_no_password(&user)),
        );
        if let Some(arn) = user.arn() {
            attributes.insert("arn".to_string(), Value::String(arn.to_string()));
        }

        Ok(State::existing(id.clone(), attributes).with_identifier(user_id))
    }
}

pub(crate) async fn find_user(client: &Client, user_id: &str) -> ProviderResult<Option<User>> {
    let output = match client.describe_users().user_id(user_id).send().await {
        Ok(output) => output,
        Err(e) if e.as_service_error().is_some_and(|se| se.is_user_not_found_fault()) => {
            return Ok(None);
        }
        Err(e) => {
            return Err(ProviderError::new(format!(
                "Failed to describe ElastiCache user ({}): {:?}",
                user_id, e
            )));
        }
    };

    Ok(output
        .users()
        .iter()
        .find(|user| user.user_id() == Some(user_id))
        .cloned())
}

pub(crate) async fn find_user_group(
    client: &Client,
    user_group_id: &str,
) -> ProviderResult<Option<UserGroup>> {
    let output = match client
        .describe_user_groups()
        .user_group_id(user_group_id)
        .send()
        .await
    {
        Ok(output) => output,
        Err(e)
            if e.as_service_error()
                .is_some_and(|se| se.is_user_group_not_found_fault()) =>
        {
            return Ok(None);
        }
        Err(e) => {
            return Err(ProviderError::new(format!(
                "Failed to describe ElastiCache user group ({}): {:?}",
                user_group_id, e
            )));
        }
    };

    Ok(output
        .user_groups()
        .iter()
        .find(|group| group.user_group_id() == Some(user_group_id))
        .cloned())
}

async fn wait_user_active(client: &Client, user_id: &str) -> ProviderResult<()> {
    info!(user_id, "waiting for ElastiCache user to be active");
    StateChange::new(|| {
        let client = client.clone();
        let user_id = user_id.to_string();
        async move {
            Ok(find_user(&client, &user_id).await?.map(|user| {
                let status = user.status().unwrap_or_default().to_string();
                (user, status)
            }))
        }
    })
    .pending(PENDING_STATUSES)
    .target(&["active"])
    .timeout(USER_TIMEOUT)
    .min_interval(Duration::from_secs(10))
    .wait()
    .await?;
    Ok(())
}

async fn wait_user_deleted(client: &Client, user_id: &str) -> ProviderResult<()> {
    info!(user_id, "waiting for ElastiCache user to be deleted");
    StateChange::new(|| {
        let client = client.clone();
        let user_id = user_id.to_string();
        async move {
            Ok(find_user(&client, &user_id).await?.map(|user| {
                let status = user.status().unwrap_or_default().to_string();
                (user, status)
            }))
        }
    })
    .pending(&["deleting"])
    .target(&[])
    .timeout(USER_TIMEOUT)
    .min_interval(Duration::from_secs(10))
    .wait()
    .await?;
    Ok(())
}

async fn wait_user_group_active(client: &Client, user_group_id: &str) -> ProviderResult<()> {
    info!(user_group_id, "waiting for ElastiCache user group to be active");
    StateChange::new(|| {
        let client = client.clone();
        let user_group_id = user_group_id.to_string();
        async move {
            Ok(find_user_group(&client, &user_group_id).await?.map(|group| {
                let status = group.status().unwrap_or_default().to_string();
                (group, status)
            }))
        }
    })
    .pending(PENDING_STATUSES)
    .target(&["active"])
    .timeout(USER_GROUP_TIMEOUT)
    .delay(Duration::from_secs(30))
    .min_interval(Duration::from_secs(10))
    .wait()
    .await?;
    Ok(())
}

async fn wait_user_group_deleted(client: &Client, user_group_id: &str) -> ProviderResult<()> {
    info!(user_group_id, "waiting for ElastiCache user group to be deleted");
    StateChange::new(|| {
        let client = client.clone();
        let user_group_id = user_group_id.to_string();
        async move {
            Ok(find_user_group(&client, &user_group_id).await?.map(|group| {
                let status = group.status().unwrap_or_default().to_string();
                (group, status)
            }))
        }
    })
    .pending(&["deleting"])
    .target(&[])
    .timeout(USER_GROUP_TIMEOUT)
    .delay(Duration::from_secs(30))
    .min_interval(Duration::from_secs(10))
    .wait()
    .await?;
    Ok(())
}

/// Splits a member set transition into the IDs to add and to remove.
fn user_id_changes(old: &[String], new: &[String]) -> (Vec<String>, Vec<String>) {
    let old: BTreeSet<&String> = old.iter().collect();
    let new: BTreeSet<&String> = new.iter().collect();
    let add = new.difference(&old).map(|id| (*id).clone()).collect();
    let remove = old.difference(&new).map(|id| (*id).clone()).collect();
    (add, remove)
}

fn has_no_password(user: &User) -> bool {
    user.authentication()
        .and_then(|auth| auth.r#type())
        .is_some_and(|auth_type| *auth_type == AuthenticationType::NoPassword)
}

// Passwords never come back from the API; the configured values are carried
// into state so they do not show up as perpetually missing.
fn carry_passwords(state: &mut State, resource: &Resource) {
    if let Some(passwords) = resource.attributes.get("passwords") {
        state
            .attributes
            .insert("passwords".to_string(), passwords.clone());
    }
}

fn expand_tags(tags: &TagMap) -> Vec<Tag> {
    tags.iter()
        .map(|(key, value)| Tag::builder().key(key).value(value).build())
        .collect()
}

async fn list_tags(client: &Client, arn: &str) -> ProviderResult<TagMap> {
    let output = client
        .list_tags_for_resource()
        .resource_name(arn)
        .send()
        .await
        .map_err(|e| ProviderError::new(format!("Failed to list tags for ({}): {:?}", arn, e)))?;

    let mut tags = TagMap::new();
    for tag in output.tag_list() {
        if let (Some(key), Some(value)) = (tag.key(), tag.value()) {
            tags.insert(key, value);
        }
    }
    Ok(tags)
}

async fn update_tags(client: &Client, arn: &str, old: &TagMap, new: &TagMap) -> ProviderResult<()> {
    let (upsert, remove) = TagMap::diff(old, new);
    if !remove.is_empty() {
        client
            .remove_tags_from_resource()
            .resource_name(arn)
            .set_tag_keys(Some(remove))
            .send()
            .await
            .map_err(|e| {
                ProviderError::new(format!("Failed to remove tags from ({}): {:?}", arn, e))
            })?;
    }
    if !upsert.is_empty() {
        client
            .add_tags_to_resource()
            .resource_name(arn)
            .set_tags(Some(expand_tags(&upsert)))
            .send()
            .await
            .map_err(|e| ProviderError::new(format!("Failed to tag ({}): {:?}", arn, e)))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_schema_accepts_a_passwordless_user() {
        let mut attributes = HashMap::new();
        attributes.insert("user_id".to_string(), Value::String("app-user".to_string()));
        attributes.insert("user_name".to_string(), Value::String("app".to_string()));
        attributes.insert("engine".to_string(), Value::String("REDIS".to_string()));
        attributes.insert(
            "access_string".to_string(),
            Value::String("on ~* +@all".to_string()),
        );
        attributes.insert("no_password_required".to_string(), Value::Bool(true));

        assert!(user_schema().validate(&attributes).is_ok());
    }

    #[test]
    fn engine_must_be_uppercase_redis() {
        let mut attributes = HashMap::new();
        attributes.insert("user_id".to_string(), Value::String("app-user".to_string()));
        attributes.insert("user_name".to_string(), Value::String("app".to_string()));
        attributes.insert("engine".to_string(), Value::String("redis".to_string()));
        attributes.insert(
            "access_string".to_string(),
            Value::String("on ~* +@all".to_string()),
        );

        let errors = user_schema().validate(&attributes).unwrap_err();
        assert!(errors.iter().any(|e| e.to_string().contains("REDIS")));
    }

    #[test]
    fn passwords_are_sensitive_and_force_replacement() {
        let schema = user_schema();
        let passwords = &schema.attributes["passwords"];
        assert!(passwords.sensitive);
        assert!(passwords.force_new);
        assert!(!schema.attributes["access_string"].force_new);
    }

    #[test]
    fn user_group_members_are_updatable_in_place() {
        let schema = user_group_schema();
        assert!(!schema.requires_replacement(&["user_ids".to_string()]));
        assert!(schema.requires_replacement(&["engine".to_string()]));
        assert!(schema.requires_replacement(&["user_group_id".to_string()]));
    }

    #[test]
    fn user_id_changes_diff_the_member_sets() {
        let old = vec!["alpha".to_string(), "beta".to_string()];
        let new = vec!["beta".to_string(), "gamma".to_string()];

        let (add, remove) = user_id_changes(&old, &new);

        assert_eq!(add, vec!["gamma".to_string()]);
        assert_eq!(remove, vec!["alpha".to_string()]);
    }

    #[test]
    fn user_id_changes_with_no_difference_are_empty() {
        let members = vec!["alpha".to_string()];
        let (add, remove) = user_id_changes(&members, &members);
        assert!(add.is_empty());
        assert!(remove.is_empty());
    }

    #[test]
    fn data_source_schema_only_requires_the_user_id() {
        let mut attributes = HashMap::new();
        attributes.insert("user_id".to_string(), Value::String("app-user".to_string()));
        assert!(user_data_source_schema().validate(&attributes).is_ok());
    }
}
