//! GuardDuty detectors and findings filters.
//!
//! A detector is account-wide, so the API identifies it by an opaque
//! detector ID and reports "not found" as a BadRequestException whose
//! message says the ID is not owned by the current account. Filters live
//! under a detector and carry the composite identifier
//! `DetectorID:FilterName`; a missing filter surfaces through the same
//! BadRequestException. Filter criteria are written per comparison in
//! configuration but keyed per field in the API, so they are folded on
//! the way out and split on the way back. Detector deletion is rejected
//! while member accounts are still attached, and is retried until the
//! members are gone or the timeout expires.

use std::collections::HashMap;
use std::time::Duration;

use aws_sdk_guardduty::Client;
use aws_sdk_guardduty::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_guardduty::operation::get_detector::GetDetectorOutput;
use aws_sdk_guardduty::operation::get_filter::GetFilterOutput;
use aws_sdk_guardduty::types::builders::ConditionBuilder;
use aws_sdk_guardduty::types::{
    Condition, DataSourceConfigurations, DataSourceConfigurationsResult, DataSourceStatus,
    DetectorStatus, FilterAction, FindingCriteria, FindingPublishingFrequency,
    S3LogsConfiguration,
};
use tracing::{debug, warn};
use vela_core::differ;
use vela_core::provider::{ProviderError, ProviderResult, ResourceType};
use vela_core::resource::{Resource, ResourceId, State, Value};
use vela_core::schema::{AttributeSchema, AttributeType, ResourceSchema};
use vela_core::waiter::retry_matching;

use crate::AwsProvider;
use crate::require_string;
use crate::tags::{self, TagMap};
use crate::validation;

/// How long to keep retrying deletion while member accounts detach.
const MEMBER_DETACH_TIMEOUT: Duration = Duration::from_secs(2 * 60);

pub struct DetectorType;

impl ResourceType for DetectorType {
    fn name(&self) -> &'static str {
        "guardduty_detector"
    }

    fn schema(&self) -> ResourceSchema {
        detector_schema()
    }
}

pub struct FilterType;

impl ResourceType for FilterType {
    fn name(&self) -> &'static str {
        "guardduty_filter"
    }

    fn schema(&self) -> ResourceSchema {
        filter_schema()
    }
}

pub fn detector_schema() -> ResourceSchema {
    let s3_logs = ResourceSchema::new("s3_logs")
        .attribute(AttributeSchema::new("enable", AttributeType::Bool).required());
    let datasources = ResourceSchema::new("datasources").attribute(
        AttributeSchema::new("s3_logs", AttributeType::Block(Box::new(s3_logs))).optional(),
    );

    ResourceSchema::new("guardduty_detector")
        .with_description("GuardDuty detector for the current account and region")
        .attribute(
            AttributeSchema::new("enable", AttributeType::Bool)
                .optional()
                .with_default(Value::Bool(true)),
        )
        .attribute(
            AttributeSchema::new(
                "finding_publishing_frequency",
                AttributeType::Enum(vec![
                    "FIFTEEN_MINUTES".to_string(),
                    "ONE_HOUR".to_string(),
                    "SIX_HOURS".to_string(),
                ]),
            )
            .optional()
            .computed(),
        )
        .attribute(
            AttributeSchema::new("datasources", AttributeType::Block(Box::new(datasources)))
                .optional()
                .computed(),
        )
        .attribute(AttributeSchema::new("account_id", AttributeType::String).computed())
        .attribute(AttributeSchema::new("arn", AttributeType::String).computed())
        .attribute(tags::tags_schema())
        .attribute(tags::tags_all_schema())
}

pub fn filter_schema() -> ResourceSchema {
    let criterion = ResourceSchema::new("criterion")
        .attribute(AttributeSchema::new("field", AttributeType::String).required())
        .attribute(
            AttributeSchema::new(
                "condition",
                AttributeType::Enum(vec![
                    "equals".to_string(),
                    "not_equals".to_string(),
                    "greater_than".to_string(),
                    "greater_than_or_equal".to_string(),
                    "less_than".to_string(),
                    "less_than_or_equal".to_string(),
                ]),
            )
            .required(),
        )
        .attribute(
            AttributeSchema::new("values", AttributeType::List(Box::new(AttributeType::String)))
                .required(),
        );
    let finding_criteria = ResourceSchema::new("finding_criteria").attribute(
        AttributeSchema::new(
            "criterion",
            AttributeType::List(Box::new(AttributeType::Block(Box::new(criterion)))),
        )
        .required(),
    );

    ResourceSchema::new("guardduty_filter")
        .with_description("GuardDuty findings filter for a detector")
        .attribute(
            AttributeSchema::new("detector_id", AttributeType::String)
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("name", validation::name_type())
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new(
                "action",
                AttributeType::Enum(vec!["NOOP".to_string(), "ARCHIVE".to_string()]),
            )
            .required(),
        )
        .attribute(AttributeSchema::new("rank", AttributeType::Int).required())
        .attribute(AttributeSchema::new("description", validation::description_type()).optional())
        .attribute(
            AttributeSchema::new(
                "finding_criteria",
                AttributeType::Block(Box::new(finding_criteria)),
            )
            .required(),
        )
        .attribute(AttributeSchema::new("arn", AttributeType::String).computed())
        .attribute(tags::tags_schema())
        .attribute(tags::tags_all_schema())
}

pub(crate) fn parse_filter_id(identifier: &str) -> Result<(String, String), ProviderError> {
    let parts: Vec<&str> = identifier.split(':').collect();
    match parts.as_slice() {
        [detector_id, name] if !detector_id.is_empty() && !name.is_empty() => {
            Ok(((*detector_id).to_string(), (*name).to_string()))
        }
        _ => Err(ProviderError::new(format!(
            "unexpected format of ID ({identifier:?}), expected DetectorID:FilterName"
        ))),
    }
}

impl AwsProvider {
    pub(crate) async fn create_guardduty_detector(
        &self,
        resource: &Resource,
    ) -> ProviderResult<State> {
        let id = &resource.id;
        let enable = resource.get_bool("enable").unwrap_or(true);
        let tags = self.merged_tags(resource);

        let mut request = self.guardduty_client.create_detector().enable(enable);
        if let Some(frequency) = resource.get_string("finding_publishing_frequency") {
            request = request.finding_publishing_frequency(FindingPublishingFrequency::from(frequency));
        }
        if let Some(value) = resource.attributes.get("datasources") {
            request = request.data_sources(expand_data_sources(value)?);
        }
        if !tags.is_empty() {
            request = request.set_tags(Some(tags.as_map()));
        }

        debug!(enable, "creating GuardDuty detector");
        let output = request.send().await.map_err(|e| {
            ProviderError::new(format!("Failed to create GuardDuty detector: {:?}", e))
                .for_resource(id.clone())
        })?;

        let detector_id = output
            .detector_id()
            .ok_or_else(|| {
                ProviderError::new("CreateDetector returned no detector ID")
                    .for_resource(id.clone())
            })?
            .to_string();

        let state = self.read_guardduty_detector(id, &detector_id).await?;
        if !state.exists {
            return Err(ProviderError::new(format!(
                "GuardDuty detector ({detector_id}) disappeared after creation"
            ))
            .for_resource(id.clone()));
        }
        Ok(state)
    }

    pub(crate) async fn read_guardduty_detector(
        &self,
        id: &ResourceId,
        detector_id: &str,
    ) -> ProviderResult<State> {
        let Some(detector) = find_detector(&self.guardduty_client, detector_id)
            .await
            .map_err(|e| e.for_resource(id.clone()))?
        else {
            warn!(detector_id, "GuardDuty detector not found, removing from state");
            return Ok(State::not_found(id.clone()));
        };

        let mut attributes = HashMap::new();
        attributes.insert(
            "enable".to_string(),
            Value::Bool(*detector.status() == DetectorStatus::Enabled),
        );
        if let Some(frequency) = detector.finding_publishing_frequency() {
            attributes.insert(
                "finding_publishing_frequency".to_string(),
                Value::String(frequency.as_str().to_string()),
            );
        }
        if let Some(data_sources) = detector.data_sources() {
            attributes.insert("datasources".to_string(), flatten_data_sources(data_sources));
        }
        attributes.insert(
            "account_id".to_string(),
            Value::String(self.account_id.clone()),
        );
        attributes.insert(
            "arn".to_string(),
            Value::String(self.build_arn("guardduty", &format!("detector/{detector_id}"))),
        );

        let mut tags = TagMap::new();
        if let Some(map) = detector.tags() {
            for (key, value) in map {
                tags.insert(key, value);
            }
        }
        self.insert_tag_attributes(&mut attributes, tags);

        Ok(State::existing(id.clone(), attributes).with_identifier(detector_id))
    }

    pub(crate) async fn update_guardduty_detector(
        &self,
        id: &ResourceId,
        detector_id: &str,
        from: &State,
        to: &Resource,
    ) -> ProviderResult<State> {
        if differ::has_change(from, to, "enable")
            || differ::has_change(from, to, "finding_publishing_frequency")
            || differ::has_change(from, to, "datasources")
        {
            let mut request = self
                .guardduty_client
                .update_detector()
                .detector_id(detector_id)
                .enable(to.get_bool("enable").unwrap_or(true));
            if let Some(frequency) = to.get_string("finding_publishing_frequency") {
                request =
                    request.finding_publishing_frequency(FindingPublishingFrequency::from(frequency));
            }
            if let Some(value) = to.attributes.get("datasources") {
                request = request.data_sources(expand_data_sources(value)?);
            }

            debug!(detector_id, "updating GuardDuty detector");
            request.send().await.map_err(|e| {
                ProviderError::new(format!(
                    "Failed to update GuardDuty detector ({}): {:?}",
                    detector_id, e
                ))
                .for_resource(id.clone())
            })?;
        }

        let old_tags = TagMap::from_value(from.attributes.get("tags_all"));
        let new_tags = self.merged_tags(to);
        if old_tags != new_tags {
            let Some(arn) = from.get_string("arn") else {
                return Err(ProviderError::new(format!(
                    "Cannot update tags for GuardDuty detector ({detector_id}): no ARN in state"
                ))
                .for_resource(id.clone()));
            };
            update_tags(&self.guardduty_client, arn, &old_tags, &new_tags)
                .await
                .map_err(|e| e.for_resource(id.clone()))?;
        }

        self.read_guardduty_detector(id, detector_id).await
    }

    pub(crate) async fn delete_guardduty_detector(
        &self,
        id: &ResourceId,
        detector_id: &str,
    ) -> ProviderResult<()> {
        debug!(detector_id, "deleting GuardDuty detector");
        let client = self.guardduty_client.clone();
        retry_matching(
            MEMBER_DETACH_TIMEOUT,
            |error| {
                error
                    .message
                    .contains("cannot delete detector while it has invited or associated members")
            },
            || {
                let client = client.clone();
                let detector_id = detector_id.to_string();
                async move {
                    match client
                        .delete_detector()
                        .detector_id(&detector_id)
                        .send()
                        .await
                    {
                        Ok(_) => Ok(()),
                        Err(e) if is_detector_not_found(&e) => Ok(()),
                        Err(e) => Err(ProviderError::new(format!(
                            "Failed to delete GuardDuty detector ({}): {:?}",
                            detector_id, e
                        ))),
                    }
                }
            },
        )
        .await
        .map_err(|e| e.for_resource(id.clone()))
    }

    pub(crate) async fn create_guardduty_filter(
        &self,
        resource: &Resource,
    ) -> ProviderResult<State> {
        let id = &resource.id;
        let detector_id = require_string(resource, "detector_id")?;
        let name = require_string(resource, "name")?;
        let action = require_string(resource, "action")?;
        let rank = filter_rank(resource).map_err(|e| e.for_resource(id.clone()))?;
        let criteria = resource.attributes.get("finding_criteria").ok_or_else(|| {
            ProviderError::new("Missing required attribute 'finding_criteria'")
                .for_resource(id.clone())
        })?;
        let criteria =
            expand_finding_criteria(criteria).map_err(|e| e.for_resource(id.clone()))?;
        let tags = self.merged_tags(resource);

        let mut request = self
            .guardduty_client
            .create_filter()
            .detector_id(detector_id)
            .name(name)
            .action(FilterAction::from(action))
            .rank(rank)
            .finding_criteria(criteria);
        if let Some(description) = resource.get_string("description") {
            request = request.description(description);
        }
        if !tags.is_empty() {
            request = request.set_tags(Some(tags.as_map()));
        }

        debug!(detector_id, name, "creating GuardDuty filter");
        request.send().await.map_err(|e| {
            ProviderError::new(format!(
                "Failed to create GuardDuty filter ({}) for detector ({}): {:?}",
                name, detector_id, e
            ))
            .for_resource(id.clone())
        })?;

        let identifier = format!("{detector_id}:{name}");
        let state = self.read_guardduty_filter(id, &identifier).await?;
        if !state.exists {
            return Err(ProviderError::new(format!(
                "GuardDuty filter ({identifier}) disappeared after creation"
            ))
            .for_resource(id.clone()));
        }
        Ok(state)
    }

    pub(crate) async fn read_guardduty_filter(
        &self,
        id: &ResourceId,
        identifier: &str,
    ) -> ProviderResult<State> {
        let (detector_id, name) =
            parse_filter_id(identifier).map_err(|e| e.for_resource(id.clone()))?;

        let Some(filter) = find_filter(&self.guardduty_client, &detector_id, &name)
            .await
            .map_err(|e| e.for_resource(id.clone()))?
        else {
            warn!(detector_id, name, "GuardDuty filter not found, removing from state");
            return Ok(State::not_found(id.clone()));
        };

        let mut attributes = HashMap::new();
        attributes.insert(
            "detector_id".to_string(),
            Value::String(detector_id.clone()),
        );
        attributes.insert("name".to_string(), Value::String(filter.name().to_string()));
        attributes.insert(
            "action".to_string(),
            Value::String(filter.action().as_str().to_string()),
        );
        attributes.insert(
            "rank".to_string(),
            Value::Int(i64::from(filter.rank().unwrap_or_default())),
        );
        if let Some(description) = filter.description() {
            attributes.insert("description".to_string(), Value::String(description.to_string()));
        }
        attributes.insert(
            "finding_criteria".to_string(),
            flatten_finding_criteria(filter.finding_criteria()),
        );
        attributes.insert(
            "arn".to_string(),
            Value::String(
                self.build_arn("guardduty", &format!("detector/{detector_id}/filter/{name}")),
            ),
        );

        let mut tags = TagMap::new();
        if let Some(map) = filter.tags() {
            for (key, value) in map {
                tags.insert(key, value);
            }
        }
        self.insert_tag_attributes(&mut attributes, tags);

        Ok(State::existing(id.clone(), attributes).with_identifier(identifier))
    }

    pub(crate) async fn update_guardduty_filter(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> ProviderResult<State> {
        let (detector_id, name) =
            parse_filter_id(identifier).map_err(|e| e.for_resource(id.clone()))?;

        if differ::has_change(from, to, "action")
            || differ::has_change(from, to, "rank")
            || differ::has_change(from, to, "description")
            || differ::has_change(from, to, "finding_criteria")
        {
            let action = require_string(to, "action")?;
            let rank = filter_rank(to).map_err(|e| e.for_resource(id.clone()))?;
            let criteria = to.attributes.get("finding_criteria").ok_or_else(|| {
                ProviderError::new("Missing required attribute 'finding_criteria'")
                    .for_resource(id.clone())
            })?;
            let criteria =
                expand_finding_criteria(criteria).map_err(|e| e.for_resource(id.clone()))?;

            let mut request = self
                .guardduty_client
                .update_filter()
                .detector_id(&detector_id)
                .filter_name(&name)
                .action(FilterAction::from(action))
                .rank(rank)
                .finding_criteria(criteria);
            if let Some(description) = to.get_string("description") {
                request = request.description(description);
            }

            debug!(detector_id, name, "updating GuardDuty filter");
            request.send().await.map_err(|e| {
                ProviderError::new(format!(
                    "Failed to update GuardDuty filter ({}) for detector ({}): {:?}",
                    name, detector_id, e
                ))
                .for_resource(id.clone())
            })?;
        }

        let old_tags = TagMap::from_value(from.attributes.get("tags_all"));
        let new_tags = self.merged_tags(to);
        if old_tags != new_tags {
            let Some(arn) = from.get_string("arn") else {
                return Err(ProviderError::new(format!(
                    "Cannot update tags for GuardDuty filter ({name}): no ARN in state"
                ))
                .for_resource(id.clone()));
            };
            update_tags(&self.guardduty_client, arn, &old_tags, &new_tags)
                .await
                .map_err(|e| e.for_resource(id.clone()))?;
        }

        self.read_guardduty_filter(id, identifier).await
    }

    pub(crate) async fn delete_guardduty_filter(
        &self,
        id: &ResourceId,
        identifier: &str,
    ) -> ProviderResult<()> {
        let (detector_id, name) =
            parse_filter_id(identifier).map_err(|e| e.for_resource(id.clone()))?;

        debug!(detector_id, name, "deleting GuardDuty filter");
        match self
            .guardduty_client
            .delete_filter()
            .detector_id(&detector_id)
            .filter_name(&name)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_detector_not_found(&e) => Ok(()),
            Err(e) => Err(ProviderError::new(format!(
                "Failed to delete GuardDuty filter ({}) for detector ({}): {:?}",
                name, detector_id, e
            ))
            .for_resource(id.clone())),
        }
    }
}

pub(crate) async fn find_detector(
    client: &Client,
    detector_id: &str,
) -> ProviderResult<Option<GetDetectorOutput>> {
    match client.get_detector().detector_id(detector_id).send().await {
        Ok(output) => Ok(Some(output)),
        Err(e) if is_detector_not_found(&e) => Ok(None),
        Err(e) => Err(ProviderError::new(format!(
            "Failed to read GuardDuty detector ({}): {:?}",
            detector_id, e
        ))),
    }
}

pub(crate) async fn find_filter(
    client: &Client,
    detector_id: &str,
    name: &str,
) -> ProviderResult<Option<GetFilterOutput>> {
    match client
        .get_filter()
        .detector_id(detector_id)
        .filter_name(name)
        .send()
        .await
    {
        Ok(output) => Ok(Some(output)),
        Err(e) if is_detector_not_found(&e) => Ok(None),
        Err(e) => Err(ProviderError::new(format!(
            "Failed to read GuardDuty filter ({}) for detector ({}): {:?}",
            name, detector_id, e
        ))),
    }
}

/// GuardDuty reports a missing detector as a BadRequestException naming
/// an ID "not owned by the current account".
fn is_detector_not_found<E, R>(error: &SdkError<E, R>) -> bool
where
    E: ProvideErrorMetadata,
{
    error.as_service_error().is_some_and(|e| {
        e.code() == Some("BadRequestException")
            && e.message()
                .is_some_and(|message| message.contains("not owned by the current account"))
    })
}

fn expand_data_sources(value: &Value) -> Result<DataSourceConfigurations, ProviderError> {
    let mut builder = DataSourceConfigurations::builder();
    if let Value::Map(attributes) = value
        && let Some(Value::Map(s3_logs)) = attributes.get("s3_logs")
    {
        let enable = s3_logs.get("enable").and_then(Value::as_bool).unwrap_or(false);
        let config = S3LogsConfiguration::builder()
            .enable(enable)
            .build()
            .map_err(|e| ProviderError::new(format!("Invalid S3 logs configuration: {:?}", e)))?;
        builder = builder.s3_logs(config);
    }
    Ok(builder.build())
}

fn flatten_data_sources(result: &DataSourceConfigurationsResult) -> Value {
    let enabled = *result.s3_logs().status() == DataSourceStatus::Enabled;

    let mut s3_logs = HashMap::new();
    s3_logs.insert("enable".to_string(), Value::Bool(enabled));

    let mut attributes = HashMap::new();
    attributes.insert("s3_logs".to_string(), Value::Map(s3_logs));
    Value::Map(attributes)
}

fn filter_rank(resource: &Resource) -> Result<i32, ProviderError> {
    let rank = resource
        .get_int("rank")
        .ok_or_else(|| ProviderError::new("Missing required attribute 'rank'"))?;
    i32::try_from(rank)
        .map_err(|_| ProviderError::new(format!("Filter rank ({rank}) is out of range")))
}

// The API keys conditions by field, so criteria targeting the same field
// fold into one entry.
fn expand_finding_criteria(value: &Value) -> Result<FindingCriteria, ProviderError> {
    let criterion_values = match value {
        Value::Map(map) => match map.get("criterion") {
            Some(Value::List(items)) => items.as_slice(),
            _ => &[],
        },
        _ => &[],
    };

    let mut criterion: HashMap<String, ConditionBuilder> = HashMap::new();
    for item in criterion_values {
        let Value::Map(map) = item else { continue };
        let (Some(field), Some(condition)) = (
            map.get("field").and_then(Value::as_str),
            map.get("condition").and_then(Value::as_str),
        ) else {
            continue;
        };
        let values: Vec<String> = match map.get("values") {
            Some(Value::List(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect(),
            _ => Vec::new(),
        };

        let builder = criterion.remove(field).unwrap_or_else(Condition::builder);
        let builder = match condition {
            "equals" => builder.set_equals(Some(values)),
            "not_equals" => builder.set_not_equals(Some(values)),
            "greater_than" => builder.greater_than(numeric_condition(field, condition, &values)?),
            "greater_than_or_equal" => {
                builder.greater_than_or_equal(numeric_condition(field, condition, &values)?)
            }
            "less_than" => builder.less_than(numeric_condition(field, condition, &values)?),
            "less_than_or_equal" => {
                builder.less_than_or_equal(numeric_condition(field, condition, &values)?)
            }
            other => {
                return Err(ProviderError::new(format!(
                    "Unknown filter condition '{other}' on field '{field}'"
                )));
            }
        };
        criterion.insert(field.to_string(), builder);
    }

    Ok(FindingCriteria::builder()
        .set_criterion(Some(
            criterion
                .into_iter()
                .map(|(field, builder)| (field, builder.build()))
                .collect(),
        ))
        .build())
}

fn numeric_condition(
    field: &str,
    condition: &str,
    values: &[String],
) -> Result<i64, ProviderError> {
    let [value] = values else {
        return Err(ProviderError::new(format!(
            "Condition '{condition}' on field '{field}' takes exactly one value"
        )));
    };
    value.parse::<i64>().map_err(|_| {
        ProviderError::new(format!(
            "Condition '{condition}' on field '{field}' needs a numeric value, got {value:?}"
        ))
    })
}

fn flatten_finding_criteria(criteria: &FindingCriteria) -> Value {
    let mut items = Vec::new();
    if let Some(criterion) = criteria.criterion() {
        let mut fields: Vec<&String> = criterion.keys().collect();
        fields.sort();
        for field in fields {
            let condition = &criterion[field];
            if !condition.equals().is_empty() {
                items.push(criterion_entry(field, "equals", condition.equals().to_vec()));
            }
            if !condition.not_equals().is_empty() {
                items.push(criterion_entry(
                    field,
                    "not_equals",
                    condition.not_equals().to_vec(),
                ));
            }
            if let Some(value) = condition.greater_than() {
                items.push(criterion_entry(field, "greater_than", vec![value.to_string()]));
            }
            if let Some(value) = condition.greater_than_or_equal() {
                items.push(criterion_entry(
                    field,
                    "greater_than_or_equal",
                    vec![value.to_string()],
                ));
            }
            if let Some(value) = condition.less_than() {
                items.push(criterion_entry(field, "less_than", vec![value.to_string()]));
            }
            if let Some(value) = condition.less_than_or_equal() {
                items.push(criterion_entry(
                    field,
                    "less_than_or_equal",
                    vec![value.to_string()],
                ));
            }
        }
    }

    let mut attributes = HashMap::new();
    attributes.insert("criterion".to_string(), Value::List(items));
    Value::Map(attributes)
}

fn criterion_entry(field: &str, condition: &str, values: Vec<String>) -> Value {
    let mut map = HashMap::new();
    map.insert("field".to_string(), Value::String(field.to_string()));
    map.insert("condition".to_string(), Value::String(condition.to_string()));
    map.insert(
        "values".to_string(),
        Value::List(values.into_iter().map(Value::String).collect()),
    );
    Value::Map(map)
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

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_guardduty::types::S3LogsConfigurationResult;

    #[test]
    fn detector_schema_accepts_an_empty_configuration() {
        assert!(detector_schema().validate(&HashMap::new()).is_ok());
    }

    #[test]
    fn detector_enable_defaults_to_true() {
        let schema = detector_schema();
        assert_eq!(schema.attributes["enable"].default, Some(Value::Bool(true)));
    }

    #[test]
    fn detector_rejects_an_unknown_frequency() {
        let mut attributes = HashMap::new();
        attributes.insert(
            "finding_publishing_frequency".to_string(),
            Value::String("TWO_HOURS".to_string()),
        );
        assert!(detector_schema().validate(&attributes).is_err());
    }

    #[test]
    fn detector_rejects_a_mistyped_datasources_block() {
        let mut s3_logs = HashMap::new();
        s3_logs.insert("enable".to_string(), Value::String("yes".to_string()));
        let mut datasources = HashMap::new();
        datasources.insert("s3_logs".to_string(), Value::Map(s3_logs));

        let mut attributes = HashMap::new();
        attributes.insert("datasources".to_string(), Value::Map(datasources));
        assert!(detector_schema().validate(&attributes).is_err());
    }

    #[test]
    fn detector_updates_never_force_replacement() {
        let schema = detector_schema();
        assert!(!schema.requires_replacement(&[
            "enable".to_string(),
            "finding_publishing_frequency".to_string(),
            "datasources".to_string(),
        ]));
    }

    #[test]
    fn expand_data_sources_builds_the_s3_configuration() {
        let mut s3_logs = HashMap::new();
        s3_logs.insert("enable".to_string(), Value::Bool(true));
        let mut datasources = HashMap::new();
        datasources.insert("s3_logs".to_string(), Value::Map(s3_logs));

        let config = expand_data_sources(&Value::Map(datasources)).unwrap();
        assert!(config.s3_logs().is_some_and(|s3| s3.enable()));
    }

    #[test]
    fn expand_data_sources_without_s3_logs_is_empty() {
        let config = expand_data_sources(&Value::Map(HashMap::new())).unwrap();
        assert!(config.s3_logs().is_none());
    }

    #[test]
    fn flatten_data_sources_reports_the_s3_status() {
        let s3_logs = S3LogsConfigurationResult::builder()
            .status(DataSourceStatus::Enabled)
            .build()
            .unwrap();
        let result = DataSourceConfigurationsResult::builder()
            .s3_logs(s3_logs)
            .build()
            .unwrap();

        let value = flatten_data_sources(&result);
        let Value::Map(attributes) = value else {
            panic!("expected a map");
        };
        let Some(Value::Map(s3_logs)) = attributes.get("s3_logs") else {
            panic!("expected an s3_logs block");
        };
        assert_eq!(s3_logs.get("enable"), Some(&Value::Bool(true)));
    }

    fn criterion_value(field: &str, condition: &str, values: &[&str]) -> Value {
        let mut map = HashMap::new();
        map.insert("field".to_string(), Value::String(field.to_string()));
        map.insert("condition".to_string(), Value::String(condition.to_string()));
        map.insert(
            "values".to_string(),
            Value::List(values.iter().map(|v| Value::String((*v).to_string())).collect()),
        );
        Value::Map(map)
    }

    fn test_criteria() -> Value {
        let mut map = HashMap::new();
        map.insert(
            "criterion".to_string(),
            Value::List(vec![
                criterion_value("region", "equals", &["eu-west-1"]),
                criterion_value(
                    "service.additionalInfo.threatListName",
                    "not_equals",
                    &["some-threat", "another-threat"],
                ),
                criterion_value("updatedAt", "greater_than", &["1570744240000"]),
                criterion_value("updatedAt", "less_than", &["1570744740000"]),
            ]),
        );
        Value::Map(map)
    }

    #[test]
    fn filter_schema_accepts_an_archiving_filter() {
        let mut attributes = HashMap::new();
        attributes.insert("detector_id".to_string(), Value::String("abc123".to_string()));
        attributes.insert("name".to_string(), Value::String("test-filter".to_string()));
        attributes.insert("action".to_string(), Value::String("ARCHIVE".to_string()));
        attributes.insert("rank".to_string(), Value::Int(1));
        attributes.insert("finding_criteria".to_string(), test_criteria());
        assert!(filter_schema().validate(&attributes).is_ok());
    }

    #[test]
    fn filter_schema_rejects_an_unknown_condition() {
        let mut criteria = HashMap::new();
        criteria.insert(
            "criterion".to_string(),
            Value::List(vec![criterion_value("region", "matches", &["eu-*"])]),
        );

        let mut attributes = HashMap::new();
        attributes.insert("detector_id".to_string(), Value::String("abc123".to_string()));
        attributes.insert("name".to_string(), Value::String("test-filter".to_string()));
        attributes.insert("action".to_string(), Value::String("NOOP".to_string()));
        attributes.insert("rank".to_string(), Value::Int(1));
        attributes.insert("finding_criteria".to_string(), Value::Map(criteria));
        assert!(filter_schema().validate(&attributes).is_err());
    }

    #[test]
    fn filter_identity_forces_replacement() {
        let schema = filter_schema();
        assert!(schema.requires_replacement(&["detector_id".to_string()]));
        assert!(schema.requires_replacement(&["name".to_string()]));
        assert!(!schema.requires_replacement(&["action".to_string(), "rank".to_string()]));
    }

    #[test]
    fn filter_ids_pair_detector_and_name() {
        let (detector_id, name) = parse_filter_id("abc123:test-filter").unwrap();
        assert_eq!(detector_id, "abc123");
        assert_eq!(name, "test-filter");

        assert!(parse_filter_id("abc123").is_err());
        assert!(parse_filter_id(":test-filter").is_err());
    }

    #[test]
    fn finding_criteria_fold_per_field() {
        let criteria = expand_finding_criteria(&test_criteria()).unwrap();
        let criterion = criteria.criterion().unwrap();
        assert_eq!(criterion.len(), 3);

        let updated_at = &criterion["updatedAt"];
        assert_eq!(updated_at.greater_than(), Some(1570744240000));
        assert_eq!(updated_at.less_than(), Some(1570744740000));
        assert_eq!(criterion["region"].equals(), ["eu-west-1"]);
        assert_eq!(
            criterion["service.additionalInfo.threatListName"].not_equals(),
            ["some-threat", "another-threat"]
        );
    }

    #[test]
    fn numeric_conditions_need_a_single_integer() {
        let mut map = HashMap::new();
        map.insert(
            "criterion".to_string(),
            Value::List(vec![criterion_value("updatedAt", "greater_than", &["yesterday"])]),
        );
        assert!(expand_finding_criteria(&Value::Map(map)).is_err());

        let mut map = HashMap::new();
        map.insert(
            "criterion".to_string(),
            Value::List(vec![criterion_value("updatedAt", "less_than", &["1", "2"])]),
        );
        assert!(expand_finding_criteria(&Value::Map(map)).is_err());
    }

    #[test]
    fn finding_criteria_split_back_into_per_comparison_entries() {
        let criteria = expand_finding_criteria(&test_criteria()).unwrap();

        let value = flatten_finding_criteria(&criteria);
        let Value::Map(attributes) = &value else {
            panic!("expected a map");
        };
        let Some(Value::List(items)) = attributes.get("criterion") else {
            panic!("expected a criterion list");
        };
        assert_eq!(items.len(), 4);

        let conditions_on = |field: &str| {
            items
                .iter()
                .filter_map(|item| {
                    let Value::Map(map) = item else { return None };
                    if map.get("field").and_then(Value::as_str) == Some(field) {
                        map.get("condition").and_then(Value::as_str)
                    } else {
                        None
                    }
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(conditions_on("updatedAt"), ["greater_than", "less_than"]);
        assert_eq!(conditions_on("region"), ["equals"]);
    }
}
