//! EC2 instance type offerings data source.
//!
//! Pure lookup over the paginated DescribeInstanceTypeOfferings API. The
//! three output lists are parallel: entry N of instance_types, locations,
//! and location_types describes the same offering.

use std::collections::HashMap;

use aws_sdk_ec2::types::{Filter, LocationType};
use tracing::debug;
use vela_core::provider::{ProviderError, ProviderResult, ResourceType};
use vela_core::resource::{Resource, State, Value};
use vela_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use crate::AwsProvider;

pub struct InstanceTypeOfferingsDataSource;

impl ResourceType for InstanceTypeOfferingsDataSource {
    fn name(&self) -> &'static str {
        "ec2_instance_type_offerings"
    }

    fn schema(&self) -> ResourceSchema {
        instance_type_offerings_schema()
    }
}

pub fn instance_type_offerings_schema() -> ResourceSchema {
    let filter = ResourceSchema::new("filter")
        .attribute(AttributeSchema::new("name", AttributeType::String).required())
        .attribute(
            AttributeSchema::new("values", AttributeType::List(Box::new(AttributeType::String)))
                .required(),
        );

    ResourceSchema::new("ec2_instance_type_offerings")
        .with_description("Instance types offered in a location")
        .attribute(
            AttributeSchema::new("filter", AttributeType::List(Box::new(AttributeType::Block(
                Box::new(filter),
            ))))
            .optional(),
        )
        .attribute(
            AttributeSchema::new(
                "location_type",
                AttributeType::Enum(vec![
                    "region".to_string(),
                    "availability-zone".to_string(),
                    "availability-zone-id".to_string(),
                ]),
            )
            .optional(),
        )
        .attribute(
            AttributeSchema::new(
                "instance_types",
                AttributeType::List(Box::new(AttributeType::String)),
            )
            .computed(),
        )
        .attribute(
            AttributeSchema::new(
                "locations",
                AttributeType::List(Box::new(AttributeType::String)),
            )
            .computed(),
        )
        .attribute(
            AttributeSchema::new(
                "location_types",
                AttributeType::List(Box::new(AttributeType::String)),
            )
            .computed(),
        )
}

impl AwsProvider {
    pub(crate) async fn read_ec2_instance_type_offerings(
        &self,
        resource: &Resource,
    ) -> ProviderResult<State> {
        let id = &resource.id;

        let mut request = self.ec2_client.describe_instance_type_offerings();
        if let Some(filters) = resource.get_list("filter") {
            request = request.set_filters(Some(expand_filters(filters)));
        }
        if let Some(location_type) = resource.get_string("location_type") {
            request = request.location_type(LocationType::from(location_type));
        }

        debug!("reading EC2 instance type offerings");
        let mut instance_types = Vec::new();
        let mut locations = Vec::new();
        let mut location_types = Vec::new();

        let mut pages = request.into_paginator().send();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| {
                ProviderError::new(format!(
                    "Failed to describe EC2 instance type offerings: {:?}",
                    e
                ))
                .for_resource(id.clone())
            })?;

            for offering in page.instance_type_offerings() {
                if let Some(instance_type) = offering.instance_type() {
                    instance_types.push(Value::String(instance_type.as_str().to_string()));
                }
                if let Some(location) = offering.location() {
                    locations.push(Value::String(location.to_string()));
                }
                if let Some(location_type) = offering.location_type() {
                    location_types.push(Value::String(location_type.as_str().to_string()));
                }
            }
        }

        let mut attributes = HashMap::new();
        if let Some(location_type) = resource.get_string("location_type") {
            attributes.insert(
                "location_type".to_string(),
                Value::String(location_type.to_string()),
            );
        }
        attributes.insert("instance_types".to_string(), Value::List(instance_types));
        attributes.insert("locations".to_string(), Value::List(locations));
        attributes.insert("location_types".to_string(), Value::List(location_types));

        Ok(State::existing(id.clone(), attributes).with_identifier(self.region.clone()))
    }
}

fn expand_filters(values: &[Value]) -> Vec<Filter> {
    let mut filters = Vec::new();
    for value in values {
        let Value::Map(attributes) = value else {
            continue;
        };
        let Some(name) = attributes.get("name").and_then(Value::as_str) else {
            continue;
        };
        let filter_values: Vec<String> = match attributes.get("values") {
            Some(Value::List(items)) => items
                .iter()
                .filter_map(|item| item.as_str().map(String::from))
                .collect(),
            _ => Vec::new(),
        };
        filters.push(
            Filter::builder()
                .name(name)
                .set_values(Some(filter_values))
                .build(),
        );
    }
    filters
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offerings_schema_accepts_an_empty_configuration() {
        assert!(instance_type_offerings_schema().validate(&HashMap::new()).is_ok());
    }

    #[test]
    fn offerings_schema_rejects_an_unknown_location_type() {
        let mut attributes = HashMap::new();
        attributes.insert(
            "location_type".to_string(),
            Value::String("galaxy".to_string()),
        );
        assert!(instance_type_offerings_schema().validate(&attributes).is_err());
    }

    #[test]
    fn offerings_schema_requires_filter_values() {
        let mut filter = HashMap::new();
        filter.insert(
            "name".to_string(),
            Value::String("instance-type".to_string()),
        );

        let mut attributes = HashMap::new();
        attributes.insert("filter".to_string(), Value::List(vec![Value::Map(filter)]));
        assert!(instance_type_offerings_schema().validate(&attributes).is_err());
    }

    #[test]
    fn expand_filters_builds_name_value_pairs() {
        let mut filter = HashMap::new();
        filter.insert(
            "name".to_string(),
            Value::String("instance-type".to_string()),
        );
        filter.insert(
            "values".to_string(),
            Value::List(vec![
                Value::String("t3.micro".to_string()),
                Value::String("t3.small".to_string()),
            ]),
        );

        let filters = expand_filters(&[Value::Map(filter)]);

        assert_eq!(filters.len(), 1);
        assert_eq!(filters[0].name(), Some("instance-type"));
        assert_eq!(filters[0].values(), ["t3.micro", "t3.small"]);
    }

    #[test]
    fn expand_filters_skips_entries_without_a_name() {
        let filters = expand_filters(&[Value::Map(HashMap::new()), Value::Bool(true)]);
        assert!(filters.is_empty());
    }
}
