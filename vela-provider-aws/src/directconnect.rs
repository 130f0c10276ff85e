//! Direct Connect gateway resource.
//!
//! Gateways are immutable once created, so every configurable attribute
//! forces replacement. The describe API keeps deleted gateways in its
//! listing for a while, which both the finder and the deletion waiter
//! have to see through. The Amazon side ASN travels as a string because
//! the valid range exceeds what every consumer handles as a plain int.

use std::collections::HashMap;
use std::time::Duration;

use aws_sdk_directconnect::Client;
use aws_sdk_directconnect::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_directconnect::types::{DirectConnectGateway, DirectConnectGatewayState};
use tracing::{debug, info, warn};
use vela_core::provider::{ProviderError, ProviderResult, ResourceType};
use vela_core::resource::{Resource, ResourceId, State, Value};
use vela_core::schema::{AttributeSchema, AttributeType, ResourceSchema};
use vela_core::waiter::StateChange;

use crate::AwsProvider;
use crate::require_string;
use crate::validation;

const GATEWAY_TIMEOUT: Duration = Duration::from_secs(10 * 60);

pub struct GatewayType;

impl ResourceType for GatewayType {
    fn name(&self) -> &'static str {
        "directconnect_gateway"
    }

    fn schema(&self) -> ResourceSchema {
        gateway_schema()
    }
}

pub fn gateway_schema() -> ResourceSchema {
    ResourceSchema::new("directconnect_gateway")
        .with_description("Direct Connect gateway")
        .attribute(
            AttributeSchema::new("name", AttributeType::String)
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("amazon_side_asn", validation::amazon_side_asn_type())
                .required()
                .force_new(),
        )
        .attribute(AttributeSchema::new("owner_account_id", AttributeType::String).computed())
}

impl AwsProvider {
    pub(crate) async fn create_directconnect_gateway(
        &self,
        resource: &Resource,
    ) -> ProviderResult<State> {
        let id = &resource.id;
        let name = require_string(resource, "name")?;
        let asn_text = require_string(resource, "amazon_side_asn")?;
        let amazon_side_asn = asn_text.parse::<i64>().map_err(|_| {
            ProviderError::new(format!(
                "amazon_side_asn ({asn_text}) must be a 64-bit integer"
            ))
            .for_resource(id.clone())
        })?;

        debug!(name, "creating Direct Connect gateway");
        let output = self
            .directconnect_client
            .create_direct_connect_gateway()
            .direct_connect_gateway_name(name)
            .amazon_side_asn(amazon_side_asn)
            .send()
            .await
            .map_err(|e| {
                ProviderError::new(format!(
                    "Failed to create Direct Connect gateway ({}): {:?}",
                    name, e
                ))
                .for_resource(id.clone())
            })?;

        let gateway_id = output
            .direct_connect_gateway()
            .and_then(|gateway| gateway.direct_connect_gateway_id())
            .ok_or_else(|| {
                ProviderError::new("CreateDirectConnectGateway returned no gateway ID")
                    .for_resource(id.clone())
            })?
            .to_string();

        wait_gateway_available(&self.directconnect_client, &gateway_id)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;

        let state = self.read_directconnect_gateway(id, &gateway_id).await?;
        if !state.exists {
            return Err(ProviderError::new(format!(
                "Direct Connect gateway ({gateway_id}) disappeared after creation"
            ))
            .for_resource(id.clone()));
        }
        Ok(state)
    }

    pub(crate) async fn read_directconnect_gateway(
        &self,
        id: &ResourceId,
        gateway_id: &str,
    ) -> ProviderResult<State> {
        let Some(gateway) = find_gateway(&self.directconnect_client, gateway_id)
            .await
            .map_err(|e| e.for_resource(id.clone()))?
        else {
            warn!(gateway_id, "Direct Connect gateway not found, removing from state");
            return Ok(State::not_found(id.clone()));
        };

        let mut attributes = HashMap::new();
        if let Some(name) = gateway.direct_connect_gateway_name() {
            attributes.insert("name".to_string(), Value::String(name.to_string()));
        }
        if let Some(asn) = gateway.amazon_side_asn() {
            attributes.insert("amazon_side_asn".to_string(), Value::String(asn.to_string()));
        }
        if let Some(owner_account_id) = gateway.owner_account() {
            attributes.insert(
                "owner_account_id".to_string(),
                Value::String(owner_account_id.to_string()),
            );
        }

        Ok(State::existing(id.clone(), attributes).with_identifier(gateway_id))
    }

    pub(crate) async fn delete_directconnect_gateway(
        &self,
        id: &ResourceId,
        gateway_id: &str,
    ) -> ProviderResult<()> {
        debug!(gateway_id, "deleting Direct Connect gateway");
        match self
            .directconnect_client
            .delete_direct_connect_gateway()
            .direct_connect_gateway_id(gateway_id)
            .send()
            .await
        {
            Ok(_) => {}
            Err(e) if is_gateway_not_found(&e) => return Ok(()),
            Err(e) => {
                return Err(ProviderError::new(format!(
                    "Failed to delete Direct Connect gateway ({}): {:?}",
                    gateway_id, e
                ))
                .for_resource(id.clone()));
            }
        }

        wait_gateway_deleted(&self.directconnect_client, gateway_id)
            .await
            .map_err(|e| e.for_resource(id.clone()))
    }
}

pub(crate) async fn find_gateway(
    client: &Client,
    gateway_id: &str,
) -> ProviderResult<Option<DirectConnectGateway>> {
    let mut next_token: Option<String> = None;
    loop {
        let mut request = client
            .describe_direct_connect_gateways()
            .direct_connect_gateway_id(gateway_id);
        if let Some(token) = &next_token {
            request = request.next_token(token);
        }

        let output = request.send().await.map_err(|e| {
            ProviderError::new(format!(
                "Failed to describe Direct Connect gateway ({}): {:?}",
                gateway_id, e
            ))
        })?;

        for gateway in output.direct_connect_gateways() {
            if gateway.direct_connect_gateway_id() != Some(gateway_id) {
                continue;
            }
            // Deleted gateways linger in the listing for a while.
            if gateway.direct_connect_gateway_state() == Some(&DirectConnectGatewayState::Deleted) {
                return Ok(None);
            }
            return Ok(Some(gateway.clone()));
        }

        next_token = output.next_token().map(String::from);
        if next_token.is_none() {
            return Ok(None);
        }
    }
}

/// Direct Connect reports a missing gateway as a client exception whose
/// message says the gateway does not exist.
fn is_gateway_not_found<E, R>(error: &SdkError<E, R>) -> bool
where
    E: ProvideErrorMetadata,
{
    error.as_service_error().is_some_and(|e| {
        e.code() == Some("DirectConnectClientException")
            && e.message()
                .is_some_and(|message| message.contains("does not exist"))
    })
}

async fn wait_gateway_available(client: &Client, gateway_id: &str) -> ProviderResult<()> {
    info!(gateway_id, "waiting for Direct Connect gateway to be available");
    StateChange::new(|| {
        let client = client.clone();
        let gateway_id = gateway_id.to_string();
        async move {
            Ok(find_gateway(&client, &gateway_id).await?.map(|gateway| {
                let status = gateway_status(&gateway);
                (gateway, status)
            }))
        }
    })
    .pending(&["pending"])
    .target(&["available"])
    .timeout(GATEWAY_TIMEOUT)
    .wait()
    .await?;
    Ok(())
}

async fn wait_gateway_deleted(client: &Client, gateway_id: &str) -> ProviderResult<()> {
    info!(gateway_id, "waiting for Direct Connect gateway to be deleted");
    StateChange::new(|| {
        let client = client.clone();
        let gateway_id = gateway_id.to_string();
        async move {
            Ok(find_gateway(&client, &gateway_id).await?.map(|gateway| {
                let status = gateway_status(&gateway);
                (gateway, status)
            }))
        }
    })
    .pending(&["pending", "available", "deleting"])
    .target(&[])
    .timeout(GATEWAY_TIMEOUT)
    .wait()
    .await?;
    Ok(())
}

fn gateway_status(gateway: &DirectConnectGateway) -> String {
    gateway
        .direct_connect_gateway_state()
        .map(|state| state.as_str().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attributes(name: &str, asn: &str) -> HashMap<String, Value> {
        let mut attributes = HashMap::new();
        attributes.insert("name".to_string(), Value::String(name.to_string()));
        attributes.insert("amazon_side_asn".to_string(), Value::String(asn.to_string()));
        attributes
    }

    #[test]
    fn gateway_schema_accepts_both_asn_ranges() {
        let schema = gateway_schema();
        assert!(schema.validate(&attributes("gw", "64512")).is_ok());
        assert!(schema.validate(&attributes("gw", "4294967294")).is_ok());
    }

    #[test]
    fn gateway_schema_rejects_an_out_of_range_asn() {
        let schema = gateway_schema();
        assert!(schema.validate(&attributes("gw", "65535")).is_err());
        assert!(schema.validate(&attributes("gw", "not-a-number")).is_err());
    }

    #[test]
    fn every_configurable_attribute_forces_replacement() {
        let schema = gateway_schema();
        assert!(schema.requires_replacement(&["name".to_string()]));
        assert!(schema.requires_replacement(&["amazon_side_asn".to_string()]));
    }

    #[test]
    fn owner_account_id_is_computed() {
        let schema = gateway_schema();
        assert!(schema.attributes["owner_account_id"].computed);
    }
}
