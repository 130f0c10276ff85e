//! Attribute validators and the custom attribute types built from them.
//!
//! Validators are plain functions so they can be embedded in
//! `AttributeType::Custom`; the `*_type` constructors below pair each one
//! with a name that shows up in type errors.

use std::sync::LazyLock;

use regex::Regex;
use vela_core::resource::Value;
use vela_core::schema::AttributeType;

use crate::arn::Arn;

static APPCONFIG_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]{4,7}$").expect("hardcoded pattern"));

static DEPLOYMENT_STRATEGY_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-z0-9]{4,7}|AppConfig\.[A-Za-z0-9.]{9,40})$").expect("hardcoded pattern")
});

fn expect_string(value: &Value) -> Result<&str, String> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(format!("expected a string, got {other:?}")),
    }
}

/// Accepts any well-formed ARN.
pub fn arn(value: &Value) -> Result<(), String> {
    Arn::parse(expect_string(value)?).map(|_| ())
}

/// Accepts AppConfig identifiers: 4-7 lowercase letters or digits.
pub fn appconfig_id(value: &Value) -> Result<(), String> {
    let s = expect_string(value)?;
    if APPCONFIG_ID.is_match(s) {
        Ok(())
    } else {
        Err(format!(
            "'{s}' must be 4 to 7 lowercase letters or digits"
        ))
    }
}

/// Accepts AppConfig deployment strategy IDs, including the predefined
/// `AppConfig.*` strategies.
pub fn deployment_strategy_id(value: &Value) -> Result<(), String> {
    let s = expect_string(value)?;
    if DEPLOYMENT_STRATEGY_ID.is_match(s) {
        Ok(())
    } else {
        Err(format!("'{s}' is not a valid deployment strategy ID"))
    }
}

/// Accepts ASNs in the private 16-bit and 32-bit ranges accepted for the
/// Amazon side of a Direct Connect gateway.
pub fn amazon_side_asn(value: &Value) -> Result<(), String> {
    let s = expect_string(value)?;
    match s.parse::<i64>() {
        Ok(asn) if (64512..=65534).contains(&asn) || (4200000000..=4294967294).contains(&asn) => {
            Ok(())
        }
        Ok(asn) => Err(format!(
            "{asn} must be in the range 64512 to 65534 or 4200000000 to 4294967294"
        )),
        Err(_) => Err(format!("'{s}' is not a valid ASN")),
    }
}

fn length_between(value: &Value, min: usize, max: usize) -> Result<(), String> {
    let s = expect_string(value)?;
    let length = s.chars().count();
    if length < min || length > max {
        Err(format!("expected length of {min} to {max}, got {length}"))
    } else {
        Ok(())
    }
}

pub fn name(value: &Value) -> Result<(), String> {
    length_between(value, 1, 64)
}

pub fn description(value: &Value) -> Result<(), String> {
    length_between(value, 0, 1024)
}

pub fn configuration_version(value: &Value) -> Result<(), String> {
    length_between(value, 1, 1024)
}

pub fn location_uri(value: &Value) -> Result<(), String> {
    length_between(value, 1, 2048)
}

pub fn arn_type() -> AttributeType {
    AttributeType::Custom {
        name: "Arn".to_string(),
        base: Box::new(AttributeType::String),
        validate: arn,
    }
}

pub fn appconfig_id_type() -> AttributeType {
    AttributeType::Custom {
        name: "AppConfigId".to_string(),
        base: Box::new(AttributeType::String),
        validate: appconfig_id,
    }
}

pub fn deployment_strategy_id_type() -> AttributeType {
    AttributeType::Custom {
        name: "DeploymentStrategyId".to_string(),
        base: Box::new(AttributeType::String),
        validate: deployment_strategy_id,
    }
}

pub fn amazon_side_asn_type() -> AttributeType {
    AttributeType::Custom {
        name: "AmazonSideAsn".to_string(),
        base: Box::new(AttributeType::String),
        validate: amazon_side_asn,
    }
}

pub fn name_type() -> AttributeType {
    AttributeType::Custom {
        name: "Name".to_string(),
        base: Box::new(AttributeType::String),
        validate: name,
    }
}

pub fn description_type() -> AttributeType {
    AttributeType::Custom {
        name: "Description".to_string(),
        base: Box::new(AttributeType::String),
        validate: description,
    }
}

pub fn configuration_version_type() -> AttributeType {
    AttributeType::Custom {
        name: "ConfigurationVersion".to_string(),
        base: Box::new(AttributeType::String),
        validate: configuration_version,
    }
}

pub fn location_uri_type() -> AttributeType {
    AttributeType::Custom {
        name: "LocationUri".to_string(),
        base: Box::new(AttributeType::String),
        validate: location_uri,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(value: &str) -> Value {
        Value::String(value.to_string())
    }

    #[test]
    fn arn_accepts_well_formed_input() {
        assert!(arn(&s("arn:aws:appconfig:us-east-1:123456789012:application/abc1234")).is_ok());
        assert!(arn(&s("application/abc1234")).is_err());
        assert!(arn(&Value::Int(7)).is_err());
    }

    #[test]
    fn appconfig_ids_are_short_lowercase_alphanumerics() {
        assert!(appconfig_id(&s("a1b2c3d")).is_ok());
        assert!(appconfig_id(&s("abcd")).is_ok());
        assert!(appconfig_id(&s("abc")).is_err());
        assert!(appconfig_id(&s("abcdefgh")).is_err());
        assert!(appconfig_id(&s("ABCD12")).is_err());
    }

    #[test]
    fn predefined_deployment_strategies_are_accepted() {
        assert!(deployment_strategy_id(&s("AppConfig.AllAtOnce")).is_ok());
        assert!(deployment_strategy_id(&s("AppConfig.Linear50PercentEvery30Seconds")).is_ok());
        assert!(deployment_strategy_id(&s("1a2b3c4")).is_ok());
        assert!(deployment_strategy_id(&s("AppConfig.")).is_err());
        assert!(deployment_strategy_id(&s("NotAStrategy")).is_err());
    }

    #[test]
    fn amazon_side_asn_checks_both_private_ranges() {
        assert!(amazon_side_asn(&s("64512")).is_ok());
        assert!(amazon_side_asn(&s("65534")).is_ok());
        assert!(amazon_side_asn(&s("4200000000")).is_ok());
        assert!(amazon_side_asn(&s("4294967294")).is_ok());
        assert!(amazon_side_asn(&s("64511")).is_err());
        assert!(amazon_side_asn(&s("65535")).is_err());
        assert!(amazon_side_asn(&s("not-a-number")).is_err());
    }

    #[test]
    fn length_validators_count_characters() {
        assert!(name(&s("a")).is_ok());
        assert!(name(&s(&"x".repeat(64))).is_ok());
        assert!(name(&s("")).is_err());
        assert!(name(&s(&"x".repeat(65))).is_err());
        assert!(description(&s("")).is_ok());
        assert!(configuration_version(&s("")).is_err());
        assert!(location_uri(&s("hosted")).is_ok());
        assert!(location_uri(&s("")).is_err());
    }
}
