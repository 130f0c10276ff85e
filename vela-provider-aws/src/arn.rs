//! Amazon Resource Name construction and parsing.
//!
//! Some services return ARNs in their API responses; for those that do not
//! (AppConfig, GuardDuty) the provider builds them from the connection
//! metadata it resolved at startup.

use std::fmt;

/// An Amazon Resource Name, `arn:partition:service:region:account-id:resource`.
///
/// The resource part may itself contain colons or slashes and is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arn {
    pub partition: String,
    pub service: String,
    pub region: String,
    pub account_id: String,
    pub resource: String,
}

impl Arn {
    /// Parses an ARN string into its five components.
    ///
    /// The region and account segments may be empty (S3 and IAM ARNs omit
    /// them), but the partition and service must be present.
    pub fn parse(input: &str) -> Result<Arn, String> {
        let mut parts = input.splitn(6, ':');
        let (Some("arn"), Some(partition), Some(service), Some(region), Some(account_id), Some(resource)) = (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) else {
            return Err(format!("'{input}' is not a valid ARN"));
        };
        if partition.is_empty() {
            return Err(format!("'{input}' is missing a partition"));
        }
        if service.is_empty() {
            return Err(format!("'{input}' is missing a service"));
        }
        if resource.is_empty() {
            return Err(format!("'{input}' is missing a resource"));
        }
        Ok(Arn {
            partition: partition.to_string(),
            service: service.to_string(),
            region: region.to_string(),
            account_id: account_id.to_string(),
            resource: resource.to_string(),
        })
    }
}

impl fmt::Display for Arn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "arn:{}:{}:{}:{}:{}",
            self.partition, self.service, self.region, self.account_id, self.resource
        )
    }
}

/// Maps a region name to its AWS partition.
pub fn partition_for_region(region: &str) -> &'static str {
    if region.starts_with("cn-") {
        "aws-cn"
    } else if region.starts_with("us-gov-") {
        "aws-us-gov"
    } else if region.starts_with("us-isob-") {
        "aws-iso-b"
    } else if region.starts_with("us-iso-") {
        "aws-iso"
    } else {
        "aws"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_builds_the_standard_form() {
        let arn = Arn {
            partition: "aws".to_string(),
            service: "guardduty".to_string(),
            region: "us-west-2".to_string(),
            account_id: "123456789012".to_string(),
            resource: "detector/abc123".to_string(),
        };
        assert_eq!(
            arn.to_string(),
            "arn:aws:guardduty:us-west-2:123456789012:detector/abc123"
        );
    }

    #[test]
    fn parse_keeps_colons_in_the_resource_part() {
        let arn = Arn::parse("arn:aws:cloudwatch:us-east-1:123456789012:alarm:my-alarm")
            .unwrap();
        assert_eq!(arn.service, "cloudwatch");
        assert_eq!(arn.resource, "alarm:my-alarm");
    }

    #[test]
    fn parse_allows_empty_region_and_account() {
        let arn = Arn::parse("arn:aws:s3:::my-bucket").unwrap();
        assert_eq!(arn.region, "");
        assert_eq!(arn.account_id, "");
        assert_eq!(arn.resource, "my-bucket");
    }

    #[test]
    fn parse_rejects_malformed_input() {
        assert!(Arn::parse("not-an-arn").is_err());
        assert!(Arn::parse("arn:aws:ec2").is_err());
        assert!(Arn::parse("arn::ec2:us-east-1:123456789012:instance/i-1").is_err());
        assert!(Arn::parse("arn:aws:ec2:us-east-1:123456789012:").is_err());
    }

    #[test]
    fn partitions_follow_region_prefixes() {
        assert_eq!(partition_for_region("us-east-1"), "aws");
        assert_eq!(partition_for_region("eu-central-1"), "aws");
        assert_eq!(partition_for_region("cn-north-1"), "aws-cn");
        assert_eq!(partition_for_region("us-gov-west-1"), "aws-us-gov");
        assert_eq!(partition_for_region("us-iso-east-1"), "aws-iso");
        assert_eq!(partition_for_region("us-isob-east-1"), "aws-iso-b");
    }
}
