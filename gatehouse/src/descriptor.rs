use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::Error;

// The region and partition name the identity provider host, so they must
// stay within DNS label characters.
static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9-]+$").expect("name pattern is a valid regex"));

/// The target of an inbound API call, as identified by the gateway
///
/// The gateway supplies a method identifier of the form
///
/// ```text
/// arn:{partition}:execute-api:{region}:{account}:{apiId}/{stage}/{verb}/{path...}
/// ```
///
/// The partition and region must be lowercase alphanumerics and hyphens.
/// Beyond that only the colon structure is required to be well formed. The
/// verb and path may be empty, and are not validated here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    partition: String,
    route: String,
    region: String,
    account_id: String,
    api_id: String,
    stage: String,
    verb: String,
    resource_path: String,
}

impl ResourceDescriptor {
    /// The partition, such as `aws`
    #[must_use]
    pub fn partition(&self) -> &str {
        &self.partition
    }

    /// The service namespace, such as `execute-api`
    #[must_use]
    pub fn route(&self) -> &str {
        &self.route
    }

    /// The region hosting the API
    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    /// The account that owns the API
    #[must_use]
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// The API identifier
    #[must_use]
    pub fn api_id(&self) -> &str {
        &self.api_id
    }

    /// The deployment stage
    #[must_use]
    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// The HTTP verb of the call
    #[must_use]
    pub fn verb(&self) -> &str {
        &self.verb
    }

    /// The resource path of the call, without a leading `/`
    #[must_use]
    pub fn resource_path(&self) -> &str {
        &self.resource_path
    }
}

impl FromStr for ResourceDescriptor {
    type Err = Error;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        let malformed = || Error::MalformedDescriptor(source.to_owned());

        let parts: Vec<&str> = source.split(':').collect();
        if parts.len() < 6 {
            return Err(malformed());
        }

        let (partition, region) = (parts[1], parts[3]);
        if !NAME_PATTERN.is_match(partition) || !NAME_PATTERN.is_match(region) {
            return Err(malformed());
        }

        // An API identifier never contains `:`, but the path might.
        let api_gateway_arn = parts[5..].join(":");
        let mut segments = api_gateway_arn.split('/');
        let (api_id, stage) = match (segments.next(), segments.next()) {
            (Some(api_id), Some(stage)) => (api_id.to_owned(), stage.to_owned()),
            _ => return Err(malformed()),
        };
        let verb = segments.next().unwrap_or_default().to_owned();
        let resource_path = segments.collect::<Vec<_>>().join("/");

        Ok(Self {
            partition: partition.to_owned(),
            route: parts[2].to_owned(),
            region: region.to_owned(),
            account_id: parts[4].to_owned(),
            api_id,
            stage,
            verb,
            resource_path,
        })
    }
}
