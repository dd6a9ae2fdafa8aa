use gatehouse_jose::jwt::{Issuer, IssuerRef};

/// An identity provider user pool that issues and signs tokens
///
/// The authority names both the URL of the published key set and the
/// issuer that tokens must carry in their `iss` claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authority {
    region: String,
    pool_id: String,
    issuer: Issuer,
    jwks_url: String,
}

impl Authority {
    /// The regional Cognito endpoint for a user pool
    pub fn new(region: impl Into<String>, pool_id: impl Into<String>) -> Self {
        let region = region.into();
        let endpoint = format!("https://cognito-idp.{}.amazonaws.com", region);
        Self::at(&endpoint, region, pool_id.into())
    }

    /// Replaces the base URL of the identity provider
    ///
    /// Both the key set URL and the expected issuer are derived from the new
    /// base, keeping the pool identifier as the first path segment.
    #[must_use]
    pub fn with_endpoint(self, endpoint: &str) -> Self {
        Self::at(endpoint, self.region, self.pool_id)
    }

    fn at(endpoint: &str, region: String, pool_id: String) -> Self {
        let issuer = format!("{}/{}", endpoint.trim_end_matches('/'), pool_id);
        let jwks_url = format!("{}/.well-known/jwks.json", issuer);

        Self {
            region,
            pool_id,
            issuer: Issuer::new(issuer),
            jwks_url,
        }
    }

    /// The region hosting the user pool
    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    /// The user pool identifier
    #[must_use]
    pub fn pool_id(&self) -> &str {
        &self.pool_id
    }

    /// The `iss` claim value of tokens issued by this authority
    #[must_use]
    pub fn issuer(&self) -> &IssuerRef {
        &self.issuer
    }

    /// The URL of the published key set
    #[must_use]
    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }
}
