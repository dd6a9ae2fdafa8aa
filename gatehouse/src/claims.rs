//! The claims extracted from a verified identity provider token
//!
//! Extraction is lenient: a claim that is present with an unexpected JSON
//! type is treated as absent rather than failing the whole payload. The
//! checks that matter for authorization (`exp`, `iss`, audience, `sub`)
//! still fail closed, because an absent value is rejected by the validator.

use gatehouse_jose::{
    clock::UnixTime,
    jwt::{Audience, AudienceRef, CoreClaims, Issuer, IssuerRef, Subject, SubjectRef},
};
use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use serde_json::Value;

/// Claims carried by an identity provider ID or access token
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[must_use]
pub struct Claims {
    #[serde(default, deserialize_with = "lenient")]
    sub: Option<Subject>,
    #[serde(default, deserialize_with = "lenient")]
    token_id: String,
    #[serde(default, deserialize_with = "lenient")]
    scope: String,
    #[serde(default, deserialize_with = "lenient")]
    email: String,
    #[serde(rename = "cognito:username", default, deserialize_with = "lenient")]
    username: String,
    #[serde(rename = "cognito:groups", default, deserialize_with = "lenient")]
    groups: Vec<String>,

    #[serde(default, deserialize_with = "lenient")]
    iss: Option<Issuer>,
    #[serde(default, deserialize_with = "one_or_many")]
    aud: Vec<Audience>,
    #[serde(default, deserialize_with = "lenient")]
    client_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    token_use: Option<String>,
    #[serde(default, deserialize_with = "numeric_date")]
    exp: Option<UnixTime>,
    #[serde(default, deserialize_with = "numeric_date")]
    nbf: Option<UnixTime>,
    #[serde(default, deserialize_with = "numeric_date")]
    iat: Option<UnixTime>,
}

impl Claims {
    /// The subject, if present and non-empty
    #[must_use]
    pub fn subject(&self) -> Option<&SubjectRef> {
        self.sub.as_deref().filter(|s| !s.as_str().is_empty())
    }

    /// The `token_id` claim
    #[must_use]
    pub fn token_id(&self) -> &str {
        &self.token_id
    }

    /// The space-delimited `scope` claim of access tokens
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// The `email` claim of ID tokens
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// The `cognito:username` claim
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The `cognito:groups` claim
    #[must_use]
    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    /// Whether the principal belongs to `group`
    ///
    /// An empty group name never matches.
    #[must_use]
    pub fn is_member_of(&self, group: &str) -> bool {
        !group.is_empty() && self.groups.iter().any(|g| g == group)
    }

    /// The audiences named by the `aud` claim
    #[must_use]
    pub fn audiences(&self) -> &[Audience] {
        &self.aud
    }

    /// Whether `aud` names the given audience
    #[must_use]
    pub fn has_audience(&self, audience: &AudienceRef) -> bool {
        self.aud.iter().any(|a| **a == *audience)
    }

    /// The `client_id` claim of access tokens
    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    /// The `token_use` claim, `id` or `access` for provider-issued tokens
    #[must_use]
    pub fn token_use(&self) -> Option<&str> {
        self.token_use.as_deref()
    }

    /// The time the token was issued
    #[must_use]
    pub fn issued_at(&self) -> Option<UnixTime> {
        self.iat
    }
}

impl CoreClaims for Claims {
    fn nbf(&self) -> Option<UnixTime> {
        self.nbf
    }

    fn exp(&self) -> Option<UnixTime> {
        self.exp
    }

    fn iss(&self) -> Option<&IssuerRef> {
        self.iss.as_deref()
    }
}

fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_default())
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<Audience>, D::Error>
where
    D: Deserializer<'de>,
{
    let audiences = match Value::deserialize(deserializer)? {
        Value::String(aud) => vec![Audience::new(aud)],
        Value::Array(values) => values
            .into_iter()
            .filter_map(|v| match v {
                Value::String(aud) => Some(Audience::new(aud)),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };
    Ok(audiences)
}

fn numeric_date<'de, D>(deserializer: D) -> Result<Option<UnixTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let time = match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .map(UnixTime),
        _ => None,
    };
    Ok(time)
}

#[cfg(test)]
mod tests {
    use color_eyre::Result;

    use super::*;

    #[test]
    fn extracts_provider_claims() -> Result<()> {
        let claims: Claims = serde_json::from_value(serde_json::json!({
            "sub": "aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee",
            "cognito:groups": ["admins", "staff"],
            "cognito:username": "jdoe",
            "email": "jdoe@example.com",
            "iss": "https://cognito-idp.us-east-1.amazonaws.com/pool",
            "aud": "client",
            "token_use": "id",
            "exp": 1_700_000_000u64,
            "iat": 1_699_996_400u64,
        }))?;

        assert_eq!(
            claims.subject().map(SubjectRef::as_str),
            Some("aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee")
        );
        assert_eq!(claims.username(), "jdoe");
        assert_eq!(claims.email(), "jdoe@example.com");
        assert!(claims.is_member_of("admins"));
        assert!(!claims.is_member_of(""));
        assert!(claims.has_audience(AudienceRef::from_str("client")));
        assert_eq!(claims.token_use(), Some("id"));
        assert_eq!(claims.exp(), Some(UnixTime(1_700_000_000)));
        assert_eq!(claims.issued_at(), Some(UnixTime(1_699_996_400)));
        assert_eq!(claims.scope(), "");
        Ok(())
    }

    #[test]
    fn wrongly_typed_claims_default_to_empty() -> Result<()> {
        let claims: Claims = serde_json::from_value(serde_json::json!({
            "sub": 42,
            "email": ["not", "a", "string"],
            "scope": null,
            "cognito:groups": ["admins", 7],
            "exp": "tomorrow",
            "aud": {"client": true},
        }))?;

        assert_eq!(claims.subject(), None);
        assert_eq!(claims.email(), "");
        assert_eq!(claims.scope(), "");
        assert!(claims.groups().is_empty());
        assert_eq!(claims.exp(), None);
        assert!(claims.audiences().is_empty());
        Ok(())
    }

    #[test]
    fn empty_subject_is_no_subject() -> Result<()> {
        let claims: Claims = serde_json::from_value(serde_json::json!({ "sub": "" }))?;
        assert_eq!(claims.subject(), None);
        Ok(())
    }

    #[test]
    fn accepts_audience_arrays_and_fractional_dates() -> Result<()> {
        let claims: Claims = serde_json::from_value(serde_json::json!({
            "aud": ["one", 2, "three"],
            "nbf": 1_600_000_000.75,
        }))?;

        assert_eq!(claims.audiences().len(), 2);
        assert_eq!(claims.nbf(), Some(UnixTime(1_600_000_000)));
        Ok(())
    }
}
