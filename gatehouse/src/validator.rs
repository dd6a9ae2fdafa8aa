use std::{fmt, sync::Arc, time::Duration};

use gatehouse_jose::{
    clock::Clock,
    error::{ClaimsRejected, JwtVerifyError},
    jwk::KeyId,
    jwt::{self, AudienceRef, ClaimsValidator, CoreValidator, Headers},
    JwtRef,
};
use thiserror::Error;

use crate::{
    config::{ClientId, ClientIdRef},
    jwks::KeySetFetcher,
    Authority, Claims, Error,
};

const TOKEN_USES: [&str; 2] = ["id", "access"];

/// Verifies bearer tokens against the keys published by an authority
pub struct TokenValidator {
    fetcher: Arc<dyn KeySetFetcher>,
    clock: Arc<dyn Clock + Send + Sync>,
    client_id: Option<ClientId>,
    leeway: Duration,
}

impl fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TokenValidator")
            .field("fetcher", &self.fetcher)
            .field("client_id", &self.client_id)
            .field("leeway", &self.leeway)
            .finish_non_exhaustive()
    }
}

impl TokenValidator {
    /// Constructs a validator that obtains keys from `fetcher`
    ///
    /// Without a client ID the audience of tokens is not checked.
    pub fn new(
        fetcher: Arc<dyn KeySetFetcher>,
        clock: Arc<dyn Clock + Send + Sync>,
        client_id: Option<ClientId>,
    ) -> Self {
        Self {
            fetcher,
            clock,
            client_id,
            leeway: Duration::ZERO,
        }
    }

    /// Allows for clock skew when checking `exp` and `nbf`
    #[must_use]
    pub fn with_leeway(self, leeway: Duration) -> Self {
        Self { leeway, ..self }
    }

    /// Verifies `token` and extracts its claims
    ///
    /// The token's algorithm is checked before any key is fetched, and the
    /// signature is checked before the payload is read.
    ///
    /// # Errors
    ///
    /// Returns the first check the token fails.
    pub async fn validate(&self, authority: &Authority, token: &JwtRef) -> Result<Claims, Error> {
        let decomposed = token.decompose().map_err(Error::MalformedToken)?;

        let alg = decomposed
            .alg()
            .map_err(|err| Error::UnsupportedAlgorithm(err.alg().to_owned()))?;

        let kid: Option<KeyId> = decomposed.kid().map(ToOwned::to_owned);

        let keys = self.fetcher.fetch(authority).await?;

        let (kid, key) = match kid {
            Some(kid) => match keys.get_verification_key(&kid, alg) {
                Some(key) => (kid, key),
                None => {
                    tracing::debug!(%kid, %alg, "unable to find matching key");
                    return Err(Error::NoMatchingKey { kid: Some(kid) });
                }
            },
            None => {
                tracing::debug!(%alg, "token does not name a key");
                return Err(Error::NoMatchingKey { kid: None });
            }
        };

        let core = CoreValidator::default().with_leeway(self.leeway);
        let audience = AudienceCheck {
            authority,
            client_id: self.client_id.as_deref(),
        };

        let validated: jwt::Validated<Claims> = decomposed
            .verify_with_custom(key, &core, audience, &self.clock)
            .map_err(|err| match err {
                JwtVerifyError::KeyVerifyError(e) if e.is_signature_mismatch() => {
                    Error::InvalidSignature { kid: kid.clone() }
                }
                JwtVerifyError::KeyVerifyError(_) => Error::NoMatchingKey {
                    kid: Some(kid.clone()),
                },
                JwtVerifyError::ClaimsRejected(rejected) => claims_error(rejected),
                other => Error::MalformedToken(other),
            })?;

        let (_, claims) = validated.extract();

        if claims.subject().is_none() {
            return Err(Error::MissingPrincipal);
        }

        Ok(claims)
    }
}

fn claims_error(rejected: ClaimsRejected) -> Error {
    match rejected {
        ClaimsRejected::TokenExpired | ClaimsRejected::MissingRequiredClaim("exp") => {
            Error::TokenExpired
        }
        ClaimsRejected::TokenNotYetValid => Error::TokenNotYetValid,
        ClaimsRejected::Custom(err) => match err.downcast::<WrongAudience>() {
            Ok(wrong) => Error::TokenWrongAudience {
                claim: wrong.claim,
                value: wrong.value,
            },
            Err(other) => Error::TokenWrongAudience {
                claim: "custom",
                value: other.to_string(),
            },
        },
        other => Error::TokenWrongAudience {
            claim: "token",
            value: other.to_string(),
        },
    }
}

#[derive(Debug, Error)]
#[error("token {claim} '{value}' is not accepted")]
struct WrongAudience {
    claim: &'static str,
    value: String,
}

fn wrong_audience(claim: &'static str, value: Option<&str>) -> ClaimsRejected {
    ClaimsRejected::Custom(Box::new(WrongAudience {
        claim,
        value: value.unwrap_or_default().to_owned(),
    }))
}

/// Checks that a token was issued by the authority for the application
#[derive(Debug)]
struct AudienceCheck<'a> {
    authority: &'a Authority,
    client_id: Option<&'a ClientIdRef>,
}

impl ClaimsValidator<Claims> for AudienceCheck<'_> {
    fn validate(&self, _header: &Headers, claims: &Claims) -> Result<(), ClaimsRejected> {
        use jwt::CoreClaims;

        let iss = claims.iss();
        if iss != Some(self.authority.issuer()) {
            return Err(wrong_audience("iss", iss.map(|i| i.as_str())));
        }

        if let Some(client_id) = self.client_id {
            let audience = AudienceRef::from_str(client_id.as_str());
            if !claims.has_audience(audience) && claims.client_id() != Some(client_id.as_str()) {
                let named = claims
                    .audiences()
                    .first()
                    .map(|a| a.as_str())
                    .or_else(|| claims.client_id());
                return Err(wrong_audience("aud", named));
            }
        }

        if let Some(token_use) = claims.token_use() {
            if !TOKEN_USES.contains(&token_use) {
                return Err(wrong_audience("token_use", Some(token_use)));
            }
        }

        Ok(())
    }
}
