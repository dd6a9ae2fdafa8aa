use std::sync::Arc;

use gatehouse_jose::{
    clock::{Clock, System},
    JwtRef,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{
    jwks::{KeySetFetcher, RemoteKeySetFetcher},
    policy::{PolicyBuilder, Verb},
    response::{AuthorizerRequest, AuthorizerResponse},
    Claims, Config, Error, ResourceDescriptor, TokenValidator,
};

const USER_VERBS: [Verb; 3] = [Verb::Get, Verb::Put, Verb::Delete];

/// Decides whether a gateway call may proceed
///
/// Every principal may read, replace, and delete their own user record and
/// anything beneath it. Members of the configured administrator group may
/// do the same for every user.
///
/// The engine is cheap to clone, and clones share the key set cache.
#[derive(Debug, Clone)]
pub struct AuthorizationEngine {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    config: Config,
    validator: TokenValidator,
}

impl AuthorizationEngine {
    /// Constructs an engine that obtains keys from `fetcher`
    pub fn new(
        config: Config,
        fetcher: Arc<dyn KeySetFetcher>,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        let client_id = config.client_id().map(ToOwned::to_owned);
        let validator = TokenValidator::new(fetcher, clock, client_id).with_leeway(config.leeway());

        Self {
            inner: Arc::new(Inner { config, validator }),
        }
    }

    /// Constructs an engine that fetches keys from the identity provider
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn from_config(config: Config) -> Result<Self, reqwest::Error> {
        let fetcher = RemoteKeySetFetcher::from_config(&config)?;
        Ok(Self::new(config, Arc::new(fetcher), Arc::new(System)))
    }

    /// The engine's configuration
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Authorizes a call to the method identified by `descriptor`
    ///
    /// The token may carry a `Bearer` scheme prefix.
    ///
    /// # Errors
    ///
    /// Returns the reason the call is denied. No partial policy is produced.
    #[tracing::instrument(
        name = "authorize",
        skip_all,
        fields(principal_id = tracing::field::Empty, region = tracing::field::Empty),
    )]
    pub async fn authorize(
        &self,
        descriptor: &str,
        token: &str,
    ) -> Result<AuthorizerResponse, Error> {
        report(self.evaluate(descriptor, token).await)
    }

    /// Authorizes a token authorizer event
    ///
    /// # Errors
    ///
    /// Returns the reason the call is denied.
    pub async fn authorize_request(
        &self,
        request: &AuthorizerRequest,
    ) -> Result<AuthorizerResponse, Error> {
        self.authorize(&request.method_arn, request.authorization_token.as_str())
            .await
    }

    /// Authorizes a call unless `cancel` fires first
    ///
    /// An in-flight key fetch is abandoned when the call is cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if cancelled, otherwise the reason the
    /// call is denied.
    #[tracing::instrument(
        name = "authorize",
        skip_all,
        fields(principal_id = tracing::field::Empty, region = tracing::field::Empty),
    )]
    pub async fn authorize_with_cancellation(
        &self,
        descriptor: &str,
        token: &str,
        cancel: &CancellationToken,
    ) -> Result<AuthorizerResponse, Error> {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            outcome = self.evaluate(descriptor, token) => outcome,
        };

        report(outcome)
    }

    /// Authorizes a call unless `deadline` passes first
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if the deadline passes, otherwise the
    /// reason the call is denied.
    #[tracing::instrument(
        name = "authorize",
        skip_all,
        fields(principal_id = tracing::field::Empty, region = tracing::field::Empty),
    )]
    pub async fn authorize_before(
        &self,
        descriptor: &str,
        token: &str,
        deadline: Instant,
    ) -> Result<AuthorizerResponse, Error> {
        let outcome = tokio::time::timeout_at(deadline, self.evaluate(descriptor, token))
            .await
            .unwrap_or(Err(Error::Cancelled));

        report(outcome)
    }

    async fn evaluate(&self, descriptor: &str, token: &str) -> Result<AuthorizerResponse, Error> {
        let span = tracing::Span::current();

        let descriptor: ResourceDescriptor = descriptor.parse()?;
        span.record("region", descriptor.region());
        tracing::debug!(
            api_id = descriptor.api_id(),
            stage = descriptor.stage(),
            "descriptor parsed"
        );

        let authority = self.inner.config.authority(descriptor.region());
        let token = JwtRef::from_str(strip_bearer(token));
        let claims = self.inner.validator.validate(&authority, token).await?;

        let principal_id = claims.subject().ok_or(Error::MissingPrincipal)?.as_str();
        span.record("principal_id", principal_id);
        tracing::debug!("token validated");

        let mut policy = PolicyBuilder::new(&descriptor);
        self.apply_rules(&mut policy, principal_id, &claims)?;
        tracing::debug!(
            allowed = policy.allowed().len(),
            denied = policy.denied().len(),
            "rules applied"
        );

        let response = policy.build(principal_id)?;
        tracing::debug!(
            statements = response.policy_document().statements().len(),
            "policy built"
        );

        Ok(response)
    }

    fn apply_rules(
        &self,
        policy: &mut PolicyBuilder,
        principal_id: &str,
        claims: &Claims,
    ) -> Result<(), Error> {
        let own_record = format!("/users/{}", principal_id);
        let own_children = format!("/users/{}/*", principal_id);

        for verb in USER_VERBS {
            policy.allow_method(verb, &own_record)?;
            policy.allow_method(verb, &own_children)?;
        }

        let admin_group = self.inner.config.admin_group();
        if claims.is_member_of(admin_group) {
            tracing::debug!(group = admin_group, "granting administrator access");
            for verb in USER_VERBS {
                policy.allow_method(verb, "users")?;
                policy.allow_method(verb, "users/*")?;
            }
        }

        Ok(())
    }
}

fn report(outcome: Result<AuthorizerResponse, Error>) -> Result<AuthorizerResponse, Error> {
    if let Err(err) = &outcome {
        let error: &dyn std::error::Error = err;
        tracing::warn!(error.kind = err.kind(), error, "authorization denied");
    }

    outcome
}

/// Removes a leading `Bearer` authorization scheme, in any case
fn strip_bearer(token: &str) -> &str {
    const SCHEME: &str = "bearer ";

    let token = token.trim();
    match token.get(..SCHEME.len()) {
        Some(scheme) if scheme.eq_ignore_ascii_case(SCHEME) => {
            token[SCHEME.len()..].trim_start()
        }
        _ => token,
    }
}
