mod common;

use std::{collections::BTreeSet, sync::Arc, time::Duration};

use color_eyre::Result;
use common::*;
use gatehouse::{
    config::ClientId, AuthorizationEngine, AuthorizerRequest, Config, Effect, Error,
    KeySetFetcher, StaticKeySetFetcher,
};
use gatehouse_jose::clock::{TestClock, UnixTime};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing_test::traced_test;

const DESCRIPTOR: &str = "apiId:aws:execute-api:us-east-1:111122223333:route/prod/GET/users/u1";
const ARN_PREFIX: &str = "arn:aws:execute-api:us-east-1:111122223333:route/prod";

fn config() -> Config {
    Config::new(POOL_ID)
        .with_admin_group("admins")
        .with_client_id(ClientId::from_static(CLIENT_ID))
}

fn engine_with(config: Config, fetcher: Arc<dyn KeySetFetcher>) -> AuthorizationEngine {
    AuthorizationEngine::new(config, fetcher, Arc::new(TestClock::new(UnixTime(NOW))))
}

fn engine() -> AuthorizationEngine {
    engine_with(config(), Arc::new(StaticKeySetFetcher::new(key_set())))
}

fn expected(verbs_and_paths: &[(&str, &str)]) -> BTreeSet<String> {
    verbs_and_paths
        .iter()
        .map(|(verb, path)| format!("{}/{}/{}", ARN_PREFIX, verb, path))
        .collect()
}

fn self_scope(sub: &str) -> BTreeSet<String> {
    let own = format!("users/{}", sub);
    let children = format!("users/{}/*", sub);
    expected(&[
        ("GET", &own),
        ("PUT", &own),
        ("DELETE", &own),
        ("GET", &children),
        ("PUT", &children),
        ("DELETE", &children),
    ])
}

fn allowed(response: &gatehouse::AuthorizerResponse) -> BTreeSet<String> {
    response
        .policy_document()
        .allowed_resources()
        .map(ToOwned::to_owned)
        .collect()
}

#[tokio::test]
async fn grants_self_scope_only() -> Result<()> {
    let token = key().sign(KEY_ID, &id_claims("u1"));

    let response = engine().authorize(DESCRIPTOR, token.as_str()).await?;

    assert_eq!(response.principal_id(), "u1");
    assert_eq!(allowed(&response), self_scope("u1"));
    assert_eq!(response.policy_document().denied_resources().count(), 0);

    let statements = response.policy_document().statements();
    assert_eq!(statements.len(), 1);
    assert_eq!(statements[0].effect(), Effect::Allow);
    assert_eq!(statements[0].actions(), ["execute-api:Invoke"]);
    Ok(())
}

#[tokio::test]
async fn renders_gateway_json() -> Result<()> {
    let token = key().sign(KEY_ID, &id_claims("u1"));

    let response = engine().authorize(DESCRIPTOR, token.as_str()).await?;
    let json = serde_json::to_value(&response)?;

    assert_eq!(json["principalId"], "u1");
    assert_eq!(json["policyDocument"]["Version"], "2012-10-17");
    assert_eq!(json["policyDocument"]["Statement"][0]["Effect"], "Allow");
    assert_eq!(
        json["policyDocument"]["Statement"][0]["Resource"][0],
        format!("{}/GET/users/u1", ARN_PREFIX)
    );
    Ok(())
}

#[tokio::test]
async fn administrators_get_a_strict_superset() -> Result<()> {
    let claims = with(id_claims("u1"), "cognito:groups", json!(["staff", "admins"]));
    let token = key().sign(KEY_ID, &claims);

    let response = engine().authorize(DESCRIPTOR, token.as_str()).await?;
    let granted = allowed(&response);

    let mut admin = expected(&[
        ("GET", "users"),
        ("PUT", "users"),
        ("DELETE", "users"),
        ("GET", "users/*"),
        ("PUT", "users/*"),
        ("DELETE", "users/*"),
    ]);
    admin.extend(self_scope("u1"));

    assert_eq!(granted, admin);
    assert!(granted.is_superset(&self_scope("u1")));
    Ok(())
}

#[tokio::test]
async fn empty_admin_group_matches_no_one() -> Result<()> {
    let claims = with(id_claims("u1"), "cognito:groups", json!([""]));
    let token = key().sign(KEY_ID, &claims);

    let engine = engine_with(
        Config::new(POOL_ID),
        Arc::new(StaticKeySetFetcher::new(key_set())),
    );
    let response = engine.authorize(DESCRIPTOR, token.as_str()).await?;

    assert_eq!(allowed(&response), self_scope("u1"));
    Ok(())
}

#[tokio::test]
async fn accepts_bearer_scheme_and_gateway_events() -> Result<()> {
    let token = key().sign(KEY_ID, &id_claims("u1"));

    let request: AuthorizerRequest = serde_json::from_value(json!({
        "type": "TOKEN",
        "authorizationToken": format!("Bearer {}", token.as_str()),
        "methodArn": DESCRIPTOR,
    }))?;

    let response = engine().authorize_request(&request).await?;
    assert_eq!(response.principal_id(), "u1");
    Ok(())
}

#[tokio::test]
async fn access_tokens_name_the_client() -> Result<()> {
    let claims = json!({
        "sub": "u1",
        "iss": ISSUER,
        "client_id": CLIENT_ID,
        "token_use": "access",
        "scope": "aws.cognito.signin.user.admin",
        "exp": NOW + 60,
    });
    let token = key().sign(KEY_ID, &claims);

    let response = engine().authorize(DESCRIPTOR, token.as_str()).await?;
    assert_eq!(response.principal_id(), "u1");
    Ok(())
}

#[tokio::test]
async fn unknown_kid_is_denied() {
    let token = key().sign("not-published", &id_claims("u1"));

    let err = engine().authorize(DESCRIPTOR, token.as_str()).await.unwrap_err();
    assert!(
        matches!(&err, Error::NoMatchingKey { kid: Some(kid) } if kid.as_str() == "not-published"),
        "{:?}",
        err
    );
}

#[tokio::test]
async fn missing_kid_is_denied() {
    let token = unsigned(json!({"alg": "RS256"}), &id_claims("u1"));

    let err = engine().authorize(DESCRIPTOR, token.as_str()).await.unwrap_err();
    assert!(matches!(err, Error::NoMatchingKey { kid: None }), "{:?}", err);
}

#[tokio::test]
async fn unsupported_algorithms_are_refused_before_fetching() {
    let fetcher = Arc::new(CountingFetcher::new(key_set()));
    let engine = engine_with(config(), fetcher.clone());

    for alg in ["HS256", "none", "PS256", "RS512"] {
        let token = unsigned(json!({"alg": alg, "kid": KEY_ID}), &id_claims("u1"));

        let err = engine.authorize(DESCRIPTOR, token.as_str()).await.unwrap_err();
        assert!(
            matches!(&err, Error::UnsupportedAlgorithm(a) if a == alg),
            "{:?}",
            err
        );
    }

    assert_eq!(fetcher.fetches(), 0);
}

#[tokio::test]
async fn tampered_payload_fails_signature() {
    let token = key().sign(KEY_ID, &id_claims("u1"));
    let forged_payload = gatehouse_jose::Base64Url::from_raw(
        serde_json::to_vec(&with(id_claims("u1"), "cognito:groups", json!(["admins"]))).unwrap(),
    )
    .to_string();

    let mut parts: Vec<&str> = token.as_str().split('.').collect();
    parts[1] = &forged_payload;
    let forged = parts.join(".");

    let err = engine().authorize(DESCRIPTOR, &forged).await.unwrap_err();
    assert!(matches!(err, Error::InvalidSignature { .. }), "{:?}", err);
}

#[tokio::test]
async fn signature_from_another_key_fails() {
    let token = other_key().sign(KEY_ID, &id_claims("u1"));

    let err = engine().authorize(DESCRIPTOR, token.as_str()).await.unwrap_err();
    assert!(
        matches!(&err, Error::InvalidSignature { kid } if kid.as_str() == KEY_ID),
        "{:?}",
        err
    );
}

#[tokio::test]
async fn expired_tokens_are_denied() {
    let expired = with(id_claims("u1"), "exp", json!(NOW - 1));
    let token = key().sign(KEY_ID, &expired);

    let err = engine().authorize(DESCRIPTOR, token.as_str()).await.unwrap_err();
    assert!(matches!(err, Error::TokenExpired), "{:?}", err);

    let token = key().sign(KEY_ID, &without(id_claims("u1"), "exp"));
    let err = engine().authorize(DESCRIPTOR, token.as_str()).await.unwrap_err();
    assert!(matches!(err, Error::TokenExpired), "{:?}", err);
}

#[tokio::test]
async fn leeway_tolerates_clock_skew() -> Result<()> {
    let expired = with(id_claims("u1"), "exp", json!(NOW - 5));
    let token = key().sign(KEY_ID, &expired);

    let engine = engine_with(
        config().with_leeway(Duration::from_secs(10)),
        Arc::new(StaticKeySetFetcher::new(key_set())),
    );

    engine.authorize(DESCRIPTOR, token.as_str()).await?;
    Ok(())
}

#[tokio::test]
async fn future_tokens_are_denied() {
    let early = with(id_claims("u1"), "nbf", json!(NOW + 120));
    let token = key().sign(KEY_ID, &early);

    let err = engine().authorize(DESCRIPTOR, token.as_str()).await.unwrap_err();
    assert!(matches!(err, Error::TokenNotYetValid), "{:?}", err);
}

#[tokio::test]
async fn wrong_issuer_is_denied() {
    let claims = with(
        id_claims("u1"),
        "iss",
        json!("https://cognito-idp.us-east-1.amazonaws.com/someone-elses-pool"),
    );
    let token = key().sign(KEY_ID, &claims);

    let err = engine().authorize(DESCRIPTOR, token.as_str()).await.unwrap_err();
    assert!(
        matches!(&err, Error::TokenWrongAudience { claim: "iss", value } if value.ends_with("someone-elses-pool")),
        "{:?}",
        err
    );
}

#[tokio::test]
async fn wrong_audience_is_denied() {
    let claims = with(id_claims("u1"), "aud", json!("another-client"));
    let token = key().sign(KEY_ID, &claims);

    let err = engine().authorize(DESCRIPTOR, token.as_str()).await.unwrap_err();
    assert!(
        matches!(&err, Error::TokenWrongAudience { claim: "aud", value } if value == "another-client"),
        "{:?}",
        err
    );
}

#[tokio::test]
async fn audience_is_unchecked_without_client_id() -> Result<()> {
    let claims = with(id_claims("u1"), "aud", json!("another-client"));
    let token = key().sign(KEY_ID, &claims);

    let engine = engine_with(
        Config::new(POOL_ID),
        Arc::new(StaticKeySetFetcher::new(key_set())),
    );
    engine.authorize(DESCRIPTOR, token.as_str()).await?;
    Ok(())
}

#[tokio::test]
async fn refresh_tokens_are_not_accepted() {
    let claims = with(id_claims("u1"), "token_use", json!("refresh"));
    let token = key().sign(KEY_ID, &claims);

    let err = engine().authorize(DESCRIPTOR, token.as_str()).await.unwrap_err();
    assert!(
        matches!(&err, Error::TokenWrongAudience { claim: "token_use", .. }),
        "{:?}",
        err
    );
}

#[tokio::test]
async fn missing_subject_is_denied() {
    for claims in [
        without(id_claims("u1"), "sub"),
        with(id_claims("u1"), "sub", json!("")),
    ] {
        let token = key().sign(KEY_ID, &claims);
        let err = engine().authorize(DESCRIPTOR, token.as_str()).await.unwrap_err();
        assert!(matches!(err, Error::MissingPrincipal), "{:?}", err);
    }
}

#[tokio::test]
async fn unusual_subjects_are_not_widened() {
    let token = key().sign(KEY_ID, &id_claims("u1 OR *"));

    let err = engine().authorize(DESCRIPTOR, token.as_str()).await.unwrap_err();
    assert!(matches!(err, Error::InvalidResourcePattern(_)), "{:?}", err);
}

#[tokio::test]
async fn malformed_inputs_are_denied() {
    let token = key().sign(KEY_ID, &id_claims("u1"));

    let err = engine()
        .authorize("arn:aws:execute-api:us-east-1", token.as_str())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MalformedDescriptor(_)), "{:?}", err);

    for token in ["", "not-a-jwt", "a.b", "Bearer "] {
        let err = engine().authorize(DESCRIPTOR, token).await.unwrap_err();
        assert!(matches!(err, Error::MalformedToken(_)), "{:?}: {:?}", token, err);
    }
}

#[tokio::test]
#[traced_test]
async fn cancellation_abandons_key_fetch() {
    let engine = engine_with(config(), Arc::new(HangingFetcher));
    let token = key().sign(KEY_ID, &id_claims("u1"));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = engine
        .authorize_with_cancellation(DESCRIPTOR, token.as_str(), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled), "{:?}", err);
    assert!(logs_contain("error.kind=\"Cancelled\""));
    assert!(!logs_contain(token.as_str()));
}

#[tokio::test]
async fn deadline_abandons_key_fetch() {
    let engine = engine_with(config(), Arc::new(HangingFetcher));
    let token = key().sign(KEY_ID, &id_claims("u1"));

    let deadline = tokio::time::Instant::now() + Duration::from_millis(20);
    let err = engine
        .authorize_before(DESCRIPTOR, token.as_str(), deadline)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled), "{:?}", err);
}

#[tokio::test]
async fn uncancelled_calls_complete() -> Result<()> {
    let token = key().sign(KEY_ID, &id_claims("u1"));

    let response = engine()
        .authorize_with_cancellation(DESCRIPTOR, token.as_str(), &CancellationToken::new())
        .await?;
    assert_eq!(allowed(&response), self_scope("u1"));
    Ok(())
}

#[tokio::test]
async fn descriptor_region_cannot_redirect_key_lookup() {
    let fetcher = Arc::new(CountingFetcher::new(key_set()));
    let engine = engine_with(config(), fetcher.clone());
    let token = key().sign(KEY_ID, &id_claims("u1"));

    let hostile = "apiId:aws:execute-api:x@evil.example/:111122223333:route/prod/GET/users/u1";
    let err = engine.authorize(hostile, token.as_str()).await.unwrap_err();

    assert!(matches!(err, Error::MalformedDescriptor(_)), "{:?}", err);
    assert_eq!(fetcher.fetches(), 0);
}

#[tokio::test]
async fn conditionless_grants_render_without_condition() -> Result<()> {
    let token = key().sign(KEY_ID, &id_claims("u1"));

    let response = engine().authorize(DESCRIPTOR, token.as_str()).await?;
    let json = serde_json::to_value(&response)?;

    assert!(json["policyDocument"]["Statement"][0].get("Condition").is_none());
    Ok(())
}
