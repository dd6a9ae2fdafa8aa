#![allow(dead_code)]

use std::{
    net::{Ipv4Addr, SocketAddr},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, HeaderName},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use gatehouse::{Authority, KeyFetchError, KeySetFetcher, StaticKeySetFetcher};
use gatehouse_jose::{
    jwa::Algorithm,
    jwk::KeyId,
    jwt::Headers,
    rsa::PrivateKey,
    Base64Url, Jwt, KeySet, SigningKey,
};
use once_cell::sync::Lazy;
use openssl::rsa::Rsa;
use serde_json::Value;
use tokio::net::TcpListener;

pub const KEY_ID: &str = "1gZ8rG3RQr";
pub const REGION: &str = "us-east-1";
pub const POOL_ID: &str = "us-east-1_Ab12Cd34";
pub const ISSUER: &str = "https://cognito-idp.us-east-1.amazonaws.com/us-east-1_Ab12Cd34";
pub const CLIENT_ID: &str = "4f1nk3cl13nt";
pub const NOW: u64 = 1_700_000_000;

pub struct TestKey {
    private: PrivateKey,
    modulus: Vec<u8>,
    exponent: Vec<u8>,
}

impl TestKey {
    fn generate() -> Self {
        let rsa = Rsa::generate(2048).unwrap();
        Self {
            private: PrivateKey::from_der(&rsa.private_key_to_der().unwrap()).unwrap(),
            modulus: rsa.n().to_vec(),
            exponent: rsa.e().to_vec(),
        }
    }

    pub fn public(&self, kid: &str) -> SigningKey {
        SigningKey::rsa(self.modulus.clone(), self.exponent.clone())
            .with_key_id(KeyId::from(kid))
            .with_algorithm(Algorithm::RS256)
    }

    pub fn sign(&self, kid: &str, claims: &Value) -> Jwt {
        let headers = Headers::with_key_id(Algorithm::RS256, kid);
        Jwt::try_from_parts_with_signature(&headers, claims, &self.private).unwrap()
    }
}

static KEY: Lazy<TestKey> = Lazy::new(TestKey::generate);
static OTHER_KEY: Lazy<TestKey> = Lazy::new(TestKey::generate);

pub fn key() -> &'static TestKey {
    &KEY
}

pub fn other_key() -> &'static TestKey {
    &OTHER_KEY
}

/// The published key set: the signing key plus an unrelated one
pub fn key_set() -> KeySet {
    vec![other_key().public("unrelated"), key().public(KEY_ID)]
        .into_iter()
        .collect()
}

/// Claims of a valid ID token for `sub`
pub fn id_claims(sub: &str) -> Value {
    serde_json::json!({
        "sub": sub,
        "iss": ISSUER,
        "aud": CLIENT_ID,
        "token_use": "id",
        "cognito:username": sub,
        "email": format!("{}@example.com", sub),
        "iat": NOW - 60,
        "exp": NOW + 3600,
    })
}

pub fn with(mut claims: Value, name: &str, value: Value) -> Value {
    claims[name] = value;
    claims
}

pub fn without(mut claims: Value, name: &str) -> Value {
    if let Some(map) = claims.as_object_mut() {
        map.remove(name);
    }
    claims
}

/// A token with an arbitrary header and a garbage signature
pub fn unsigned(header: Value, claims: &Value) -> Jwt {
    let header = Base64Url::from_raw(serde_json::to_vec(&header).unwrap());
    let payload = Base64Url::from_raw(serde_json::to_vec(claims).unwrap());
    Jwt::new(format!("{}.{}.c2lnbmF0dXJl", header, payload))
}

/// Counts fetches before delegating to a static key set
#[derive(Debug)]
pub struct CountingFetcher {
    inner: StaticKeySetFetcher,
    fetches: AtomicUsize,
}

impl CountingFetcher {
    pub fn new(keys: KeySet) -> Self {
        Self {
            inner: StaticKeySetFetcher::new(keys),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeySetFetcher for CountingFetcher {
    async fn fetch(&self, authority: &Authority) -> Result<Arc<KeySet>, KeyFetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch(authority).await
    }

    async fn refresh(&self, authority: &Authority) -> Result<Arc<KeySet>, KeyFetchError> {
        self.fetch(authority).await
    }
}

/// A fetcher whose requests never complete
#[derive(Debug)]
pub struct HangingFetcher;

#[async_trait]
impl KeySetFetcher for HangingFetcher {
    async fn fetch(&self, _authority: &Authority) -> Result<Arc<KeySet>, KeyFetchError> {
        std::future::pending().await
    }

    async fn refresh(&self, authority: &Authority) -> Result<Arc<KeySet>, KeyFetchError> {
        self.fetch(authority).await
    }
}

type Responder = dyn Fn(usize, &HeaderMap) -> Response + Send + Sync;

/// A request received by the [`FakeProvider`]
#[derive(Debug, Clone)]
pub struct Recorded {
    pub pool: String,
    pub headers: HeaderMap,
}

impl Recorded {
    pub fn header(&self, name: HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

#[derive(Clone)]
struct ProviderState {
    requests: Arc<Mutex<Vec<Recorded>>>,
    respond: Arc<Responder>,
}

async fn jwks(
    State(state): State<ProviderState>,
    Path(pool): Path<String>,
    headers: HeaderMap,
) -> Response {
    let number = {
        let mut requests = state.requests.lock().unwrap();
        requests.push(Recorded {
            pool,
            headers: headers.clone(),
        });
        requests.len()
    };

    (state.respond)(number, &headers)
}

/// An identity provider publishing a key set at `/{pool}/.well-known/jwks.json`
///
/// The responder receives the 1-based request number and the request
/// headers.
pub struct FakeProvider {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl FakeProvider {
    pub async fn start<F>(respond: F) -> Self
    where
        F: Fn(usize, &HeaderMap) -> Response + Send + Sync + 'static,
    {
        let state = ProviderState {
            requests: Arc::default(),
            respond: Arc::new(respond),
        };
        let requests = Arc::clone(&state.requests);

        let router = Router::new()
            .route("/:pool/.well-known/jwks.json", get(jwks))
            .with_state(state);

        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });

        Self { addr, requests }
    }

    /// Serves `keys` on every request
    pub async fn serving(keys: KeySet) -> Self {
        Self::start(move |_, _| Json(keys.clone()).into_response()).await
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn authority(&self) -> Authority {
        Authority::new(REGION, POOL_ID).with_endpoint(&self.endpoint())
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

/// An address nothing is listening on
pub fn refused_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}
