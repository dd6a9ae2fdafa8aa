//! Compact JSON Web Tokens
//!
//! The specifications for this standard can be found in [RFC7519][].
//!
//! A compact JWT is three base64url sections separated by `.`:
//!
//! ```text
//! header.payload.signature
//! ```
//!
//! The header names the signing algorithm and the identifier of the key
//! that produced the signature. Both are attacker-controlled until the
//! signature has been checked, so they are only used to *select* a key,
//! never to decide whether one is needed. Nothing in the payload is
//! trusted before verification; [`Validated`] can only be produced by this
//! module after the signature and the registered claims have been checked.
//!
//! [RFC7519]: https://tools.ietf.org/html/rfc7519

use std::{fmt, time::Duration};

use aliri_braid::braid;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    b64::Base64Url,
    clock::{Clock, System, UnixTime},
    error, jwa, jwk, jws,
};

/// An issuer of JWTs
#[braid(serde, ref_doc = "A borrowed reference to an [`Issuer`]")]
pub struct Issuer;

/// An audience of a JWT
#[braid(serde, ref_doc = "A borrowed reference to an [`Audience`]")]
pub struct Audience;

/// The subject of a JWT
#[braid(serde, ref_doc = "A borrowed reference to a [`Subject`]")]
pub struct Subject;

/// A JSON Web Token
///
/// This type provides custom implementations of [`Display`][JwtRef#impl-Display] and
/// [`Debug`][JwtRef#impl-Debug] to prevent bearer credentials from reaching logs.
#[braid(
    serde,
    debug = "owned",
    display = "owned",
    ord = "omit",
    ref_doc = "A borrowed reference to a JSON Web Token ([`Jwt`])"
)]
#[must_use]
pub struct Jwt;

/// Prints `***JWT***`
///
/// The alternate form, `{:#?}`, prints the header and payload sections and
/// elides the signature.
impl fmt::Debug for JwtRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if f.alternate() {
            match self.0.rfind('.') {
                Some(idx) => write!(f, "\"{}…\"", &self.0[..=idx]),
                None => f.write_str("\"…\""),
            }
        } else {
            f.write_str("***JWT***")
        }
    }
}

/// Prints `***JWT***`
///
/// The alternate form, `{:#}`, prints the whole token.
impl fmt::Display for JwtRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if f.alternate() {
            f.write_str(&self.0)
        } else {
            f.write_str("***JWT***")
        }
    }
}

/// The protected header of a JWT
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[must_use]
pub struct Headers {
    alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kid: Option<jwk::KeyId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    typ: Option<String>,
}

impl Headers {
    /// Constructs headers for the given algorithm
    pub fn new(alg: jwa::Algorithm) -> Self {
        Self::from_raw_parts(alg.name(), None)
    }

    /// Constructs headers with a specific signing algorithm and key ID
    pub fn with_key_id(alg: jwa::Algorithm, kid: impl Into<jwk::KeyId>) -> Self {
        Self::from_raw_parts(alg.name(), Some(kid.into()))
    }

    /// Constructs headers naming an arbitrary algorithm
    pub fn from_raw_parts(alg: impl Into<String>, kid: Option<jwk::KeyId>) -> Self {
        Self {
            alg: alg.into(),
            kid,
            typ: Some("JWT".to_owned()),
        }
    }

    /// The algorithm name exactly as it appears in the header
    #[must_use]
    pub fn alg_name(&self) -> &str {
        &self.alg
    }

    /// The declared algorithm, if it is one that is accepted
    ///
    /// # Errors
    ///
    /// Returns an error naming the declared algorithm if it is not accepted.
    pub fn algorithm(&self) -> Result<jwa::Algorithm, error::UnsupportedAlgorithm> {
        self.alg.parse()
    }

    /// The ID of the key that signed the token
    #[must_use]
    pub fn kid(&self) -> Option<&jwk::KeyIdRef> {
        self.kid.as_deref()
    }
}

/// The validated headers and claims of a JWT
///
/// This type can _only_ be generated within this crate to assert that the
/// headers and claims held by this type have already been validated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Validated<C = BasicClaims> {
    headers: Headers,
    claims: C,
}

impl<C> Validated<C> {
    /// Extracts the headers and claims from the token
    pub fn extract(self) -> (Headers, C) {
        (self.headers, self.claims)
    }

    /// The validated token headers
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// The validated token claims
    pub fn claims(&self) -> &C {
        &self.claims
    }
}

/// A decomposed JWT
///
/// This structure is suitable for inspection to determine which key
/// should be used to validate the JWT.
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use]
pub struct Decomposed<'a> {
    header: Headers,
    message: &'a str,
    payload: &'a str,
    signature: Base64Url,
}

macro_rules! expect_two {
    ($iter:expr) => {{
        let mut i = $iter;
        match (i.next(), i.next(), i.next()) {
            (Some(first), Some(second), None) => Some((first, second)),
            _ => None,
        }
    }};
}

impl JwtRef {
    /// Decomposes the JWT into its parts, preparing it for later processing.
    ///
    /// # Errors
    ///
    /// Returns an error if the JWT is malformed.
    pub fn decompose(&self) -> Result<Decomposed<'_>, error::JwtVerifyError> {
        let (s_str, message) =
            expect_two!(self.as_str().rsplitn(2, '.')).ok_or_else(error::malformed_jwt)?;
        let (payload, h_str) =
            expect_two!(message.rsplitn(2, '.')).ok_or_else(error::malformed_jwt)?;

        let h_raw = Base64Url::from_encoded(h_str).map_err(error::malformed_jwt_header)?;
        let signature = Base64Url::from_encoded(s_str).map_err(error::malformed_jwt_signature)?;
        let header: Headers =
            serde_json::from_slice(h_raw.as_slice()).map_err(error::malformed_jwt_header)?;

        Ok(Decomposed {
            header,
            message,
            payload,
            signature,
        })
    }
}

impl<'a> Decomposed<'a> {
    /// The declared algorithm, if it is one that is accepted
    ///
    /// # Errors
    ///
    /// Returns an error naming the declared algorithm if it is not accepted.
    pub fn alg(&self) -> Result<jwa::Algorithm, error::UnsupportedAlgorithm> {
        self.header.algorithm()
    }

    /// The ID of the key the header claims signed this token
    #[must_use]
    pub fn kid(&self) -> Option<&jwk::KeyIdRef> {
        self.header.kid()
    }

    /// The untrusted headers of the JWT
    ///
    /// **WARNING:** *These headers have not been validated and should not be trusted.*
    pub fn untrusted_header(&self) -> &Headers {
        &self.header
    }

    /// The untrusted, still-encoded payload of the JWT
    ///
    /// **WARNING:** *This payload has not been validated and should not be trusted.*
    #[must_use]
    pub fn untrusted_payload(&self) -> &'a str {
        self.payload
    }

    /// Verifies the signature and core claims using the system clock
    ///
    /// # Errors
    ///
    /// Returns an error if the signature does not verify against `key` or the
    /// claims are rejected by `validator`.
    pub fn verify<C, V>(
        self,
        key: &V,
        validator: &CoreValidator,
    ) -> Result<Validated<C>, error::JwtVerifyError>
    where
        C: DeserializeOwned + CoreClaims,
        V: jws::Verifier,
        error::JwtVerifyError: From<V::Error>,
    {
        self.verify_with_custom(key, validator, NoopValidator, &System)
    }

    /// Verifies the signature, then the core and custom claim checks
    ///
    /// The signature is checked before the payload is even decoded. Claims
    /// are evaluated against `clock`.
    ///
    /// # Errors
    ///
    /// Returns an error if the algorithm is not accepted, the signature does
    /// not verify, the payload cannot be decoded, or either validator rejects
    /// the claims.
    pub fn verify_with_custom<C, V, X, K>(
        self,
        key: &V,
        validator: &CoreValidator,
        custom: X,
        clock: &K,
    ) -> Result<Validated<C>, error::JwtVerifyError>
    where
        C: DeserializeOwned + CoreClaims,
        V: jws::Verifier,
        error::JwtVerifyError: From<V::Error>,
        X: ClaimsValidator<C>,
        K: Clock + ?Sized,
    {
        let alg = self.alg()?;

        key.verify(alg, self.message.as_bytes(), self.signature.as_slice())?;

        let p_raw = Base64Url::from_encoded(self.payload).map_err(error::malformed_jwt_payload)?;
        let claims: C =
            serde_json::from_slice(p_raw.as_slice()).map_err(error::malformed_jwt_payload)?;

        validator.validate_with_clock(&claims, clock)?;
        custom.validate(&self.header, &claims)?;

        Ok(Validated {
            headers: self.header,
            claims,
        })
    }
}

#[cfg(any(test, feature = "private-keys"))]
#[cfg_attr(docsrs, doc(cfg(feature = "private-keys")))]
impl Jwt {
    /// Constructs a new JWT from a header and payload, signed by `key`
    ///
    /// # Errors
    ///
    /// * If the header does not name an accepted algorithm
    /// * If serialization of either the header or payload fails
    /// * If the signature cannot be produced
    pub fn try_from_parts_with_signature<P: Serialize>(
        headers: &Headers,
        payload: &P,
        key: &crate::rsa::PrivateKey,
    ) -> Result<Self, error::JwtSigningError> {
        use jws::Signer;

        let alg = headers.algorithm().map_err(error::malformed_jwt_header)?;

        let h_raw =
            Base64Url::from_raw(serde_json::to_vec(headers).map_err(error::malformed_jwt_header)?);
        let p_raw =
            Base64Url::from_raw(serde_json::to_vec(payload).map_err(error::malformed_jwt_payload)?);

        let message = format!("{}.{}", h_raw, p_raw);
        let signature = Base64Url::from_raw(key.sign(alg, message.as_bytes())?);

        Ok(Self::new(format!("{}.{}", message, signature)))
    }
}

/// Registered claims needed to validate a token
pub trait CoreClaims {
    /// Not before
    ///
    /// A verifier MUST reject this token before the given time.
    fn nbf(&self) -> Option<UnixTime>;

    /// Expires
    ///
    /// A verifier MUST reject this token after the given time.
    fn exp(&self) -> Option<UnixTime>;

    /// Issuer
    ///
    /// A verifier MUST reject this token if the issuer is not approved.
    fn iss(&self) -> Option<&IssuerRef>;
}

/// A claims validator
pub trait ClaimsValidator<C> {
    /// Validates the header and payload claims decoded from a JWT
    ///
    /// # Errors
    ///
    /// Returns an error if the header or payload claims are invalid according to
    /// the validator.
    fn validate(&self, header: &Headers, claims: &C) -> Result<(), error::ClaimsRejected>;
}

impl<C, T> ClaimsValidator<C> for &'_ T
where
    T: ClaimsValidator<C> + ?Sized,
{
    #[inline]
    fn validate(&self, header: &Headers, claims: &C) -> Result<(), error::ClaimsRejected> {
        T::validate(self, header, claims)
    }
}

/// A validator that makes no checks
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct NoopValidator;

impl<C> ClaimsValidator<C> for NoopValidator {
    #[inline]
    fn validate(&self, _header: &Headers, _claims: &C) -> Result<(), error::ClaimsRejected> {
        Ok(())
    }
}

/// A core validator for the temporal and issuer claims
///
/// By default, the `exp` claim is required and must not be in the past, with
/// no grace period.
#[derive(Clone, Debug)]
#[must_use]
pub struct CoreValidator {
    leeway: Duration,
    validate_nbf: bool,
    validate_exp: bool,
    issuer: Option<Issuer>,
}

impl Default for CoreValidator {
    #[inline]
    fn default() -> Self {
        Self {
            leeway: Duration::default(),
            validate_exp: true,
            validate_nbf: true,
            issuer: None,
        }
    }
}

impl CoreValidator {
    /// Allows a grace period for token validation
    ///
    /// Applies on either side of the "not before" and "expires" claims.
    #[inline]
    pub fn with_leeway(self, leeway: Duration) -> Self {
        Self { leeway, ..self }
    }

    /// Skips expiration checks
    #[inline]
    pub fn ignore_expiration(self) -> Self {
        Self {
            validate_exp: false,
            ..self
        }
    }

    /// Skips "not valid before" checks
    #[inline]
    pub fn ignore_not_before(self) -> Self {
        Self {
            validate_nbf: false,
            ..self
        }
    }

    /// Require that tokens specify a particular issuer
    #[inline]
    pub fn require_issuer(self, issuer: Issuer) -> Self {
        Self {
            issuer: Some(issuer),
            ..self
        }
    }

    /// Validates the registered claims against the time reported by `clock`
    ///
    /// A present `nbf` is checked; an absent one is not required.
    ///
    /// # Errors
    ///
    /// Returns the first claim that fails validation.
    pub fn validate_with_clock<T: CoreClaims, K: Clock + ?Sized>(
        &self,
        claims: &T,
        clock: &K,
    ) -> Result<(), error::ClaimsRejected> {
        let now = clock.now();

        if self.validate_exp {
            match claims.exp() {
                Some(exp) if exp < now.saturating_sub(self.leeway) => {
                    return Err(error::ClaimsRejected::TokenExpired)
                }
                Some(_) => {}
                None => return Err(error::ClaimsRejected::MissingRequiredClaim("exp")),
            }
        }

        if self.validate_nbf {
            if let Some(nbf) = claims.nbf() {
                if nbf > now.saturating_add(self.leeway) {
                    return Err(error::ClaimsRejected::TokenNotYetValid);
                }
            }
        }

        if let Some(allowed_iss) = &self.issuer {
            match claims.iss() {
                Some(iss) if iss == &**allowed_iss => {}
                Some(_) => return Err(error::ClaimsRejected::InvalidIssuer),
                None => return Err(error::ClaimsRejected::MissingRequiredClaim("iss")),
            }
        }

        Ok(())
    }
}

/// Common claims used in JWTs
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[must_use]
pub struct BasicClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iss: Option<Issuer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub: Option<Subject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exp: Option<UnixTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    nbf: Option<UnixTime>,
}

impl BasicClaims {
    /// Constructs a new, empty payload
    pub const fn new() -> Self {
        Self {
            iss: None,
            sub: None,
            exp: None,
            nbf: None,
        }
    }

    /// Sets the `iss` claim for the JWT
    pub fn with_issuer(mut self, iss: impl Into<Issuer>) -> Self {
        self.iss = Some(iss.into());
        self
    }

    /// Sets the `sub` claim for the JWT
    pub fn with_subject(mut self, sub: impl Into<Subject>) -> Self {
        self.sub = Some(sub.into());
        self
    }

    /// Sets the `exp` claim for the JWT
    pub fn with_expiration(mut self, time: UnixTime) -> Self {
        self.exp = Some(time);
        self
    }

    /// Sets the `nbf` claim for the JWT
    pub fn with_not_before(mut self, time: UnixTime) -> Self {
        self.nbf = Some(time);
        self
    }

    /// The `sub` claim
    #[must_use]
    pub fn sub(&self) -> Option<&SubjectRef> {
        self.sub.as_deref()
    }
}

impl CoreClaims for BasicClaims {
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
