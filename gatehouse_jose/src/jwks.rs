use serde::{Deserialize, Serialize};

use crate::{jwa, jwk, SigningKey};

/// A JSON Web Key Set (JWKS)
///
/// Published sets are small, so lookups scan the keys in order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySet {
    keys: Vec<SigningKey>,
}

impl KeySet {
    /// Adds a key to the set
    pub fn add_key(&mut self, key: SigningKey) {
        self.keys.push(key);
    }

    /// A view of the keys in this set
    #[must_use]
    pub fn keys(&self) -> &[SigningKey] {
        &self.keys
    }

    /// Whether the set holds no keys at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Gets the key whose identifier is exactly `kid`
    #[must_use]
    pub fn get_key_by_id(&self, kid: &jwk::KeyIdRef) -> Option<&SigningKey> {
        self.keys.iter().find(|k| k.key_id() == Some(kid))
    }

    /// Gets the key whose identifier is `kid`, provided it can verify `alg`
    ///
    /// A key without an identifier never matches; there is no fallback to
    /// an arbitrary key in the set.
    #[must_use]
    pub fn get_verification_key(
        &self,
        kid: &jwk::KeyIdRef,
        alg: jwa::Algorithm,
    ) -> Option<&SigningKey> {
        self.get_key_by_id(kid).filter(|k| k.is_compatible(alg))
    }
}

impl FromIterator<SigningKey> for KeySet {
    fn from_iter<I: IntoIterator<Item = SigningKey>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}
