#![allow(dead_code)]

use once_cell::sync::Lazy;
use openssl::rsa::Rsa;

use crate::{jwk, rsa, SigningKey};

pub const TEST_KEY_ID: &str = "EkKhyPqtd";
pub const OTHER_KEY_ID: &str = "Vb1xk2qQe";

pub struct KeyPair {
    pub private: rsa::PrivateKey,
    pub public: rsa::PublicKey,
    pub modulus: Vec<u8>,
    pub exponent: Vec<u8>,
}

impl KeyPair {
    fn generate() -> Self {
        let rsa = Rsa::generate(2048).unwrap();
        let der = rsa.private_key_to_der().unwrap();
        let modulus = rsa.n().to_vec();
        let exponent = rsa.e().to_vec();

        Self {
            private: rsa::PrivateKey::from_der(&der).unwrap(),
            public: rsa::PublicKey::from_components(modulus.clone(), exponent.clone()).unwrap(),
            modulus,
            exponent,
        }
    }

    pub fn signing_key(&self, kid: &'static str) -> SigningKey {
        SigningKey::rsa(self.modulus.clone(), self.exponent.clone())
            .with_key_id(jwk::KeyId::from_static(kid))
            .with_algorithm(crate::jwa::Algorithm::RS256)
    }
}

static KEY: Lazy<KeyPair> = Lazy::new(KeyPair::generate);
static OTHER_KEY: Lazy<KeyPair> = Lazy::new(KeyPair::generate);

pub fn key_pair() -> &'static KeyPair {
    &KEY
}

pub fn other_key_pair() -> &'static KeyPair {
    &OTHER_KEY
}
