use chrono::Utc;
use http::{HeaderValue, Method};
use smol_str::SmolStr;
use uuid::Uuid;

use crate::jose::{
    SigningError, create_signed_jwt,
    jws::RegisteredHeader,
    jwt::{Claims, PublicClaims, RegisteredClaims},
};
use crate::keys::KeyPair;

pub const JWT_HEADER_TYP_DPOP: &str = "dpop+jwt";

#[derive(thiserror::Error, Debug, miette::Diagnostic)]
pub enum DpopError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Key(#[from] crate::error::KeyError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Signing(#[from] SigningError),
    #[error(transparent)]
    #[diagnostic(code(podauth::dpop::header))]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),
}

/// A signed DPoP proof, bound to one method and URI.
///
/// Proofs are single use, so this is deliberately not `Clone`.
#[derive(Debug, PartialEq, Eq)]
pub struct DpopProof(SmolStr);

impl DpopProof {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> SmolStr {
        self.0
    }

    /// Value for the `DPoP` request header.
    pub fn into_header_value(self) -> Result<HeaderValue, DpopError> {
        Ok(HeaderValue::from_str(&self.0)?)
    }
}

impl std::fmt::Display for DpopProof {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sign a DPoP proof for `method` on `uri` with `key`.
///
/// The header embeds the public projection of the key. Each call mints a
/// fresh `jti` and stamps `iat` with the current time in seconds.
pub fn build_dpop_proof(
    uri: impl AsRef<str>,
    method: &Method,
    key: &KeyPair,
) -> Result<DpopProof, DpopError> {
    let mut header = RegisteredHeader::from(key.algorithm());
    header.typ = Some(JWT_HEADER_TYP_DPOP.into());
    header.jwk = Some(key.public_jwk().clone());

    let claims = Claims {
        registered: RegisteredClaims {
            jti: Some(Uuid::new_v4().to_string().into()),
            iat: Some(Utc::now().timestamp()),
            ..Default::default()
        },
        public: PublicClaims {
            htm: Some(method.as_str().into()),
            htu: Some(uri.as_ref().into()),
        },
    };
    tracing::trace!(htm = %method, htu = uri.as_ref(), "signing dpop proof");
    let token = create_signed_jwt(key.private_key(), header.into(), claims)?;
    Ok(DpopProof(token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_key;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use jose_jwk::{Jwk, crypto};
    use p256::ecdsa::{Signature, VerifyingKey, signature::Verifier};
    use serde_json::Value;

    fn decode(segment: &str) -> Value {
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(segment).unwrap()).unwrap()
    }

    fn key() -> KeyPair {
        KeyPair::from_jwk(&generate_key()).unwrap()
    }

    #[test]
    fn proof_carries_method_uri_and_public_key() {
        let key = key();
        let proof = build_dpop_proof("https://idp.example/token", &Method::POST, &key).unwrap();
        let parts: Vec<_> = proof.as_str().split('.').collect();
        assert_eq!(parts.len(), 3);

        let header = decode(parts[0]);
        assert_eq!(header["typ"], "dpop+jwt");
        assert_eq!(header["alg"], "ES256");
        assert!(header["jwk"].get("d").is_none());
        assert_eq!(header["jwk"]["x"], serde_json::to_value(key.public_jwk()).unwrap()["x"]);

        let claims = decode(parts[1]);
        assert_eq!(claims["htm"], "POST");
        assert_eq!(claims["htu"], "https://idp.example/token");
        assert!(claims["iat"].as_i64().unwrap() > 0);
        assert!(claims["jti"].as_str().is_some_and(|s| !s.is_empty()));
    }

    #[test]
    fn each_proof_has_a_fresh_jti() {
        let key = key();
        let a = build_dpop_proof("https://pod.example/r", &Method::GET, &key).unwrap();
        let b = build_dpop_proof("https://pod.example/r", &Method::GET, &key).unwrap();
        let jti = |p: &DpopProof| decode(p.as_str().split('.').nth(1).unwrap())["jti"].clone();
        assert_ne!(jti(&a), jti(&b));
    }

    #[test]
    fn signature_verifies_against_embedded_key() {
        let key = key();
        let proof = build_dpop_proof("https://pod.example/r", &Method::PUT, &key).unwrap();
        let (signing_input, signature) = proof.as_str().rsplit_once('.').unwrap();

        let header = decode(signing_input.split('.').next().unwrap());
        let jwk: Jwk = serde_json::from_value(header["jwk"].clone()).unwrap();
        let public = match crypto::Key::try_from(&jwk.key).unwrap() {
            crypto::Key::P256(crypto::Kind::Public(pk)) => pk,
            _ => panic!("expected a P-256 public key"),
        };
        let verifying = VerifyingKey::from(public);
        let signature = Signature::from_slice(&URL_SAFE_NO_PAD.decode(signature).unwrap()).unwrap();
        verifying
            .verify(signing_input.as_bytes(), &signature)
            .unwrap();
    }

    #[test]
    fn es384_proof_verifies_against_embedded_key() {
        let secret = elliptic_curve::SecretKey::<p384::NistP384>::random(
            &mut rand::rngs::ThreadRng::default(),
        );
        let mut jwk = Jwk {
            key: jose_jwk::Key::from(&crypto::Key::from(secret)),
            prm: Default::default(),
        };
        jwk.prm.alg = Some(jose_jwa::Algorithm::Signing(jose_jwa::Signing::Es384));
        let key = KeyPair::from_jwk(&jwk).unwrap();
        assert!(matches!(key.private_key(), crate::keys::PrivateKey::Es384(_)));

        let proof = build_dpop_proof("https://pod.example/r", &Method::GET, &key).unwrap();
        let (signing_input, signature) = proof.as_str().rsplit_once('.').unwrap();
        let header = decode(signing_input.split('.').next().unwrap());
        assert_eq!(header["alg"], "ES384");
        assert_eq!(header["jwk"]["crv"], "P-384");

        let embedded: Jwk = serde_json::from_value(header["jwk"].clone()).unwrap();
        let public = match crypto::Key::try_from(&embedded.key).unwrap() {
            crypto::Key::P384(crypto::Kind::Public(pk)) => pk,
            _ => panic!("expected a P-384 public key"),
        };
        let verifying = p384::ecdsa::VerifyingKey::from(public);
        let signature =
            p384::ecdsa::Signature::from_slice(&URL_SAFE_NO_PAD.decode(signature).unwrap())
                .unwrap();
        verifying
            .verify(signing_input.as_bytes(), &signature)
            .unwrap();
    }

    #[test]
    fn header_value_is_the_compact_token() {
        let proof = build_dpop_proof("https://pod.example/r", &Method::GET, &key()).unwrap();
        let text = proof.to_string();
        assert_eq!(proof.into_header_value().unwrap(), text.as_str());
    }
}
