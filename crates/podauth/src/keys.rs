//! Key material: private signing handles, public projections and thumbprints
//! derived from stored JSON Web Keys.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use elliptic_curve::SecretKey;
use jose_jwa::{Algorithm, Signing};
use jose_jwk::{Jwk, JwkSet, Key, crypto};
use rand::rngs::ThreadRng;
use serde_json::Value;
use sha2::{Digest, Sha256};
use smol_str::{SmolStr, format_smolstr};

use crate::error::{KeyError, Result};

/// JWK members that carry private key material (RFC 7518 §6.2.2, §6.3.2).
const PRIVATE_MEMBERS: &[&str] = &["d", "p", "q", "dp", "dq", "qi", "oth"];

/// An imported private key, ready to sign.
#[derive(Clone)]
pub enum PrivateKey {
    Es256(p256::ecdsa::SigningKey),
    Es384(p384::ecdsa::SigningKey),
}

impl PrivateKey {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            PrivateKey::Es256(_) => Algorithm::Signing(Signing::Es256),
            PrivateKey::Es384(_) => Algorithm::Signing(Signing::Es384),
        }
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let alg = match self {
            PrivateKey::Es256(_) => "ES256",
            PrivateKey::Es384(_) => "ES384",
        };
        f.debug_tuple("PrivateKey").field(&alg).finish()
    }
}

/// A private JWK together with everything derived from it.
///
/// Built on demand from stored key material and never mutated afterwards.
#[derive(Clone)]
pub struct KeyPair {
    private_jwk: Jwk,
    private_key: PrivateKey,
    public_jwk: Jwk,
    thumbprint: SmolStr,
}

impl KeyPair {
    /// Import `jwk`. The key must declare its `alg`; it is never inferred.
    pub fn from_jwk(jwk: &Jwk) -> Result<Self> {
        let alg = jwk.prm.alg.as_ref().ok_or(KeyError::MissingAlgorithm)?;
        let (private_key, derived_public) = import_private_key(&jwk.key, alg)?;
        let public_jwk = public_jwk(jwk)?;
        let thumbprint = thumbprint(&public_jwk)?;
        if thumbprint_of(&derived_public)? != thumbprint {
            return Err(KeyError::PublicMismatch);
        }
        Ok(Self {
            private_jwk: jwk.clone(),
            private_key,
            public_jwk,
            thumbprint,
        })
    }

    /// Import every key of a set, in order.
    pub fn from_jwks(jwks: &JwkSet) -> Result<Vec<Self>> {
        jwks.keys.iter().map(Self::from_jwk).collect()
    }

    pub fn private_jwk(&self) -> &Jwk {
        &self.private_jwk
    }

    pub fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }

    pub fn public_jwk(&self) -> &Jwk {
        &self.public_jwk
    }

    /// RFC 7638 thumbprint of the public key.
    pub fn thumbprint(&self) -> &str {
        &self.thumbprint
    }

    pub fn algorithm(&self) -> Algorithm {
        self.private_key.algorithm()
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("private_key", &self.private_key)
            .field("public_jwk", &self.public_jwk)
            .field("thumbprint", &self.thumbprint)
            .finish_non_exhaustive()
    }
}

fn import_private_key(key: &Key, alg: &Algorithm) -> Result<(PrivateKey, Key)> {
    let wanted = match alg {
        Algorithm::Signing(Signing::Es256) => Curve::P256,
        Algorithm::Signing(Signing::Es384) => Curve::P384,
        other => return Err(KeyError::UnsupportedAlgorithm(alg_name(other))),
    };
    let imported = crypto::Key::try_from(key)
        .map_err(|e| KeyError::Crypto(format_smolstr!("{e:?}")))?;
    match (wanted, imported) {
        (Curve::P256, crypto::Key::P256(crypto::Kind::Secret(secret))) => {
            let public = Key::from(&crypto::Key::from(secret.public_key()));
            Ok((PrivateKey::Es256(secret.into()), public))
        }
        (Curve::P384, crypto::Key::P384(crypto::Kind::Secret(secret))) => {
            let public = Key::from(&crypto::Key::from(secret.public_key()));
            Ok((PrivateKey::Es384(secret.into()), public))
        }
        (Curve::P256, crypto::Key::P256(crypto::Kind::Public(_)))
        | (Curve::P384, crypto::Key::P384(crypto::Kind::Public(_))) => Err(KeyError::NotPrivate),
        _ => Err(KeyError::AlgorithmMismatch {
            alg: alg_name(alg),
        }),
    }
}

#[derive(Clone, Copy)]
enum Curve {
    P256,
    P384,
}

fn alg_name(alg: &Algorithm) -> SmolStr {
    serde_json::to_value(alg)
        .ok()
        .and_then(|v| v.as_str().map(SmolStr::new))
        .unwrap_or_else(|| SmolStr::new_static("unknown"))
}

/// Public-only projection of `jwk`.
///
/// Works on a serialized copy, so the caller's key is left untouched. All
/// other members (`alg`, `kid`, ...) are preserved.
pub fn public_jwk(jwk: &Jwk) -> Result<Jwk> {
    let mut value = serde_json::to_value(jwk)?;
    if value.get("kty").and_then(Value::as_str) == Some("oct") {
        return Err(KeyError::Symmetric);
    }
    if let Some(members) = value.as_object_mut() {
        for member in PRIVATE_MEMBERS {
            members.remove(*member);
        }
    }
    Ok(serde_json::from_value(value)?)
}

pub fn public_jwks(jwks: &[Jwk]) -> Result<Vec<Jwk>> {
    jwks.iter().map(public_jwk).collect()
}

/// RFC 7638 thumbprint: SHA-256 over the required members in lexicographic
/// order, base64url without padding. Private and optional members are
/// ignored, so a private key and its projection share a thumbprint.
pub fn thumbprint(jwk: &Jwk) -> Result<SmolStr> {
    thumbprint_of(&jwk.key)
}

fn thumbprint_of(key: &Key) -> Result<SmolStr> {
    let value = serde_json::to_value(key)?;
    let required: &[&'static str] = match value.get("kty").and_then(Value::as_str) {
        Some("EC") => &["crv", "kty", "x", "y"],
        Some("RSA") => &["e", "kty", "n"],
        Some("OKP") => &["crv", "kty", "x"],
        Some("oct") => return Err(KeyError::Symmetric),
        _ => return Err(KeyError::Crypto(SmolStr::new_static("unknown key type"))),
    };
    let mut canonical = BTreeMap::new();
    for member in required {
        let field = value.get(*member).ok_or_else(|| {
            KeyError::Malformed(<serde_json::Error as serde::de::Error>::missing_field(*member))
        })?;
        canonical.insert(*member, field);
    }
    let digest = Sha256::digest(serde_json::to_string(&canonical)?.as_bytes());
    Ok(URL_SAFE_NO_PAD.encode(digest).into())
}

pub fn parse_jwk(json: &str) -> Result<Jwk> {
    Ok(serde_json::from_str(json)?)
}

pub fn parse_jwks(json: &str) -> Result<JwkSet> {
    Ok(serde_json::from_str(json)?)
}

/// Generate a fresh P-256 private JWK tagged `alg: ES256`.
pub fn generate_key() -> Jwk {
    let secret = SecretKey::<p256::NistP256>::random(&mut ThreadRng::default());
    let mut jwk = Jwk {
        key: Key::from(&crypto::Key::from(secret)),
        prm: Default::default(),
    };
    jwk.prm.alg = Some(Algorithm::Signing(Signing::Es256));
    jwk
}
