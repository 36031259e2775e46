use miette::Diagnostic;
use smol_str::SmolStr;
use thiserror::Error;

/// A configuration object or endpoint needed by an operation is absent.
///
/// Always raised before any network traffic.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum ConfigError {
    /// A whole configuration object is missing
    #[error("[{operation}] {config} configuration is required to {purpose}")]
    #[diagnostic(
        code(podauth::config::missing),
        help("construct the service with the named configuration")
    )]
    Missing {
        config: &'static str,
        operation: &'static str,
        purpose: &'static str,
    },
    /// The configuration exists but does not define the endpoint
    #[error("[{operation}] {config} configuration has no {endpoint} endpoint")]
    #[diagnostic(
        code(podauth::config::endpoint),
        help("set the corresponding path (or redirect endpoint) on the configuration")
    )]
    MissingEndpoint {
        config: &'static str,
        endpoint: &'static str,
        operation: &'static str,
    },
}

impl ConfigError {
    pub fn missing(config: &'static str, operation: &'static str, purpose: &'static str) -> Self {
        Self::Missing {
            config,
            operation,
            purpose,
        }
    }

    pub fn missing_endpoint(
        config: &'static str,
        endpoint: &'static str,
        operation: &'static str,
    ) -> Self {
        Self::MissingEndpoint {
            config,
            endpoint,
            operation,
        }
    }
}

/// Errors emitted while importing or projecting key material.
#[derive(Debug, Error, Diagnostic)]
pub enum KeyError {
    /// The JWK JSON does not have the expected structure
    #[error("invalid JWK: {0}")]
    #[diagnostic(
        code(podauth::jwk::malformed),
        help("expected an EC (P-256/P-384) private JWK with base64url x, y and d values")
    )]
    Malformed(#[from] serde_json::Error),
    /// The key carries no `alg`
    #[error("JWK has no `alg`; refusing to guess the signing algorithm")]
    #[diagnostic(code(podauth::jwk::missing_alg), help("set `alg` (e.g. ES256) on the stored key"))]
    MissingAlgorithm,
    /// `alg` names something we cannot sign with
    #[error("unsupported signing algorithm `{0}`")]
    #[diagnostic(code(podauth::jwk::unsupported_alg), help("supported algorithms: ES256, ES384"))]
    UnsupportedAlgorithm(SmolStr),
    /// `alg` and the key's curve disagree
    #[error("algorithm `{alg}` cannot be used with this key type")]
    #[diagnostic(code(podauth::jwk::alg_mismatch))]
    AlgorithmMismatch { alg: SmolStr },
    /// Only the public half was supplied
    #[error("JWK has no private component")]
    #[diagnostic(code(podauth::jwk::not_private))]
    NotPrivate,
    /// Symmetric keys have no public projection
    #[error("symmetric (`oct`) keys have no public projection")]
    #[diagnostic(code(podauth::jwk::symmetric))]
    Symmetric,
    /// `x`/`y` do not belong to `d`
    #[error("public coordinates do not match the private key")]
    #[diagnostic(code(podauth::jwk::public_mismatch))]
    PublicMismatch,
    /// The underlying crypto library rejected the key
    #[error("crypto error: {0}")]
    #[diagnostic(code(podauth::jwk::crypto))]
    Crypto(SmolStr),
}

pub type Result<T> = core::result::Result<T, KeyError>;
