use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use signature::Signer;
use smol_str::SmolStr;

use super::{Header, jwt::Claims};
use crate::keys::PrivateKey;

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum SigningError {
    #[error(transparent)]
    #[diagnostic(code(podauth::jose::serde))]
    Serde(#[from] serde_json::Error),
    #[error("signing failed: {0}")]
    #[diagnostic(code(podauth::jose::signature))]
    Signature(#[from] signature::Error),
}

/// Produce a compact JWS (`header.payload.signature`) over `claims`.
///
/// ECDSA signatures are encoded as fixed-width `r || s`, as JWS requires.
pub fn create_signed_jwt(
    key: &PrivateKey,
    header: Header,
    claims: Claims,
) -> Result<SmolStr, SigningError> {
    let header = URL_SAFE_NO_PAD.encode(serde_json::to_string(&header)?);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_string(&claims)?);
    let signing_input = format!("{header}.{payload}");
    let signature = match key {
        PrivateKey::Es256(key) => {
            let signature: p256::ecdsa::Signature = key.try_sign(signing_input.as_bytes())?;
            URL_SAFE_NO_PAD.encode(signature.to_bytes())
        }
        PrivateKey::Es384(key) => {
            let signature: p384::ecdsa::Signature = key.try_sign(signing_input.as_bytes())?;
            URL_SAFE_NO_PAD.encode(signature.to_bytes())
        }
    };
    Ok(format!("{signing_input}.{signature}").into())
}
