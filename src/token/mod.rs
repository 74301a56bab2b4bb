//! Signed password-reset claims.
//!
//! Compact token form `header.claims.signature`, base64url-unpadded JSON,
//! signed with HMAC-SHA256 under the service secret. The claim authorizes a
//! single password-reset attempt: `sub` names the user, `jti` carries the
//! one-shot reset token that is checked against the pending reset recorded
//! for that user, and `exp` bounds the claim itself.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const ALG: &str = "HS256";
const TYP: &str = "JWT";

/// Issuer stamped into every claim this service signs or accepts.
pub const ISSUER: &str = "retejo";

/// HMAC key for reset claims, kept behind [`SecretString`] so it never
/// shows up in debug output.
#[derive(Clone)]
pub struct TokenKey(SecretString);

impl TokenKey {
    #[must_use]
    pub fn new(secret: SecretString) -> Self {
        Self(secret)
    }

    fn mac(&self) -> Result<HmacSha256, Error> {
        HmacSha256::new_from_slice(self.0.expose_secret().as_bytes())
            .map_err(|_| Error::InvalidKey)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct Header {
    alg: String,
    typ: String,
}

impl Header {
    fn hs256() -> Self {
        Self {
            alg: ALG.to_string(),
            typ: TYP.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResetClaims {
    pub iss: String,
    /// User id the reset applies to.
    pub sub: String,
    /// One-shot reset token, matched against the user's pending reset.
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("invalid signing key")]
    InvalidKey,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid issuer")]
    InvalidIssuer,
    #[error("token expired")]
    Expired,
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, Error> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, Error> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| Error::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Create a signed reset claim.
///
/// # Errors
///
/// Returns an error if the key is unusable or the claim cannot be encoded.
pub fn sign(key: &TokenKey, claims: &ResetClaims) -> Result<String, Error> {
    let header_b64 = b64e_json(&Header::hs256())?;
    let claims_b64 = b64e_json(claims)?;
    let signing_input = format!("{header_b64}.{claims_b64}");

    let mut mac = key.mac()?;
    mac.update(signing_input.as_bytes());
    let signature = mac.finalize().into_bytes();
    let signature_b64 = Base64UrlUnpadded::encode_string(&signature);

    Ok(format!("{signing_input}.{signature_b64}"))
}

/// Verify a reset claim and return its decoded payload.
///
/// # Errors
///
/// Returns an error if:
/// - the token is malformed or contains invalid base64/json,
/// - the algorithm is not HS256,
/// - the signature does not verify under `key`,
/// - the claims fail validation (`iss`, `exp`).
pub fn parse(key: &TokenKey, token: &str, now_unix_seconds: i64) -> Result<ResetClaims, Error> {
    let mut parts = token.split('.');
    let header_b64 = parts.next().ok_or(Error::TokenFormat)?;
    let claims_b64 = parts.next().ok_or(Error::TokenFormat)?;
    let sig_b64 = parts.next().ok_or(Error::TokenFormat)?;
    if parts.next().is_some() {
        return Err(Error::TokenFormat);
    }

    let header: Header = b64d_json(header_b64)?;
    if header.alg != ALG {
        return Err(Error::UnsupportedAlg(header.alg));
    }

    let signature = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| Error::Base64)?;
    let mut mac = key.mac()?;
    mac.update(format!("{header_b64}.{claims_b64}").as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| Error::InvalidSignature)?;

    let claims: ResetClaims = b64d_json(claims_b64)?;
    if claims.iss != ISSUER {
        return Err(Error::InvalidIssuer);
    }
    if claims.exp <= now_unix_seconds {
        return Err(Error::Expired);
    }

    Ok(claims)
}

/// Seconds since the Unix epoch.
#[must_use]
pub fn now_unix_seconds() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
}
