//! User store: the password-reset operation and password hashing.

use async_trait::async_trait;
use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::Hmac;
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use sqlx::{PgPool, Row};
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

const PBKDF2_SCHEME: &str = "pbkdf2-sha256";
const PBKDF2_ROUNDS: u32 = 100_000;
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

/// Outcome of a reset attempt, one variant per expected domain condition.
#[derive(Debug, Error)]
pub enum ResetPasswordError {
    #[error("no such user")]
    NoSuchUser,
    #[error("reset token does not match a pending reset")]
    InvalidToken,
    #[error("reset token expired")]
    Expired,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Applies password resets. Injected into the handler at construction time.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Consume the user's pending reset token and set a new password.
    ///
    /// The attempt is all-or-nothing: on success the password hash is
    /// replaced and the pending reset is cleared in one statement.
    async fn reset_password(
        &self,
        user_id: Uuid,
        reset_token: &str,
        new_password: &str,
        now_unix_seconds: i64,
    ) -> Result<(), ResetPasswordError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn reset_password(
        &self,
        user_id: Uuid,
        reset_token: &str,
        new_password: &str,
        now_unix_seconds: i64,
    ) -> Result<(), ResetPasswordError> {
        let query = "SELECT reset_token_hash, reset_token_expires_at FROM users WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?
            .ok_or(ResetPasswordError::NoSuchUser)?;

        let stored_hash: Option<Vec<u8>> = row.get("reset_token_hash");
        let expires_at: Option<i64> = row.get("reset_token_expires_at");

        let stored_hash = stored_hash.ok_or(ResetPasswordError::InvalidToken)?;
        if stored_hash != hash_reset_token(reset_token) {
            return Err(ResetPasswordError::InvalidToken);
        }
        let expires_at = expires_at.ok_or(ResetPasswordError::InvalidToken)?;
        if expires_at <= now_unix_seconds {
            return Err(ResetPasswordError::Expired);
        }

        let password_hash = hash_password(new_password);
        let query = r"
            UPDATE users
            SET password_hash = $2,
                reset_token_hash = NULL,
                reset_token_expires_at = NULL
            WHERE id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(user_id)
            .bind(password_hash)
            .execute(&self.pool)
            .instrument(span)
            .await?;

        Ok(())
    }
}

/// Hash a reset token for storage and comparison; the raw token only ever
/// travels inside the signed claim.
#[must_use]
pub fn hash_reset_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

/// Derive a salted PBKDF2-HMAC-SHA256 password hash.
///
/// Encoded as `pbkdf2-sha256$rounds$salt$hash` with base64url fields.
#[must_use]
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let derived = derive(password, &salt, PBKDF2_ROUNDS);
    format!(
        "{PBKDF2_SCHEME}${PBKDF2_ROUNDS}${}${}",
        Base64UrlUnpadded::encode_string(&salt),
        Base64UrlUnpadded::encode_string(&derived)
    )
}

/// Check a candidate password against a stored hash string.
#[must_use]
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut fields = stored.split('$');
    let (Some(scheme), Some(rounds), Some(salt_b64), Some(hash_b64), None) = (
        fields.next(),
        fields.next(),
        fields.next(),
        fields.next(),
        fields.next(),
    ) else {
        return false;
    };
    if scheme != PBKDF2_SCHEME {
        return false;
    }
    let Ok(rounds) = rounds.parse::<u32>() else {
        return false;
    };
    let (Ok(salt), Ok(hash)) = (
        Base64UrlUnpadded::decode_vec(salt_b64),
        Base64UrlUnpadded::decode_vec(hash_b64),
    ) else {
        return false;
    };
    derive(password, &salt, rounds).to_vec() == hash
}

fn derive(password: &str, salt: &[u8], rounds: u32) -> [u8; HASH_LEN] {
    let mut out = [0u8; HASH_LEN];
    pbkdf2::pbkdf2::<Hmac<Sha256>>(password.as_bytes(), salt, rounds, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_round_trip() {
        let stored = hash_password("correct horse");
        assert!(stored.starts_with("pbkdf2-sha256$"));
        assert!(verify_password("correct horse", &stored));
        assert!(!verify_password("wrong horse", &stored));
    }

    #[test]
    fn password_hashes_are_salted() {
        assert_ne!(hash_password("same"), hash_password("same"));
    }

    #[test]
    fn verify_rejects_malformed_hashes() {
        assert!(!verify_password("x", "not-a-hash"));
        assert!(!verify_password("x", "md5$1$a$b"));
        assert!(!verify_password("x", "pbkdf2-sha256$nan$a$b"));
    }

    #[test]
    fn reset_token_hash_is_stable() {
        assert_eq!(hash_reset_token("tok"), hash_reset_token("tok"));
        assert_ne!(hash_reset_token("tok"), hash_reset_token("tok2"));
    }
}
