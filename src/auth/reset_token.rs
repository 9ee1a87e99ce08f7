//! Password reset tokens.
//!
//! The plaintext token only ever leaves the service inside the reset email;
//! the user record keeps its SHA-256 digest and an expiry instant.

use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};
use tracing::debug;

use crate::auth::{
    repo::UserRepo,
    repo_types::{PendingReset, User},
};

const TOKEN_BYTES: usize = 20;

/// Lowercase hex SHA-256 of a plaintext token.
pub fn digest(plaintext: &str) -> String {
    hex::encode(Sha256::digest(plaintext.as_bytes()))
}

/// Fresh random token and its digest.
pub fn generate() -> (String, String) {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    let plaintext = hex::encode(bytes);
    let hash = digest(&plaintext);
    (plaintext, hash)
}

/// Store a new token on `user`, valid until `now + ttl`, and return its plaintext.
///
/// Any token previously issued to the user is replaced.
pub async fn issue(
    repo: &dyn UserRepo,
    user: &User,
    now: OffsetDateTime,
    ttl: Duration,
) -> anyhow::Result<String> {
    let (plaintext, token_hash) = generate();
    let reset = PendingReset {
        token_hash,
        expires_at: now + ttl,
    };
    repo.set_reset_token(user.id, Some(&reset)).await?;
    debug!(user_id = %user.id, expires_at = %reset.expires_at, "reset token issued");
    Ok(plaintext)
}

/// Find the user a still-valid token was issued to.
///
/// Nothing is cleared here; the caller does that once the reset succeeds.
pub async fn consume(
    repo: &dyn UserRepo,
    plaintext: &str,
    now: OffsetDateTime,
) -> anyhow::Result<Option<User>> {
    repo.find_by_reset_token(&digest(plaintext), now).await
}

/// Drop whatever token is stored on the user.
pub async fn revoke(repo: &dyn UserRepo, user: &User) -> anyhow::Result<()> {
    repo.set_reset_token(user.id, None).await
}
