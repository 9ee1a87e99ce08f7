//! Account operations, independent of the HTTP layer.

use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use time::{Duration, OffsetDateTime};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{AuthResponse, PublicUser},
        error::AuthError,
        jwt::JwtKeys,
        password::{hash_password, verify_password},
        repo::UserRepo,
        repo_types::{NewUser, User},
        reset_token,
    },
    mail::{templates, Mailer},
    state::AppState,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn session_for(state: &AppState, user: User) -> Result<AuthResponse, AuthError> {
    let token = JwtKeys::from_ref(state).sign(user.id)?;
    Ok(AuthResponse {
        user: user.into(),
        token,
    })
}

pub async fn register(
    state: &AppState,
    name: &str,
    email: &str,
    password: &str,
) -> Result<AuthResponse, AuthError> {
    let name = name.trim();
    let email = normalize_email(email);

    if name.is_empty() {
        return Err(AuthError::Validation("Name is required"));
    }
    if !is_valid_email(&email) {
        warn!(%email, "invalid email");
        return Err(AuthError::Validation("Invalid email"));
    }
    if password.is_empty() {
        return Err(AuthError::Validation("Password is required"));
    }

    if state.users.find_by_email(&email).await?.is_some() {
        warn!(%email, "email already registered");
        return Err(AuthError::UserExists);
    }

    let hash = hash_password(password.to_string()).await?;
    let user = state
        .users
        .create(NewUser {
            name,
            email: &email,
            password_hash: &hash,
        })
        .await?
        // Lost a race with a concurrent registration of the same email.
        .ok_or(AuthError::UserExists)?;

    info!(user_id = %user.id, email = %user.email, "user registered");

    if let Some(admin) = &state.config.mail.admin_email {
        state
            .notifications
            .enqueue(templates::admin_new_user(admin, &user.name, &user.email));
    }
    state
        .notifications
        .enqueue(templates::welcome(&user.name, &user.email));

    session_for(state, user)
}

pub async fn login(
    state: &AppState,
    email: &str,
    password: &str,
) -> Result<AuthResponse, AuthError> {
    let email = normalize_email(email);

    let Some(user) = state.users.find_by_email(&email).await? else {
        warn!(%email, "login unknown email");
        return Err(AuthError::InvalidCredentials);
    };

    if !verify_password(password.to_string(), user.password_hash.clone()).await? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AuthError::InvalidCredentials);
    }

    info!(user_id = %user.id, "user logged in");
    session_for(state, user)
}

pub async fn get_profile(state: &AppState, id: Uuid) -> Result<PublicUser, AuthError> {
    state
        .users
        .find_by_id(id)
        .await?
        .map(PublicUser::from)
        .ok_or(AuthError::UserNotFound)
}

/// Issue a reset token and email its link. If the email cannot be delivered
/// the token is revoked again; a failed revoke is only logged.
pub async fn request_password_reset(state: &AppState, email: &str) -> Result<(), AuthError> {
    let email = normalize_email(email);
    let user = state
        .users
        .find_by_email(&email)
        .await?
        .ok_or(AuthError::EmailNotFound)?;

    let ttl = Duration::minutes(state.config.reset_token_ttl_minutes);
    let token =
        reset_token::issue(state.users.as_ref(), &user, OffsetDateTime::now_utc(), ttl).await?;

    let url = templates::reset_url(&state.config.frontend_url, &token);
    if let Err(e) = state
        .mailer
        .send(&templates::password_reset(&user.email, &url))
        .await
    {
        error!(error = %e, user_id = %user.id, "reset email failed, revoking token");
        if let Err(e) = reset_token::revoke(state.users.as_ref(), &user).await {
            // The stored token stays valid until it expires.
            error!(error = ?e, user_id = %user.id, "failed to revoke reset token");
        }
        return Err(AuthError::EmailDelivery);
    }

    info!(user_id = %user.id, "reset email sent");
    Ok(())
}

pub async fn complete_password_reset(
    state: &AppState,
    token: &str,
    new_password: &str,
) -> Result<(), AuthError> {
    if new_password.is_empty() {
        return Err(AuthError::Validation("Password is required"));
    }

    let user = reset_token::consume(state.users.as_ref(), token, OffsetDateTime::now_utc())
        .await?
        .ok_or(AuthError::InvalidResetToken)?;

    let hash = hash_password(new_password.to_string()).await?;
    // A concurrent reset with the same token may have won in the meantime.
    if !state
        .users
        .update_password(user.id, &reset_token::digest(token), &hash)
        .await?
    {
        warn!(user_id = %user.id, "reset token used concurrently");
        return Err(AuthError::InvalidResetToken);
    }

    info!(user_id = %user.id, "password reset");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::auth::repo::MemoryUserRepo;
    use crate::auth::repo_types::PendingReset;
    use crate::mail::RecordingMailer;
    use crate::state::testing;

    fn token_from_link(text: &str) -> String {
        text.rsplit('/').next().unwrap().to_string()
    }

    #[test]
    fn email_format() {
        assert!(is_valid_email("a@x.com"));
        assert!(!is_valid_email("a@x"));
        assert!(!is_valid_email("no spaces@x.com"));
        assert!(!is_valid_email(""));
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let fake = testing::fake();
        register(&fake.state, "Alice", "a@x.com", "pw123").await.unwrap();

        let err = register(&fake.state, "Alice 2", " A@X.com ", "other")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UserExists));
        assert_eq!(err.to_string(), "User already exists");
        assert_eq!(fake.users.len(), 1);
    }

    #[tokio::test]
    async fn register_returns_usable_token_and_notifies() {
        let fake = testing::fake();
        let res = register(&fake.state, "Alice", "a@x.com", "pw123").await.unwrap();
        assert_eq!(res.user.email, "a@x.com");

        let claims = JwtKeys::from_ref(&fake.state).verify(&res.token).unwrap();
        assert_eq!(claims.sub, res.user.id);

        let sent = fake.mailer.wait_for(2).await;
        assert_eq!(sent[0].to, "admin@example.com");
        assert_eq!(sent[1].to, "a@x.com");
    }

    #[tokio::test]
    async fn register_succeeds_when_notifications_fail() {
        let fake = testing::fake();
        fake.mailer.set_failing(true);
        let res = register(&fake.state, "Alice", "a@x.com", "pw123").await;
        assert!(res.is_ok());
        assert_eq!(fake.users.len(), 1);
    }

    #[tokio::test]
    async fn register_validates_body() {
        let fake = testing::fake();
        let cases = [("", "a@x.com", "pw"), ("A", "nope", "pw"), ("A", "a@x.com", "")];
        for (name, email, password) in cases {
            let err = register(&fake.state, name, email, password)
                .await
                .unwrap_err();
            assert!(matches!(err, AuthError::Validation(_)));
        }
        assert_eq!(fake.users.len(), 0);
    }

    #[tokio::test]
    async fn login_checks_password() {
        let fake = testing::fake();
        register(&fake.state, "Alice", "a@x.com", "pw123").await.unwrap();

        let ok = login(&fake.state, "a@x.com", "pw123").await.unwrap();
        assert!(JwtKeys::from_ref(&fake.state).verify(&ok.token).is_ok());

        let bad = login(&fake.state, "a@x.com", "wrong").await.unwrap_err();
        assert!(matches!(bad, AuthError::InvalidCredentials));

        let unknown = login(&fake.state, "b@x.com", "pw123").await.unwrap_err();
        assert!(matches!(unknown, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn profile_lookup() {
        let fake = testing::fake();
        let res = register(&fake.state, "Alice", "a@x.com", "pw123").await.unwrap();

        let profile = get_profile(&fake.state, res.user.id).await.unwrap();
        assert_eq!(profile, res.user);

        let missing = get_profile(&fake.state, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(missing, AuthError::UserNotFound));
    }

    #[tokio::test]
    async fn reset_flow_changes_password_once() {
        let fake = testing::fake_with(testing::config(None));
        register(&fake.state, "Alice", "a@x.com", "pw123").await.unwrap();
        // Welcome email.
        fake.mailer.wait_for(1).await;

        request_password_reset(&fake.state, "a@x.com").await.unwrap();
        let sent = fake.mailer.sent();
        let reset = sent.last().unwrap();
        assert_eq!(reset.subject, "Password Reset");
        assert!(reset.text.contains("http://localhost:5173/reset-password/"));
        let token = token_from_link(&reset.text);

        complete_password_reset(&fake.state, &token, "new-pw").await.unwrap();
        assert!(login(&fake.state, "a@x.com", "new-pw").await.is_ok());
        assert!(login(&fake.state, "a@x.com", "pw123").await.is_err());

        let replay = complete_password_reset(&fake.state, &token, "again")
            .await
            .unwrap_err();
        assert!(matches!(replay, AuthError::InvalidResetToken));
    }

    #[tokio::test]
    async fn wrong_token_leaves_pending_token_usable() {
        let fake = testing::fake_with(testing::config(None));
        register(&fake.state, "Alice", "a@x.com", "pw123").await.unwrap();
        fake.mailer.wait_for(1).await;
        request_password_reset(&fake.state, "a@x.com").await.unwrap();
        let token = token_from_link(&fake.mailer.sent().last().unwrap().text);

        let err = complete_password_reset(&fake.state, "deadbeef", "x")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidResetToken));
        assert!(complete_password_reset(&fake.state, &token, "new-pw").await.is_ok());
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let fake = testing::fake();
        let res = register(&fake.state, "Alice", "a@x.com", "pw123").await.unwrap();
        let user = fake.users.find_by_id(res.user.id).await.unwrap().unwrap();

        let issued_at = OffsetDateTime::now_utc() - Duration::minutes(11);
        let token =
            reset_token::issue(fake.users.as_ref(), &user, issued_at, Duration::minutes(10))
                .await
                .unwrap();

        let err = complete_password_reset(&fake.state, &token, "new-pw")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidResetToken));
    }

    #[tokio::test]
    async fn failed_reset_email_clears_token() {
        let fake = testing::fake_with(testing::config(None));
        let res = register(&fake.state, "Alice", "a@x.com", "pw123").await.unwrap();
        fake.mailer.wait_for(1).await;

        fake.mailer.set_failing(true);
        let err = request_password_reset(&fake.state, "a@x.com").await.unwrap_err();
        assert!(matches!(err, AuthError::EmailDelivery));
        let user = fake.users.find_by_id(res.user.id).await.unwrap().unwrap();
        assert!(user.reset_password_token.is_none());
        assert!(user.reset_password_expire.is_none());

        fake.mailer.set_failing(false);
        request_password_reset(&fake.state, "a@x.com").await.unwrap();
        let user = fake.users.find_by_id(res.user.id).await.unwrap().unwrap();
        assert!(user.reset_password_token.is_some());
        assert!(user.reset_password_expire.is_some());
    }

    #[tokio::test]
    async fn reset_for_unknown_email() {
        let fake = testing::fake();
        let err = request_password_reset(&fake.state, "ghost@x.com")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::EmailNotFound));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_resets_with_one_token_succeed_once() {
        let fake = testing::fake_with(testing::config(None));
        register(&fake.state, "Alice", "a@x.com", "pw123").await.unwrap();
        fake.mailer.wait_for(1).await;
        request_password_reset(&fake.state, "a@x.com").await.unwrap();
        let token = token_from_link(&fake.mailer.sent().last().unwrap().text);

        let (a, b) = tokio::join!(
            complete_password_reset(&fake.state, &token, "first-pw"),
            complete_password_reset(&fake.state, &token, "second-pw"),
        );
        let (winner, loser) = match (a, b) {
            (Ok(()), Err(e)) => ("first-pw", e),
            (Err(e), Ok(())) => ("second-pw", e),
            other => panic!("expected exactly one reset to succeed: {other:?}"),
        };
        assert!(matches!(loser, AuthError::InvalidResetToken));
        assert!(login(&fake.state, "a@x.com", winner).await.is_ok());
    }

    /// Memory store whose reset tokens cannot be cleared.
    #[derive(Default)]
    struct StickyTokens(MemoryUserRepo);

    #[async_trait::async_trait]
    impl UserRepo for StickyTokens {
        async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
            self.0.find_by_email(email).await
        }

        async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
            self.0.find_by_id(id).await
        }

        async fn create(&self, new: NewUser<'_>) -> anyhow::Result<Option<User>> {
            self.0.create(new).await
        }

        async fn set_reset_token(
            &self,
            id: Uuid,
            reset: Option<&PendingReset>,
        ) -> anyhow::Result<()> {
            match reset {
                Some(_) => self.0.set_reset_token(id, reset).await,
                None => anyhow::bail!("database unavailable"),
            }
        }

        async fn find_by_reset_token(
            &self,
            token_hash: &str,
            now: OffsetDateTime,
        ) -> anyhow::Result<Option<User>> {
            self.0.find_by_reset_token(token_hash, now).await
        }

        async fn update_password(
            &self,
            id: Uuid,
            token_hash: &str,
            password_hash: &str,
        ) -> anyhow::Result<bool> {
            self.0.update_password(id, token_hash, password_hash).await
        }
    }

    #[tokio::test]
    async fn failed_revoke_still_reports_delivery_failure() {
        let users = Arc::new(StickyTokens::default());
        let mailer = Arc::new(RecordingMailer::default());
        let state = AppState::from_parts(
            Arc::new(testing::config(None)),
            users.clone(),
            mailer.clone(),
        );
        let res = register(&state, "Alice", "a@x.com", "pw123").await.unwrap();
        mailer.wait_for(1).await;

        mailer.set_failing(true);
        let err = request_password_reset(&state, "a@x.com").await.unwrap_err();
        assert!(matches!(err, AuthError::EmailDelivery));
        assert_eq!(err.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);

        let user = users.find_by_id(res.user.id).await.unwrap().unwrap();
        assert!(user.reset_password_token.is_some());
    }
}
