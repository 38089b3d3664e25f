//! Session authority: password hashing, session tokens and the password
//! reset flow.
//!
//! Session and reset tokens are 32 random bytes, hex encoded. Reset tokens
//! only ever leave the service URL-safe base64 encoded inside the reset link.

use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use chrono::{Duration, Utc};
use serde_json::json;
use tracing::{info, warn};

use sprout_db::Database;
use sprout_db::models::UserRow;
use sprout_types::models::User;

use crate::blocking;
use crate::error::{Error, Result};
use crate::mail::EmailSender;
use crate::templates::{RESET_PW_EMAIL, TemplateRenderer};

pub const RESET_EMAIL_SUBJECT: &str = "Sprout Password Reset Request";

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub session_ttl: Duration,
    pub reset_ttl: Duration,
    /// Page the reset link points at; the encoded token is appended as `?token=`.
    pub reset_link_base: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl: Duration::hours(1),
            reset_ttl: Duration::hours(1),
            reset_link_base: "http://localhost:8080/pw/change".to_string(),
        }
    }
}

pub struct SessionAuthority {
    db: Arc<Database>,
    mailer: Arc<dyn EmailSender>,
    templates: Arc<dyn TemplateRenderer>,
    config: AuthConfig,
}

impl SessionAuthority {
    pub fn new(
        db: Arc<Database>,
        mailer: Arc<dyn EmailSender>,
        templates: Arc<dyn TemplateRenderer>,
        config: AuthConfig,
    ) -> Self {
        Self {
            db,
            mailer,
            templates,
            config,
        }
    }

    pub async fn create_user(&self, email: &str, password: &str, name: &str) -> Result<User> {
        if email.trim().is_empty() {
            return Err(Error::InvalidInput("email must not be empty"));
        }
        if password.is_empty() {
            return Err(Error::InvalidInput("password must not be empty"));
        }

        if self.find_user_by_email("create_user", email).await?.is_some() {
            return Err(Error::UserExists);
        }

        let pw_hash = hash_password(password.to_string()).await?;

        let db = self.db.clone();
        let (email, name) = (email.to_string(), name.to_string());
        let row = tokio::task::spawn_blocking(move || db.create_user(&email, &pw_hash, &name))
            .await?
            .map_err(|e| {
                // lost a race against a concurrent sign-up with the same email
                if sprout_db::is_constraint_violation(&e) {
                    Error::UserExists
                } else {
                    Error::Persistence { op: "create_user", source: e }
                }
            })?;

        info!(user_id = row.id, "user created");
        Ok(row.into())
    }

    /// Verify credentials and open a new session, closing every earlier one.
    pub async fn login(&self, email: &str, password: &str) -> Result<String> {
        let user = self
            .find_user_by_email("login", email)
            .await?
            .ok_or(Error::NoUser)?;

        if !verify_password(password.to_string(), user.pw_hash.clone()).await? {
            warn!(user_id = user.id, "login with invalid password");
            return Err(Error::InvalidPassword);
        }

        let token = new_token();
        let now = Utc::now();
        let expires_at = now + self.config.session_ttl;

        let db = self.db.clone();
        let session_token = token.clone();
        blocking("login", move || {
            db.start_session(user.id, &session_token, now, expires_at)
        })
        .await?;

        info!(user_id = user.id, %expires_at, "session started");
        Ok(token)
    }

    /// The authorization check for every authenticated request.
    pub async fn validate_token(&self, token: &str) -> Result<User> {
        let db = self.db.clone();
        let t = token.to_string();
        let session = blocking("validate_token", move || db.get_session(&t))
            .await?
            .ok_or(Error::InvalidToken)?;

        if Utc::now() > session.expires_at {
            return Err(Error::ExpiredToken);
        }

        let db = self.db.clone();
        let user = blocking("validate_token", move || db.get_user(session.user_id))
            .await?
            .ok_or(Error::InvalidToken)?;
        Ok(user.into())
    }

    /// End every session of the token's owner.
    pub async fn logout(&self, token: &str) -> Result<()> {
        let db = self.db.clone();
        let t = token.to_string();
        let session = blocking("logout", move || db.get_session(&t))
            .await?
            .ok_or(Error::InvalidToken)?;

        let db = self.db.clone();
        let removed = blocking("logout", move || db.delete_user_sessions(session.user_id)).await?;

        info!(user_id = session.user_id, removed, "user logged out");
        Ok(())
    }

    /// Issue a reset token and email the reset link. Fails with `NoUser` for
    /// unknown emails; callers facing the outside world should not surface it.
    pub async fn forgot_pw(&self, email: &str) -> Result<()> {
        let user = self
            .find_user_by_email("forgot_pw", email)
            .await?
            .ok_or(Error::NoUser)?;

        let token = new_token();
        let expires_at = Utc::now() + self.config.reset_ttl;

        let db = self.db.clone();
        let stored = token.clone();
        blocking("forgot_pw", move || {
            db.replace_pw_reset_token(user.id, &stored, expires_at)
        })
        .await?;

        let reset_link = format!(
            "{}?token={}",
            self.config.reset_link_base,
            URL_SAFE.encode(token.as_bytes())
        );
        let body = self
            .templates
            .render(
                RESET_PW_EMAIL,
                json!({ "username": user.name, "reset_link": reset_link }),
            )
            .map_err(Error::Template)?;

        self.mailer
            .send_email(&user.email, RESET_EMAIL_SUBJECT, &body)
            .await
            .map_err(Error::Email)?;

        info!(user_id = user.id, "password reset email dispatched");
        Ok(())
    }

    /// Decode and check a reset token, returning the id of its user.
    pub async fn validate_forgot_pw_token(&self, encoded: &str) -> Result<i64> {
        let token = URL_SAFE
            .decode(encoded)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .ok_or(Error::InvalidToken)?;

        let db = self.db.clone();
        let row = blocking("validate_forgot_pw_token", move || db.get_pw_reset_token(&token))
            .await?
            .ok_or(Error::InvalidToken)?;

        if Utc::now() > row.expires_at {
            return Err(Error::ExpiredToken);
        }
        Ok(row.user_id)
    }

    /// The user a reset token belongs to, for greeting them on the reset page.
    pub async fn reset_token_owner(&self, encoded: &str) -> Result<User> {
        let user_id = self.validate_forgot_pw_token(encoded).await?;
        let db = self.db.clone();
        blocking("reset_token_owner", move || db.get_user(user_id))
            .await?
            .map(User::from)
            .ok_or(Error::NoUser)
    }

    /// Set a new password through a reset token and burn the user's reset
    /// tokens. If only the burning fails, the new password still stands and
    /// the error is `ResetCleanup`.
    pub async fn change_pw(&self, encoded: &str, new_password: &str) -> Result<()> {
        if new_password.is_empty() {
            return Err(Error::InvalidInput("password must not be empty"));
        }

        let user_id = self.validate_forgot_pw_token(encoded).await?;
        let pw_hash = hash_password(new_password.to_string()).await?;

        let db = self.db.clone();
        let updated = blocking("change_pw", move || db.change_password(user_id, &pw_hash)).await?;
        if !updated {
            return Err(Error::NoUser);
        }
        info!(user_id, "password changed");

        let db = self.db.clone();
        tokio::task::spawn_blocking(move || db.delete_user_pw_reset_tokens(user_id))
            .await?
            .map_err(Error::ResetCleanup)?;
        Ok(())
    }

    async fn find_user_by_email(&self, op: &'static str, email: &str) -> Result<Option<UserRow>> {
        let db = self.db.clone();
        let email = email.to_string();
        blocking(op, move || db.get_user_by_email(&email)).await
    }
}

fn new_token() -> String {
    hex::encode(rand::random::<[u8; 32]>())
}

async fn hash_password(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| Error::PasswordHash(e.to_string()))
    })
    .await?
}

async fn verify_password(password: String, pw_hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&pw_hash).map_err(|e| Error::PasswordHash(e.to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    })
    .await?
}
