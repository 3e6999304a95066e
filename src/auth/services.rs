use std::sync::Arc;

use anyhow::Context;
use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::{
    jwt::JwtKeys,
    password::{hash_password, verify_password},
    repo::UserRepo,
    repo_types::User,
};
use crate::error::{AppError, AppResult};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Credential checks and token issuance on top of a [`UserRepo`].
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepo>,
    keys: JwtKeys,
    // Verified against when the email is unknown, so both failure paths pay
    // for one argon2 verification.
    dummy_hash: Arc<str>,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserRepo>, keys: JwtKeys) -> anyhow::Result<Self> {
        let dummy_hash = hash_password(&Uuid::new_v4().to_string()).context("hash dummy password")?;
        Ok(Self {
            users,
            keys,
            dummy_hash: dummy_hash.into(),
        })
    }

    /// Returns `None` for an unknown email and for a wrong password alike.
    pub async fn authenticate(&self, email: &str, password: &str) -> AppResult<Option<User>> {
        let found = self.users.find_by_email(email).await.map_err(|e| {
            error!(error = %e, "find_by_email failed");
            AppError::Internal(e)
        })?;

        let Some(user) = found else {
            let _ = verify_password(password, &self.dummy_hash);
            warn!(%email, "login unknown email");
            return Ok(None);
        };

        match verify_password(password, &user.password_hash) {
            Ok(true) => Ok(Some(user)),
            Ok(false) => {
                warn!(%email, "login invalid password");
                Ok(None)
            }
            Err(e) => {
                // Parsing failed before any hashing; pay for one anyway.
                let _ = verify_password(password, &self.dummy_hash);
                error!(error = %e, %email, "stored password hash unreadable");
                Ok(None)
            }
        }
    }

    pub fn issue_token(&self, user: &User) -> AppResult<String> {
        self.keys.sign(user).map_err(|e| {
            error!(error = %e, "jwt sign failed");
            AppError::Internal(e)
        })
    }

    /// Check-then-put: two concurrent registrations of one email can both pass.
    pub async fn register(&self, email: &str, password: &str, name: &str) -> AppResult<User> {
        let existing = self.users.find_by_email(email).await.map_err(|e| {
            error!(error = %e, "find_by_email failed");
            AppError::Internal(e)
        })?;
        if existing.is_some() {
            warn!(%email, "email already registered");
            return Err(AppError::Conflict("User already exists".into()));
        }

        let password_hash = hash_password(password)?;
        let user = User {
            email: email.to_string(),
            name: name.to_string(),
            password_hash,
            created_at: OffsetDateTime::now_utc(),
        };

        self.users.create(&user).await.map_err(|e| {
            error!(error = %e, "create user failed");
            AppError::Internal(e)
        })?;

        info!(email = %user.email, "user registered");
        Ok(user)
    }
}
