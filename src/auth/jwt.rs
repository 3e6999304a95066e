use std::time::Duration;

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use crate::{auth::claims::Claims, auth::repo_types::User, config::JwtConfig};

/// Longest accepted token lifetime: one year.
pub const MAX_TTL_MINUTES: i64 = 525_600;

/// Holds JWT signing and verification keys.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    pub ttl: Duration,
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            ttl: Duration::from_secs(cfg.ttl_minutes.clamp(1, MAX_TTL_MINUTES) as u64 * 60),
        }
    }

    pub fn sign(&self, user: &User) -> anyhow::Result<String> {
        self.sign_at(user, OffsetDateTime::now_utc())
    }

    pub(crate) fn sign_at(&self, user: &User, issued_at: OffsetDateTime) -> anyhow::Result<String> {
        let exp = issued_at + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = Claims {
            email: user.email.clone(),
            sub: user.email.clone(),
            name: user.name.clone(),
            iat: issued_at.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        debug!(email = %user.email, "jwt signed");
        Ok(token)
    }

    /// Checks signature and expiry.
    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(email = %data.claims.email, "jwt verified");
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys(secret: &str) -> JwtKeys {
        JwtKeys::from_config(&JwtConfig {
            secret: secret.into(),
            ttl_minutes: 60,
        })
    }

    fn user() -> User {
        User {
            email: "ada@example.com".into(),
            name: "Ada".into(),
            password_hash: String::new(),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn sign_and_verify_carries_identity_claims() {
        let keys = make_keys("dev-secret");
        let token = keys.sign(&user()).expect("sign");
        let claims = keys.verify(&token).expect("verify");
        assert_eq!(claims.email, "ada@example.com");
        assert_eq!(claims.sub, "ada@example.com");
        assert_eq!(claims.name, "Ada");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn token_accepted_before_expiry_and_rejected_after() {
        let keys = make_keys("dev-secret");

        let fresh = keys
            .sign_at(&user(), OffsetDateTime::now_utc() - TimeDuration::minutes(59))
            .unwrap();
        assert!(keys.verify(&fresh).is_ok());

        let stale = keys
            .sign_at(&user(), OffsetDateTime::now_utc() - TimeDuration::hours(2))
            .unwrap();
        assert!(keys.verify(&stale).is_err());
    }

    #[test]
    fn verify_rejects_foreign_signature() {
        let token = make_keys("secret-a").sign(&user()).unwrap();
        assert!(make_keys("secret-b").verify(&token).is_err());
    }

    #[test]
    fn out_of_range_ttl_is_clamped() {
        let huge = JwtKeys::from_config(&JwtConfig {
            secret: "dev-secret".into(),
            ttl_minutes: i64::MAX,
        });
        assert_eq!(huge.ttl, Duration::from_secs(MAX_TTL_MINUTES as u64 * 60));
        let token = huge.sign(&user()).unwrap();
        assert!(huge.verify(&token).is_ok());

        let negative = JwtKeys::from_config(&JwtConfig {
            secret: "dev-secret".into(),
            ttl_minutes: -5,
        });
        assert_eq!(negative.ttl, Duration::from_secs(60));
    }

    #[test]
    fn verify_rejects_garbage() {
        let keys = make_keys("dev-secret");
        assert!(keys.verify("not.a.jwt").is_err());
        assert!(keys.verify("").is_err());
    }
}
