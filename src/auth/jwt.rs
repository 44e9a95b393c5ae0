use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use super::claims::{Claims, SessionUser};
use crate::{config::JwtConfig, state::AppState};

/// Signing and verification keys plus token lifetimes.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub session_ttl: Duration,
    pub remember_ttl: Duration,
}

impl From<&JwtConfig> for JwtKeys {
    fn from(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            session_ttl: Duration::from_secs((cfg.ttl_minutes.max(1) as u64) * 60),
            remember_ttl: Duration::from_secs((cfg.remember_ttl_minutes.max(1) as u64) * 60),
        }
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.as_ref().clone()
    }
}

impl JwtKeys {
    /// Issues a session token; `remember` selects the long lifetime.
    pub fn issue(&self, user_id: Uuid, name: &str, remember: bool) -> anyhow::Result<String> {
        self.issue_at(user_id, name, remember, OffsetDateTime::now_utc())
    }

    pub(crate) fn issue_at(
        &self,
        user_id: Uuid,
        name: &str,
        remember: bool,
        now: OffsetDateTime,
    ) -> anyhow::Result<String> {
        let ttl = if remember {
            self.remember_ttl
        } else {
            self.session_ttl
        };
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            name: name.to_string(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, remember, "jwt signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<SessionUser> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.sub, "jwt verified");
        Ok(data.claims.into())
    }

    /// Like [`JwtKeys::verify`] but swallows every failure.
    pub fn try_verify(&self, token: &str) -> Option<SessionUser> {
        self.verify(token).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn make_keys(secret: &str, issuer: &str, audience: &str) -> JwtKeys {
        let mut cfg = AppConfig::for_tests().jwt;
        cfg.secret = secret.into();
        cfg.issuer = issuer.into();
        cfg.audience = audience.into();
        JwtKeys::from(&cfg)
    }

    #[test]
    fn sign_and_verify_session_token() {
        let keys = make_keys("dev-secret", "test-issuer", "test-aud");
        let user_id = Uuid::new_v4();
        let token = keys.issue(user_id, "alice", false).expect("issue");
        let user = keys.verify(&token).expect("verify token");
        assert_eq!(user.id, user_id);
        assert_eq!(user.name, "alice");
    }

    #[test]
    fn short_session_expires_after_an_hour() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let issued = OffsetDateTime::now_utc() - TimeDuration::minutes(61);
        let token = keys
            .issue_at(Uuid::new_v4(), "bob", false, issued)
            .expect("issue");
        assert!(keys.verify(&token).is_err());
        assert!(keys.try_verify(&token).is_none());
    }

    #[test]
    fn remembered_session_survives_six_days() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let issued = OffsetDateTime::now_utc() - TimeDuration::days(6);
        let token = keys
            .issue_at(Uuid::new_v4(), "bob", true, issued)
            .expect("issue");
        assert!(keys.verify(&token).is_ok());

        let stale = OffsetDateTime::now_utc() - TimeDuration::days(7) - TimeDuration::minutes(1);
        let token = keys
            .issue_at(Uuid::new_v4(), "bob", true, stale)
            .expect("issue");
        assert!(keys.verify(&token).is_err());
    }

    #[test]
    fn verify_rejects_wrong_secret() {
        let good = make_keys("secret-a", "iss", "aud");
        let bad = make_keys("secret-b", "iss", "aud");
        let token = good.issue(Uuid::new_v4(), "carol", false).unwrap();
        assert!(bad.verify(&token).is_err());
    }

    #[test]
    fn verify_rejects_wrong_issuer_or_audience() {
        let good = make_keys("same-secret", "good-iss", "good-aud");
        let bad = make_keys("same-secret", "bad-iss", "bad-aud");
        let token = good.issue(Uuid::new_v4(), "dave", false).unwrap();
        assert!(bad.verify(&token).is_err());
    }

    #[test]
    fn try_verify_handles_garbage() {
        let keys = make_keys("dev-secret", "iss", "aud");
        assert!(keys.try_verify("").is_none());
        assert!(keys.try_verify("not.a.jwt").is_none());
    }
}
