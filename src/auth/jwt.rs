use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use super::claims::Claims;
use crate::{
    config::{JwtConfig, MAX_TTL_MINUTES},
    state::AppState,
};

/// Why a presented token was refused. Callers must not tell the client which.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("invalid token")]
    Invalid,
    #[error("token expired")]
    Expired,
}

/// Holds JWT signing and verification keys with config data.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
}

impl JwtKeys {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: Duration::from_secs(cfg.ttl_minutes.clamp(1, MAX_TTL_MINUTES) as u64 * 60),
        }
    }

    pub fn sign(&self, user_id: Uuid) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, "jwt signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            }
        })?;
        debug!(user_id = %data.claims.sub, "jwt verified");
        Ok(data.claims)
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys(secret: &str) -> JwtKeys {
        JwtKeys::new(&JwtConfig {
            secret: secret.into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            ttl_minutes: 60,
        })
    }

    fn sign_expiring_at(keys: &JwtKeys, user_id: Uuid, exp: OffsetDateTime) -> String {
        let claims = Claims {
            sub: user_id,
            iat: (exp - TimeDuration::hours(1)).unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: keys.issuer.clone(),
            aud: keys.audience.clone(),
        };
        encode(&Header::default(), &claims, &keys.encoding).unwrap()
    }

    #[test]
    fn sign_then_verify_returns_subject() {
        let keys = make_keys("dev-secret");
        let user_id = Uuid::new_v4();
        let token = keys.sign(user_id).expect("sign");
        let claims = keys.verify(&token).expect("verify");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
    }

    #[test]
    fn token_is_valid_for_one_hour() {
        let keys = make_keys("dev-secret");
        let claims = keys.verify(&keys.sign(Uuid::new_v4()).unwrap()).unwrap();
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn expired_token_is_rejected_as_expired() {
        let keys = make_keys("dev-secret");
        let past = OffsetDateTime::now_utc() - TimeDuration::minutes(5);
        let token = sign_expiring_at(&keys, Uuid::new_v4(), past);
        assert_eq!(keys.verify(&token).unwrap_err(), TokenError::Expired);
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let keys = make_keys("dev-secret");
        let token = keys.sign(Uuid::new_v4()).unwrap();
        let payload_start = token.find('.').unwrap() + 1;
        let mut bytes = token.into_bytes();
        bytes[payload_start + 5] = if bytes[payload_start + 5] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(bytes).unwrap();
        assert_eq!(keys.verify(&tampered).unwrap_err(), TokenError::Invalid);
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let token = make_keys("secret-a").sign(Uuid::new_v4()).unwrap();
        assert_eq!(make_keys("secret-b").verify(&token).unwrap_err(), TokenError::Invalid);
    }

    #[test]
    fn garbage_is_rejected() {
        let keys = make_keys("dev-secret");
        assert_eq!(keys.verify("not.a.jwt").unwrap_err(), TokenError::Invalid);
        assert_eq!(keys.verify("").unwrap_err(), TokenError::Invalid);
    }

    #[test]
    fn out_of_range_lifetimes_are_clamped() {
        let mut cfg = JwtConfig {
            secret: "s".into(),
            issuer: "i".into(),
            audience: "a".into(),
            ttl_minutes: i64::MAX,
        };
        assert_eq!(JwtKeys::new(&cfg).ttl.as_secs(), MAX_TTL_MINUTES as u64 * 60);
        cfg.ttl_minutes = 0;
        assert_eq!(JwtKeys::new(&cfg).ttl.as_secs(), 60);
    }

    #[test]
    fn state_keys_are_built_once() {
        let mut st = AppState::fake();
        let token = JwtKeys::from_ref(&st).sign(Uuid::new_v4()).unwrap();

        let mut cfg = (*st.config).clone();
        cfg.jwt.secret = "rotated".into();
        st.config = std::sync::Arc::new(cfg);
        assert!(JwtKeys::from_ref(&st).verify(&token).is_ok());
    }

    #[test]
    fn wrong_audience_is_rejected() {
        let good = make_keys("same-secret");
        let mut other = make_keys("same-secret");
        other.audience = "someone-else".into();
        let token = good.sign(Uuid::new_v4()).unwrap();
        assert_eq!(other.verify(&token).unwrap_err(), TokenError::Invalid);
    }
}
