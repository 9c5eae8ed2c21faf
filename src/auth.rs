use crate::config;

use base64::{STANDARD, STANDARD_NO_PAD, URL_SAFE_NO_PAD, decode_config, encode_config};
use jwt_simple::algorithms::MACLike;
use jwt_simple::prelude::{
    Claims, Duration as JwtDuration, HS256Key, NoCustomClaims, VerificationOptions,
};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};

use std::collections::HashSet;

const ISSUER: &str = "dishcast";

/// Verifies the bearer tokens that guard the broadcast endpoint.
#[derive(Debug, Clone)]
pub struct AdminAuth {
    key: HS256Key,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid admin key")]
    InvalidKey,
    #[error("invalid admin token")]
    InvalidToken,
    #[error("admin token missing expiry")]
    MissingExpiry,
    #[error("admin token missing subject")]
    MissingSubject,
}

impl AdminAuth {
    pub(crate) fn from_config(config: &config::AppConfig) -> Result<Option<Self>, AuthError> {
        let Some(key) = config.admin_key.as_deref() else {
            return Ok(None);
        };
        Self::from_key(key).map(Some)
    }

    pub fn from_key(raw: &str) -> Result<Self, AuthError> {
        let key_bytes = decode_key(raw)?;
        Ok(Self {
            key: HS256Key::from_bytes(&key_bytes),
        })
    }

    pub fn issue_token(&self, subject: &str, ttl: time::Duration) -> Result<String, AuthError> {
        let ttl_seconds = ttl.whole_seconds();
        if ttl_seconds <= 0 || subject.trim().is_empty() {
            return Err(AuthError::InvalidToken);
        }
        let claims = Claims::create(JwtDuration::from_secs(ttl_seconds as u64))
            .with_subject(subject.trim())
            .with_issuer(ISSUER);
        self.key
            .authenticate(claims)
            .map_err(|_| AuthError::InvalidToken)
    }

    pub(crate) fn verify_token(&self, token: &str) -> Result<(), AuthError> {
        let mut options = VerificationOptions::default();
        options.allowed_issuers = Some(HashSet::from([ISSUER.to_string()]));

        let claims = self
            .key
            .verify_token::<NoCustomClaims>(token, Some(options))
            .map_err(|_| AuthError::InvalidToken)?;

        if claims.expires_at.is_none() {
            return Err(AuthError::MissingExpiry);
        }

        let subject = claims.subject.ok_or(AuthError::MissingSubject)?;
        if subject.trim().is_empty() {
            return Err(AuthError::MissingSubject);
        }

        Ok(())
    }
}

fn decode_key(raw: &str) -> Result<Vec<u8>, AuthError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AuthError::InvalidKey);
    }

    let decoded = decode_config(trimmed, URL_SAFE_NO_PAD)
        .or_else(|_| decode_config(trimmed, STANDARD))
        .or_else(|_| decode_config(trimmed, STANDARD_NO_PAD))
        .map_err(|_| AuthError::InvalidKey)?;

    if decoded.is_empty() {
        return Err(AuthError::InvalidKey);
    }

    Ok(decoded)
}

pub fn generate_admin_key() -> String {
    let mut rng = OsRng;
    generate_admin_key_with_rng(&mut rng)
}

pub(crate) fn generate_admin_key_with_rng<R: RngCore + CryptoRng>(rng: &mut R) -> String {
    let mut bytes = [0u8; 32];
    rng.fill_bytes(&mut bytes);
    encode_config(bytes, URL_SAFE_NO_PAD)
}
