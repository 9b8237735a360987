use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use thiserror::Error;

use crate::core::config::Settings;

#[derive(Debug, Error)]
pub(crate) enum SecurityError {
    #[error("token header is not parseable")]
    MalformedToken,
    #[error("token has no key id")]
    MissingKeyId,
    #[error("no published key matches the token key id")]
    UnknownKey,
    #[error("token verification failed")]
    Verification,
}

/// Claims the identity provider puts in its tokens. Only the subject and
/// email are consumed by this service.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct IdentityClaims {
    pub(crate) sub: String,
    pub(crate) email: String,
    #[serde(default)]
    pub(crate) name: Option<String>,
}

/// Published signing keys of the identity provider, fetched once at startup.
#[derive(Debug, Clone)]
pub(crate) struct Keystore {
    keys: JwkSet,
    issuer: String,
    audience: String,
}

impl Keystore {
    pub(crate) fn new(keys: JwkSet, issuer: String, audience: String) -> Self {
        Self { keys, issuer, audience }
    }

    /// A keystore that rejects every token. Used when no JWKS URL is
    /// configured (development and tests).
    pub(crate) fn empty(issuer: String, audience: String) -> Self {
        Self { keys: JwkSet { keys: Vec::new() }, issuer, audience }
    }

    pub(crate) async fn fetch(settings: &Settings) -> anyhow::Result<Self> {
        let idp = settings.idp();
        if idp.jwks_url.is_empty() {
            tracing::warn!("IDP_JWKS_URL is not set; all bearer tokens will be rejected");
            return Ok(Self::empty(idp.issuer.clone(), idp.audience.clone()));
        }

        let keys: JwkSet = reqwest::Client::new()
            .get(&idp.jwks_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        tracing::info!(jwks_url = %idp.jwks_url, key_count = keys.keys.len(), "Fetched identity provider key set");

        Ok(Self::new(keys, idp.issuer.clone(), idp.audience.clone()))
    }

    /// Verify a bearer token: signature against the published keys plus
    /// audience, issuer and expiry.
    pub(crate) fn verify_bearer(&self, token: &str) -> Result<IdentityClaims, SecurityError> {
        let header = decode_header(token).map_err(|_| SecurityError::MalformedToken)?;
        let kid = header.kid.ok_or(SecurityError::MissingKeyId)?;

        let jwk = self.keys.find(&kid).ok_or(SecurityError::UnknownKey)?;
        let key = DecodingKey::from_jwk(jwk).map_err(|_| SecurityError::UnknownKey)?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[self.audience.as_str()]);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.validate_exp = true;

        decode::<IdentityClaims>(token, &key, &validation)
            .map(|data| data.claims)
            .map_err(|_| SecurityError::Verification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keystore() -> Keystore {
        Keystore::empty("https://idp.example.com/pool".to_string(), "client-id".to_string())
    }

    #[test]
    fn garbage_token_is_malformed() {
        let err = keystore().verify_bearer("not-a-jwt").unwrap_err();
        assert!(matches!(err, SecurityError::MalformedToken));
    }

    #[test]
    fn token_without_kid_is_rejected() {
        // HS256 token with no kid in the header
        let token = jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &serde_json::json!({"sub": "abc", "email": "a@b.c", "exp": 4102444800_i64}),
            &jsonwebtoken::EncodingKey::from_secret(b"secret"),
        )
        .expect("token");

        let err = keystore().verify_bearer(&token).unwrap_err();
        assert!(matches!(err, SecurityError::MissingKeyId));
    }

    #[test]
    fn unknown_kid_is_rejected() {
        let mut header = jsonwebtoken::Header::default();
        header.kid = Some("no-such-key".to_string());
        let token = jsonwebtoken::encode(
            &header,
            &serde_json::json!({"sub": "abc", "email": "a@b.c", "exp": 4102444800_i64}),
            &jsonwebtoken::EncodingKey::from_secret(b"secret"),
        )
        .expect("token");

        let err = keystore().verify_bearer(&token).unwrap_err();
        assert!(matches!(err, SecurityError::UnknownKey));
    }
}
