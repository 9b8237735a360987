//! Admin client for the external identity provider. Token verification is
//! separate (core::security); this covers provisioning and password
//! management on behalf of administrators.

use std::time::Duration;

use anyhow::Context;
use reqwest::{Client, StatusCode};

use crate::core::config::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProvisionOutcome {
    Created,
    AlreadyExists,
}

#[derive(Debug, Clone)]
pub(crate) struct IdentityAdminService {
    client: Client,
    base_url: String,
    api_key: String,
    default_password: String,
}

impl IdentityAdminService {
    pub(crate) fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build identity provider HTTP client")?;

        Ok(Self {
            client,
            base_url: settings.idp().admin_base_url.trim_end_matches('/').to_string(),
            api_key: settings.idp().admin_api_key.clone(),
            default_password: settings.idp().default_password.clone(),
        })
    }

    /// Create the identity in the provider directory. An existing identity
    /// is success, not failure.
    pub(crate) async fn create_identity(&self, email: &str) -> anyhow::Result<ProvisionOutcome> {
        let url = format!("{}/users", self.base_url);
        let payload = serde_json::json!({
            "email": email,
            "email_verified": true,
            "suppress_invite": true,
        });

        let response = self
            .client
            .post(&url)
            .header("X-Api-Key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .context("Failed to call identity provider")?;

        match response.status() {
            StatusCode::CONFLICT => Ok(ProvisionOutcome::AlreadyExists),
            status if status.is_success() => Ok(ProvisionOutcome::Created),
            status => {
                let body = response.text().await.unwrap_or_default();
                anyhow::bail!("identity provider create failed (status {status}): {body}")
            }
        }
    }

    pub(crate) async fn set_password(
        &self,
        email: &str,
        password: &str,
        permanent: bool,
    ) -> anyhow::Result<()> {
        let url = format!("{}/users/{}/password", self.base_url, email);
        let payload = serde_json::json!({
            "password": password,
            "permanent": permanent,
        });

        self.client
            .put(&url)
            .header("X-Api-Key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .context("Failed to call identity provider")?
            .error_for_status()
            .context("identity provider set_password failed")?;

        Ok(())
    }

    pub(crate) async fn set_default_password(&self, email: &str) -> anyhow::Result<()> {
        self.set_password(email, &self.default_password, true).await
    }

    /// Check a password by attempting a credential login against the
    /// provider. A clean 401/403 means "wrong password", not an error.
    pub(crate) async fn verify_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> anyhow::Result<bool> {
        let url = format!("{}/sessions/verify", self.base_url);
        let payload = serde_json::json!({
            "email": email,
            "password": password,
        });

        let response = self
            .client
            .post(&url)
            .header("X-Api-Key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .context("Failed to call identity provider")?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                anyhow::bail!("identity provider credential check failed (status {status}): {body}")
            }
        }
    }
}
