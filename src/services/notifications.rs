use std::time::Duration;

use anyhow::Context;
use reqwest::Client;

use crate::core::config::Settings;

/// Outbound email via the notification service. Delivery failures are
/// reported to the caller but are never fatal to the enclosing operation.
#[derive(Debug, Clone)]
pub(crate) struct EmailService {
    client: Client,
    base_url: String,
    api_key: String,
    from_address: String,
}

impl EmailService {
    pub(crate) fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build email HTTP client")?;

        Ok(Self {
            client,
            base_url: settings.email().base_url.trim_end_matches('/').to_string(),
            api_key: settings.email().api_key.clone(),
            from_address: settings.email().from_address.clone(),
        })
    }

    pub(crate) async fn send_assignment_email(
        &self,
        to: &str,
        exam_title: &str,
        include_temp_password: bool,
    ) -> anyhow::Result<()> {
        if self.base_url.is_empty() {
            anyhow::bail!("EMAIL_API_URL is not configured");
        }

        let url = format!("{}/messages", self.base_url);
        let payload = serde_json::json!({
            "from": self.from_address,
            "to": to,
            "template": "exam_assignment",
            "params": {
                "exam_title": exam_title,
                "include_temp_password": include_temp_password,
            },
        });

        self.client
            .post(&url)
            .header("X-Api-Key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .context("Failed to call notification service")?
            .error_for_status()
            .context("notification service rejected the message")?;

        Ok(())
    }
}
