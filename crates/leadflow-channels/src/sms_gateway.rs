//! HTTP SMS gateway — POSTs `{from, to, body}` as JSON to a configured URL.

use async_trait::async_trait;
use leadflow_core::config::SmsGatewayConfig;
use leadflow_core::error::{LeadflowError, Result};
use leadflow_core::traits::SmsSender;

use crate::transport_error;

pub struct HttpSmsGateway {
    config: SmsGatewayConfig,
    client: reqwest::Client,
}

impl HttpSmsGateway {
    pub fn new(config: SmsGatewayConfig) -> Result<Self> {
        if config.url.is_empty() {
            return Err(LeadflowError::Config("sms.url is not set".into()));
        }
        Ok(Self {
            config,
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl SmsSender for HttpSmsGateway {
    fn name(&self) -> &str {
        "http-gateway"
    }

    async fn send(&self, sender: &str, recipient: &str, body: &str) -> Result<()> {
        let mut req = self
            .client
            .post(&self.config.url)
            .json(&serde_json::json!({
                "from": sender,
                "to": recipient,
                "body": body,
            }))
            .timeout(std::time::Duration::from_secs(self.config.timeout_secs));
        if !self.config.token.is_empty() {
            req = req.header("Authorization", format!("Bearer {}", self.config.token));
        }

        let resp = req
            .send()
            .await
            .map_err(|e| transport_error("SMS gateway", e, LeadflowError::Send))?;

        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            Err(LeadflowError::Send(format!("SMS gateway error {status}: {text}")))
        }
    }
}
