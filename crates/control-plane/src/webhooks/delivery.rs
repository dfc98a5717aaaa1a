// Outbound webhook transport over reqwest
// Decision: Bounded per-request timeout, no redirects, no retries

use async_trait::async_trait;
use mailplate_core::{DeliveryError, DeliveryRequest, WebhookTransport};
use std::time::Duration;

/// reqwest-backed [`WebhookTransport`]
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("mailplate-webhooks/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl WebhookTransport for HttpTransport {
    async fn send(&self, request: DeliveryRequest) -> Result<u16, DeliveryError> {
        let mut builder = self.client.post(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        match builder.body(request.body).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    Ok(status.as_u16())
                } else {
                    Err(DeliveryError::Status(status.as_u16()))
                }
            }
            Err(e) if e.is_timeout() => Err(DeliveryError::Timeout),
            Err(e) => Err(DeliveryError::Transport(e.to_string())),
        }
    }
}
