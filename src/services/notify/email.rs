use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;

use super::{BookingNotice, Notifier};

/// Posts notifications to an HTTP email relay.
pub struct EmailRelayNotifier {
    url: String,
    token: String,
    client: reqwest::Client,
}

impl EmailRelayNotifier {
    pub fn new(url: String, token: String) -> Self {
        Self {
            url,
            token,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RelayPayload<'a> {
    to_email: &'a str,
    to_name: &'a str,
    from_name: &'a str,
    subject: &'a str,
    booking: &'a BookingNotice,
}

#[async_trait]
impl Notifier for EmailRelayNotifier {
    async fn send_booking_notification(
        &self,
        to_email: &str,
        to_name: &str,
        from_name: &str,
        notice: &BookingNotice,
    ) -> anyhow::Result<()> {
        let payload = RelayPayload {
            to_email,
            to_name,
            from_name,
            subject: notice.kind.subject(),
            booking: notice,
        };

        self.client
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await
            .context("failed to reach email relay")?
            .error_for_status()
            .context("email relay returned error")?;

        Ok(())
    }
}
