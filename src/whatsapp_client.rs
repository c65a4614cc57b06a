use std::time::Duration;

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};

// Client for the WhatsApp staff-alert channel (Twilio messaging API).
// Sends are fire-and-forget: callers log failures and carry on, the
// notification row in the store is the source of truth either way.
#[derive(Clone)]
pub struct WhatsappClient {
    http_client: Client,
    base_url: String,
    account_sid: String,
    auth_token: SecretString,
    from_number: String,
}

impl WhatsappClient {
    #[tracing::instrument(
        "Sending WhatsApp staff alert",
        skip(self, body)
    )]
    pub async fn send_staff_alert(&self, to: &str, body: &str) -> Result<(), reqwest::Error> {
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.account_sid
        );
        let params = [
            ("To", to),
            ("From", self.from_number.as_str()),
            ("Body", body),
        ];

        self.http_client
            .post(url)
            .basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
            .form(&params)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    pub fn new(
        base_url: String,
        account_sid: String,
        auth_token: SecretString,
        from_number: String,
        timeout: u64,
    ) -> WhatsappClient {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()
            .unwrap();

        Self {
            http_client,
            base_url,
            account_sid,
            auth_token,
            from_number,
        }
    }
}
