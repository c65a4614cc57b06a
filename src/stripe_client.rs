use std::time::Duration;

use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::PaymentMethod;

// Client for the payment provider's hosted-checkout API. The webhook half
// of the integration lives in routes::webhook.
#[derive(Clone)]
pub struct StripeClient {
    http_client: Client,
    base_url: String,
    secret_key: SecretString,
    currency: String,
}

// Everything the provider needs to round-trip a settlement back to us
// through the webhook metadata bag.
#[derive(Debug)]
pub struct CheckoutRequest {
    pub amount: Decimal,
    pub tip: Decimal,
    pub method: PaymentMethod,
    pub description: String,
    pub success_url: String,
    pub cancel_url: String,
    pub order_id: Uuid,
    pub branch_id: Uuid,
    pub user_id: Uuid,
    pub type_of_payment: &'static str,
    pub is_order_amount_full_paid: bool,
    pub extra_data: String,
}

#[derive(Deserialize, Debug)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

impl StripeClient {
    #[tracing::instrument(
        "Creating a hosted checkout session",
        skip(self, request)
    )]
    pub async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, anyhow::Error> {
        let url = format!("{}/v1/checkout/sessions", self.base_url);

        let unit_amount = ((request.amount + request.tip) * Decimal::from(100))
            .trunc()
            .to_i64()
            .ok_or_else(|| anyhow::anyhow!("Checkout amount does not fit in minor units"))?;

        let params = [
            ("mode", "payment".to_string()),
            ("success_url", request.success_url.clone()),
            ("cancel_url", request.cancel_url.clone()),
            ("payment_method_types[0]", request.method.as_str().to_string()),
            ("line_items[0][quantity]", "1".to_string()),
            ("line_items[0][price_data][currency]", self.currency.clone()),
            ("line_items[0][price_data][unit_amount]", unit_amount.to_string()),
            (
                "line_items[0][price_data][product_data][name]",
                request.description.clone(),
            ),
            ("metadata[orderId]", request.order_id.to_string()),
            ("metadata[branchId]", request.branch_id.to_string()),
            ("metadata[userId]", request.user_id.to_string()),
            ("metadata[typeOfPayment]", request.type_of_payment.to_string()),
            ("metadata[paymentMethod]", request.method.as_str().to_string()),
            ("metadata[tip]", request.tip.to_string()),
            (
                "metadata[isOrderAmountFullPaid]",
                request.is_order_amount_full_paid.to_string(),
            ),
            ("metadata[extraData]", request.extra_data.clone()),
        ];

        let session = self
            .http_client
            .post(url)
            .bearer_auth(self.secret_key.expose_secret())
            .form(&params)
            .send()
            .await?
            .error_for_status()?
            .json::<CheckoutSession>()
            .await?;

        Ok(session)
    }

    pub fn new(
        base_url: String,
        secret_key: SecretString,
        currency: String,
        timeout: u64,
    ) -> StripeClient {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()
            .unwrap();

        Self {
            http_client,
            base_url,
            secret_key,
            currency,
        }
    }
}
