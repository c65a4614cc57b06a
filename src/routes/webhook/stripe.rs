use std::str::FromStr;

use actix_web::{web, HttpRequest, HttpResponse};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    db_interaction::{find_order, settle_payment, ConfirmedPayment, PaidItemRef, PaymentKind, SettlementError, SettlementOutcome},
    domain::PaymentMethod,
    events::{invalidation_message, table_channel, EventBroker, END_ORDER_SIGNAL},
    startup::WebhookSecret,
    utils::{get_pooled_connection, DbPool},
};

// Provider event envelope. Only the checkout-session events matter here;
// everything else is acknowledged and ignored.
#[derive(Deserialize, Debug)]
struct WebhookEnvelope {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: WebhookData,
}

#[derive(Deserialize, Debug)]
struct WebhookData {
    object: CheckoutSessionObject,
}

#[derive(Deserialize, Debug)]
struct CheckoutSessionObject {
    id: String,
    payment_intent: Option<String>,
    payment_status: Option<String>,
    amount_total: Option<i64>,
    metadata: RawMetadata,
}

// The metadata bag exactly as the provider round-trips it: flat and
// stringly typed. Decoded into typed settlement values once, here at the
// boundary, before anything touches the store.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawMetadata {
    order_id: Option<String>,
    branch_id: Option<String>,
    user_id: Option<String>,
    type_of_payment: Option<String>,
    payment_method: Option<String>,
    tip: Option<String>,
    is_order_amount_full_paid: Option<String>,
    extra_data: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct RawPaidItem {
    item_id: Uuid,
    #[allow(dead_code)]
    price: Option<Decimal>,
}

fn decode_metadata(
    object: &CheckoutSessionObject,
) -> Result<ConfirmedPayment, String> {
    let metadata = &object.metadata;

    let intent_id = object
        .payment_intent
        .clone()
        .ok_or("session has no payment intent")?;

    let parse_uuid = |field: &Option<String>, name: &str| {
        field
            .as_deref()
            .ok_or(format!("metadata is missing {}", name))
            .and_then(|raw| Uuid::parse_str(raw).map_err(|_| format!("{} is not a uuid", name)))
    };

    let order_id = parse_uuid(&metadata.order_id, "orderId")?;
    let branch_id = parse_uuid(&metadata.branch_id, "branchId")?;
    let user_id = parse_uuid(&metadata.user_id, "userId")?;

    let method = metadata
        .payment_method
        .as_deref()
        .ok_or("metadata is missing paymentMethod")
        .and_then(|raw| {
            PaymentMethod::parse(raw).map_err(|_| "paymentMethod is not supported")
        })?;

    let tip = match metadata.tip.as_deref() {
        Some(raw) => Decimal::from_str(raw).map_err(|_| "tip is not a decimal")?,
        None => Decimal::ZERO,
    };
    if tip < Decimal::ZERO {
        return Err("tip cannot be negative".to_string());
    }

    let amount_total = object.amount_total.ok_or("session has no amount_total")?;
    let amount = Decimal::new(amount_total, 2) - tip;
    if amount <= Decimal::ZERO {
        return Err("settled amount must be positive".to_string());
    }

    let items = match metadata.extra_data.as_deref() {
        Some(raw) if !raw.is_empty() => {
            let raw_items: Vec<RawPaidItem> =
                serde_json::from_str(raw).map_err(|_| "extraData is not valid json")?;

            raw_items
                .into_iter()
                .map(|item| PaidItemRef {
                    item_id: item.item_id,
                    price: item.price,
                })
                .collect()
        }
        _ => Vec::new(),
    };

    let kind = match metadata.type_of_payment.as_deref() {
        Some("perDish") => PaymentKind::PerDish { items },
        Some("cartPay") => PaymentKind::CartPay { items },
        Some("fullpay") => PaymentKind::FullBill,
        Some(other) => return Err(format!("{} is not a payment type", other)),
        None => return Err("metadata is missing typeOfPayment".to_string()),
    };

    let full_paid = metadata.is_order_amount_full_paid.as_deref() == Some("true");
    let completes_order = matches!(kind, PaymentKind::FullBill) || full_paid;

    Ok(ConfirmedPayment {
        intent_id,
        order_id,
        branch_id,
        user_id,
        method,
        amount,
        tip,
        kind,
        completes_order,
    })
}

// The provider delivers events at least once and in no particular order;
// a non-200 response makes it retry. Settlement failures that a retry can
// fix return 500, everything non-retryable is acknowledged with 200 so
// the provider stops redelivering.
#[tracing::instrument(
    "Handling payment provider webhook",
    skip_all
)]
pub async fn stripe_webhook(
    pool: web::Data<DbPool>,
    broker: web::Data<EventBroker>,
    secret: web::Data<WebhookSecret>,
    request: HttpRequest,
    body: web::Bytes,
) -> HttpResponse {
    // Signature verification is delegated infrastructure; this shared-
    // secret comparison is the in-process stand-in for it
    let signature = request
        .headers()
        .get("Stripe-Signature")
        .and_then(|value| value.to_str().ok());

    match signature {
        Some(value) if value == secret.0.expose_secret() => {}
        _ => {
            tracing::warn!("Webhook signature missing or invalid");
            return HttpResponse::BadRequest().finish();
        }
    }

    let envelope: WebhookEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(error) => {
            tracing::warn!("Failed to parse webhook body: {}", error);
            return HttpResponse::BadRequest().finish();
        }
    };

    tracing::info!(
        event_id = %envelope.id,
        event_type = %envelope.event_type,
        "Received payment provider event"
    );

    match envelope.event_type.as_str() {
        "checkout.session.completed" => {
            handle_checkout_completed(&pool, &broker, &envelope.data.object).await
        }
        "checkout.session.expired" => {
            // Abandoned checkout: nothing was charged, nothing mutates
            tracing::info!(session_id = %envelope.data.object.id, "Checkout session expired");
            HttpResponse::Ok().finish()
        }
        other => {
            tracing::debug!(event_type = other, "Ignoring unhandled webhook event type");
            HttpResponse::Ok().finish()
        }
    }
}

async fn handle_checkout_completed(
    pool: &web::Data<DbPool>,
    broker: &web::Data<EventBroker>,
    object: &CheckoutSessionObject,
) -> HttpResponse {
    if object.payment_status.as_deref() != Some("paid") {
        tracing::info!(
            session_id = %object.id,
            payment_status = ?object.payment_status,
            "Checkout session completed without payment"
        );
        return HttpResponse::Ok().finish();
    }

    let payment = match decode_metadata(object) {
        Ok(payment) => payment,
        Err(reason) => {
            // Malformed metadata never gets better on redelivery
            tracing::warn!(session_id = %object.id, reason = %reason, "Discarding unsettleable webhook");
            return HttpResponse::Ok().finish();
        }
    };

    let conn = match get_pooled_connection(pool).await {
        Ok(conn) => conn,
        Err(error) => {
            tracing::error!("Failed to get connection from pool: {:?}", error);
            return HttpResponse::InternalServerError().finish();
        }
    };

    let order_id = payment.order_id;
    let completes_order = payment.completes_order;

    let outcome = match settle_payment(conn, payment).await {
        Ok(outcome) => outcome,
        Err(error @ (SettlementError::OrderNotFound(_) | SettlementError::UserNotFound(_))) => {
            tracing::warn!("Webhook references missing records, not retryable: {:?}", error);
            return HttpResponse::Ok().finish();
        }
        Err(error) => {
            tracing::error!("Settlement failed, provider will redeliver: {:?}", error);
            return HttpResponse::InternalServerError().finish();
        }
    };

    if outcome == SettlementOutcome::AlreadyProcessed {
        tracing::info!("Duplicate webhook delivery, settlement already applied");
        return HttpResponse::Ok().finish();
    }

    // Tell every session at the table to re-fetch; a completing payment
    // additionally instructs clients to acknowledge the end of the order
    let conn = match get_pooled_connection(pool).await {
        Ok(conn) => conn,
        Err(error) => {
            // Settlement is committed; losing the notification is survivable
            tracing::error!("Failed to get connection for event fan-out: {:?}", error);
            return HttpResponse::Ok().finish();
        }
    };

    match find_order(conn, order_id).await {
        Ok(Some(order)) => {
            if let Some(table_id) = order.table_id {
                let message = if completes_order {
                    END_ORDER_SIGNAL.to_string()
                } else {
                    invalidation_message()
                };
                broker.publish(&table_channel(table_id), message);
            }
        }
        Ok(None) => {}
        Err(error) => {
            tracing::error!("Failed to load order for event fan-out: {:?}", error);
        }
    }

    HttpResponse::Ok().finish()
}
