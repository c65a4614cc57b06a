use actix_web::{error::{ErrorBadRequest, ErrorConflict, ErrorForbidden, ErrorInternalServerError, ErrorNotFound}, web, HttpResponse};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    amounts::tip_from_percentage,
    db_interaction::{
        amount_left_for_table, find_branch, get_table_view, AmountLeftError, CartItemWithOwners,
        TableViewError,
    },
    domain::PaymentMethod,
    session_state::TypedSession,
    startup::ApplicationBaseUrl,
    stripe_client::{CheckoutRequest, StripeClient},
    utils::{get_pooled_connection, DbPool},
};

// The three ways to pay, as the client submits them
#[derive(Deserialize, Debug)]
#[serde(tag = "mode")]
pub enum PaymentForm {
    #[serde(rename = "perDish", rename_all = "camelCase")]
    PerDish {
        items: Vec<Uuid>,
        tip_percentage: Option<Decimal>,
        method: PaymentMethod,
    },
    #[serde(rename = "cartPay", rename_all = "camelCase")]
    CartPay {
        tip_percentage: Option<Decimal>,
        method: PaymentMethod,
    },
    #[serde(rename = "fullBill", rename_all = "camelCase")]
    FullBill {
        tip_percentage: Option<Decimal>,
        method: PaymentMethod,
    },
}

impl PaymentForm {
    fn method(&self) -> PaymentMethod {
        match self {
            PaymentForm::PerDish { method, .. }
            | PaymentForm::CartPay { method, .. }
            | PaymentForm::FullBill { method, .. } => *method,
        }
    }

    fn tip_percentage(&self) -> Decimal {
        match self {
            PaymentForm::PerDish { tip_percentage, .. }
            | PaymentForm::CartPay { tip_percentage, .. }
            | PaymentForm::FullBill { tip_percentage, .. } => {
                tip_percentage.unwrap_or(Decimal::ZERO)
            }
        }
    }

    fn type_of_payment(&self) -> &'static str {
        match self {
            PaymentForm::PerDish { .. } => "perDish",
            PaymentForm::CartPay { .. } => "cartPay",
            PaymentForm::FullBill { .. } => "fullpay",
        }
    }
}

#[derive(Serialize)]
pub struct PaymentResponse {
    pub checkout_url: String,
}

// Sum the selected unpaid lines and serialise them for the provider's
// metadata bag, so the webhook can settle exactly these items later.
fn select_lines(
    all_items: &[CartItemWithOwners],
    wanted: &[Uuid],
) -> Result<(Decimal, String), actix_web::Error> {
    let mut amount = Decimal::ZERO;
    let mut extra = Vec::new();

    for item_id in wanted {
        let found = all_items
            .iter()
            .find(|entry| entry.item.cart_item_id == *item_id)
            .ok_or_else(|| ErrorBadRequest("Selected item is not part of this order"))?;

        if found.item.paid {
            return Err(ErrorConflict("Selected item is already settled"));
        }

        let line_total =
            (found.item.price * Decimal::from(found.item.quantity)).round_dp(2);
        amount += line_total;
        extra.push(serde_json::json!({
            "itemId": found.item.cart_item_id,
            "price": line_total.to_string(),
        }));
    }

    let extra_data = serde_json::to_string(&extra).map_err(ErrorInternalServerError)?;
    Ok((amount, extra_data))
}

// Start a payment: validate it against the branch and the live order
// state, then hand the diner over to the provider's hosted checkout. The
// store is only mutated when the provider's webhook confirms settlement.
#[tracing::instrument(
    "Initiating payment",
    skip(pool, session, stripe, base_url)
)]
pub async fn post_payment(
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
    form: web::Json<PaymentForm>,
    session: TypedSession,
    stripe: web::Data<StripeClient>,
    base_url: web::Data<ApplicationBaseUrl>,
) -> Result<HttpResponse, actix_web::Error> {
    let table_id = path.into_inner();
    let form = form.0;

    let user_id = session
        .get_user_id()
        .map_err(ErrorInternalServerError)?
        .ok_or_else(|| ErrorForbidden("Join the table first"))?;

    let tip_percentage = form.tip_percentage();
    if tip_percentage < Decimal::ZERO {
        return Err(ErrorBadRequest("Tip percentage cannot be negative"));
    }

    let conn = get_pooled_connection(&pool)
        .await
        .map_err(ErrorInternalServerError)?;

    let view = get_table_view(conn, table_id)
        .await
        .map_err(|error| match error {
            TableViewError::TableNotFound(_) => ErrorNotFound(error),
            other => ErrorInternalServerError(other),
        })?;

    let order_view = view
        .order
        .ok_or_else(|| ErrorConflict("This table has no open order"))?;

    if !order_view.order.active {
        return Err(ErrorConflict("This order is already closed"));
    }

    let conn = get_pooled_connection(&pool)
        .await
        .map_err(ErrorInternalServerError)?;

    let branch = find_branch(conn, view.table.branch_id)
        .await
        .map_err(ErrorInternalServerError)?
        .ok_or_else(|| ErrorNotFound("Branch does not exist"))?;

    let method = form.method();
    if !branch
        .accepted_methods
        .iter()
        .any(|accepted| accepted == method.as_str())
    {
        return Err(ErrorBadRequest("This branch does not accept that payment method"));
    }

    let (amount, extra_data) = match &form {
        PaymentForm::PerDish { items, .. } => {
            if items.is_empty() {
                return Err(ErrorBadRequest("Select at least one dish to pay"));
            }
            select_lines(&order_view.items, items)?
        }
        PaymentForm::CartPay { .. } => {
            let cart = session.get_cart().map_err(ErrorInternalServerError)?;
            let unpaid: Vec<Uuid> = cart
                .into_iter()
                .filter(|id| {
                    order_view
                        .items
                        .iter()
                        .any(|entry| entry.item.cart_item_id == *id && !entry.item.paid)
                })
                .collect();

            if unpaid.is_empty() {
                return Err(ErrorBadRequest("Your cart has nothing left to pay"));
            }
            select_lines(&order_view.items, &unpaid)?
        }
        PaymentForm::FullBill { .. } => {
            let conn = get_pooled_connection(&pool)
                .await
                .map_err(ErrorInternalServerError)?;

            let left = amount_left_for_table(conn, table_id)
                .await
                .map_err(|error| match error {
                    AmountLeftError::TableNotFound(_) => ErrorNotFound(error),
                    AmountLeftError::NoActiveOrder(_) => {
                        ErrorConflict("This table has no open order")
                    }
                    other => ErrorInternalServerError(other),
                })?;

            (left, "[]".to_string())
        }
    };

    if amount <= Decimal::ZERO {
        return Err(ErrorBadRequest("There is nothing left to pay on this order"));
    }

    let tip = tip_from_percentage(amount, tip_percentage);
    let is_order_amount_full_paid = amount + tip >= order_view.amount_left_to_pay;

    let request = CheckoutRequest {
        amount,
        tip,
        method,
        description: format!("Table {} order", view.table.number),
        success_url: format!("{}/payment/complete", base_url.0),
        cancel_url: format!("{}/table/{}", base_url.0, table_id),
        order_id: order_view.order.order_id,
        branch_id: view.table.branch_id,
        user_id,
        type_of_payment: form.type_of_payment(),
        is_order_amount_full_paid,
        extra_data,
    };

    let checkout = stripe
        .create_checkout_session(&request)
        .await
        .map_err(ErrorInternalServerError)?;

    Ok(HttpResponse::Ok().json(PaymentResponse {
        checkout_url: checkout.url,
    }))
}
