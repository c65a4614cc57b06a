use std::{error::Error, fmt::Debug};

use chrono::Utc;
use diesel::{Connection, ExpressionMethods, OptionalExtension, QueryDsl, RunQueryDsl};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    domain::PaymentMethod,
    models::{Order, Payment, User, PAYMENT_STATUS_ACCEPTED},
    telemetry::spawn_blocking_with_tracing,
    utils::{error_fmt_chain, is_unique_violation, DbConnection},
};

// One settled cart line carried in the provider metadata's extraData
#[derive(Debug, Clone)]
pub struct PaidItemRef {
    pub item_id: Uuid,
    pub price: Option<Decimal>,
}

// The three payment modes, decoded once at the webhook boundary
#[derive(Debug, Clone)]
pub enum PaymentKind {
    // Settles specific cart items regardless of who added them
    PerDish { items: Vec<PaidItemRef> },
    // Settles exactly the items the paying diner added
    CartPay { items: Vec<PaidItemRef> },
    // Settles the whole remaining balance
    FullBill,
}

impl PaymentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentKind::PerDish { .. } => "perDish",
            PaymentKind::CartPay { .. } => "cartPay",
            PaymentKind::FullBill => "fullpay",
        }
    }
}

// A confirmed provider payment, ready to be applied to the store.
// intent_id is the provider's payment-intent identifier and doubles as
// the idempotency key for at-least-once webhook delivery.
#[derive(Debug)]
pub struct ConfirmedPayment {
    pub intent_id: String,
    pub order_id: Uuid,
    pub branch_id: Uuid,
    pub user_id: Uuid,
    pub method: PaymentMethod,
    pub amount: Decimal,
    pub tip: Decimal,
    pub kind: PaymentKind,
    // True for full-bill payments and for dish payments that happen to
    // settle the remainder; drives the order-completion side effects.
    pub completes_order: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub enum SettlementOutcome {
    Applied,
    // A payment row for this intent already exists; nothing was mutated
    AlreadyProcessed,
}

// Error associated with applying a confirmed payment
#[derive(Error)]
pub enum SettlementError {
    #[error("Failed due to threadpool error")]
    ThreadpoolError(#[from] tokio::task::JoinError),
    #[error("order {0} does not exist")]
    OrderNotFound(Uuid),
    #[error("diner {0} does not exist")]
    UserNotFound(Uuid),
    #[error("another delivery of intent {0} won the settlement race")]
    ConcurrentDuplicate(String),
    #[error("Failed to run query")]
    RunQueryError(#[from] diesel::result::Error),
}

impl Debug for SettlementError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)?;
        error_fmt_chain(f, &self.source())
    }
}

// Apply one confirmed payment atomically across User, CartItem, Order and
// Payment records.
//
// The whole settlement is one transaction. The payment row is written
// LAST and its intent_id unique constraint is the commit marker: a
// concurrent duplicate delivery double-applies nothing because its
// transaction rolls back at that insert, and a sequential redelivery
// short-circuits on the initial lookup. Balance updates are single-
// statement increments, never read-modify-write.
#[tracing::instrument(
    "Applying confirmed payment",
    skip(conn, payment),
    fields(intent_id = %payment.intent_id, kind = payment.kind.as_str())
)]
pub async fn settle_payment(
    mut conn: DbConnection,
    payment: ConfirmedPayment,
) -> Result<SettlementOutcome, SettlementError> {
    let result = spawn_blocking_with_tracing(move || {
        conn.transaction::<SettlementOutcome, SettlementError, _>(|conn| {
            use crate::schema::cart_items;
            use crate::schema::orders;
            use crate::schema::payments;
            use crate::schema::users;

            let already_settled = payments::table
                .filter(payments::intent_id.eq(&payment.intent_id))
                .first::<Payment>(conn)
                .optional()?
                .is_some();

            if already_settled {
                return Ok(SettlementOutcome::AlreadyProcessed);
            }

            orders::table
                .find(payment.order_id)
                .first::<Order>(conn)
                .optional()?
                .ok_or(SettlementError::OrderNotFound(payment.order_id))?;

            let payer = users::table
                .find(payment.user_id)
                .first::<User>(conn)
                .optional()?
                .ok_or(SettlementError::UserNotFound(payment.user_id))?;

            let total = payment.amount + payment.tip;

            diesel::update(users::table.find(payment.user_id))
                .set((
                    users::paid.eq(users::paid + payment.amount),
                    users::tip.eq(users::tip + payment.tip),
                    users::total.eq(users::total + total),
                ))
                .execute(conn)?;

            match &payment.kind {
                PaymentKind::PerDish { items } | PaymentKind::CartPay { items } => {
                    for item in items {
                        let affected = diesel::update(
                            cart_items::table
                                .find(item.item_id)
                                .filter(cart_items::order_id.eq(payment.order_id)),
                        )
                        .set((
                            cart_items::paid.eq(true),
                            cart_items::paid_by.eq(payer.name.clone()),
                        ))
                        .execute(conn)?;

                        if affected == 0 {
                            tracing::warn!(
                                item_id = %item.item_id,
                                "Settled cart item is missing from the order"
                            );
                        }
                    }
                }
                PaymentKind::FullBill => {}
            }

            if payment.completes_order {
                diesel::update(orders::table.find(payment.order_id))
                    .set((
                        orders::paid.eq(true),
                        orders::paid_date.eq(Utc::now()),
                        orders::active.eq(false),
                        orders::tip.eq(orders::tip + payment.tip),
                    ))
                    .execute(conn)?;
            }

            let record = Payment {
                payment_id: Uuid::new_v4(),
                intent_id: payment.intent_id.clone(),
                order_id: payment.order_id,
                branch_id: payment.branch_id,
                user_id: payment.user_id,
                method: payment.method.as_str().to_string(),
                amount: payment.amount,
                tip: payment.tip,
                total,
                status: PAYMENT_STATUS_ACCEPTED.to_string(),
                created_at: Utc::now(),
            };

            diesel::insert_into(payments::table)
                .values(&record)
                .execute(conn)
                .map_err(|error| {
                    if is_unique_violation(&error) {
                        SettlementError::ConcurrentDuplicate(payment.intent_id.clone())
                    } else {
                        SettlementError::RunQueryError(error)
                    }
                })?;

            Ok(SettlementOutcome::Applied)
        })
    })
    .await?;

    match result {
        Err(SettlementError::ConcurrentDuplicate(intent_id)) => {
            tracing::info!(intent_id = %intent_id, "Duplicate settlement rolled back");
            Ok(SettlementOutcome::AlreadyProcessed)
        }
        other => other,
    }
}
