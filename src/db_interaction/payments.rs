use std::{error::Error, fmt::Debug};

use diesel::{ExpressionMethods, OptionalExtension, PgConnection, QueryDsl, RunQueryDsl};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    amounts::{amount_left_to_pay, order_total, CartLine},
    models::{Table, PAYMENT_STATUS_ACCEPTED},
    telemetry::spawn_blocking_with_tracing,
    utils::{error_fmt_chain, DbConnection},
};

// Totals (amount + tip) of the accepted payments against an order.
// Shared by the amount calculation and the table view, inside whatever
// transaction the caller is running.
pub fn accepted_payment_totals(
    conn: &mut PgConnection,
    order_id: Uuid,
) -> Result<Vec<Decimal>, diesel::result::Error> {
    use crate::schema::payments;

    payments::table
        .filter(payments::order_id.eq(order_id))
        .filter(payments::status.eq(PAYMENT_STATUS_ACCEPTED))
        .select(payments::total)
        .load::<Decimal>(conn)
}

pub fn cart_lines_for_order(
    conn: &mut PgConnection,
    order_id: Uuid,
) -> Result<Vec<CartLine>, diesel::result::Error> {
    use crate::schema::cart_items;

    let lines = cart_items::table
        .filter(cart_items::order_id.eq(order_id))
        .select((cart_items::price, cart_items::quantity))
        .load::<(Decimal, i32)>(conn)?;

    Ok(lines
        .into_iter()
        .map(|(price, quantity)| CartLine { price, quantity })
        .collect())
}

// Error associated with computing a table's remaining balance
#[derive(Error)]
pub enum AmountLeftError {
    #[error("Failed due to threadpool error")]
    ThreadpoolError(#[from] tokio::task::JoinError),
    #[error("table {0} does not exist")]
    TableNotFound(Uuid),
    #[error("table {0} has no open order")]
    NoActiveOrder(Uuid),
    #[error("Failed to run query")]
    RunQueryError(#[from] diesel::result::Error),
}

impl Debug for AmountLeftError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)?;
        error_fmt_chain(f, &self.source())
    }
}

// What is still owed on the table's order. A table without an open order
// is reported as NoActiveOrder rather than a default balance.
#[tracing::instrument(
    "Computing amount left to pay for table",
    skip(conn)
)]
pub async fn amount_left_for_table(
    mut conn: DbConnection,
    table_id: Uuid,
) -> Result<Decimal, AmountLeftError> {
    let amount = spawn_blocking_with_tracing(move || {
        use crate::schema::tables;

        let table = tables::table
            .find(table_id)
            .first::<Table>(&mut conn)
            .optional()?
            .ok_or(AmountLeftError::TableNotFound(table_id))?;

        let order_id = table
            .order_id
            .ok_or(AmountLeftError::NoActiveOrder(table_id))?;

        let lines = cart_lines_for_order(&mut conn, order_id)?;
        let settled = accepted_payment_totals(&mut conn, order_id)?;

        Ok::<Decimal, AmountLeftError>(amount_left_to_pay(order_total(&lines), &settled))
    })
    .await??;

    Ok(amount)
}
