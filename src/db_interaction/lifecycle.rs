use std::{error::Error, fmt::Debug};

use chrono::Utc;
use diesel::{Connection, ExpressionMethods, OptionalExtension, PgConnection, QueryDsl, RunQueryDsl};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    models::{Order, Table},
    telemetry::spawn_blocking_with_tracing,
    utils::{error_fmt_chain, is_unique_violation, DbConnection},
};

// How often a lost order-creation race is retried before giving up. One
// retry is enough: the second attempt reads the winner's order.
const JOIN_ATTEMPTS: u8 = 2;

// Error associated with attaching a diner to a table
#[derive(Error)]
pub enum JoinTableError {
    #[error("Failed due to threadpool error")]
    ThreadpoolError(#[from] tokio::task::JoinError),
    #[error("table {0} does not exist")]
    TableNotFound(Uuid),
    #[error("diner {0} does not exist")]
    UserNotFound(Uuid),
    #[error("Failed to run query")]
    RunQueryError(#[from] diesel::result::Error),
}

impl Debug for JoinTableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)?;
        error_fmt_chain(f, &self.source())
    }
}

// Attach a diner to a table and its active order, opening the tab if this
// is the first diner. Safe to call again for an already-attached diner.
//
// Two diners joining a fresh table at once both try to insert an order;
// the one_active_order_per_table index rejects the loser, whose
// transaction rolls back and retries against the winner's order.
#[tracing::instrument(
    "Joining diner to table",
    skip(conn)
)]
pub async fn join_table(
    mut conn: DbConnection,
    table_id: Uuid,
    user_id: Uuid,
) -> Result<Uuid, JoinTableError> {
    let order_id = spawn_blocking_with_tracing(move || {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let result = conn.transaction::<Uuid, JoinTableError, _>(|conn| {
                use crate::schema::orders;
                use crate::schema::tables;
                use crate::schema::users;

                let table = tables::table
                    .find(table_id)
                    .first::<Table>(conn)
                    .optional()?
                    .ok_or(JoinTableError::TableNotFound(table_id))?;

                let current = users::table
                    .find(user_id)
                    .select((users::table_id, users::order_id))
                    .first::<(Option<Uuid>, Option<Uuid>)>(conn)
                    .optional()?
                    .ok_or(JoinTableError::UserNotFound(user_id))?;

                // A diner switching tables leaves their old participation
                // behind before attaching anywhere else
                if let (Some(previous_table), _) = current {
                    if previous_table != table_id {
                        clean_user_participation(conn, user_id)?;
                    }
                }

                let active_order = orders::table
                    .filter(orders::table_id.eq(table_id))
                    .filter(orders::active.eq(true))
                    .first::<Order>(conn)
                    .optional()?;

                let order_id = match active_order {
                    Some(order) => order.order_id,
                    None => {
                        // The first diner opens the tab
                        let order = Order {
                            order_id: Uuid::new_v4(),
                            table_id: Some(table_id),
                            branch_id: table.branch_id,
                            active: true,
                            paid: false,
                            paid_date: None,
                            tip: Decimal::ZERO,
                            created_at: Utc::now(),
                        };

                        diesel::insert_into(orders::table)
                            .values(&order)
                            .execute(conn)?;

                        order.order_id
                    }
                };

                diesel::update(users::table.find(user_id))
                    .set((
                        users::table_id.eq(table_id),
                        users::order_id.eq(order_id),
                    ))
                    .execute(conn)?;

                diesel::update(tables::table.find(table_id))
                    .set(tables::order_id.eq(order_id))
                    .execute(conn)?;

                Ok(order_id)
            });

            match result {
                Err(JoinTableError::RunQueryError(ref error))
                    if is_unique_violation(error) && attempt < JOIN_ATTEMPTS =>
                {
                    tracing::info!("Lost the order creation race, retrying against the winner");
                    continue;
                }
                other => break other,
            }
        }
    })
    .await??;

    Ok(order_id)
}

// Error associated with ending a table's order
#[derive(Error)]
pub enum EndOrderError {
    #[error("Failed due to threadpool error")]
    ThreadpoolError(#[from] tokio::task::JoinError),
    #[error("table {0} does not exist")]
    TableNotFound(Uuid),
    #[error("Failed to run query")]
    RunQueryError(#[from] diesel::result::Error),
}

impl Debug for EndOrderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)?;
        error_fmt_chain(f, &self.source())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum EndOrderOutcome {
    // The order that was closed by this call
    Ended(Uuid),
    // Nothing to do: the table has no open tab (double-invocation path)
    NoOpenOrder,
}

// Close a table's tab: zero every attached diner's balances, detach them,
// unlink cart-item ownership, deactivate the order and clear the table's
// back-reference. Cart item rows stay on the ended order as history.
//
// Keyed on tables.order_id rather than the active flag so that the
// end-acknowledgement after a full-bill settlement (which already cleared
// the flag) still runs the cleanup. Calling this twice is a no-op.
#[tracing::instrument(
    "Ending order for table",
    skip(conn)
)]
pub async fn end_order(
    mut conn: DbConnection,
    table_id: Uuid,
) -> Result<EndOrderOutcome, EndOrderError> {
    let outcome = spawn_blocking_with_tracing(move || {
        conn.transaction::<EndOrderOutcome, EndOrderError, _>(|conn| {
            use crate::schema::orders;
            use crate::schema::tables;
            use crate::schema::users;

            let table = tables::table
                .find(table_id)
                .first::<Table>(conn)
                .optional()?
                .ok_or(EndOrderError::TableNotFound(table_id))?;

            let Some(order_id) = table.order_id else {
                return Ok(EndOrderOutcome::NoOpenOrder);
            };

            let attached_users: Vec<Uuid> = users::table
                .filter(users::order_id.eq(order_id))
                .select(users::user_id)
                .load::<Uuid>(conn)?;

            for user_id in attached_users {
                clean_user_participation(conn, user_id)?;
            }

            diesel::update(orders::table.find(order_id))
                .set((
                    orders::active.eq(false),
                    orders::table_id.eq(None::<Uuid>),
                ))
                .execute(conn)?;

            diesel::update(tables::table.find(table_id))
                .set(tables::order_id.eq(None::<Uuid>))
                .execute(conn)?;

            Ok(EndOrderOutcome::Ended(order_id))
        })
    })
    .await??;

    Ok(outcome)
}

// User-level cleanup shared by end_order and forced resets: zero the
// balances, detach from order and table, drop cart-item ownership links.
// The invariant total = paid + tip holds trivially at zero.
pub fn clean_user_participation(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> Result<(), diesel::result::Error> {
    use crate::schema::cart_item_owners;
    use crate::schema::users;

    diesel::delete(cart_item_owners::table.filter(cart_item_owners::user_id.eq(user_id)))
        .execute(conn)?;

    diesel::update(users::table.find(user_id))
        .set((
            users::paid.eq(Decimal::ZERO),
            users::tip.eq(Decimal::ZERO),
            users::total.eq(Decimal::ZERO),
            users::table_id.eq(None::<Uuid>),
            users::order_id.eq(None::<Uuid>),
        ))
        .execute(conn)?;

    Ok(())
}
