use std::{error::Error, fmt::Debug};

use diesel::{Connection, ExpressionMethods, OptionalExtension, QueryDsl, RunQueryDsl};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    amounts::{amount_left_to_pay, order_total},
    db_interaction::payments::{accepted_payment_totals, cart_lines_for_order},
    models::{CartItem, Order, Table, User},
    telemetry::spawn_blocking_with_tracing,
    utils::{error_fmt_chain, DbConnection},
};

// One cart line plus the diners sharing it
#[derive(Serialize)]
pub struct CartItemWithOwners {
    pub item: CartItem,
    pub owners: Vec<Uuid>,
}

// The aggregate every connected client re-fetches after an invalidation
// event: the table, its open order, attached diners and the live balance.
#[derive(Serialize)]
pub struct TableView {
    pub table: Table,
    pub order: Option<OrderView>,
}

#[derive(Serialize)]
pub struct OrderView {
    pub order: Order,
    pub users: Vec<User>,
    pub items: Vec<CartItemWithOwners>,
    pub amount_left_to_pay: Decimal,
}

// Error associated with loading a table's shared view
#[derive(Error)]
pub enum TableViewError {
    #[error("Failed due to threadpool error")]
    ThreadpoolError(#[from] tokio::task::JoinError),
    #[error("table {0} does not exist")]
    TableNotFound(Uuid),
    #[error("Failed to run query")]
    RunQueryError(#[from] diesel::result::Error),
}

impl Debug for TableViewError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)?;
        error_fmt_chain(f, &self.source())
    }
}

#[tracing::instrument(
    "Getting order by id",
    skip(conn)
)]
pub async fn find_order(
    mut conn: DbConnection,
    order_id: Uuid,
) -> Result<Option<Order>, anyhow::Error> {
    use anyhow::Context;

    let res = spawn_blocking_with_tracing(move || {
        use crate::schema::orders;

        orders::table
            .find(order_id)
            .first::<Order>(&mut conn)
            .optional()
            .context("Failed to get order by id")
    })
    .await
    .context("Failed due to threadpool error")??;

    Ok(res)
}

#[tracing::instrument(
    "Loading table view",
    skip(conn)
)]
pub async fn get_table_view(
    mut conn: DbConnection,
    table_id: Uuid,
) -> Result<TableView, TableViewError> {
    let view = spawn_blocking_with_tracing(move || {
        // Read everything inside one transaction so concurrent settlements
        // cannot produce a view with mismatched balances
        conn.transaction::<TableView, TableViewError, _>(|conn| {
            use crate::schema::cart_item_owners;
            use crate::schema::cart_items;
            use crate::schema::orders;
            use crate::schema::tables;
            use crate::schema::users;

            let table = tables::table
                .find(table_id)
                .first::<Table>(conn)
                .optional()?
                .ok_or(TableViewError::TableNotFound(table_id))?;

            let Some(order_id) = table.order_id else {
                return Ok(TableView { table, order: None });
            };

            let order = orders::table.find(order_id).first::<Order>(conn)?;

            let diners = users::table
                .filter(users::order_id.eq(order_id))
                .order_by(users::created_at)
                .load::<User>(conn)?;

            let items = cart_items::table
                .filter(cart_items::order_id.eq(order_id))
                .order_by(cart_items::created_at)
                .load::<CartItem>(conn)?;

            let item_ids: Vec<Uuid> = items.iter().map(|item| item.cart_item_id).collect();
            let ownerships = cart_item_owners::table
                .filter(cart_item_owners::cart_item_id.eq_any(&item_ids))
                .load::<(Uuid, Uuid)>(conn)?;

            let items = items
                .into_iter()
                .map(|item| {
                    let owners = ownerships
                        .iter()
                        .filter(|(cart_item_id, _)| *cart_item_id == item.cart_item_id)
                        .map(|(_, user_id)| *user_id)
                        .collect();

                    CartItemWithOwners { item, owners }
                })
                .collect();

            let lines = cart_lines_for_order(conn, order_id)?;
            let settled = accepted_payment_totals(conn, order_id)?;
            let amount_left = amount_left_to_pay(order_total(&lines), &settled);

            Ok(TableView {
                table,
                order: Some(OrderView {
                    order,
                    users: diners,
                    items,
                    amount_left_to_pay: amount_left,
                }),
            })
        })
    })
    .await??;

    Ok(view)
}
