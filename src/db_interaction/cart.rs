use std::{error::Error, fmt::Debug};

use chrono::Utc;
use diesel::{Connection, ExpressionMethods, OptionalExtension, QueryDsl, RunQueryDsl};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    models::{CartItem, CartItemOwner, Order, Table},
    telemetry::spawn_blocking_with_tracing,
    utils::{error_fmt_chain, DbConnection},
};

// Denormalised line data captured at add-time; the catalog is an external
// collaborator and its prices may change under us.
#[derive(Debug, Clone)]
pub struct NewCartItemData {
    pub product_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
}

// Error associated with adding an item to a table's shared cart
#[derive(Error)]
pub enum AddCartItemError {
    #[error("Failed due to threadpool error")]
    ThreadpoolError(#[from] tokio::task::JoinError),
    #[error("table {0} does not exist")]
    TableNotFound(Uuid),
    #[error("table {0} has no open order")]
    NoOpenOrder(Uuid),
    #[error("Failed to run query")]
    RunQueryError(#[from] diesel::result::Error),
}

impl Debug for AddCartItemError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)?;
        error_fmt_chain(f, &self.source())
    }
}

// Add one line to the table's active order, owned by one or more diners
// (shared-dish semantics).
#[tracing::instrument(
    "Adding item to shared cart",
    skip(conn, data)
)]
pub async fn add_cart_item(
    mut conn: DbConnection,
    table_id: Uuid,
    data: NewCartItemData,
    owner_ids: Vec<Uuid>,
) -> Result<CartItem, AddCartItemError> {
    let item = spawn_blocking_with_tracing(move || {
        conn.transaction::<CartItem, AddCartItemError, _>(|conn| {
            use crate::schema::cart_item_owners;
            use crate::schema::cart_items;
            use crate::schema::orders;
            use crate::schema::tables;

            let table = tables::table
                .find(table_id)
                .first::<Table>(conn)
                .optional()?
                .ok_or(AddCartItemError::TableNotFound(table_id))?;

            let order_id = table
                .order_id
                .ok_or(AddCartItemError::NoOpenOrder(table_id))?;

            let order = orders::table
                .find(order_id)
                .first::<Order>(conn)
                .optional()?
                .ok_or(AddCartItemError::NoOpenOrder(table_id))?;

            if !order.active {
                return Err(AddCartItemError::NoOpenOrder(table_id));
            }

            let item = CartItem {
                cart_item_id: Uuid::new_v4(),
                order_id,
                product_id: data.product_id,
                name: data.name.clone(),
                price: data.price,
                quantity: data.quantity,
                paid: false,
                paid_by: None,
                created_at: Utc::now(),
            };

            diesel::insert_into(cart_items::table)
                .values(&item)
                .execute(conn)?;

            let mut owners = owner_ids.clone();
            owners.sort();
            owners.dedup();

            for user_id in owners {
                let owner = CartItemOwner {
                    cart_item_id: item.cart_item_id,
                    user_id,
                };

                diesel::insert_into(cart_item_owners::table)
                    .values(&owner)
                    .execute(conn)?;
            }

            Ok(item)
        })
    })
    .await??;

    Ok(item)
}

// Error associated with removing an item from the shared cart
#[derive(Error)]
pub enum RemoveCartItemError {
    #[error("Failed due to threadpool error")]
    ThreadpoolError(#[from] tokio::task::JoinError),
    #[error("cart item {0} does not exist")]
    ItemNotFound(Uuid),
    #[error("cart item {0} is already settled")]
    AlreadyPaid(Uuid),
    #[error("Failed to run query")]
    RunQueryError(#[from] diesel::result::Error),
}

impl Debug for RemoveCartItemError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)?;
        error_fmt_chain(f, &self.source())
    }
}

// Remove an unpaid line and its ownership links. Settled lines are
// immutable history and stay put.
#[tracing::instrument(
    "Removing item from shared cart",
    skip(conn)
)]
pub async fn remove_cart_item(
    mut conn: DbConnection,
    cart_item_id: Uuid,
) -> Result<(), RemoveCartItemError> {
    spawn_blocking_with_tracing(move || {
        conn.transaction::<(), RemoveCartItemError, _>(|conn| {
            use crate::schema::cart_item_owners;
            use crate::schema::cart_items;

            let item = cart_items::table
                .find(cart_item_id)
                .first::<CartItem>(conn)
                .optional()?
                .ok_or(RemoveCartItemError::ItemNotFound(cart_item_id))?;

            if item.paid {
                return Err(RemoveCartItemError::AlreadyPaid(cart_item_id));
            }

            diesel::delete(
                cart_item_owners::table.filter(cart_item_owners::cart_item_id.eq(cart_item_id)),
            )
            .execute(conn)?;

            diesel::delete(cart_items::table.find(cart_item_id)).execute(conn)?;

            Ok(())
        })
    })
    .await??;

    Ok(())
}
