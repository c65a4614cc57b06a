use chrono::{DateTime, Utc};
use diesel::prelude::{Insertable, Queryable};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::schema::branches;
use crate::schema::cart_item_owners;
use crate::schema::cart_items;
use crate::schema::notifications;
use crate::schema::orders;
use crate::schema::payments;
use crate::schema::tables;
use crate::schema::users;

#[derive(Queryable, Insertable, Clone)]
#[diesel(table_name = branches)]
pub struct Branch {
    pub branch_id: Uuid,
    pub name: String,
    pub accepted_methods: Vec<String>,
    pub staff_number: Option<String>,
}

#[derive(Queryable, Insertable, Serialize, Clone)]
#[diesel(table_name = tables)]
pub struct Table {
    pub table_id: Uuid,
    pub branch_id: Uuid,
    pub number: i32,
    pub seats: i32,
    pub order_id: Option<Uuid>,
}

// A shared tab for one seating. At most one active order per table,
// enforced by the one_active_order_per_table index.
#[derive(Queryable, Insertable, Serialize, Clone)]
#[diesel(table_name = orders)]
pub struct Order {
    pub order_id: Uuid,
    pub table_id: Option<Uuid>,
    pub branch_id: Uuid,
    pub active: bool,
    pub paid: bool,
    pub paid_date: Option<DateTime<Utc>>,
    pub tip: Decimal,
    pub created_at: DateTime<Utc>,
}

// An ephemeral diner identity, not a staff account
#[derive(Queryable, Insertable, Serialize, Clone)]
#[diesel(table_name = users)]
pub struct User {
    pub user_id: Uuid,
    pub name: String,
    pub color: String,
    pub table_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub paid: Decimal,
    pub tip: Decimal,
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Queryable, Insertable, Serialize, Clone)]
#[diesel(table_name = cart_items)]
pub struct CartItem {
    pub cart_item_id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
    pub paid: bool,
    pub paid_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Queryable, Insertable, Clone)]
#[diesel(table_name = cart_item_owners)]
pub struct CartItemOwner {
    pub cart_item_id: Uuid,
    pub user_id: Uuid,
}

#[derive(Queryable, Insertable, Serialize, Clone)]
#[diesel(table_name = payments)]
pub struct Payment {
    pub payment_id: Uuid,
    pub intent_id: String,
    pub order_id: Uuid,
    pub branch_id: Uuid,
    pub user_id: Uuid,
    pub method: String,
    pub amount: Decimal,
    pub tip: Decimal,
    pub total: Decimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Queryable, Insertable, Serialize, Deserialize, Clone)]
#[diesel(table_name = notifications)]
pub struct Notification {
    pub notification_id: Uuid,
    pub branch_id: Uuid,
    pub table_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub kind: String,
    pub message: String,
    pub method: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

pub const PAYMENT_STATUS_PENDING: &str = "pending";
pub const PAYMENT_STATUS_ACCEPTED: &str = "accepted";
pub const PAYMENT_STATUS_DISPUTED: &str = "disputed";

pub const NOTIFICATION_STATUS_PENDING: &str = "pending";
