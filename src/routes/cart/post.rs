use actix_web::{error::{ErrorBadRequest, ErrorConflict, ErrorForbidden, ErrorInternalServerError, ErrorNotFound}, web, HttpResponse};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    db_interaction::{add_cart_item, AddCartItemError, NewCartItemData},
    events::{invalidation_message, table_channel, EventBroker},
    session_state::TypedSession,
    utils::{get_pooled_connection, DbPool},
};

#[derive(Deserialize, Debug)]
pub struct CartItemForm {
    pub product_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
    // Other diners sharing the dish, in addition to the one adding it
    pub shared_with: Option<Vec<Uuid>>,
}

#[tracing::instrument(
    "Adding item to the shared cart",
    skip(pool, session, broker)
)]
pub async fn post_cart_item(
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
    form: web::Json<CartItemForm>,
    session: TypedSession,
    broker: web::Data<EventBroker>,
) -> Result<HttpResponse, actix_web::Error> {
    let table_id = path.into_inner();
    let form = form.0;

    let user_id = session
        .get_user_id()
        .map_err(ErrorInternalServerError)?
        .ok_or_else(|| ErrorForbidden("Join the table first"))?;

    // The session identity is table-scoped: joining table A does not let a
    // diner put items on table B's tab
    let session_table = session.get_table_id().map_err(ErrorInternalServerError)?;
    if session_table != Some(table_id) {
        return Err(ErrorForbidden("Join this table first"));
    }

    if form.price <= Decimal::ZERO {
        return Err(ErrorBadRequest("Item price must be positive"));
    }
    if form.quantity <= 0 {
        return Err(ErrorBadRequest("Item quantity must be positive"));
    }
    if form.name.trim().is_empty() {
        return Err(ErrorBadRequest("Item name cannot be empty"));
    }

    let mut owners = form.shared_with.clone().unwrap_or_default();
    owners.push(user_id);

    let data = NewCartItemData {
        product_id: form.product_id,
        name: form.name,
        price: form.price,
        quantity: form.quantity,
    };

    let conn = get_pooled_connection(&pool)
        .await
        .map_err(ErrorInternalServerError)?;

    let item = add_cart_item(conn, table_id, data, owners)
        .await
        .map_err(|error| match error {
            AddCartItemError::TableNotFound(_) => ErrorNotFound(error),
            AddCartItemError::NoOpenOrder(_) => ErrorConflict(error),
            other => ErrorInternalServerError(other),
        })?;

    session
        .push_cart_item(item.cart_item_id)
        .map_err(ErrorInternalServerError)?;

    broker.publish(&table_channel(table_id), invalidation_message());

    Ok(HttpResponse::Ok().json(item))
}
