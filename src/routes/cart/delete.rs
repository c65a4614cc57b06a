use actix_web::{error::{ErrorConflict, ErrorInternalServerError, ErrorNotFound}, web, HttpResponse};
use uuid::Uuid;

use crate::{
    db_interaction::{remove_cart_item, RemoveCartItemError},
    events::{invalidation_message, table_channel, EventBroker},
    session_state::TypedSession,
    utils::{get_pooled_connection, DbPool},
};

#[tracing::instrument(
    "Removing item from the shared cart",
    skip(pool, session, broker)
)]
pub async fn delete_cart_item(
    pool: web::Data<DbPool>,
    path: web::Path<(Uuid, Uuid)>,
    session: TypedSession,
    broker: web::Data<EventBroker>,
) -> Result<HttpResponse, actix_web::Error> {
    let (table_id, cart_item_id) = path.into_inner();

    let conn = get_pooled_connection(&pool)
        .await
        .map_err(ErrorInternalServerError)?;

    remove_cart_item(conn, cart_item_id)
        .await
        .map_err(|error| match error {
            RemoveCartItemError::ItemNotFound(_) => ErrorNotFound(error),
            // Settled lines are history; a concurrent payment won the race
            RemoveCartItemError::AlreadyPaid(_) => ErrorConflict(error),
            other => ErrorInternalServerError(other),
        })?;

    // Drop the line from this diner's session cart snapshot as well
    let cart = session.get_cart().map_err(ErrorInternalServerError)?;
    if cart.contains(&cart_item_id) {
        session.clear_cart();
        for remaining in cart.into_iter().filter(|id| *id != cart_item_id) {
            session
                .push_cart_item(remaining)
                .map_err(ErrorInternalServerError)?;
        }
    }

    broker.publish(&table_channel(table_id), invalidation_message());

    Ok(HttpResponse::Ok().finish())
}
