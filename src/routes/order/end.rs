use actix_web::{error::{ErrorInternalServerError, ErrorNotFound}, web, HttpResponse};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    db_interaction::{end_order, EndOrderError, EndOrderOutcome},
    events::{table_channel, EventBroker, END_ORDER_SIGNAL},
    session_state::TypedSession,
    utils::{get_pooled_connection, DbPool},
};

#[derive(Serialize)]
pub struct EndOrderResponse {
    pub ended_order_id: Option<Uuid>,
}

// Close the table's tab. Two browser tabs racing to end the same order is
// normal: the loser finds no open order and succeeds as a no-op.
#[tracing::instrument(
    "Ending order",
    skip(pool, session, broker)
)]
pub async fn post_end_order(
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
    session: TypedSession,
    broker: web::Data<EventBroker>,
) -> Result<HttpResponse, actix_web::Error> {
    let table_id = path.into_inner();

    let conn = get_pooled_connection(&pool)
        .await
        .map_err(ErrorInternalServerError)?;

    let outcome = end_order(conn, table_id)
        .await
        .map_err(|error| match error {
            EndOrderError::TableNotFound(_) => ErrorNotFound(error),
            other => ErrorInternalServerError(other),
        })?;

    session.leave_table();

    let ended_order_id = match outcome {
        EndOrderOutcome::Ended(order_id) => {
            broker.publish(&table_channel(table_id), END_ORDER_SIGNAL.to_string());
            Some(order_id)
        }
        EndOrderOutcome::NoOpenOrder => None,
    };

    Ok(HttpResponse::Ok().json(EndOrderResponse { ended_order_id }))
}

// Clients receiving the endOrder control signal acknowledge it here. The
// shared cleanup already ran (or runs now, after a full-bill settlement);
// what remains is this diner's own session state.
#[tracing::instrument(
    "Acknowledging end of order",
    skip(pool, session, broker)
)]
pub async fn post_end_order_ack(
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
    session: TypedSession,
    broker: web::Data<EventBroker>,
) -> Result<HttpResponse, actix_web::Error> {
    let table_id = path.into_inner();

    let conn = get_pooled_connection(&pool)
        .await
        .map_err(ErrorInternalServerError)?;

    // Idempotent: after a full-bill settlement the first acknowledgement
    // performs the store cleanup, later ones find nothing to do
    let outcome = end_order(conn, table_id)
        .await
        .map_err(|error| match error {
            EndOrderError::TableNotFound(_) => ErrorNotFound(error),
            other => ErrorInternalServerError(other),
        })?;

    if let EndOrderOutcome::Ended(_) = outcome {
        broker.publish(&table_channel(table_id), END_ORDER_SIGNAL.to_string());
    }

    session.leave_table();

    Ok(HttpResponse::Ok().finish())
}
