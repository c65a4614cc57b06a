use actix_web::{error::{ErrorBadRequest, ErrorInternalServerError, ErrorNotFound}, web, HttpResponse};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    db_interaction::{find_user, insert_user, join_table, JoinTableError},
    domain::UserName,
    events::{invalidation_message, table_channel, EventBroker},
    session_state::TypedSession,
    utils::{get_pooled_connection, DbPool},
};

#[derive(Deserialize, Debug)]
pub struct JoinForm {
    pub name: String,
}

#[derive(Serialize)]
pub struct JoinResponse {
    pub user_id: Uuid,
    pub order_id: Uuid,
    pub name: String,
    pub color: String,
}

// A diner scans the table's QR code and enters a name. The first diner at
// the table opens the shared tab; everyone after that lands on it.
#[tracing::instrument(
    "Joining diner to table",
    skip(pool, session, broker)
)]
pub async fn join(
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
    form: web::Json<JoinForm>,
    session: TypedSession,
    broker: web::Data<EventBroker>,
) -> Result<HttpResponse, actix_web::Error> {
    let table_id = path.into_inner();
    let name = UserName::parse(form.0.name).map_err(ErrorBadRequest)?;

    // Reuse the session identity while it still resolves to a diner row;
    // purged rows get a fresh identity
    let existing = match session.get_user_id().map_err(ErrorInternalServerError)? {
        Some(user_id) => {
            let conn = get_pooled_connection(&pool)
                .await
                .map_err(ErrorInternalServerError)?;

            find_user(conn, user_id)
                .await
                .map_err(ErrorInternalServerError)?
        }
        None => None,
    };

    let user = match existing {
        Some(user) => user,
        None => {
            let conn = get_pooled_connection(&pool)
                .await
                .map_err(ErrorInternalServerError)?;

            insert_user(conn, name).await.map_err(ErrorInternalServerError)?
        }
    };

    let conn = get_pooled_connection(&pool)
        .await
        .map_err(ErrorInternalServerError)?;

    let order_id = join_table(conn, table_id, user.user_id)
        .await
        .map_err(|error| match error {
            JoinTableError::TableNotFound(_) => ErrorNotFound(error),
            other => ErrorInternalServerError(other),
        })?;

    session.renew();
    session
        .set_user_id(user.user_id)
        .context("Failed to insert diner id into the session")
        .map_err(ErrorInternalServerError)?;
    session
        .set_username(&user.name)
        .context("Failed to insert diner name into the session")
        .map_err(ErrorInternalServerError)?;
    session
        .set_table_id(table_id)
        .context("Failed to insert table id into the session")
        .map_err(ErrorInternalServerError)?;

    broker.publish(&table_channel(table_id), invalidation_message());

    Ok(HttpResponse::Ok().json(JoinResponse {
        user_id: user.user_id,
        order_id,
        name: user.name,
        color: user.color,
    }))
}
