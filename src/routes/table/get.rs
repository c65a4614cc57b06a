use actix_web::{error::{ErrorInternalServerError, ErrorNotFound}, web, HttpResponse};
use uuid::Uuid;

use crate::{
    db_interaction::{get_table_view, TableViewError},
    utils::{get_pooled_connection, DbPool},
};

// The re-fetch target for invalidation events: every connected client
// reloads this view when the table channel fires.
#[tracing::instrument(
    "Getting table view",
    skip(pool)
)]
pub async fn get_table(
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, actix_web::Error> {
    let table_id = path.into_inner();

    let conn = get_pooled_connection(&pool)
        .await
        .map_err(ErrorInternalServerError)?;

    let view = get_table_view(conn, table_id)
        .await
        .map_err(|error| match error {
            TableViewError::TableNotFound(_) => ErrorNotFound(error),
            other => ErrorInternalServerError(other),
        })?;

    Ok(HttpResponse::Ok().json(view))
}
