use anyhow::Context;
use diesel::{OptionalExtension, QueryDsl, RunQueryDsl};
use uuid::Uuid;

use crate::{models::Branch, telemetry::spawn_blocking_with_tracing, utils::DbConnection};

#[tracing::instrument(
    "Getting branch by id",
    skip(conn)
)]
pub async fn find_branch(
    mut conn: DbConnection,
    branch_id: Uuid,
) -> Result<Option<Branch>, anyhow::Error> {
    let res = spawn_blocking_with_tracing(move || {
        use crate::schema::branches;

        branches::table
            .find(branch_id)
            .first::<Branch>(&mut conn)
            .optional()
            .context("Failed to get branch by id")
    })
    .await
    .context("Failed due to threadpool error")??;

    Ok(res)
}
