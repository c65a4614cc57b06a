use std::{error::Error, fmt::Debug};

use anyhow::Context;
use chrono::Utc;
use diesel::{OptionalExtension, QueryDsl, RunQueryDsl};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    domain::{pick_user_color, UserName},
    models::User,
    telemetry::spawn_blocking_with_tracing,
    utils::{error_fmt_chain, DbConnection},
};

// Error associated with creating a diner identity
#[derive(Error)]
pub enum InsertUserError {
    #[error("Failed due to threadpool error")]
    ThreadpoolError(#[from] tokio::task::JoinError),
    #[error("Failed to run query")]
    RunQueryError(#[from] diesel::result::Error),
}

impl Debug for InsertUserError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)?;
        error_fmt_chain(f, &self.source())
    }
}

// Create the ephemeral diner identity at name-entry. Balances start at
// zero; table/order attachment happens in lifecycle::join_table.
#[tracing::instrument(
    "Inserting diner into the database",
    skip(conn)
)]
pub async fn insert_user(
    mut conn: DbConnection,
    name: UserName,
) -> Result<User, InsertUserError> {
    let user = User {
        user_id: Uuid::new_v4(),
        name: name.inner(),
        color: pick_user_color(),
        table_id: None,
        order_id: None,
        paid: Decimal::ZERO,
        tip: Decimal::ZERO,
        total: Decimal::ZERO,
        created_at: Utc::now(),
    };

    let inserted = user.clone();
    spawn_blocking_with_tracing(move || {
        use crate::schema::users;

        diesel::insert_into(users::table)
            .values(&inserted)
            .execute(&mut conn)
    })
    .await??;

    Ok(user)
}

#[tracing::instrument(
    "Getting diner by id",
    skip(conn)
)]
pub async fn find_user(
    mut conn: DbConnection,
    user_id: Uuid,
) -> Result<Option<User>, anyhow::Error> {
    let res = spawn_blocking_with_tracing(move || {
        use crate::schema::users;

        users::table
            .find(user_id)
            .first::<User>(&mut conn)
            .optional()
            .context("Failed to get diner by id")
    })
    .await
    .context("Failed due to threadpool error")??;

    Ok(res)
}

