use std::{error::Error, fmt::Debug};

use thiserror::Error;

use diesel::RunQueryDsl;

use crate::{
    models::Notification,
    telemetry::spawn_blocking_with_tracing,
    utils::{error_fmt_chain, DbConnection},
};

// Error associated with recording a staff notification
#[derive(Error)]
pub enum InsertNotificationError {
    #[error("Failed due to threadpool error")]
    ThreadpoolError(#[from] tokio::task::JoinError),
    #[error("Failed to run query")]
    RunQueryError(#[from] diesel::result::Error),
}

impl Debug for InsertNotificationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)?;
        error_fmt_chain(f, &self.source())
    }
}

// The notification row is written before any delivery attempt; the staff
// dashboard reads it even if the WhatsApp send fails.
#[tracing::instrument(
    "Inserting staff notification",
    skip_all
)]
pub async fn insert_notification(
    mut conn: DbConnection,
    notification: Notification,
) -> Result<(), InsertNotificationError> {
    spawn_blocking_with_tracing(move || {
        use crate::schema::notifications;

        diesel::insert_into(notifications::table)
            .values(&notification)
            .execute(&mut conn)
    })
    .await??;

    Ok(())
}
