use actix_web::{error::{ErrorInternalServerError, ErrorNotFound}, web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    db_interaction::{find_branch, get_table_view, insert_notification, TableViewError},
    events::{invalidation_message, table_channel, EventBroker},
    models::{Notification, NOTIFICATION_STATUS_PENDING},
    session_state::TypedSession,
    utils::{get_pooled_connection, DbPool},
    whatsapp_client::WhatsappClient,
};

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum HelpKind {
    Waiter,
    Manager,
}

impl HelpKind {
    fn as_str(&self) -> &'static str {
        match self {
            HelpKind::Waiter => "call_waiter",
            HelpKind::Manager => "call_manager",
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct HelpForm {
    pub kind: HelpKind,
    pub message: Option<String>,
}

// A diner calls staff to the table. The notification row is the source of
// truth; WhatsApp delivery is best-effort and never fails the request.
#[tracing::instrument(
    "Requesting staff help",
    skip(pool, session, broker, whatsapp)
)]
pub async fn post_help(
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
    form: web::Json<HelpForm>,
    session: TypedSession,
    broker: web::Data<EventBroker>,
    whatsapp: web::Data<WhatsappClient>,
) -> Result<HttpResponse, actix_web::Error> {
    let table_id = path.into_inner();
    let form = form.0;

    let user_id = session.get_user_id().map_err(ErrorInternalServerError)?;
    let username = session
        .get_username()
        .map_err(ErrorInternalServerError)?
        .unwrap_or_else(|| "A diner".to_string());

    let conn = get_pooled_connection(&pool)
        .await
        .map_err(ErrorInternalServerError)?;

    let view = get_table_view(conn, table_id)
        .await
        .map_err(|error| match error {
            TableViewError::TableNotFound(_) => ErrorNotFound(error),
            other => ErrorInternalServerError(other),
        })?;

    let message = form.message.unwrap_or_else(|| match form.kind {
        HelpKind::Waiter => {
            format!("{} at table {} is calling a waiter", username, view.table.number)
        }
        HelpKind::Manager => {
            format!("{} at table {} is calling a manager", username, view.table.number)
        }
    });

    let notification = Notification {
        notification_id: Uuid::new_v4(),
        branch_id: view.table.branch_id,
        table_id: Some(table_id),
        user_id,
        kind: form.kind.as_str().to_string(),
        message: message.clone(),
        method: "whatsapp".to_string(),
        status: NOTIFICATION_STATUS_PENDING.to_string(),
        created_at: Utc::now(),
    };

    let conn = get_pooled_connection(&pool)
        .await
        .map_err(ErrorInternalServerError)?;

    insert_notification(conn, notification)
        .await
        .map_err(ErrorInternalServerError)?;

    let conn = get_pooled_connection(&pool)
        .await
        .map_err(ErrorInternalServerError)?;

    let branch = find_branch(conn, view.table.branch_id)
        .await
        .map_err(ErrorInternalServerError)?;

    if let Some(staff_number) = branch.and_then(|branch| branch.staff_number) {
        if let Err(error) = whatsapp.send_staff_alert(&staff_number, &message).await {
            tracing::error!("Failed to deliver staff alert over WhatsApp: {:?}", error);
        }
    }

    broker.publish(&table_channel(table_id), invalidation_message());

    Ok(HttpResponse::Ok().finish())
}
