use std::convert::Infallible;

use actix_web::{web, HttpResponse};
use futures_util::{stream, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::events::{table_channel, EventBroker};

// One long-lived subscription per open browser connection. Closing the
// response stream drops the broadcast receiver, which unregisters the
// listener; the broker prunes the channel once the last receiver is gone.
#[tracing::instrument(
    "Opening table event stream",
    skip(broker)
)]
pub async fn table_events(
    path: web::Path<Uuid>,
    broker: web::Data<EventBroker>,
) -> HttpResponse {
    let table_id = path.into_inner();
    let receiver = broker.subscribe(&table_channel(table_id));

    let greeting = stream::iter([Ok::<_, Infallible>(web::Bytes::from_static(
        b": connected\n\n",
    ))]);

    let messages = stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(message) => {
                    let frame = web::Bytes::from(format!("data: {}\n\n", message));
                    break Some((Ok::<_, Infallible>(frame), receiver));
                }
                Err(RecvError::Lagged(skipped)) => {
                    // A slow consumer only needs to know it must re-fetch,
                    // not every message it missed
                    tracing::warn!(skipped, "Event stream subscriber lagged");
                    continue;
                }
                Err(RecvError::Closed) => break None,
            }
        }
    });

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("cache-control", "no-cache"))
        .streaming(greeting.chain(messages))
}
