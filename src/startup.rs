use std::net::TcpListener;

use actix_session::{storage::CookieSessionStore, SessionMiddleware};
use actix_web::{cookie::Key, dev::Server, web, App, HttpServer};
use diesel::{r2d2::ConnectionManager, PgConnection};
use r2d2::Pool;
use secrecy::{ExposeSecret, SecretString};
use tracing_actix_web::TracingLogger;

use crate::{
    configuration::Settings,
    events::EventBroker,
    routes::{
        cart::{delete_cart_item, post_cart_item},
        health_check,
        help::post_help,
        order::{post_end_order, post_end_order_ack, post_payment},
        payment::payment_complete,
        table::{get_table, join, table_events},
        webhook::stripe_webhook,
    },
    session_state::RequireDinerFactory,
    stripe_client::StripeClient,
    whatsapp_client::WhatsappClient,
};

// Public origin used to build the provider's redirect urls
pub struct ApplicationBaseUrl(pub String);

// Shared secret the webhook endpoint checks the Stripe-Signature header
// against; the cryptographic verification itself is delegated.
pub struct WebhookSecret(pub SecretString);

pub struct Application {
    pub host: String,
    pub port: u16,
    pub server: Server,
}

impl Application {
    pub async fn new(settings: Settings) -> Result<Application, anyhow::Error> {
        let manager = ConnectionManager::<PgConnection>::new(
            settings.database.get_database_table_url(),
        );
        let pool = Pool::builder().build(manager)?;

        let stripe_client = StripeClient::new(
            settings.stripe.api_uri,
            settings.stripe.secret_key,
            settings.stripe.currency,
            settings.stripe.timeout_seconds,
        );

        let whatsapp_client = WhatsappClient::new(
            settings.whatsapp.api_uri,
            settings.whatsapp.account_sid,
            settings.whatsapp.auth_token,
            settings.whatsapp.from_number,
            settings.whatsapp.timeout_seconds,
        );

        let pool = web::Data::new(pool);
        let broker = web::Data::new(EventBroker::new());
        let stripe_client = web::Data::new(stripe_client);
        let whatsapp_client = web::Data::new(whatsapp_client);
        let base_url = web::Data::new(ApplicationBaseUrl(settings.application.base_url));
        let webhook_secret = web::Data::new(WebhookSecret(settings.stripe.webhook_secret));

        let session_key =
            Key::derive_from(settings.application.hmac_secret.expose_secret().as_bytes());

        let listener = TcpListener::bind((
            settings.application.host.as_str(),
            settings.application.port,
        ))?;
        let host = settings.application.host;
        let port = listener.local_addr()?.port();

        let server = HttpServer::new(move || {
            App::new()
                .wrap(TracingLogger::default())
                .wrap(
                    SessionMiddleware::builder(
                        CookieSessionStore::default(),
                        session_key.clone(),
                    )
                    .cookie_secure(false)
                    .build(),
                )
                .route("/health", web::get().to(health_check))
                .route("/table/{table_id}", web::get().to(get_table))
                .route("/table/{table_id}/join", web::post().to(join))
                .route("/table/{table_id}/events", web::get().to(table_events))
                .service(
                    web::resource("/table/{table_id}/cart")
                        .route(web::post().to(post_cart_item))
                        .wrap(RequireDinerFactory),
                )
                .service(
                    web::resource("/table/{table_id}/cart/{cart_item_id}")
                        .route(web::delete().to(delete_cart_item))
                        .wrap(RequireDinerFactory),
                )
                .service(
                    web::resource("/table/{table_id}/pay")
                        .route(web::post().to(post_payment))
                        .wrap(RequireDinerFactory),
                )
                .service(
                    web::resource("/table/{table_id}/end")
                        .route(web::post().to(post_end_order))
                        .wrap(RequireDinerFactory),
                )
                .service(
                    web::resource("/table/{table_id}/end/ack")
                        .route(web::post().to(post_end_order_ack))
                        .wrap(RequireDinerFactory),
                )
                .service(
                    web::resource("/table/{table_id}/help")
                        .route(web::post().to(post_help))
                        .wrap(RequireDinerFactory),
                )
                .route("/payment/complete", web::get().to(payment_complete))
                .route("/webhooks/stripe", web::post().to(stripe_webhook))
                .app_data(pool.clone())
                .app_data(broker.clone())
                .app_data(stripe_client.clone())
                .app_data(whatsapp_client.clone())
                .app_data(base_url.clone())
                .app_data(webhook_secret.clone())
        })
        .listen(listener)?
        .run();

        Ok(Application { host, port, server })
    }
}
