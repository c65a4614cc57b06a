use std::error::Error;

use chrono::Utc;
use diesel::{pg::Pg, r2d2::ConnectionManager, Connection, ExpressionMethods, PgConnection, QueryDsl, RunQueryDsl};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use dinetab::{
    configuration::{DatabaseSettings, Settings},
    models::{Branch, Table},
    schema::{branches, tables},
    startup::Application,
    telemetry::{get_subscriber, init_subscriber},
    utils::DbPool,
};
use once_cell::sync::Lazy;
use r2d2::Pool;
use reqwest::redirect::Policy;
use secrecy::SecretString;
use uuid::Uuid;
use wiremock::MockServer;

static LOGGER_INSTANCE: Lazy<()> = Lazy::new(|| {
    let log_level = "info".to_string();
    let name = "dinetab-test".to_string();

    if std::env::var("TEST_LOG").is_ok() {
        let subscriber = get_subscriber(name, log_level, std::io::stdout);
        init_subscriber(subscriber);
    } else {
        let subscriber = get_subscriber(name, log_level, std::io::sink);
        init_subscriber(subscriber);
    }

    ()
});

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");

pub const TEST_WEBHOOK_SECRET: &str = "whsec_test_secret";

fn run_migrations(connection: &mut impl MigrationHarness<Pg>)
    -> Result<(), Box<dyn Error + Send + Sync + 'static>>
{
    connection.run_pending_migrations(MIGRATIONS)?;
    Ok(())
}

pub struct TestApp{
    pub host: String,
    pub port: u16,
    pub pool: DbPool,
    pub stripe_api: MockServer,
    pub whatsapp_api: MockServer,
    pub api_client: reqwest::Client
}

impl TestApp {
    fn create_db(settings: &DatabaseSettings) -> DbPool{
        let mut connection = PgConnection::establish(&settings.get_database_url())
                                .expect("Failed to connect to postgres database");

        let query = format!(r#"CREATE DATABASE "{}";"#, settings.name);
        diesel::sql_query(query)
            .execute(&mut connection)
            .expect("Failed to create test database");

        let pool = Pool::new(ConnectionManager::<PgConnection>::new(settings.get_database_table_url()))
            .expect("Failed to build connection pool to test database");

        let mut conn = pool.get().expect("Failed to get connection to test database");
        run_migrations(&mut conn).expect("Failed to run migrations");

        pool
    }

    pub fn get_app_url(&self) -> String{
        format!("http://{}:{}", self.host, self.port)
    }

    pub async fn spawn_app() -> TestApp{
        Lazy::force(&LOGGER_INSTANCE);

        let stripe_api = MockServer::start().await;
        let whatsapp_api = MockServer::start().await;

        let mut settings = Settings::get();
        settings.application.port = 0;
        settings.database.name = Uuid::new_v4().to_string();
        settings.stripe.api_uri = stripe_api.uri();
        settings.stripe.webhook_secret = SecretString::new(TEST_WEBHOOK_SECRET.into());
        settings.whatsapp.api_uri = whatsapp_api.uri();

        let pool = TestApp::create_db(&settings.database);


        let application = Application::new(settings)
                            .await
                            .expect("Failed to build application");


        tokio::task::spawn(application.server);

        let api_client = TestApp::new_session_client();

        return TestApp{
            host: application.host,
            port: application.port,
            pool,
            stripe_api,
            whatsapp_api,
            api_client
        }
    }

    // Each diner session is one browser: one cookie jar per client
    pub fn new_session_client() -> reqwest::Client {
        reqwest::Client::builder()
            .redirect(Policy::none())
            .cookie_store(true)
            .build()
            .unwrap()
    }

    pub fn seed_branch(&self, accepted_methods: Vec<&str>, staff_number: Option<&str>) -> Uuid {
        let branch = Branch {
            branch_id: Uuid::new_v4(),
            name: "Centrum".to_string(),
            accepted_methods: accepted_methods.iter().map(|m| m.to_string()).collect(),
            staff_number: staff_number.map(|n| n.to_string()),
        };

        let mut conn = self.pool.get().unwrap();
        diesel::insert_into(branches::table)
            .values(&branch)
            .execute(&mut conn)
            .expect("Failed to seed branch");

        branch.branch_id
    }

    pub fn seed_table(&self, branch_id: Uuid, number: i32) -> Uuid {
        let table = Table {
            table_id: Uuid::new_v4(),
            branch_id,
            number,
            seats: 4,
            order_id: None,
        };

        let mut conn = self.pool.get().unwrap();
        diesel::insert_into(tables::table)
            .values(&table)
            .execute(&mut conn)
            .expect("Failed to seed table");

        table.table_id
    }

    pub async fn join(
        &self,
        client: &reqwest::Client,
        table_id: Uuid,
        name: &str,
    ) -> reqwest::Response {
        client
            .post(format!("{}/table/{}/join", self.get_app_url(), table_id))
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await
            .expect("Failed to send join request")
    }

    pub async fn add_cart_item(
        &self,
        client: &reqwest::Client,
        table_id: Uuid,
        name: &str,
        price: &str,
        quantity: i32,
    ) -> reqwest::Response {
        client
            .post(format!("{}/table/{}/cart", self.get_app_url(), table_id))
            .json(&serde_json::json!({
                "product_id": Uuid::new_v4(),
                "name": name,
                "price": price,
                "quantity": quantity
            }))
            .send()
            .await
            .expect("Failed to send add-to-cart request")
    }

    pub async fn post_webhook(&self, body: &serde_json::Value) -> reqwest::Response {
        self.api_client
            .post(format!("{}/webhooks/stripe", self.get_app_url()))
            .header("Stripe-Signature", TEST_WEBHOOK_SECRET)
            .json(body)
            .send()
            .await
            .expect("Failed to send webhook request")
    }

    // Keep user rows out of each other's way when a test needs a diner
    // with preset balances
    pub fn set_user_balances(&self, user_id: Uuid, paid: &str, tip: &str) {
        use dinetab::schema::users;
        use rust_decimal::Decimal;
        use std::str::FromStr;

        let paid = Decimal::from_str(paid).unwrap();
        let tip = Decimal::from_str(tip).unwrap();

        let mut conn = self.pool.get().unwrap();
        diesel::update(users::table.filter(users::user_id.eq(user_id)))
            .set((
                users::paid.eq(paid),
                users::tip.eq(tip),
                users::total.eq(paid + tip),
            ))
            .execute(&mut conn)
            .expect("Failed to set user balances");
    }
}

// Build a provider webhook event body for a completed checkout session
pub fn checkout_completed_event(
    intent_id: &str,
    order_id: Uuid,
    branch_id: Uuid,
    user_id: Uuid,
    type_of_payment: &str,
    amount_total_minor: i64,
    tip: &str,
    is_full_paid: bool,
    extra_data: &serde_json::Value,
) -> serde_json::Value {
    serde_json::json!({
        "id": format!("evt_{}", Uuid::new_v4().simple()),
        "type": "checkout.session.completed",
        "created": Utc::now().timestamp(),
        "data": {
            "object": {
                "id": format!("cs_{}", Uuid::new_v4().simple()),
                "payment_intent": intent_id,
                "payment_status": "paid",
                "amount_total": amount_total_minor,
                "metadata": {
                    "orderId": order_id.to_string(),
                    "branchId": branch_id.to_string(),
                    "userId": user_id.to_string(),
                    "typeOfPayment": type_of_payment,
                    "paymentMethod": "card",
                    "tip": tip,
                    "isOrderAmountFullPaid": is_full_paid.to_string(),
                    "extraData": extra_data.to_string()
                }
            }
        }
    })
}
