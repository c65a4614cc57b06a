use config::{Config, File};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

#[derive(Deserialize, Debug)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub database: DatabaseSettings,
    pub stripe: StripeSettings,
    pub whatsapp: WhatsappSettings,
}

#[derive(Deserialize, Debug)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    pub base_url: String,
    pub hmac_secret: SecretString,
}

#[derive(Deserialize, Debug)]
pub struct DatabaseSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub name: String,
}

// Payment provider settings (hosted checkout + webhook)
#[derive(Deserialize, Debug)]
pub struct StripeSettings {
    pub api_uri: String,
    pub secret_key: SecretString,
    pub webhook_secret: SecretString,
    pub currency: String,
    pub timeout_seconds: u64,
}

// Staff alert delivery settings (Twilio WhatsApp API)
#[derive(Deserialize, Debug)]
pub struct WhatsappSettings {
    pub api_uri: String,
    pub account_sid: String,
    pub auth_token: SecretString,
    pub from_number: String,
    pub timeout_seconds: u64,
}

impl Settings {
    pub fn get() -> Self {
        let config = Config::builder()
            .add_source(File::with_name("configuration/base.yaml"))
            .build()
            .expect("Failed to get configuration")
            .try_deserialize::<Settings>()
            .expect("Failed to deserialize to Settings struct");

        config
    }
}

impl DatabaseSettings {
    // Url of the postgres server, without a database name. The test harness
    // uses it to create a throwaway database per test.
    pub fn get_database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}",
            self.username,
            self.password.expose_secret(),
            self.host,
            self.port
        )
    }

    pub fn get_database_table_url(&self) -> String {
        format!("{}/{}", self.get_database_url(), self.name)
    }
}
