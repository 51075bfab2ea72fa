use common::error::Res;
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};

pub mod log;

pub mod models {
    pub mod log;
}

#[derive(Clone, Debug)]
/// Where the audit table lives.
pub struct ConnectionSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

/// Opens the single connection every insert goes through.
///
/// The pool is capped at one connection so concurrent inserts queue on it.
pub async fn setup(settings: &ConnectionSettings) -> Res<log::MySqlStore> {
    let options = MySqlConnectOptions::new()
        .host(&settings.host)
        .port(settings.port)
        .username(&settings.user)
        .password(&settings.password)
        .database(&settings.database);

    let pool = MySqlPoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .connect_with(options)
        .await?;

    ::log::info!(
        "Connected to MySQL at {}:{}/{}",
        settings.host,
        settings.port,
        settings.database
    );

    Ok(log::MySqlStore::new(pool))
}
