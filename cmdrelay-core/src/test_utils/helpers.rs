// File: cmdrelay-core/src/test_utils/helpers.rs

use sqlx::{Pool, Postgres};
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use cmdrelay_common::models::RelayConfig;

use crate::Error;
use crate::db::Database;

/// Connection string for the Postgres test database, if one is configured.
pub fn test_database_url() -> Option<String> {
    std::env::var("TEST_DATABASE_URL").ok().filter(|u| !u.trim().is_empty())
}

pub async fn create_test_db_pool(url: &str) -> Result<Pool<Postgres>, Error> {
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(url)
        .await?;
    Ok(pool)
}

/// Wipes relay data so each test can start fresh.
pub async fn clean_database(pool: &Pool<Postgres>) -> Result<(), Error> {
    sqlx::query("TRUNCATE TABLE relay_config, relay_commands RESTART IDENTITY CASCADE")
        .execute(pool)
        .await?;
    Ok(())
}

/// Returns a migrated, empty test DB, or `None` when `TEST_DATABASE_URL` is unset.
pub async fn setup_test_database() -> Result<Option<Database>, Error> {
    let Some(url) = test_database_url() else {
        info!("TEST_DATABASE_URL not set; skipping Postgres-backed test");
        return Ok(None);
    };
    let db = Database::from_pool(create_test_db_pool(&url).await?);
    db.migrate().await?;
    clean_database(db.pool()).await?;
    Ok(Some(db))
}

/// A config with every Twitch field filled in and both echo surfaces off.
pub fn twitch_only_config() -> RelayConfig {
    RelayConfig {
        twitch_user_name: "relaybot".into(),
        twitch_access_token: "oauth:first-token".into(),
        twitch_channel: "#streamer".into(),
        twitch_client_id: "client-id".into(),
        ..Default::default()
    }
}
