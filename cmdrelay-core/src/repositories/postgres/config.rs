// File: cmdrelay-core/src/repositories/postgres/config.rs

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use sqlx::postgres::PgRow;
use cmdrelay_common::error::Error;
use cmdrelay_common::models::RelayConfig;
use cmdrelay_common::traits::repository_traits::ConfigRepository;

use super::map_unique_violation;

#[derive(Clone)]
pub struct PostgresConfigRepository {
    pool: Pool<Postgres>,
}

impl PostgresConfigRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn row_to_config(r: &PgRow) -> Result<RelayConfig, Error> {
    Ok(RelayConfig {
        config_id: r.try_get("config_id")?,
        enable_youtube: r.try_get("enable_youtube")?,
        enable_discord: r.try_get("enable_discord")?,
        google_credentials_file: r.try_get("google_credentials_file")?,
        youtube_user_email: r.try_get("youtube_user_email")?,
        discord_token: r.try_get("discord_token")?,
        discord_channel_id: r.try_get("discord_channel_id")?,
        twitch_user_name: r.try_get("twitch_user_name")?,
        twitch_access_token: r.try_get("twitch_access_token")?,
        twitch_channel: r.try_get("twitch_channel")?,
        twitch_client_id: r.try_get("twitch_client_id")?,
        modified_date: r.try_get("modified_date")?,
    })
}

#[async_trait]
impl ConfigRepository for PostgresConfigRepository {
    async fn get_config(&self) -> Result<Option<RelayConfig>, Error> {
        let row_opt = sqlx::query(
            r#"
            SELECT
                config_id,
                enable_youtube,
                enable_discord,
                google_credentials_file,
                youtube_user_email,
                discord_token,
                discord_channel_id,
                twitch_user_name,
                twitch_access_token,
                twitch_channel,
                twitch_client_id,
                modified_date
            FROM relay_config
            LIMIT 1
            "#,
        )
            .fetch_optional(&self.pool)
            .await?;

        row_opt.as_ref().map(row_to_config).transpose()
    }

    async fn create_config(&self, config: &RelayConfig) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO relay_config (
                config_id,
                enable_youtube,
                enable_discord,
                google_credentials_file,
                youtube_user_email,
                discord_token,
                discord_channel_id,
                twitch_user_name,
                twitch_access_token,
                twitch_channel,
                twitch_client_id,
                modified_date
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12)
            "#,
        )
            .bind(config.config_id)
            .bind(config.enable_youtube)
            .bind(config.enable_discord)
            .bind(&config.google_credentials_file)
            .bind(&config.youtube_user_email)
            .bind(&config.discord_token)
            .bind(&config.discord_channel_id)
            .bind(&config.twitch_user_name)
            .bind(&config.twitch_access_token)
            .bind(&config.twitch_channel)
            .bind(&config.twitch_client_id)
            .bind(config.modified_date)
            .execute(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, "a relay config already exists"))?;

        Ok(())
    }

    async fn replace_config(&self, config: &RelayConfig) -> Result<(), Error> {
        let result = sqlx::query(
            r#"
            UPDATE relay_config
            SET
                enable_youtube = $2,
                enable_discord = $3,
                google_credentials_file = $4,
                youtube_user_email = $5,
                discord_token = $6,
                discord_channel_id = $7,
                twitch_user_name = $8,
                twitch_access_token = $9,
                twitch_channel = $10,
                twitch_client_id = $11,
                modified_date = $12
            WHERE config_id = $1
            "#,
        )
            .bind(config.config_id)
            .bind(config.enable_youtube)
            .bind(config.enable_discord)
            .bind(&config.google_credentials_file)
            .bind(&config.youtube_user_email)
            .bind(&config.discord_token)
            .bind(&config.discord_channel_id)
            .bind(&config.twitch_user_name)
            .bind(&config.twitch_access_token)
            .bind(&config.twitch_channel)
            .bind(&config.twitch_client_id)
            .bind(config.modified_date)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("relay config {}", config.config_id)));
        }
        Ok(())
    }
}
