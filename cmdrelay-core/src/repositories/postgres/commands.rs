// File: cmdrelay-core/src/repositories/postgres/commands.rs

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use sqlx::postgres::PgRow;
use uuid::Uuid;
use cmdrelay_common::error::Error;
use cmdrelay_common::models::Command;
use cmdrelay_common::traits::repository_traits::CommandRepository;

use super::map_unique_violation;

pub struct PostgresCommandRepository {
    pub pool: Pool<Postgres>,
}

impl PostgresCommandRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn row_to_command(r: &PgRow) -> Result<Command, Error> {
    Ok(Command {
        command_id: r.try_get("command_id")?,
        command_name: r.try_get("command_name")?,
        is_enabled: r.try_get("is_enabled")?,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}

#[async_trait]
impl CommandRepository for PostgresCommandRepository {
    async fn create_command(&self, cmd: &Command) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO relay_commands (
                command_id,
                command_name,
                is_enabled,
                created_at,
                updated_at
            )
            VALUES ($1,$2,$3,$4,$5)
            "#,
        )
            .bind(cmd.command_id)
            .bind(&cmd.command_name)
            .bind(cmd.is_enabled)
            .bind(cmd.created_at)
            .bind(cmd.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, &format!("command '{}' already exists", cmd.command_name)))?;

        Ok(())
    }

    async fn get_command_by_id(&self, command_id: Uuid) -> Result<Option<Command>, Error> {
        let row_opt = sqlx::query(
            r#"
            SELECT command_id, command_name, is_enabled, created_at, updated_at
            FROM relay_commands
            WHERE command_id = $1
            "#,
        )
            .bind(command_id)
            .fetch_optional(&self.pool)
            .await?;

        row_opt.as_ref().map(row_to_command).transpose()
    }

    async fn get_command_by_name(&self, command_name: &str) -> Result<Option<Command>, Error> {
        let row_opt = sqlx::query(
            r#"
            SELECT command_id, command_name, is_enabled, created_at, updated_at
            FROM relay_commands
            WHERE command_name = $1
            "#,
        )
            .bind(command_name)
            .fetch_optional(&self.pool)
            .await?;

        row_opt.as_ref().map(row_to_command).transpose()
    }

    async fn list_commands(&self) -> Result<Vec<Command>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT command_id, command_name, is_enabled, created_at, updated_at
            FROM relay_commands
            ORDER BY seq ASC
            "#,
        )
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_command).collect()
    }

    async fn update_command(&self, cmd: &Command) -> Result<(), Error> {
        let result = sqlx::query(
            r#"
            UPDATE relay_commands
            SET command_name = $2,
                is_enabled = $3,
                updated_at = $4
            WHERE command_id = $1
            "#,
        )
            .bind(cmd.command_id)
            .bind(&cmd.command_name)
            .bind(cmd.is_enabled)
            .bind(cmd.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, &format!("command '{}' already exists", cmd.command_name)))?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("command {}", cmd.command_id)));
        }
        Ok(())
    }

    async fn delete_command(&self, command_id: Uuid) -> Result<(), Error> {
        sqlx::query("DELETE FROM relay_commands WHERE command_id = $1")
            .bind(command_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
