// src/repositories/postgres/mod.rs

use cmdrelay_common::error::Error;

pub mod commands;
pub mod config;

pub use commands::PostgresCommandRepository;
pub use config::PostgresConfigRepository;

/// Turns a Postgres unique-violation (SQLSTATE 23505) into `Error::Conflict`.
pub(crate) fn map_unique_violation(e: sqlx::Error, what: &str) -> Error {
    if let Some(db_err) = e.as_database_error() {
        if db_err.code().as_deref() == Some("23505") {
            return Error::Conflict(what.to_string());
        }
    }
    Error::Database(e)
}
