// src/repositories/mod.rs

pub use cmdrelay_common::traits::repository_traits::{CommandRepository, ConfigRepository};

pub use memory::{InMemoryCommandRepository, InMemoryConfigRepository};
pub use postgres::{PostgresCommandRepository, PostgresConfigRepository};

pub mod memory;
pub mod postgres;
