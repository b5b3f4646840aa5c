// src/lib.rs

pub mod db;
pub mod repositories;
pub mod platforms;
pub mod eventbus;
pub mod telemetry;
pub mod services;
pub mod test_utils;

pub use db::Database;
pub use cmdrelay_common::error::Error;
