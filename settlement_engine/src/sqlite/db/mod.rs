//! # SQLite Database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interactions are maintained by simple functions (rather than stateful structs) that accept a
//! `&mut SqliteConnection` argument. Callers can obtain a connection from a pool,
//! or create an atomic transaction as the need arises and call through to the functions without any other changes.
//!
//! Monetary amounts are stored as decimal text. Structured values (items, exchange rate, tolerance, payment address
//! and metadata) are stored as JSON text.
use std::{env, fmt::Display, str::FromStr};

use log::info;
use serde::de::DeserializeOwned;
use settlement_common::{Currency, Money};
use sqlx::{sqlite::SqlitePoolOptions, Error as SqlxError, SqlitePool};

use crate::traits::RepositoryError;

pub mod invoices;
pub mod payments;
pub mod transitions;

const SQLITE_DB_URL: &str = "sqlite://data/settlement_store.db";

pub fn db_url() -> String {
    let result = env::var("STL_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ STL_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}

impl From<SqlxError> for RepositoryError {
    fn from(e: SqlxError) -> Self {
        RepositoryError::StorageError(e.to_string())
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(e: serde_json::Error) -> Self {
        RepositoryError::CorruptRecord(e.to_string())
    }
}

pub(crate) fn parse_field<T>(kind: &str, value: &str) -> Result<T, RepositoryError>
where
    T: FromStr,
    T::Err: Display,
{
    value.parse::<T>().map_err(|e| RepositoryError::CorruptRecord(format!("{kind} '{value}': {e}")))
}

pub(crate) fn parse_money(kind: &str, value: &str, currency: Currency) -> Result<Money, RepositoryError> {
    Money::parse(value, currency).map_err(|e| RepositoryError::CorruptRecord(format!("{kind} '{value}': {e}")))
}

pub(crate) fn from_json<T: DeserializeOwned>(kind: &str, value: &str) -> Result<T, RepositoryError> {
    serde_json::from_str(value).map_err(|e| RepositoryError::CorruptRecord(format!("{kind}: {e}")))
}

pub(crate) fn u32_field(kind: &str, value: i64) -> Result<u32, RepositoryError> {
    u32::try_from(value).map_err(|_| RepositoryError::CorruptRecord(format!("{kind} is out of range: {value}")))
}
