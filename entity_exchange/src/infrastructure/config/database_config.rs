// /////////////////////////////////////////////////////////////////////////////
// Entity Exchange RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Database Configuration
//!
//! Connection settings for the SQLite store, layered from built-in defaults
//! and `EXCHANGE_DATABASE_*` environment variables (e.g.
//! `EXCHANGE_DATABASE_URL`, `EXCHANGE_DATABASE_MAX_CONNECTIONS`). Hosts that
//! manage their own pool can bypass this entirely and hand pools to the
//! repositories directly.

use std::time::Duration;

use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::infrastructure::repositories::schema;

/// Connection settings for the relational store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite connection URL (`sqlite://path.db` or `sqlite::memory:`).
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            url: "sqlite://entity_exchange.db".to_string(),
            max_connections: 5,
            min_connections: 1,
            acquire_timeout_seconds: 30,
        }
    }
}

impl DatabaseConfig {
    /// Loads configuration from defaults overlaid with
    /// `EXCHANGE_DATABASE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = DatabaseConfig::default();

        Config::builder()
            .set_default("url", defaults.url)?
            .set_default("max_connections", i64::from(defaults.max_connections))?
            .set_default("min_connections", i64::from(defaults.min_connections))?
            .set_default(
                "acquire_timeout_seconds",
                defaults.acquire_timeout_seconds as i64,
            )?
            .add_source(Environment::with_prefix("EXCHANGE_DATABASE"))
            .build()?
            .try_deserialize()
    }

    /// Opens a pool for these settings with the schema applied.
    pub async fn connect(&self) -> Result<SqlitePool, sqlx::Error> {
        schema::connect_pool(
            &self.url,
            self.max_connections,
            self.min_connections,
            Duration::from_secs(self.acquire_timeout_seconds),
        )
        .await
    }
}
