use anyhow::{anyhow, Context, Result};
use common::config::{DatabaseConfig, MongoConfig, SyncConfig};
use serde::Deserialize;
use std::collections::HashMap;
use std::net::SocketAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub mongo: MongoConfig,
    pub sync: SyncConfig,
    pub metrics_addr: Option<SocketAddr>,
    pub log_format: LogFormat,
}

/// Flat view of the environment, one field per variable.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct Settings {
    database_url: Option<String>,
    postgres_host: String,
    postgres_port: u16,
    postgres_user: String,
    postgres_password: String,
    postgres_db: String,
    db_max_connections: u32,
    db_min_connections: u32,
    db_connect_timeout: u64,
    mongo_uri: Option<String>,
    mongo_database: Option<String>,
    source_schema: String,
    sync_interval: u64,
    dead_letter_capacity: usize,
    metrics_addr: Option<String>,
    log_format: String,
}

impl Default for Settings {
    fn default() -> Self {
        let database = DatabaseConfig::default();
        let sync = SyncConfig::default();

        Self {
            database_url: database.url,
            postgres_host: database.host,
            postgres_port: database.port,
            postgres_user: database.user,
            postgres_password: database.password,
            postgres_db: database.database,
            db_max_connections: database.max_connections,
            db_min_connections: database.min_connections,
            db_connect_timeout: database.connect_timeout_secs,
            mongo_uri: None,
            mongo_database: None,
            source_schema: sync.source_schema,
            sync_interval: sync.interval_secs,
            dead_letter_capacity: sync.dead_letter_capacity,
            metrics_addr: None,
            log_format: "pretty".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Load from the process environment, or from `vars` when given.
    fn load(vars: Option<HashMap<String, String>>) -> Result<Self> {
        let settings: Settings = config::Config::builder()
            .add_source(config::Environment::default().source(vars))
            .build()?
            .try_deserialize()
            .context("invalid configuration")?;

        Self::from_settings(settings)
    }

    fn from_settings(settings: Settings) -> Result<Self> {
        let mongo_uri = settings
            .mongo_uri
            .ok_or_else(|| anyhow!("MONGO_URI must be set"))?;

        let metrics_addr = settings
            .metrics_addr
            .filter(|addr| !addr.is_empty())
            .map(|addr| addr.parse::<SocketAddr>())
            .transpose()
            .context("METRICS_ADDR must be a socket address")?;

        let log_format = match settings.log_format.to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" | "text" | "" => LogFormat::Pretty,
            other => return Err(anyhow!("unknown LOG_FORMAT `{}`", other)),
        };

        if settings.sync_interval == 0 {
            return Err(anyhow!("SYNC_INTERVAL must be at least one second"));
        }

        Ok(Config {
            database: DatabaseConfig {
                url: settings.database_url.filter(|url| !url.is_empty()),
                host: settings.postgres_host,
                port: settings.postgres_port,
                user: settings.postgres_user,
                password: settings.postgres_password,
                database: settings.postgres_db,
                max_connections: settings.db_max_connections,
                min_connections: settings.db_min_connections,
                connect_timeout_secs: settings.db_connect_timeout,
            },
            mongo: MongoConfig {
                uri: mongo_uri,
                database: settings.mongo_database.filter(|name| !name.is_empty()),
            },
            sync: SyncConfig {
                source_schema: settings.source_schema,
                interval_secs: settings.sync_interval,
                dead_letter_capacity: settings.dead_letter_capacity,
            },
            metrics_addr,
            log_format,
        })
    }
}
