use serde::{Deserialize, Serialize};

/// Relational source connection. `url` wins over the individual parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: String::new(),
            database: "postgres".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    /// Falls back to the database named in the URI, then to `test`.
    pub database: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Relational schema holding the replicated tables.
    pub source_schema: String,
    pub interval_secs: u64,
    pub dead_letter_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            source_schema: "processed".to_string(),
            interval_secs: 60,
            dead_letter_capacity: 1000,
        }
    }
}
