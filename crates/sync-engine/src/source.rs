use async_trait::async_trait;
use common::{config::DatabaseConfig, utils::qualified_table, Result, Watermark};
use serde_json::Value;
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    PgPool,
};
use std::time::Duration;
use tracing::{debug, info};

/// Read side of replication: the relational store of record.
#[async_trait]
pub trait RelationalSource: Send + Sync {
    /// Rows of `table` created after `watermark`, each as a JSON object.
    async fn fetch_rows(&self, table: &str, watermark: Watermark) -> Result<Vec<Value>>;
}

/// PostgreSQL source reading the tables of one schema.
pub struct PgSource {
    pool: PgPool,
    schema: String,
}

impl PgSource {
    pub fn new(pool: PgPool, schema: impl Into<String>) -> Self {
        Self {
            pool,
            schema: schema.into(),
        }
    }

    pub async fn connect(config: &DatabaseConfig, schema: impl Into<String>) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect_with(connect_options(config)?)
            .await?;

        info!("PostgreSQL pool created");

        Ok(Self::new(pool, schema))
    }
}

fn connect_options(config: &DatabaseConfig) -> Result<PgConnectOptions> {
    match &config.url {
        Some(url) => Ok(url.parse()?),
        None => Ok(PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database)),
    }
}

/// Build the fetch query. The watermark is never interpolated, only bound as `$1`.
fn select_query(schema: &str, table: &str, watermark: Watermark) -> String {
    let table = qualified_table(schema, table);
    if watermark.is_absent() {
        format!("SELECT row_to_json(t) FROM {} t", table)
    } else {
        format!(
            "SELECT row_to_json(t) FROM {} t \
             WHERE date_trunc('second', t.created_at) > date_trunc('second', $1::timestamptz)",
            table
        )
    }
}

#[async_trait]
impl RelationalSource for PgSource {
    async fn fetch_rows(&self, table: &str, watermark: Watermark) -> Result<Vec<Value>> {
        let query = select_query(&self.schema, table, watermark);

        let rows = match watermark.get() {
            None => {
                debug!(%query, "Running query");
                sqlx::query_scalar::<_, Value>(&query)
                    .fetch_all(&self.pool)
                    .await?
            }
            Some(since) => {
                debug!(%query, since = %since.to_rfc3339(), "Running query");
                sqlx::query_scalar::<_, Value>(&query)
                    .bind(since)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(rows)
    }
}
