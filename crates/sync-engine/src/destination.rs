use async_trait::async_trait;
use bson::{doc, Bson, Document};
use chrono::{DateTime, Utc};
use common::{config::MongoConfig, Result};
use mongodb::{
    options::{FindOneOptions, IndexOptions},
    Client, Database, IndexModel,
};
use schema::CREATED_AT;
use tracing::{info, warn};

use crate::TableMapping;

/// Write side of replication: the document store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// `created_at` of the most recent document in `collection`, if any.
    async fn latest_created_at(&self, collection: &str) -> Result<Option<DateTime<Utc>>>;

    async fn insert_one(&self, collection: &str, document: Document) -> Result<()>;
}

const DEFAULT_DATABASE: &str = "test";

/// MongoDB destination.
#[derive(Clone)]
pub struct MongoStore {
    database: Database,
}

impl MongoStore {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub async fn connect(config: &MongoConfig) -> Result<Self> {
        let client = Client::with_uri_str(&config.uri).await?;

        let database = match &config.database {
            Some(name) => client.database(name),
            None => client
                .default_database()
                .unwrap_or_else(|| client.database(DEFAULT_DATABASE)),
        };

        database.run_command(doc! { "ping": 1 }, None).await?;
        info!(database = database.name(), "MongoDB connection established");

        Ok(Self::new(database))
    }

    /// Unique index on each mapping's natural key plus a descending
    /// `created_at` index for the watermark lookup.
    pub async fn ensure_indexes(&self, mappings: &[TableMapping]) -> Result<()> {
        for mapping in mappings {
            let collection = self.database.collection::<Document>(mapping.collection);

            let mut keys = Document::new();
            for field in mapping.key_fields {
                keys.insert(*field, 1);
            }
            let unique = IndexModel::builder()
                .keys(keys)
                .options(IndexOptions::builder().unique(true).build())
                .build();
            let recency = IndexModel::builder()
                .keys(doc! { CREATED_AT: -1 })
                .build();

            collection.create_indexes([unique, recency], None).await?;
        }

        info!("Destination indexes ensured");
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn latest_created_at(&self, collection: &str) -> Result<Option<DateTime<Utc>>> {
        let options = FindOneOptions::builder()
            .sort(doc! { CREATED_AT: -1 })
            .projection(doc! { CREATED_AT: 1 })
            .build();

        let latest = self
            .database
            .collection::<Document>(collection)
            .find_one(doc! {}, options)
            .await?;

        match latest.as_ref().and_then(|document| document.get(CREATED_AT)) {
            Some(Bson::DateTime(instant)) => Ok(Some(instant.to_chrono())),
            Some(other) => {
                warn!(collection, value = %other, "Latest document has a non-date created_at");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn insert_one(&self, collection: &str, document: Document) -> Result<()> {
        self.database
            .collection::<Document>(collection)
            .insert_one(document, None)
            .await?;

        Ok(())
    }
}
