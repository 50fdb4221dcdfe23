//! Record sinks
//!
//! A sink persists exactly one record per call. Every worker owns its own
//! sink connection; nothing here is shared across workers.

use crate::message::Record;
use async_trait::async_trait;
use fitload_common::{FitError, Result};
use mongodb::bson::{doc, Document};
use mongodb::{Client, Collection};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Database holding the activity collections
const SINK_DATABASE: &str = "fit";

/// Destination for produced records (dependency injection)
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Persist one record
    async fn persist(&self, record: &Record) -> Result<()>;
}

#[async_trait]
impl<S: RecordSink> RecordSink for Arc<S> {
    async fn persist(&self, record: &Record) -> Result<()> {
        (**self).persist(record).await
    }
}

/// Opens one sink connection per worker
#[async_trait]
pub trait SinkFactory: Send + Sync {
    /// Open a fresh sink connection
    async fn connect(&self) -> Result<Box<dyn RecordSink>>;
}

/// MongoDB document-store sink
pub struct MongoSink {
    collection: Collection<Document>,
}

impl MongoSink {
    /// Connect and verify the server is reachable
    ///
    /// Connectivity is checked with a ping up front so an unreachable sink
    /// is an explicit connection error, not a late insert failure.
    pub async fn connect(connection_string: &str, collection_name: &str) -> Result<Self> {
        let client = Client::with_uri_str(connection_string)
            .await
            .map_err(|e| FitError::connection(e.to_string()))?;

        let database = client.database(SINK_DATABASE);
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| FitError::connection(e.to_string()))?;

        debug!(collection = %collection_name, "Connected to sink");
        Ok(Self {
            collection: database.collection(collection_name),
        })
    }

    /// Delete every document in the target collection
    pub async fn clear(&self) -> Result<u64> {
        let result = self
            .collection
            .delete_many(doc! {})
            .await
            .map_err(|e| FitError::database(e.to_string()))?;

        info!(deleted = result.deleted_count, "Cleared target collection");
        Ok(result.deleted_count)
    }
}

#[async_trait]
impl RecordSink for MongoSink {
    async fn persist(&self, record: &Record) -> Result<()> {
        let document = mongodb::bson::to_document(&record.document)
            .map_err(|e| FitError::database(e.to_string()))?;

        self.collection
            .insert_one(document)
            .await
            .map_err(|e| FitError::database(e.to_string()))?;

        Ok(())
    }
}

/// Factory opening one [`MongoSink`] per worker
pub struct MongoSinkFactory {
    connection_string: String,
    collection_name: String,
}

impl MongoSinkFactory {
    pub fn new(connection_string: impl Into<String>, collection_name: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            collection_name: collection_name.into(),
        }
    }
}

#[async_trait]
impl SinkFactory for MongoSinkFactory {
    async fn connect(&self) -> Result<Box<dyn RecordSink>> {
        let sink = MongoSink::connect(&self.connection_string, &self.collection_name).await?;
        Ok(Box::new(sink))
    }
}

/// Per-record diagnostic dump writer
///
/// One pretty-printed rendering of the full record per message, named
/// `dump_file_<activity_id><record_id>.txt`.
pub struct DumpWriter {
    directory: PathBuf,
}

impl DumpWriter {
    /// Create the dump directory if needed and return a writer for it
    pub fn create(directory: impl AsRef<Path>) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        std::fs::create_dir_all(&directory)?;
        Ok(Self { directory })
    }

    /// Write one full record rendering
    pub fn write(
        &self,
        activity_id: &str,
        record_id: u32,
        full: &Map<String, Value>,
    ) -> Result<PathBuf> {
        let path = self
            .directory
            .join(format!("dump_file_{}{}.txt", activity_id, record_id));
        let rendered = serde_json::to_string_pretty(full)?;
        std::fs::write(&path, rendered)?;
        Ok(path)
    }
}

/// In-memory sink, for tests and dry runs
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<Record>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything persisted so far
    pub fn records(&self) -> Vec<Record> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn persist(&self, record: &Record) -> Result<()> {
        self.records
            .lock()
            .map_err(|_| FitError::database("memory sink poisoned"))?
            .push(record.clone());
        Ok(())
    }
}

/// Factory handing every worker the same shared [`MemorySink`]
pub struct MemorySinkFactory {
    sink: Arc<MemorySink>,
}

impl MemorySinkFactory {
    pub fn new(sink: Arc<MemorySink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl SinkFactory for MemorySinkFactory {
    async fn connect(&self) -> Result<Box<dyn RecordSink>> {
        Ok(Box::new(Arc::clone(&self.sink)))
    }
}
