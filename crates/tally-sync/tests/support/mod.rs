//! In-memory collaborators shared by the integration tests.

#![allow(dead_code)]

use arrow_array::{Array, BooleanArray, Float64Array, Int64Array, RecordBatch, StringArray};
use arrow_schema::DataType;
use async_trait::async_trait;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::{json, Map, Value as Json};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tally_core::{Edge, PageResult, Value};
use tally_sync::{
    BlobStore, EntityConfig, GraphQlTransport, StateStore, SyncEngine, SyncError, SyncResult,
    SyncSettings, Variables,
};

// =============================================================================
// GraphQL Source
// =============================================================================

/// A GraphQL source holding one collection and its change log.
///
/// Routes by operation name, answers `first`/`after`/`last` and the id list
/// filter, and records every call.
#[derive(Default)]
pub struct FakeSource {
    items: Mutex<Vec<Json>>,
    deltas: Mutex<Vec<(String, Json)>>,
    calls: Mutex<Vec<(String, Variables)>>,
    failing: Mutex<Option<String>>,
}

impl FakeSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_items(self: Arc<Self>, items: Vec<Json>) -> Arc<Self> {
        *self.items.lock().unwrap() = items;
        self
    }

    /// Appends a change record `{dbId, mutationType}` under `cursor`.
    pub fn push_delta(&self, cursor: &str, id: i64, kind: &str) {
        self.deltas
            .lock()
            .unwrap()
            .push((cursor.to_string(), json!({ "dbId": id, "mutationType": kind })));
    }

    /// Makes every call of `operation` fail with a transport error.
    pub fn fail_operation(&self, operation: &str) {
        *self.failing.lock().unwrap() = Some(operation.to_string());
    }

    pub fn calls(&self) -> Vec<(String, Variables)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_of(&self, operation: &str) -> Vec<Variables> {
        self.calls()
            .into_iter()
            .filter(|(name, _)| name == operation)
            .map(|(_, variables)| variables)
            .collect()
    }

    fn item_cursor(item: &Json) -> String {
        format!("item-{}", item["dbId"])
    }

    fn page(nodes: Vec<(String, Json)>, after: Option<&str>, first: usize) -> PageResult {
        let start = after
            .and_then(|cursor| nodes.iter().position(|(c, _)| c == cursor))
            .map_or(0, |position| position + 1);
        let end = start.saturating_add(first).min(nodes.len());

        PageResult {
            edges: nodes[start.min(end)..end]
                .iter()
                .map(|(cursor, node)| Edge::new(Value::from(node.clone()), cursor.as_str()))
                .collect(),
            has_next_page: end < nodes.len(),
        }
    }
}

fn operation_name(query: &str) -> String {
    query
        .split_whitespace()
        .nth(1)
        .and_then(|name| name.split('(').next())
        .unwrap_or_default()
        .to_string()
}

#[async_trait]
impl GraphQlTransport for FakeSource {
    async fn execute(&self, query: &str, variables: &Variables) -> SyncResult<PageResult> {
        let operation = operation_name(query);
        self.calls
            .lock()
            .unwrap()
            .push((operation.clone(), variables.clone()));

        if self.failing.lock().unwrap().as_deref() == Some(operation.as_str()) {
            return Err(SyncError::Transport(format!("{} unavailable", operation)));
        }

        let first = variables
            .get("first")
            .and_then(Json::as_u64)
            .map_or(usize::MAX, |n| n as usize);
        let after = variables.get("after").and_then(Json::as_str);

        match operation.as_str() {
            "ItemsAfterCursor" => {
                let nodes = self
                    .items
                    .lock()
                    .unwrap()
                    .iter()
                    .map(|item| (Self::item_cursor(item), item.clone()))
                    .collect();
                Ok(Self::page(nodes, after, first))
            }
            "ItemsByIds" => {
                let ids = variables
                    .get("dbIdList")
                    .and_then(Json::as_array)
                    .cloned()
                    .unwrap_or_default();
                let nodes = self
                    .items
                    .lock()
                    .unwrap()
                    .iter()
                    .filter(|item| ids.contains(&item["dbId"]))
                    .map(|item| (Self::item_cursor(item), item.clone()))
                    .collect();
                Ok(Self::page(nodes, after, first))
            }
            "Deltas" => {
                let log = self.deltas.lock().unwrap().clone();
                if variables.get("last").and_then(Json::as_u64) == Some(1) {
                    let tail = log.last().cloned().into_iter().collect();
                    return Ok(Self::page(tail, None, 1));
                }
                Ok(Self::page(log, after, first))
            }
            other => Err(SyncError::GraphQl(format!("Unknown operation {}", other))),
        }
    }
}

// =============================================================================
// Blob Store
// =============================================================================

#[derive(Debug, Clone)]
pub struct WrittenBlob {
    pub namespace: String,
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Keeps written blobs in memory; writes can be made to fail.
#[derive(Default)]
pub struct RecordingBlobStore {
    writes: Mutex<Vec<WrittenBlob>>,
    failing: AtomicBool,
}

impl RecordingBlobStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn writes(&self) -> Vec<WrittenBlob> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl BlobStore for RecordingBlobStore {
    async fn write_blob(&self, namespace: &str, name: &str, bytes: Vec<u8>) -> SyncResult<String> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SyncError::StorageTransient("injected write failure".into()));
        }
        self.writes.lock().unwrap().push(WrittenBlob {
            namespace: namespace.to_string(),
            name: name.to_string(),
            bytes,
        });
        Ok(format!("{}/{}", namespace, name))
    }

    async fn delete_all(&self, namespace: Option<&str>) -> SyncResult<usize> {
        let mut writes = self.writes.lock().unwrap();
        let before = writes.len();
        writes.retain(|blob| namespace.is_some_and(|ns| ns != blob.namespace));
        Ok(before - writes.len())
    }
}

// =============================================================================
// Engine
// =============================================================================

pub fn customers(with_deltas: bool) -> EntityConfig {
    EntityConfig {
        name: "customers".into(),
        items_query: "customers".into(),
        deltas_query: with_deltas.then(|| "customer_deltas".to_string()),
        fields: "dbId name address { city }".into(),
        columns: None,
        id_type: "Int".into(),
    }
}

pub fn engine(
    entity: &EntityConfig,
    source: &Arc<FakeSource>,
    blobs: &Arc<RecordingBlobStore>,
    state: &Arc<dyn StateStore>,
) -> SyncEngine {
    SyncEngine::from_config(
        entity,
        &SyncSettings::default(),
        source.clone(),
        blobs.clone(),
        state.clone(),
    )
    .unwrap()
}

// =============================================================================
// Parquet
// =============================================================================

/// Decodes a blob into its column names and JSON rows.
pub fn decode(bytes: &[u8]) -> (Vec<String>, Vec<Map<String, Json>>) {
    let reader = ParquetRecordBatchReaderBuilder::try_new(bytes::Bytes::from(bytes.to_vec()))
        .unwrap()
        .build()
        .unwrap();

    let mut columns = Vec::new();
    let mut rows = Vec::new();
    for batch in reader {
        let batch = batch.unwrap();
        columns = batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().to_string())
            .collect();
        rows.extend(batch_rows(&batch, &columns));
    }
    (columns, rows)
}

fn batch_rows(batch: &RecordBatch, columns: &[String]) -> Vec<Map<String, Json>> {
    (0..batch.num_rows())
        .map(|row| {
            columns
                .iter()
                .enumerate()
                .map(|(i, name)| (name.clone(), cell(batch.column(i).as_ref(), row)))
                .collect()
        })
        .collect()
}

fn cell(array: &dyn Array, row: usize) -> Json {
    if array.is_null(row) {
        return Json::Null;
    }
    match array.data_type() {
        DataType::Boolean => json!(array.as_any().downcast_ref::<BooleanArray>().unwrap().value(row)),
        DataType::Int64 => json!(array.as_any().downcast_ref::<Int64Array>().unwrap().value(row)),
        DataType::Float64 => json!(array.as_any().downcast_ref::<Float64Array>().unwrap().value(row)),
        DataType::Utf8 => json!(array.as_any().downcast_ref::<StringArray>().unwrap().value(row)),
        other => panic!("unexpected column type {:?}", other),
    }
}
