//! In-memory document store with an index scan.
//!
//! Documents are kept as raw bytes next to their parsed JSON form, which the
//! scan uses for filtering and ordering. Scans are strongly consistent: an
//! entity is visible to every scan started after its `put` returned.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::RwLock;

use async_trait::async_trait;
use cairn_core::{
    CairnResult, CodecError, Cursor, Direction, Filter, FilterOp, IndexQuery, Key, Order,
    StoreError,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::traits::{DocumentStore, KeyScan};

#[derive(Debug, Clone)]
struct StoredDocument {
    bytes: Vec<u8>,
    fields: Value,
}

/// Snapshot of store operation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub puts: u64,
    pub gets: u64,
    pub deletes: u64,
    pub scans: u64,
}

#[derive(Debug, Default)]
struct Counters {
    puts: AtomicU64,
    gets: AtomicU64,
    deletes: AtomicU64,
    scans: AtomicU64,
}

/// In-memory [`DocumentStore`].
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<BTreeMap<Key, StoredDocument>>,
    counters: Counters,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.documents
            .read()
            .map(|documents| documents.contains_key(key))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.documents
            .read()
            .map(|documents| documents.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all stored data.
    pub fn clear(&self) {
        if let Ok(mut documents) = self.documents.write() {
            documents.clear();
        }
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            puts: self.counters.puts.load(AtomicOrdering::Relaxed),
            gets: self.counters.gets.load(AtomicOrdering::Relaxed),
            deletes: self.counters.deletes.load(AtomicOrdering::Relaxed),
            scans: self.counters.scans.load(AtomicOrdering::Relaxed),
        }
    }

    /// Keys matching `query`, in scan order, paired with their sort values.
    fn matching(&self, query: &IndexQuery) -> CairnResult<Vec<Position>> {
        let documents = self
            .documents
            .read()
            .map_err(|_| StoreError::LockPoisoned)?;

        let mut hits = Vec::new();
        for (key, document) in documents.iter() {
            if key.kind() != query.kind() {
                continue;
            }
            if let Some(ancestor) = query.ancestor_key() {
                if !key.has_ancestor(ancestor) {
                    continue;
                }
            }
            if !query
                .filters()
                .iter()
                .all(|filter| filter_matches(&document.fields, filter))
            {
                continue;
            }

            let values: Option<Vec<Value>> = query
                .orders()
                .iter()
                .map(|order| document.fields.get(&order.field).cloned())
                .collect();
            // Entities without a sort property are not in that index.
            if let Some(values) = values {
                hits.push(Position {
                    values,
                    key: key.clone(),
                });
            }
        }

        hits.sort_by(|a, b| compare_positions(query.orders(), a, b));
        Ok(hits)
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    type Scan = MemoryScan;

    async fn put(&self, key: &Key, document: Vec<u8>) -> CairnResult<Key> {
        let fields: Value = serde_json::from_slice(&document).map_err(|e| StoreError::WriteFailed {
            key: key.clone(),
            reason: format!("document is not JSON: {}", e),
        })?;

        let mut documents = self
            .documents
            .write()
            .map_err(|_| StoreError::LockPoisoned)?;
        documents.insert(
            key.clone(),
            StoredDocument {
                bytes: document,
                fields,
            },
        );
        self.counters.puts.fetch_add(1, AtomicOrdering::Relaxed);
        Ok(key.clone())
    }

    async fn get(&self, key: &Key) -> CairnResult<Vec<u8>> {
        self.counters.gets.fetch_add(1, AtomicOrdering::Relaxed);
        let documents = self
            .documents
            .read()
            .map_err(|_| StoreError::LockPoisoned)?;
        documents
            .get(key)
            .map(|document| document.bytes.clone())
            .ok_or_else(|| StoreError::NotFound { key: key.clone() }.into())
    }

    async fn delete(&self, key: &Key) -> CairnResult<()> {
        self.counters.deletes.fetch_add(1, AtomicOrdering::Relaxed);
        let mut documents = self
            .documents
            .write()
            .map_err(|_| StoreError::LockPoisoned)?;
        documents.remove(key);
        Ok(())
    }

    async fn run(&self, query: &IndexQuery) -> CairnResult<MemoryScan> {
        self.counters.scans.fetch_add(1, AtomicOrdering::Relaxed);

        let start = match query.start_cursor() {
            Some(cursor) if !cursor.is_start() => Some(Position::decode(cursor)?),
            _ => None,
        };

        let mut hits = self.matching(query)?;
        if let Some(start) = &start {
            hits.retain(|hit| compare_positions(query.orders(), hit, start) == Ordering::Greater);
        }
        if let Some(limit) = query.limit_value() {
            hits.truncate(limit);
        }

        Ok(MemoryScan {
            pending: hits.into_iter(),
            last: start,
        })
    }
}

/// Key stream over a snapshot taken when the scan started.
#[derive(Debug)]
pub struct MemoryScan {
    pending: std::vec::IntoIter<Position>,
    last: Option<Position>,
}

#[async_trait]
impl KeyScan for MemoryScan {
    async fn next(&mut self) -> CairnResult<Option<Key>> {
        match self.pending.next() {
            Some(position) => {
                let key = position.key.clone();
                self.last = Some(position);
                Ok(Some(key))
            }
            None => Ok(None),
        }
    }

    fn cursor(&self) -> CairnResult<Cursor> {
        match &self.last {
            Some(position) => Ok(position.encode()?),
            None => Ok(Cursor::default()),
        }
    }
}

/// A point in index order: the sort values of an entry plus its key.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Position {
    values: Vec<Value>,
    key: Key,
}

impl Position {
    fn encode(&self) -> Result<Cursor, CodecError> {
        let bytes = serde_json::to_vec(self).map_err(|e| CodecError::InvalidCursor {
            reason: e.to_string(),
        })?;
        Ok(Cursor::new(hex::encode(bytes)))
    }

    fn decode(cursor: &Cursor) -> Result<Self, StoreError> {
        let bytes = hex::decode(cursor.as_str()).map_err(|e| StoreError::InvalidCursor {
            reason: e.to_string(),
        })?;
        serde_json::from_slice(&bytes).map_err(|e| StoreError::InvalidCursor {
            reason: e.to_string(),
        })
    }
}

fn compare_positions(orders: &[Order], a: &Position, b: &Position) -> Ordering {
    for (i, order) in orders.iter().enumerate() {
        let ordering = match (a.values.get(i), b.values.get(i)) {
            (Some(x), Some(y)) => compare_values(x, y),
            (x, y) => x.is_some().cmp(&y.is_some()),
        };
        let ordering = match order.direction {
            Direction::Ascending => ordering,
            Direction::Descending => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    a.key.cmp(&b.key)
}

fn filter_matches(fields: &Value, filter: &Filter) -> bool {
    let Some(value) = fields.get(&filter.field) else {
        return false;
    };
    let ordering = compare_values(value, &filter.value);
    match filter.op {
        FilterOp::Eq => ordering == Ordering::Equal,
        FilterOp::Lt => ordering == Ordering::Less,
        FilterOp::Le => ordering != Ordering::Greater,
        FilterOp::Gt => ordering == Ordering::Greater,
        FilterOp::Ge => ordering != Ordering::Less,
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values: by type first, then by value.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => {
                let x = x.as_f64().unwrap_or(f64::NAN);
                let y = y.as_f64().unwrap_or(f64::NAN);
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (x, y) in x.iter().zip(y.iter()) {
                let ordering = compare_values(x, y);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(_), Value::Object(_)) => a.to_string().cmp(&b.to_string()),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}
