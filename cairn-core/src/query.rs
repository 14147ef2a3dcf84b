//! Index query description.
//!
//! An [`IndexQuery`] is a pure value describing a scan over one kind in the
//! document store: filters, sort order, an optional ancestor, a limit and a
//! start cursor. Stores interpret it; Cairn only ever runs it keys-only.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Cursor, Key};

/// Comparison operator for a property filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

/// A single property filter, applied to a top-level field of the entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

/// A sort specification entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub field: String,
    pub direction: Direction,
}

/// Description of an index scan.
///
/// # Example
///
/// ```ignore
/// let q = IndexQuery::new("Account")
///     .filter("active", FilterOp::Eq, true)
///     .order("created", Direction::Ascending)
///     .limit(20)
///     .start(previous_cursor);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexQuery {
    kind: String,
    ancestor: Option<Key>,
    filters: Vec<Filter>,
    orders: Vec<Order>,
    limit: Option<usize>,
    start: Option<Cursor>,
    keys_only: bool,
}

impl IndexQuery {
    /// Start a query over all entities of `kind`.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ancestor: None,
            filters: Vec::new(),
            orders: Vec::new(),
            limit: None,
            start: None,
            keys_only: false,
        }
    }

    /// Restrict to entities whose key has `ancestor` in its path.
    pub fn ancestor(mut self, ancestor: Key) -> Self {
        self.ancestor = Some(ancestor);
        self
    }

    /// Add a property filter.
    pub fn filter(mut self, field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            op,
            value: value.into(),
        });
        self
    }

    /// Append a sort specification entry.
    pub fn order(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.orders.push(Order {
            field: field.into(),
            direction,
        });
        self
    }

    /// Return at most `limit` keys.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Resume after the position recorded in `cursor`.
    pub fn start(mut self, cursor: Cursor) -> Self {
        self.start = Some(cursor);
        self
    }

    /// Return keys only, never entity payloads.
    pub fn keys_only(mut self) -> Self {
        self.keys_only = true;
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn ancestor_key(&self) -> Option<&Key> {
        self.ancestor.as_ref()
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn limit_value(&self) -> Option<usize> {
        self.limit
    }

    pub fn start_cursor(&self) -> Option<&Cursor> {
        self.start.as_ref()
    }

    pub fn is_keys_only(&self) -> bool {
        self.keys_only
    }
}
