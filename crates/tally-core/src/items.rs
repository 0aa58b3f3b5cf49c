//! # Paginated Results
//!
//! Pages returned by the GraphQL source and the accumulated item results.
//!
//! ## Page Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  PageResult                         ItemsResult                         │
//! │  ──────────                         ───────────                         │
//! │  edges: [ { node, cursor }, .. ]    items:  nodes of every page, in    │
//! │  has_next_page: bool                        arrival order               │
//! │                                     cursor: cursor of the LAST node,   │
//! │  one request, discarded after       None when `items` is empty          │
//! │  its edges are accumulated                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Value;

// =============================================================================
// Cursor
// =============================================================================

/// Opaque pagination token. Only equality is meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Cursor(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Cursor {
    fn from(s: &str) -> Self {
        Cursor(s.to_string())
    }
}

impl From<String> for Cursor {
    fn from(s: String) -> Self {
        Cursor(s)
    }
}

// =============================================================================
// Page
// =============================================================================

/// One edge of a connection: a node and its cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub node: Value,
    pub cursor: Option<Cursor>,
}

impl Edge {
    pub fn new(node: Value, cursor: impl Into<Cursor>) -> Self {
        Edge {
            node,
            cursor: Some(cursor.into()),
        }
    }
}

/// One page of a paginated query.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageResult {
    pub edges: Vec<Edge>,
    pub has_next_page: bool,
}

impl PageResult {
    /// Cursor of the last edge on this page.
    pub fn last_cursor(&self) -> Option<&Cursor> {
        self.edges.last().and_then(|edge| edge.cursor.as_ref())
    }
}

// =============================================================================
// Items Result
// =============================================================================

/// Accumulated output of a full pagination run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ItemsResult {
    pub items: Vec<Value>,
    pub cursor: Option<Cursor>,
}

impl ItemsResult {
    /// An empty result with no cursor.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a result from accumulated edges. The cursor is taken from the
    /// last edge so it always matches the last item.
    pub fn from_edges(edges: Vec<Edge>) -> Self {
        let cursor = edges.last().and_then(|edge| edge.cursor.clone());
        let items = edges.into_iter().map(|edge| edge.node).collect();
        ItemsResult { items, cursor }
    }

    pub fn has_items(&self) -> bool {
        !self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the items with `key = value` added to each at the first level.
    pub fn tagged(self, key: &str, value: &Value) -> Vec<Value> {
        self.items
            .into_iter()
            .map(|item| item.with_field(key, value.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_edges_takes_last_cursor() {
        let result = ItemsResult::from_edges(vec![
            Edge::new(Value::int(1), "c1"),
            Edge::new(Value::int(2), "c2"),
        ]);
        assert_eq!(result.len(), 2);
        assert_eq!(result.cursor, Some(Cursor::from("c2")));
    }

    #[test]
    fn test_from_no_edges_has_no_cursor() {
        let result = ItemsResult::from_edges(Vec::new());
        assert!(!result.has_items());
        assert_eq!(result.cursor, None);
        assert_eq!(result, ItemsResult::empty());
    }

    #[test]
    fn test_page_last_cursor() {
        let page = PageResult {
            edges: vec![Edge::new(Value::Null, "a"), Edge::new(Value::Null, "b")],
            has_next_page: true,
        };
        assert_eq!(page.last_cursor(), Some(&Cursor::from("b")));
        assert_eq!(PageResult::default().last_cursor(), None);
    }

    #[test]
    fn test_tagged_adds_field_to_every_item() {
        let result = ItemsResult::from_edges(vec![
            Edge::new(Value::object([("dbId", Value::int(1))]), "c1"),
            Edge::new(Value::object([("dbId", Value::int(2))]), "c2"),
        ]);
        let tagged = result.tagged("mutationType", &Value::text("ADDED"));
        assert!(tagged
            .iter()
            .all(|item| item.get("mutationType") == Some(&Value::text("ADDED"))));
    }
}
