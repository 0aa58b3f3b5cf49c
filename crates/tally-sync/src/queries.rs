//! # Query Templates
//!
//! Renders the GraphQL documents of an entity from its collection names and
//! field selection, so that every entity is configuration only.
//!
//! ```text
//!   items_query = "customers"          by_ids        customers(first, after,
//!   deltas_query = "customer_deltas"   ──────►         filter: { dbId_in })
//!   fields = "dbId email ..."          after_cursor  customers(first, after)
//!                                      deltas        customer_deltas(first,
//!                                                      last, after)
//! ```

use tally_core::MUTATION_TYPE_FIELD;

/// Name of the id list variable of by-ids queries.
pub const ID_LIST_VARIABLE: &str = "dbIdList";

/// The three queries one entity needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityQueries {
    /// Records whose id is in `$dbIdList`.
    pub by_ids: String,
    /// Every record after `$after`.
    pub after_cursor: String,
    /// Change-log records, when the entity has a change log.
    pub deltas: Option<String>,
}

impl EntityQueries {
    /// Renders the queries.
    ///
    /// ## Arguments
    /// * `items` - Collection of the records
    /// * `deltas` - Change-log collection, if any
    /// * `fields` - Field selection of a record
    /// * `id_field` - Identifier field, used for the filter and change-log nodes
    /// * `id_type` - GraphQL type of one id (`Int`, `String`, ...)
    pub fn build(
        items: &str,
        deltas: Option<&str>,
        fields: &str,
        id_field: &str,
        id_type: &str,
    ) -> Self {
        let selection = connection_selection(fields.trim());

        let by_ids = format!(
            "query ItemsByIds($first: Int, $after: String, ${list}: [{id_type}!]) {{\n  \
             {items}(first: $first, after: $after, filter: {{ {id_field}_in: ${list} }}) {{\n\
             {selection}  }}\n}}\n",
            list = ID_LIST_VARIABLE,
        );

        let after_cursor = format!(
            "query ItemsAfterCursor($first: Int, $after: String) {{\n  \
             {items}(first: $first, after: $after) {{\n\
             {selection}  }}\n}}\n"
        );

        let deltas = deltas.map(|collection| {
            let delta_selection = connection_selection(&format!("{id_field} {MUTATION_TYPE_FIELD}"));
            format!(
                "query Deltas($first: Int, $last: Int, $after: String) {{\n  \
                 {collection}(first: $first, last: $last, after: $after) {{\n\
                 {delta_selection}  }}\n}}\n"
            )
        });

        EntityQueries {
            by_ids,
            after_cursor,
            deltas,
        }
    }
}

fn connection_selection(fields: &str) -> String {
    format!(
        "    edges {{\n      node {{\n        {fields}\n      }}\n      cursor\n    }}\n    \
         pageInfo {{\n      hasNextPage\n    }}\n"
    )
}
