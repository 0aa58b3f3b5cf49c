//! # Field Selections
//!
//! Derives the column list of an entity from its GraphQL field selection, so
//! fields are declared in exactly one place.
//!
//! ```text
//!   dbId                         ["dbId",
//!   owner {                ──►    "owner.dbId",
//!       dbId                      "owner.description",
//!       description               "project.code"]
//!   }
//!   project { code }
//! ```
//!
//! Only plain selections are supported: names, nesting, whitespace and
//! commas. Aliases, arguments and fragments are rejected.

use crate::error::{CoreError, CoreResult};
use crate::row::PATH_SEPARATOR;

/// Flattens a GraphQL field selection into dot-path column names, in
/// declaration order. Fields with a nested selection are parents, not
/// columns.
pub fn flatten_field_selection(selection: &str) -> CoreResult<Vec<String>> {
    let mut columns = Vec::new();
    let mut parents: Vec<String> = Vec::new();
    let mut name = String::new();
    // Last completed name at this level; becomes a parent if `{` follows.
    let mut pending: Option<String> = None;

    for (offset, ch) in selection.char_indices() {
        if ch.is_alphanumeric() || ch == '_' {
            if name.is_empty() {
                emit(&mut columns, &parents, pending.take());
            }
            name.push(ch);
            continue;
        }

        if !name.is_empty() {
            pending = Some(std::mem::take(&mut name));
        }

        match ch {
            '{' => {
                let parent = pending
                    .take()
                    .ok_or(CoreError::OrphanSelection { offset })?;
                parents.push(parent);
            }
            '}' => {
                emit(&mut columns, &parents, pending.take());
                if parents.pop().is_none() {
                    return Err(CoreError::UnbalancedBraces { offset });
                }
            }
            c if c.is_whitespace() || c == ',' => {}
            found => return Err(CoreError::UnexpectedCharacter { found, offset }),
        }
    }

    if !name.is_empty() {
        pending = Some(name);
    }
    emit(&mut columns, &parents, pending.take());

    if !parents.is_empty() {
        return Err(CoreError::UnbalancedBraces {
            offset: selection.len(),
        });
    }

    Ok(columns)
}

fn emit(columns: &mut Vec<String>, parents: &[String], leaf: Option<String>) {
    if let Some(leaf) = leaf {
        let mut path = parents.join(&PATH_SEPARATOR.to_string());
        if !path.is_empty() {
            path.push(PATH_SEPARATOR);
        }
        path.push_str(&leaf);
        columns.push(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_selection() {
        let columns = flatten_field_selection("dbId description\n  email").unwrap();
        assert_eq!(columns, vec!["dbId", "description", "email"]);
    }

    #[test]
    fn test_nested_selection() {
        let selection = r#"
            dbId
            owner {
                dbId
                description
            }
            account {
                accountGroup { description codeTranslated }
                code
            }
            invoiceAmount
        "#;
        let columns = flatten_field_selection(selection).unwrap();
        assert_eq!(
            columns,
            vec![
                "dbId",
                "owner.dbId",
                "owner.description",
                "account.accountGroup.description",
                "account.accountGroup.codeTranslated",
                "account.code",
                "invoiceAmount",
            ]
        );
    }

    #[test]
    fn test_braces_without_whitespace() {
        let columns = flatten_field_selection("project{code,description}").unwrap();
        assert_eq!(columns, vec!["project.code", "project.description"]);
    }

    #[test]
    fn test_unbalanced_braces() {
        assert!(matches!(
            flatten_field_selection("owner { dbId"),
            Err(CoreError::UnbalancedBraces { .. })
        ));
        assert!(matches!(
            flatten_field_selection("dbId }"),
            Err(CoreError::UnbalancedBraces { offset: 5 })
        ));
    }

    #[test]
    fn test_orphan_and_unexpected() {
        assert!(matches!(
            flatten_field_selection("{ dbId }"),
            Err(CoreError::OrphanSelection { offset: 0 })
        ));
        assert!(matches!(
            flatten_field_selection("total(currency: EUR)"),
            Err(CoreError::UnexpectedCharacter { found: '(', .. })
        ));
    }

    #[test]
    fn test_empty_selection() {
        assert!(flatten_field_selection("   ").unwrap().is_empty());
    }
}
