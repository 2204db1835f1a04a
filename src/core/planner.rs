//! Access-path selection for `find`.
//!
//! The planner picks exactly one path per query: a direct `uuid` lookup when
//! the filter names `id`, otherwise the declared index that covers the most
//! filter fields, otherwise a full scan. Whatever the path does not settle is
//! left in [`QueryPlan::remaining`] for the in-process check.

use crate::core::document::{Attributes, ID_ATTR};
use crate::core::error::{GoatfishError, Result};
use crate::core::value::Value;
use std::collections::BTreeSet;
use std::fmt;

/// Returns the position of the declared index that is a subset of `fields`
/// and leaves the fewest fields uncovered. The first-declared index wins ties.
pub fn largest_index<S: AsRef<str>>(indexes: &[Vec<String>], fields: &[S]) -> Option<usize> {
    let fields: BTreeSet<&str> = fields.iter().map(AsRef::as_ref).collect();
    let mut best: Option<(usize, usize)> = None;
    for (pos, index) in indexes.iter().enumerate() {
        if index.is_empty() || !index.iter().all(|f| fields.contains(f.as_str())) {
            continue;
        }
        let covered: BTreeSet<&str> = index.iter().map(String::as_str).collect();
        let leftover = fields.len() - covered.len();
        if best.is_none_or(|(_, b)| leftover < b) {
            best = Some((pos, leftover));
        }
    }
    best.map(|(pos, _)| pos)
}

#[derive(Debug, Clone, PartialEq)]
pub enum AccessPath {
    /// Unique lookup on the primary table's `uuid` column.
    ById(Value),
    /// Join against one index table, equality on each of its columns.
    Index {
        position: usize,
        table: String,
        columns: Vec<(String, Value)>,
    },
    Scan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub path: AccessPath,
    pub remaining: Attributes,
}

impl QueryPlan {
    pub fn build(
        collection: &str,
        indexes: &[Vec<String>],
        filter: Option<&Attributes>,
    ) -> QueryPlan {
        let mut remaining = filter.cloned().unwrap_or_default();

        if let Some(id) = remaining.remove(ID_ATTR) {
            return QueryPlan {
                path: AccessPath::ById(id),
                remaining,
            };
        }

        // A missing attribute matches a null filter but has no index row, and
        // a NaN filter matches nothing while its key would match itself. Both
        // stay in the in-process check.
        let fields: Vec<&str> = remaining
            .iter()
            .filter(|(_, v)| !v.is_null() && !v.contains_nan())
            .map(|(k, _)| k.as_str())
            .collect();
        let path = match largest_index(indexes, fields.as_slice()) {
            Some(position) => {
                let index = &indexes[position];
                let mut columns = Vec::with_capacity(index.len());
                for field in index {
                    if let Some(value) = remaining.remove(field) {
                        columns.push((field.clone(), value));
                    }
                }
                AccessPath::Index {
                    position,
                    table: crate::core::schemas::index_table_name(collection, index),
                    columns,
                }
            }
            None => AccessPath::Scan,
        };
        QueryPlan { path, remaining }
    }

    /// WHERE clause fragment and its parameters, numbered from `first_param`.
    pub(crate) fn predicate(&self, first_param: usize) -> Result<(String, Vec<String>)> {
        use crate::core::schemas::quote;
        match &self.path {
            AccessPath::ById(id) => {
                // A non-text id can never match a stored uuid.
                let key = match id {
                    Value::Text(s) => s.clone(),
                    other => other.index_key()?,
                };
                Ok((format!("p.uuid = ?{}", first_param), vec![key]))
            }
            AccessPath::Index { columns, .. } => {
                let mut clauses = Vec::with_capacity(columns.len());
                let mut params = Vec::with_capacity(columns.len());
                for (i, (field, value)) in columns.iter().enumerate() {
                    clauses.push(format!("i.{} = ?{}", quote(field), first_param + i));
                    params.push(value.index_key()?);
                }
                Ok((clauses.join(" AND "), params))
            }
            AccessPath::Scan => Ok(("1".to_string(), Vec::new())),
        }
    }

    pub(crate) fn from_clause(&self, primary: &str) -> String {
        use crate::core::schemas::quote;
        match &self.path {
            AccessPath::Index { table, .. } => format!(
                "{} p INNER JOIN {} i ON p.uuid = i.uuid",
                quote(primary),
                quote(table)
            ),
            _ => format!("{} p", quote(primary)),
        }
    }
}

impl fmt::Display for QueryPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            AccessPath::ById(_) => write!(f, "lookup by id")?,
            AccessPath::Index { table, .. } => write!(f, "index {}", table)?,
            AccessPath::Scan => write!(f, "full scan")?,
        }
        if !self.remaining.is_empty() {
            let keys: Vec<&str> = self.remaining.keys().map(String::as_str).collect();
            write!(f, ", then filter on {}", keys.join(", "))?;
        }
        Ok(())
    }
}

/// Checks an index declaration before it is used to name tables and columns.
pub fn validate_index_spec(index: &[String]) -> Result<()> {
    if index.is_empty() {
        return Err(GoatfishError::ValidationError(
            "index must name at least one attribute".to_string(),
        ));
    }
    let mut seen = BTreeSet::new();
    for field in index {
        crate::core::schemas::validate_ident(field)?;
        if field == "uuid" {
            return Err(GoatfishError::ValidationError(
                "'uuid' is reserved for the index key column".to_string(),
            ));
        }
        if !seen.insert(field.as_str()) {
            return Err(GoatfishError::ValidationError(format!(
                "index repeats attribute '{}'",
                field
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs(raw: &[&[&str]]) -> Vec<Vec<String>> {
        raw.iter()
            .map(|i| i.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_largest_index_prefers_widest_cover() {
        let indexes = specs(&[&["foo"], &["foo", "bar"]]);
        assert_eq!(largest_index(&indexes, &["foo", "bar"]), Some(1));
        assert_eq!(largest_index(&indexes, &["bar", "foo"]), Some(1));
        assert_eq!(largest_index(&indexes, &["foo"]), Some(0));
        assert_eq!(largest_index(&indexes, &["foo", "baz"]), Some(0));
    }

    #[test]
    fn test_largest_index_requires_subset() {
        let indexes = specs(&[&["foo", "bar"]]);
        assert_eq!(largest_index(&indexes, &["baz"]), None);
        assert_eq!(largest_index(&indexes, &["foo"]), None);
        assert_eq!(largest_index::<&str>(&indexes, &[]), None);
    }

    #[test]
    fn test_largest_index_ties_go_to_first_declared() {
        let indexes = specs(&[&["a"], &["b"], &["a", "c"], &["b", "c"]]);
        assert_eq!(largest_index(&indexes, &["a", "b"]), Some(0));
        assert_eq!(largest_index(&indexes, &["a", "b", "c"]), Some(2));
    }

    #[test]
    fn test_largest_index_is_optimal_over_all_subsets() {
        let indexes = specs(&[&["a"], &["b", "c"], &["a", "b"], &["c"], &["a", "b", "d"]]);
        let universe = ["a", "b", "c", "d"];
        for mask in 0u32..16 {
            let fields: Vec<&str> = universe
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, f)| *f)
                .collect();
            let eligible: Vec<usize> = indexes
                .iter()
                .enumerate()
                .filter(|(_, idx)| idx.iter().all(|f| fields.contains(&f.as_str())))
                .map(|(i, _)| i)
                .collect();
            match largest_index(&indexes, &fields) {
                None => assert!(eligible.is_empty(), "missed an index for {:?}", fields),
                Some(chosen) => {
                    assert!(eligible.contains(&chosen));
                    let best = eligible.iter().map(|i| indexes[*i].len()).max().unwrap();
                    assert_eq!(indexes[chosen].len(), best, "suboptimal for {:?}", fields);
                }
            }
        }
    }

    #[test]
    fn test_plan_with_id_skips_indexes() {
        let indexes = specs(&[&["foo"]]);
        let mut filter = Attributes::new();
        filter.insert("id".into(), Value::from("abc"));
        filter.insert("foo".into(), Value::Int(1));
        let plan = QueryPlan::build("note", &indexes, Some(&filter));
        assert_eq!(plan.path, AccessPath::ById(Value::from("abc")));
        assert_eq!(plan.remaining.len(), 1);
        assert_eq!(plan.remaining["foo"], Value::Int(1));
    }

    #[test]
    fn test_plan_moves_indexed_fields_out_of_remaining() {
        let indexes = specs(&[&["foo"], &["foo", "bar"]]);
        let mut filter = Attributes::new();
        filter.insert("foo".into(), Value::Int(1));
        filter.insert("bar".into(), Value::from("hi"));
        filter.insert("baz".into(), Value::Bool(true));
        let plan = QueryPlan::build("note", &indexes, Some(&filter));
        let AccessPath::Index { position, table, columns } = &plan.path else {
            panic!("expected index path, got {:?}", plan.path);
        };
        assert_eq!(*position, 1);
        assert_eq!(table, "note_foo_bar");
        assert_eq!(columns[0].0, "foo");
        assert_eq!(columns[1].0, "bar");
        assert_eq!(plan.remaining.keys().collect::<Vec<_>>(), vec!["baz"]);
        assert_eq!(plan.to_string(), "index note_foo_bar, then filter on baz");
    }

    #[test]
    fn test_plan_keeps_null_filters_in_process() {
        let indexes = specs(&[&["foo"], &["foo", "bar"]]);
        let mut filter = Attributes::new();
        filter.insert("foo".into(), Value::from("hello"));
        filter.insert("bar".into(), Value::Null);
        let plan = QueryPlan::build("note", &indexes, Some(&filter));
        assert!(matches!(plan.path, AccessPath::Index { position: 0, .. }));
        assert_eq!(plan.remaining.keys().collect::<Vec<_>>(), vec!["bar"]);
    }

    #[test]
    fn test_plan_keeps_nan_filters_in_process() {
        let indexes = specs(&[&["x"]]);
        let mut filter = Attributes::new();
        filter.insert("x".into(), Value::List(vec![Value::Float(f64::NAN)]));
        let plan = QueryPlan::build("m", &indexes, Some(&filter));
        assert_eq!(plan.path, AccessPath::Scan);
        assert_eq!(plan.remaining.len(), 1);
    }

    #[test]
    fn test_plan_without_filter_scans() {
        let plan = QueryPlan::build("note", &specs(&[&["foo"]]), None);
        assert_eq!(plan.path, AccessPath::Scan);
        assert!(plan.remaining.is_empty());
    }

    #[test]
    fn test_validate_index_spec() {
        assert!(validate_index_spec(&["foo".to_string()]).is_ok());
        assert!(validate_index_spec(&[]).is_err());
        assert!(validate_index_spec(&["uuid".to_string()]).is_err());
        assert!(validate_index_spec(&["a".to_string(), "a".to_string()]).is_err());
        assert!(validate_index_spec(&["a b".to_string()]).is_err());
    }
}
