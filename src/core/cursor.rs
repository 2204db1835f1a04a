//! Lazy result stream returned by `Collection::find`.

use crate::core::codec::Codec;
use crate::core::db::Store;
use crate::core::document::{Attributes, Document};
use crate::core::error::Result;
use crate::core::planner::QueryPlan;
use rusqlite::params_from_iter;
use rusqlite::types::Value as SqlValue;
use std::collections::VecDeque;
use std::iter::FusedIterator;

/// Single-pass iterator over the documents matching a query.
///
/// Rows are pulled from SQLite in batches, keyed on the internal row id, so
/// a consumer that stops early (as `find_one` does) never reads the rest of
/// the table. Once exhausted, or after yielding an error, it yields nothing.
pub struct Cursor<'a> {
    store: &'a Store,
    codec: &'a dyn Codec,
    sql: String,
    params: Vec<String>,
    remaining: Attributes,
    batch_size: usize,
    last_rowid: i64,
    buffer: VecDeque<(String, Vec<u8>)>,
    exhausted: bool,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(
        store: &'a Store,
        codec: &'a dyn Codec,
        primary: &str,
        plan: QueryPlan,
        batch_size: usize,
    ) -> Result<Self> {
        // ?1 and ?2 are the keyset position and the batch size.
        let (predicate, params) = plan.predicate(3)?;
        let sql = format!(
            "SELECT p.id, p.uuid, p.data FROM {} WHERE {} AND p.id > ?1 ORDER BY p.id LIMIT ?2",
            plan.from_clause(primary),
            predicate
        );
        tracing::trace!(sql = %sql, "cursor prepared");
        Ok(Self {
            store,
            codec,
            sql,
            params,
            remaining: plan.remaining,
            batch_size: batch_size.max(1),
            last_rowid: 0,
            buffer: VecDeque::new(),
            exhausted: false,
        })
    }

    fn fetch_batch(&mut self) -> Result<()> {
        let store: &'a Store = self.store;
        let mut stmt = store.conn().prepare_cached(&self.sql)?;
        let mut bound = vec![
            SqlValue::Integer(self.last_rowid),
            SqlValue::Integer(self.batch_size as i64),
        ];
        bound.extend(self.params.iter().cloned().map(SqlValue::Text));

        let rows = stmt.query_map(params_from_iter(bound), |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Vec<u8>>(2)?,
            ))
        })?;

        let mut fetched = 0;
        for r in rows {
            let (rowid, uuid, data) = r?;
            self.last_rowid = rowid;
            self.buffer.push_back((uuid, data));
            fetched += 1;
        }
        if fetched < self.batch_size {
            self.exhausted = true;
        }
        Ok(())
    }

    fn fail<T>(&mut self, err: T) -> Option<T> {
        self.exhausted = true;
        self.buffer.clear();
        Some(err)
    }
}

impl Iterator for Cursor<'_> {
    type Item = Result<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((uuid, data)) = self.buffer.pop_front() {
                let attrs = match self.codec.decode(&data) {
                    Ok(attrs) => attrs,
                    Err(e) => return self.fail(Err(e)),
                };
                let doc = Document::from_stored(uuid, attrs);
                if doc.matches(&self.remaining) {
                    return Some(Ok(doc));
                }
                continue;
            }
            if self.exhausted {
                return None;
            }
            if let Err(e) = self.fetch_batch() {
                return self.fail(Err(e));
            }
        }
    }
}

impl FusedIterator for Cursor<'_> {}
