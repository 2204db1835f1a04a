//! Collections: a named set of documents, its primary table and index tables.
//!
//! ```no_run
//! use goatfish::{Collection, Document, ModelConfig, Store};
//!
//! let store = Store::open("notes.db")?;
//! let notes = Collection::new(
//!     ModelConfig::new("note")
//!         .with_store(store)
//!         .index(["foo"])
//!         .index(["foo", "bar"]),
//! )?;
//! notes.initialize()?;
//!
//! let mut doc = Document::from_attrs([("foo", 1)]);
//! notes.save(&mut doc, true)?;
//! let found = notes.get(doc.id().unwrap())?;
//! assert_eq!(found, Some(doc));
//! # Ok::<(), goatfish::GoatfishError>(())
//! ```

use crate::core::codec::{Codec, JsonCodec};
use crate::core::cursor::Cursor;
use crate::core::db::Store;
use crate::core::document::{Attributes, Document, ID_ATTR, new_id};
use crate::core::error::{GoatfishError, Result};
use crate::core::planner::{self, QueryPlan};
use crate::core::schemas::{self, quote};
use crate::core::value::Value;
use rusqlite::{params, params_from_iter};

pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Everything a collection needs: its name, its store and its index
/// declarations. The index list is fixed once the collection is built.
#[derive(Debug)]
pub struct ModelConfig {
    pub name: String,
    pub store: Option<Store>,
    pub indexes: Vec<Vec<String>>,
    pub codec: Box<dyn Codec>,
    pub batch_size: usize,
}

impl ModelConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            store: None,
            indexes: Vec::new(),
            codec: Box::new(JsonCodec),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_store(mut self, store: Store) -> Self {
        self.store = Some(store);
        self
    }

    pub fn index<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.indexes.push(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_codec(mut self, codec: Box<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }
}

#[derive(Debug)]
pub struct Collection {
    name: String,
    store: Option<Store>,
    indexes: Vec<Vec<String>>,
    index_tables: Vec<String>,
    codec: Box<dyn Codec>,
    batch_size: usize,
}

impl Collection {
    /// Validates names and freezes the index declarations.
    pub fn new(config: ModelConfig) -> Result<Self> {
        schemas::validate_ident(&config.name)?;
        for index in &config.indexes {
            planner::validate_index_spec(index)?;
        }
        let index_tables = config
            .indexes
            .iter()
            .map(|index| schemas::index_table_name(&config.name, index))
            .collect();
        Ok(Self {
            name: config.name,
            store: config.store,
            indexes: config.indexes,
            index_tables,
            codec: config.codec,
            batch_size: config.batch_size,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn indexes(&self) -> &[Vec<String>] {
        &self.indexes
    }

    pub fn index_tables(&self) -> &[String] {
        &self.index_tables
    }

    fn store(&self) -> Result<&Store> {
        self.store.as_ref().ok_or_else(|| {
            GoatfishError::NotConfigured(format!(
                "collection '{}' has no store connection",
                self.name
            ))
        })
    }

    /// Creates the primary table, its uuid index and every index table.
    /// Safe to run on every startup.
    pub fn initialize(&self) -> Result<()> {
        let conn = self.store()?.conn();
        conn.execute(&schemas::primary_table_sql(&self.name), [])?;
        conn.execute(&schemas::uuid_index_sql(&self.name), [])?;
        for (index, table) in self.indexes.iter().zip(&self.index_tables) {
            conn.execute(&schemas::index_table_sql(table, index), [])?;
            conn.execute(&schemas::index_table_index_sql(table, index), [])?;
        }
        tracing::debug!(
            collection = %self.name,
            indexes = self.indexes.len(),
            "schema initialized"
        );
        Ok(())
    }

    /// The declared index that best covers `fields`, if any qualifies.
    pub fn largest_index<S: AsRef<str>>(&self, fields: &[S]) -> Option<&[String]> {
        planner::largest_index(&self.indexes, fields).map(|pos| self.indexes[pos].as_slice())
    }

    pub fn plan(&self, parameters: Option<&Attributes>) -> QueryPlan {
        QueryPlan::build(&self.name, &self.indexes, parameters)
    }

    /// Documents whose attributes equal every entry of `parameters`.
    pub fn find(&self, parameters: Option<&Attributes>) -> Result<Cursor<'_>> {
        let store = self.store()?;
        let plan = self.plan(parameters);
        tracing::debug!(collection = %self.name, plan = %plan, "find");
        Cursor::new(store, self.codec.as_ref(), &self.name, plan, self.batch_size)
    }

    pub fn find_one(&self, parameters: Option<&Attributes>) -> Result<Option<Document>> {
        self.find(parameters)?.next().transpose()
    }

    pub fn get(&self, id: &str) -> Result<Option<Document>> {
        let mut parameters = Attributes::new();
        parameters.insert(ID_ATTR.to_string(), Value::from(id));
        self.find_one(Some(&parameters))
    }

    pub fn count(&self, parameters: Option<&Attributes>) -> Result<usize> {
        let mut n = 0;
        for doc in self.find(parameters)? {
            doc?;
            n += 1;
        }
        Ok(n)
    }

    /// Inserts or updates `doc` and refreshes its index rows.
    ///
    /// A new document gets its id here. The id is never part of the stored
    /// blob; on update it is taken out for encoding and always put back. A
    /// failed save leaves no partial rows behind and a new document unsaved.
    pub fn save(&self, doc: &mut Document, commit: bool) -> Result<()> {
        let store = self.store()?;
        let existing = doc.saved_id()?;
        let result = store.write_atomically(|| match &existing {
            None => self.insert(store, doc),
            Some(id) => self.update(store, id, doc),
        });
        if result.is_err() && existing.is_none() {
            doc.remove(ID_ATTR);
        }
        result?;
        if commit {
            store.commit()?;
        }
        Ok(())
    }

    fn insert(&self, store: &Store, doc: &mut Document) -> Result<()> {
        doc.remove(ID_ATTR);
        let id = new_id();
        let data = self.codec.encode(doc.attrs())?;
        store.conn().execute(
            &format!("INSERT INTO {} (uuid, data) VALUES (?1, ?2)", quote(&self.name)),
            params![id, data],
        )?;
        doc.set(ID_ATTR, id.clone());
        tracing::debug!(collection = %self.name, id = %id, "inserted");
        self.write_index_rows(store, &id, doc)
    }

    fn update(&self, store: &Store, id: &str, doc: &mut Document) -> Result<()> {
        let saved = doc.remove(ID_ATTR);
        let encoded = self.codec.encode(doc.attrs());
        if let Some(saved) = saved {
            doc.attrs_mut().insert(ID_ATTR.to_string(), saved);
        }
        store.conn().execute(
            &format!("UPDATE {} SET data = ?1 WHERE uuid = ?2", quote(&self.name)),
            params![encoded?, id],
        )?;
        tracing::debug!(collection = %self.name, id = %id, "updated");
        self.write_index_rows(store, id, doc)
    }

    fn write_index_rows(&self, store: &Store, id: &str, doc: &Document) -> Result<()> {
        for (index, table) in self.indexes.iter().zip(&self.index_tables) {
            let mut row = Vec::with_capacity(index.len() + 1);
            row.push(id.to_string());
            for field in index {
                match doc.get(field) {
                    Some(value) => row.push(value.index_key()?),
                    None => break,
                }
            }
            if row.len() != index.len() + 1 {
                tracing::trace!(table = %table, id = %id, "index row skipped");
                continue;
            }
            let mut stmt = store
                .conn()
                .prepare_cached(&schemas::index_upsert_sql(table, index))?;
            stmt.execute(params_from_iter(row))?;
        }
        Ok(())
    }

    /// Removes the document from the primary table and every index table.
    pub fn delete(&self, doc: &Document, commit: bool) -> Result<()> {
        let store = self.store()?;
        let id = doc.id();
        store.write_atomically(|| {
            store.conn().execute(
                &format!("DELETE FROM {} WHERE uuid = ?1", quote(&self.name)),
                params![id],
            )?;
            for table in &self.index_tables {
                store.conn().execute(
                    &format!("DELETE FROM {} WHERE uuid = ?1", quote(table)),
                    params![id],
                )?;
            }
            Ok(())
        })?;
        tracing::debug!(collection = %self.name, id = ?id, "deleted");
        if commit {
            store.commit()?;
        }
        Ok(())
    }

    pub fn commit(&self) -> Result<()> {
        self.store()?.commit()
    }

    /// Rebuilds every index table from the stored documents, e.g. after a new
    /// index was declared. Returns the number of documents scanned.
    pub fn reindex(&self, commit: bool) -> Result<usize> {
        let store = self.store()?;
        let scanned = store.write_atomically(|| {
            for table in &self.index_tables {
                store
                    .conn()
                    .execute(&format!("DELETE FROM {}", quote(table)), [])?;
            }
            let docs: Vec<Document> = self.find(None)?.collect::<Result<_>>()?;
            for doc in &docs {
                if let Some(id) = doc.id() {
                    self.write_index_rows(store, id, doc)?;
                }
            }
            Ok(docs.len())
        })?;
        tracing::debug!(collection = %self.name, documents = scanned, "reindexed");
        if commit {
            store.commit()?;
        }
        Ok(scanned)
    }
}
