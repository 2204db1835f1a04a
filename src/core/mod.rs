//! Storage engine: values, documents, codecs, the SQLite store, the query
//! planner and the collection API built on top of them.

pub mod codec;
pub mod collection;
pub mod config;
pub mod cursor;
pub mod db;
pub mod document;
pub mod error;
pub mod planner;
pub mod schemas;
pub mod value;
