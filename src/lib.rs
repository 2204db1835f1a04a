//! goatfish: a tiny document store on top of SQLite.
//!
//! Documents are open-ended attribute maps serialized into one blob per row.
//! Each collection may declare composite secondary indexes; every index is a
//! side table holding the indexed attributes of each document that has them.
//! `find` uses the single declared index that covers the most filter fields
//! and checks whatever is left in process.
//!
//! # Crate Structure
//!
//! - [`core`]: values, documents, codecs, store, planner and collections
//! - `cli`: the `goatfish` command-line front end

pub mod cli;
pub mod core;

pub use crate::core::codec::{Codec, CodecKind, JsonCodec, MsgpackCodec};
pub use crate::core::collection::{Collection, ModelConfig};
pub use crate::core::config::GoatfishConfig;
pub use crate::core::cursor::Cursor;
pub use crate::core::db::Store;
pub use crate::core::document::{Attributes, Document};
pub use crate::core::error::{GoatfishError, Result};
pub use crate::core::planner::{AccessPath, QueryPlan};
pub use crate::core::value::Value;

pub use crate::cli::run;
