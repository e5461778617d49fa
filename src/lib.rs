// Copyright (c) 2025
// This file is licensed under the AGPL-3.0-or-later

#![cfg_attr(not(debug_assertions), deny(missing_docs))]
#![cfg_attr(not(debug_assertions), deny(warnings))]

//! Row-wise MVCC iterator over a versioned, document-structured key-value
//! store: decodes sub-document keys, resolves transactional intents against
//! a status oracle, applies tombstone and TTL visibility rules, and
//! assembles projected rows at a caller-supplied read timestamp.

pub use assembler::Row;
pub use error::Error;
pub use iterator::{CancellationToken, ReadContext, RowIterator};
pub use key::{ColumnId, DecodedKey, EntryKind, IntentStrength, KeyCodec, KeyError, SubPath};
pub use oracle::{TestOracle, TransactionStatus, TransactionStatusOracle};
pub use schema::{encode_doc_key, Column, ColumnType, Projection, Schema, SchemaError, TableSchema};
pub use store::{MemoryStore, OrderedStore, StoreCursor};
pub use timestamp::{Timestamp, Version, WriteIndex};
pub use value::{Payload, PayloadType, TransactionId, Value, ValueCodec, ValueError};

mod assembler;
pub mod encoding;
mod error;
mod intent;
mod iterator;
mod key;
mod oracle;
mod schema;
mod store;
mod timestamp;
mod value;
mod visibility;
mod walker;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;
