// Copyright (c) 2025
// This file is licensed under the AGPL-3.0-or-later

//! Shared fixtures for the end-to-end scenario and property test files: a
//! five-column row schema (`a`, `b` as the key, `c`, `d`, `e` as data) and
//! small builders for populating a [`MemoryStore`] with regular writes,
//! tombstones, and transactional intents.

#![allow(dead_code)]

use std::time::Duration;

pub use rowcursor::{
    encode_doc_key, Column, ColumnType, IntentStrength, KeyCodec, MemoryStore, OrderedStore,
    Payload, StoreCursor, SubPath, TableSchema, TransactionId, Value, ValueCodec, Version,
    WriteIndex,
};
pub use rowcursor::Timestamp;

pub const A: u32 = 10;
pub const B: u32 = 20;
pub const C: u32 = 30;
pub const D: u32 = 40;
pub const E: u32 = 50;

pub fn schema() -> TableSchema {
    TableSchema::new(
        vec![
            Column { id: A, name: "a".into(), column_type: ColumnType::Text },
            Column { id: B, name: "b".into(), column_type: ColumnType::Int },
            Column { id: C, name: "c".into(), column_type: ColumnType::Text },
            Column { id: D, name: "d".into(), column_type: ColumnType::Int },
            Column { id: E, name: "e".into(), column_type: ColumnType::Text },
        ],
        2,
    )
}

pub fn doc_key(name: &str, n: i64) -> Vec<u8> {
    encode_doc_key(&[Value::Text(name.to_string()), Value::Int(n)])
}

pub fn version(physical: u64) -> Version {
    Version::new(Timestamp::new(physical, 0), WriteIndex::ZERO)
}

pub fn primitive(value: &Value) -> Payload {
    let (type_tag, bytes) = ValueCodec::encode_primitive(value);
    Payload::Primitive { type_tag, bytes }
}

pub fn put_regular(store: &mut MemoryStore, doc: &[u8], column: u32, physical: u64, value: &Value) {
    put_regular_ttl(store, doc, column, physical, value, None);
}

pub fn put_regular_ttl(
    store: &mut MemoryStore,
    doc: &[u8],
    column: u32,
    physical: u64,
    value: &Value,
    ttl: Option<Duration>,
) {
    let key = KeyCodec::encode_regular(doc, &SubPath::column(column), version(physical));
    store.put(key, ValueCodec::encode_regular(primitive(value), ttl));
}

pub fn put_regular_delete(store: &mut MemoryStore, doc: &[u8], column: u32, physical: u64) {
    let key = KeyCodec::encode_regular(doc, &SubPath::column(column), version(physical));
    store.put(key, ValueCodec::encode_regular(Payload::Tombstone, None));
}

pub fn put_doc_tombstone(store: &mut MemoryStore, doc: &[u8], physical: u64) {
    let key = KeyCodec::encode_regular(doc, &SubPath::root(), version(physical));
    store.put(key, ValueCodec::encode_regular(Payload::Tombstone, None));
}

pub fn put_weak_intent(store: &mut MemoryStore, doc: &[u8], path: SubPath, txn: TransactionId, physical: u64) {
    let key = KeyCodec::encode_intent(doc, &path, IntentStrength::Weak, version(physical));
    store.put(key, ValueCodec::encode_weak_intent(txn));
}

pub fn put_strong_intent(
    store: &mut MemoryStore,
    doc: &[u8],
    path: SubPath,
    txn: TransactionId,
    physical: u64,
    payload: Payload,
) {
    let key = KeyCodec::encode_intent(doc, &path, IntentStrength::Strong, version(physical));
    store.put(key, ValueCodec::encode_strong_intent(txn, payload, None));
}

pub fn txn(n: u128) -> TransactionId {
    TransactionId(uuid::Uuid::from_u128(n))
}

/// Renders raw bytes as an escaped ASCII string, for readable test failure
/// output.
fn escape(bytes: &[u8]) -> String {
    let escaped = bytes.iter().copied().flat_map(std::ascii::escape_default).collect::<Vec<_>>();
    format!("\"{}\"", String::from_utf8_lossy(&escaped))
}

pub fn dump_store(store: &MemoryStore) -> String {
    let mut cursor = store.snapshot();
    cursor.seek_to_first();
    let mut out = String::new();
    while cursor.valid() {
        out.push_str(&format!("{} → {}\n", escape(cursor.key()), escape(cursor.value())));
        cursor.next();
    }
    out
}
