// Copyright (c) 2025
// This file is licensed under the AGPL-3.0-or-later

//! Document Walker (C5): drives the ordered store one document at a time,
//! feeding each sub-path's versions through the visibility filter and
//! assembling the per-document cell map C6 needs (§4.5).

use std::collections::HashMap;

use crate::intent::IntentResolver;
use crate::key::{ColumnId, KeyCodec};
use crate::oracle::TransactionStatusOracle;
use crate::timestamp::Timestamp;
use crate::visibility::{resolve_cell_step, CellStep, VisibleCell};
use crate::Result;

/// One document's worth of materialized state, handed to the row assembler
/// (§4.5 step 4).
pub struct ProcessedDocument {
    /// Logical (unescaped) document-key bytes, ready for
    /// `Schema::decode_primary_key`.
    pub doc_key: Vec<u8>,
    /// Visible value per non-key column id that had any entries at all.
    pub cells: HashMap<ColumnId, VisibleCell>,
    /// Whether the document carries a tombstone at or before the read
    /// timestamp (§4.5 step 5 — used by the caller together with the
    /// projection to decide whether to skip an all-NULL row).
    pub tombstoned: bool,
}

/// Walks an ordered store snapshot one document at a time (§4.5 state
/// machine: `Start`, `AtDocument`, `Exhausted`, collapsed here into the
/// cursor's own validity plus an `exhausted` latch).
pub struct DocumentWalker<S> {
    cursor: S,
    read_ts: Timestamp,
    /// Whether intent entries should be resolved at all. Non-transactional
    /// read contexts ignore every intent entry unconditionally (§4.3).
    transactional: bool,
    exhausted: bool,
}

impl<S: crate::store::StoreCursor> DocumentWalker<S> {
    /// Builds a walker over `cursor`. Call [`Self::init`] before the first
    /// [`Self::next_document`].
    pub fn new(cursor: S, read_ts: Timestamp, transactional: bool) -> Self {
        Self { cursor, read_ts, transactional, exhausted: false }
    }

    /// `Start → AtDocument`: positions at the first entry at or after
    /// `lower_bound` (or the very first entry, if none).
    pub fn init(&mut self, lower_bound: Option<&[u8]>) {
        match lower_bound {
            Some(bound) => self.cursor.seek(bound),
            None => self.cursor.seek_to_first(),
        }
        self.exhausted = !self.cursor.valid();
        tracing::trace!(has_lower_bound = lower_bound.is_some(), read_ts = %self.read_ts, "walker initialized");
    }

    /// Advances to and fully processes the next document, skipping any that
    /// turn out to be entirely hidden with no key-only-projection exception
    /// to honor (that exception is applied by the caller, which is why a
    /// fully-processed, possibly all-NULL document is still returned here —
    /// §4.5 step 5 needs the projection, which this component doesn't see).
    pub fn next_document<O: TransactionStatusOracle>(
        &mut self,
        resolver: &mut IntentResolver<'_, O>,
    ) -> Result<Option<ProcessedDocument>> {
        if self.exhausted || !self.cursor.valid() {
            self.exhausted = true;
            return Ok(None);
        }

        let doc_prefix = KeyCodec::doc_key_bytes(self.cursor.key())?.to_vec();
        let mut doc_key: Option<Vec<u8>> = None;
        let mut doc_ts = Timestamp::MIN;
        let mut cells = HashMap::new();

        while self.cursor.valid() && KeyCodec::doc_key_bytes(self.cursor.key())? == doc_prefix.as_slice() {
            let decoded = KeyCodec::decode(self.cursor.key())?;
            if doc_key.is_none() {
                doc_key = Some(decoded.doc_key.into_owned());
            }
            let path_prefix = KeyCodec::path_prefix(self.cursor.key())?.to_vec();
            let is_root = decoded.sub_path.is_root();
            let column_id = decoded.sub_path.as_column();

            if is_root {
                let (_, threshold) = self.scan_path(&path_prefix, doc_ts, resolver)?;
                doc_ts = threshold;
            } else if let Some(column_id) = column_id {
                let (visible, _) = self.scan_path(&path_prefix, doc_ts, resolver)?;
                if let Some(cell) = visible {
                    cells.insert(column_id, cell);
                }
            } else {
                // Multi-component sub-paths belong to non-row document
                // shapes, out of scope for this crate's row iterator; skip
                // the whole path's versions.
                self.scan_path(&path_prefix, doc_ts, resolver)?;
            }
        }

        self.exhausted = !self.cursor.valid();

        // The loop above runs at least once: `doc_prefix` was derived from
        // the cursor's own key, so the first iteration's prefix check always
        // matches.
        let doc_key = doc_key.expect("document prefix always matches its own first entry");

        let tombstoned = doc_ts > Timestamp::MIN && doc_ts <= self.read_ts;
        tracing::trace!(fully_hidden = tombstoned && cells.is_empty(), "document advanced");

        // §4.5 step 2's early-exit ("fully hidden, no later regular write")
        // is exactly the case where every sub-path resolved to NULL under a
        // document tombstone; whether that row is still worth emitting
        // depends on the projection, which the caller decides (step 5).
        Ok(Some(ProcessedDocument { doc_key, cells, tombstoned }))
    }

    /// Scans one `(doc_key, sub_path)`'s versions against the inherited
    /// tombstone threshold, stopping as soon as the visibility filter
    /// reaches a decision and fast-skipping any older, now-irrelevant
    /// versions of the same path via `Seek` rather than draining them one
    /// `Next()` at a time (§4.5 "Seek-vs-next discipline").
    fn scan_path<O: TransactionStatusOracle>(
        &mut self,
        path_prefix: &[u8],
        inherited_threshold: Timestamp,
        resolver: &mut IntentResolver<'_, O>,
    ) -> Result<(Option<VisibleCell>, Timestamp)> {
        let mut threshold = inherited_threshold;

        while self.cursor.valid() {
            let key = self.cursor.key();
            if KeyCodec::path_prefix(key)? != path_prefix {
                break;
            }
            let decoded = KeyCodec::decode(key)?;
            let kind = decoded.kind;
            let version = decoded.version;
            let value_bytes = self.cursor.value().to_vec();
            self.cursor.next();

            if !self.transactional && matches!(kind, crate::key::EntryKind::Intent(_)) {
                continue;
            }

            match resolve_cell_step(self.read_ts, threshold, kind, version, &value_bytes, resolver)? {
                CellStep::Continue(updated) => threshold = updated,
                CellStep::Done(result, updated) => {
                    if let Some(bound) = KeyCodec::upper_bound(path_prefix) {
                        self.cursor.seek(&bound);
                    } else {
                        while self.cursor.valid() && KeyCodec::path_prefix(self.cursor.key())? == path_prefix {
                            self.cursor.next();
                        }
                    }
                    return Ok((result, updated));
                }
            }
        }

        Ok((None, threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{IntentStrength, SubPath};
    use crate::oracle::TestOracle;
    use crate::schema::encode_doc_key;
    use crate::store::{MemoryStore, OrderedStore};
    use crate::timestamp::{Version, WriteIndex};
    use crate::value::{Payload, PayloadType, Value, ValueCodec};

    fn doc_key(n: &str) -> Vec<u8> {
        encode_doc_key(&[Value::Text(n.to_string())])
    }

    fn version(physical: u64) -> Version {
        Version::new(Timestamp::new(physical, 0), WriteIndex::ZERO)
    }

    fn put_regular(store: &mut MemoryStore, doc: &[u8], path: SubPath, physical: u64, payload: Payload) {
        let key = KeyCodec::encode_regular(doc, &path, version(physical));
        store.put(key, ValueCodec::encode_regular(payload, None));
    }

    fn primitive(value: &Value) -> Payload {
        let (type_tag, bytes) = ValueCodec::encode_primitive(value);
        Payload::Primitive { type_tag, bytes }
    }

    #[test]
    fn walks_a_single_document_with_two_columns() {
        let doc = doc_key("row1");
        let mut store = MemoryStore::new();
        put_regular(&mut store, &doc, SubPath::column(30), 1000, primitive(&Value::Text("c".into())));
        put_regular(&mut store, &doc, SubPath::column(40), 1000, primitive(&Value::Int(10)));

        let oracle = TestOracle::new();
        let mut resolver = IntentResolver::new(&oracle, Timestamp::new(2000, 0));
        let mut walker = DocumentWalker::new(store.snapshot(), Timestamp::new(2000, 0), true);
        walker.init(None);

        let processed = walker.next_document(&mut resolver).unwrap().unwrap();
        assert_eq!(processed.doc_key, doc);
        assert!(!processed.tombstoned);
        assert_eq!(processed.cells.len(), 2);
        let c30 = &processed.cells[&30];
        assert_eq!(ValueCodec::decode_primitive(c30.type_tag, &c30.bytes).unwrap(), Value::Text("c".into()));
    }

    #[test]
    fn document_tombstone_shadows_older_columns_but_not_later_ones() {
        let doc = doc_key("row1");
        let mut store = MemoryStore::new();
        put_regular(&mut store, &doc, SubPath::column(30), 1000, primitive(&Value::Text("old_c".into())));
        put_regular(&mut store, &doc, SubPath::root(), 2500, Payload::Tombstone);
        put_regular(&mut store, &doc, SubPath::column(50), 2800, primitive(&Value::Text("e".into())));

        let oracle = TestOracle::new();
        let mut resolver = IntentResolver::new(&oracle, Timestamp::new(2800, 0));
        let mut walker = DocumentWalker::new(store.snapshot(), Timestamp::new(2800, 0), true);
        walker.init(None);

        let processed = walker.next_document(&mut resolver).unwrap().unwrap();
        assert!(processed.tombstoned);
        assert!(!processed.cells.contains_key(&30));
        let c50 = &processed.cells[&50];
        assert_eq!(ValueCodec::decode_primitive(c50.type_tag, &c50.bytes).unwrap(), Value::Text("e".into()));
    }

    #[test]
    fn fully_deleted_document_has_no_cells() {
        let doc = doc_key("row1");
        let mut store = MemoryStore::new();
        put_regular(&mut store, &doc, SubPath::column(30), 1000, primitive(&Value::Int(1)));
        put_regular(&mut store, &doc, SubPath::root(), 2000, Payload::Tombstone);

        let oracle = TestOracle::new();
        let mut resolver = IntentResolver::new(&oracle, Timestamp::new(3000, 0));
        let mut walker = DocumentWalker::new(store.snapshot(), Timestamp::new(3000, 0), true);
        walker.init(None);

        let processed = walker.next_document(&mut resolver).unwrap().unwrap();
        assert!(processed.tombstoned);
        assert!(processed.cells.is_empty());
    }

    #[test]
    fn walker_advances_across_multiple_documents() {
        let row1 = doc_key("row1");
        let row2 = doc_key("row2");
        let mut store = MemoryStore::new();
        put_regular(&mut store, &row1, SubPath::column(30), 1000, primitive(&Value::Int(1)));
        put_regular(&mut store, &row2, SubPath::column(30), 1000, primitive(&Value::Int(2)));

        let oracle = TestOracle::new();
        let mut resolver = IntentResolver::new(&oracle, Timestamp::new(2000, 0));
        let mut walker = DocumentWalker::new(store.snapshot(), Timestamp::new(2000, 0), true);
        walker.init(None);

        let first = walker.next_document(&mut resolver).unwrap().unwrap();
        assert_eq!(first.doc_key, row1);
        let second = walker.next_document(&mut resolver).unwrap().unwrap();
        assert_eq!(second.doc_key, row2);
        assert!(walker.next_document(&mut resolver).unwrap().is_none());
    }

    #[test]
    fn weak_intent_at_root_does_not_become_a_document_tombstone() {
        let doc = doc_key("row1");
        let mut store = MemoryStore::new();
        let txn_id = crate::value::TransactionId(uuid::Uuid::from_u128(1));
        let key = KeyCodec::encode_intent(&doc, &SubPath::root(), IntentStrength::Weak, version(1500));
        store.put(key, ValueCodec::encode_weak_intent(txn_id));
        put_regular(&mut store, &doc, SubPath::column(30), 1000, primitive(&Value::Int(1)));

        let oracle = TestOracle::new();
        let mut resolver = IntentResolver::new(&oracle, Timestamp::new(2000, 0));
        let mut walker = DocumentWalker::new(store.snapshot(), Timestamp::new(2000, 0), true);
        walker.init(None);

        let processed = walker.next_document(&mut resolver).unwrap().unwrap();
        assert!(!processed.tombstoned);
        assert!(processed.cells.contains_key(&30));
    }
}
