// Copyright (c) 2025
// This file is licensed under the AGPL-3.0-or-later

//! Visibility Filter (C4): picks the single visible version of one
//! `(doc_key, sub_path)` cell at a read timestamp, given the versions the
//! walker feeds it newest-first, plus inherited tombstone thresholds
//! (§4.4).

use crate::intent::{IntentResolution, IntentResolver};
use crate::key::{EntryKind, IntentStrength};
use crate::oracle::TransactionStatusOracle;
use crate::timestamp::{Timestamp, Version};
use crate::value::{Payload, PayloadType, ValueCodec};
use crate::Result;

/// The cell's visible value, if any.
pub struct VisibleCell {
    /// The version at which this value became visible: the write's own
    /// timestamp for a regular entry, or its transaction's commit time for
    /// an intent.
    pub effective_time: Timestamp,
    /// The value's wire type.
    pub type_tag: PayloadType,
    /// The encoded value bytes.
    pub bytes: Vec<u8>,
}

/// The outcome of folding one more version into a cell scan (§4.4 steps
/// 2a–2e), returned by [`resolve_cell_step`] so the walker can drive the
/// per-version logic directly against a live store cursor, stopping and
/// fast-skipping the moment a decision is reached instead of requiring the
/// full version list up front.
pub enum CellStep {
    /// No decision yet; keep scanning with the (possibly updated) threshold.
    Continue(Timestamp),
    /// Scanning this cell is finished: the visible value (if any), and the
    /// tombstone threshold to carry into the next cell.
    Done(Option<VisibleCell>, Timestamp),
}

/// Folds one version into an in-progress cell scan (§4.4 algorithm, one
/// iteration of the loop over step 2).
pub fn resolve_cell_step<O: TransactionStatusOracle>(
    read_ts: Timestamp,
    cell_tombstone_ts: Timestamp,
    kind: EntryKind,
    version: Version,
    value_bytes: &[u8],
    resolver: &mut IntentResolver<'_, O>,
) -> Result<CellStep> {
    let (effective_time, decoded) = match kind {
        EntryKind::Regular => (version.timestamp, ValueCodec::decode_regular(value_bytes)?),
        // Weak intents are placeholders with no payload of their own; the
        // walker uses them only to detect a pending descendant write, never
        // feeds them here as a candidate cell value.
        EntryKind::Intent(IntentStrength::Weak) => return Ok(CellStep::Continue(cell_tombstone_ts)),
        EntryKind::Intent(IntentStrength::Strong) => {
            let (txn_id, maybe_value) = ValueCodec::decode_intent(value_bytes)?;
            match resolver.resolve(txn_id)? {
                IntentResolution::Invisible => return Ok(CellStep::Continue(cell_tombstone_ts)),
                IntentResolution::Visible(commit_ts) => {
                    if commit_ts > read_ts {
                        return Ok(CellStep::Continue(cell_tombstone_ts));
                    }
                    let Some(intent_value) = maybe_value else {
                        return Ok(CellStep::Continue(cell_tombstone_ts));
                    };
                    (commit_ts, intent_value.value)
                }
            }
        }
    };

    if effective_time > read_ts {
        return Ok(CellStep::Continue(cell_tombstone_ts));
    }
    if effective_time <= cell_tombstone_ts {
        // Older versions of this cell are shadowed; nothing further in the
        // (newest-first) scan can become visible.
        return Ok(CellStep::Done(None, cell_tombstone_ts));
    }

    match decoded.payload {
        Payload::Tombstone => {
            Ok(CellStep::Done(None, cell_tombstone_ts.max(effective_time)))
        }
        Payload::Primitive { type_tag, bytes } => {
            let expired = decoded
                .ttl
                .is_some_and(|ttl| read_ts.micros_since(effective_time) >= ttl.as_micros() as u64);
            if expired {
                return Ok(CellStep::Done(None, cell_tombstone_ts.max(effective_time)));
            }
            Ok(CellStep::Done(
                Some(VisibleCell { effective_time, type_tag, bytes }),
                cell_tombstone_ts,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{TestOracle, TransactionStatus};
    use crate::timestamp::WriteIndex;
    use crate::value::{TransactionId, Value};
    use std::time::Duration;
    use uuid::Uuid;

    fn ts(physical: u64) -> Timestamp {
        Timestamp::new(physical, 0)
    }

    fn version(physical: u64) -> Version {
        Version::new(ts(physical), WriteIndex::ZERO)
    }

    fn regular(physical: u64, payload: Payload, ttl: Option<Duration>) -> (Version, Vec<u8>) {
        (version(physical), ValueCodec::encode_regular(payload, ttl))
    }

    fn primitive(value: &Value) -> Payload {
        let (type_tag, bytes) = ValueCodec::encode_primitive(value);
        Payload::Primitive { type_tag, bytes }
    }

    /// Drives [`resolve_cell_step`] over a newest-first version list the way
    /// the walker drives it over a live cursor, for tests that only care
    /// about the end-to-end per-cell decision.
    fn resolve_cell<O: TransactionStatusOracle>(
        read_ts: Timestamp,
        doc_tombstone_threshold: Timestamp,
        versions: &[(EntryKind, Version, Vec<u8>)],
        resolver: &mut IntentResolver<'_, O>,
    ) -> Result<(Option<VisibleCell>, Timestamp)> {
        let mut threshold = doc_tombstone_threshold;
        for (kind, version, value_bytes) in versions {
            match resolve_cell_step(read_ts, threshold, *kind, *version, value_bytes, resolver)? {
                CellStep::Continue(updated) => threshold = updated,
                CellStep::Done(result, updated) => return Ok((result, updated)),
            }
        }
        Ok((None, threshold))
    }

    #[test]
    fn newest_non_tombstone_version_at_or_before_read_time_wins() {
        let oracle = TestOracle::new();
        let mut resolver = IntentResolver::new(&oracle, ts(3000));
        let (v1, b1) = regular(1000, primitive(&Value::Text("old".into())), None);
        let (v2, b2) = regular(2000, primitive(&Value::Text("new".into())), None);
        let versions = [(EntryKind::Regular, v2, b2), (EntryKind::Regular, v1, b1)];
        let (cell, _) = resolve_cell(ts(3000), Timestamp::MIN, &versions, &mut resolver).unwrap();
        let cell = cell.unwrap();
        assert_eq!(ValueCodec::decode_primitive(cell.type_tag, &cell.bytes).unwrap(), Value::Text("new".into()));
    }

    #[test]
    fn future_write_is_invisible() {
        let oracle = TestOracle::new();
        let mut resolver = IntentResolver::new(&oracle, ts(1000));
        let (v, b) = regular(2000, primitive(&Value::Int(1)), None);
        let versions = [(EntryKind::Regular, v, b)];
        let (cell, _) = resolve_cell(ts(1000), Timestamp::MIN, &versions, &mut resolver).unwrap();
        assert!(cell.is_none());
    }

    #[test]
    fn tombstone_shadows_older_versions() {
        let oracle = TestOracle::new();
        let mut resolver = IntentResolver::new(&oracle, ts(3000));
        let (del, db) = regular(2000, Payload::Tombstone, None);
        let (old, ob) = regular(1000, primitive(&Value::Int(1)), None);
        let versions = [(EntryKind::Regular, del, db), (EntryKind::Regular, old, ob)];
        let (cell, threshold) = resolve_cell(ts(3000), Timestamp::MIN, &versions, &mut resolver).unwrap();
        assert!(cell.is_none());
        assert_eq!(threshold, ts(2000));
    }

    #[test]
    fn inherited_document_tombstone_shadows_a_cell_written_before_it() {
        let oracle = TestOracle::new();
        let mut resolver = IntentResolver::new(&oracle, ts(3000));
        let (old, ob) = regular(1000, primitive(&Value::Int(1)), None);
        let versions = [(EntryKind::Regular, old, ob)];
        let (cell, _) = resolve_cell(ts(3000), ts(2000), &versions, &mut resolver).unwrap();
        assert!(cell.is_none());
    }

    #[test]
    fn expired_ttl_behaves_like_a_tombstone() {
        let oracle = TestOracle::new();
        let mut resolver = IntentResolver::new(&oracle, ts(2800 + 2));
        let (v, b) = regular(2800, primitive(&Value::Int(1)), Some(Duration::from_micros(1)));
        let versions = [(EntryKind::Regular, v, b)];
        let (cell, _) = resolve_cell(ts(2800 + 2), Timestamp::MIN, &versions, &mut resolver).unwrap();
        assert!(cell.is_none());
    }

    #[test]
    fn unexpired_ttl_remains_visible() {
        let oracle = TestOracle::new();
        let mut resolver = IntentResolver::new(&oracle, ts(2800 + 2));
        let (v, b) = regular(2800, primitive(&Value::Int(1)), Some(Duration::from_micros(3)));
        let versions = [(EntryKind::Regular, v, b)];
        let (cell, _) = resolve_cell(ts(2800 + 2), Timestamp::MIN, &versions, &mut resolver).unwrap();
        assert!(cell.is_some());
    }

    #[test]
    fn committed_intent_counts_as_a_regular_write_at_commit_time() {
        let mut oracle = TestOracle::new();
        let txn_id = TransactionId(Uuid::from_u128(1));
        oracle.set_status(txn_id, TransactionStatus::Committed(ts(3500)));
        let mut resolver = IntentResolver::new(&oracle, ts(4000));
        let bytes = ValueCodec::encode_strong_intent(txn_id, primitive(&Value::Int(7)), None);
        let versions = [(EntryKind::Intent(IntentStrength::Strong), version(500), bytes)];
        let (cell, _) = resolve_cell(ts(4000), Timestamp::MIN, &versions, &mut resolver).unwrap();
        let cell = cell.unwrap();
        assert_eq!(cell.effective_time, ts(3500));
    }

    #[test]
    fn pending_intent_propagates_try_again() {
        let mut oracle = TestOracle::new();
        let txn_id = TransactionId(Uuid::from_u128(1));
        oracle.set_status(txn_id, TransactionStatus::Pending);
        let mut resolver = IntentResolver::new(&oracle, ts(4000));
        let bytes = ValueCodec::encode_strong_intent(txn_id, primitive(&Value::Int(7)), None);
        let versions = [(EntryKind::Intent(IntentStrength::Strong), version(500), bytes)];
        assert!(resolve_cell(ts(4000), Timestamp::MIN, &versions, &mut resolver).is_err());
    }

    #[test]
    fn aborted_intent_is_skipped_in_favor_of_the_next_version() {
        let mut oracle = TestOracle::new();
        let txn_id = TransactionId(Uuid::from_u128(1));
        oracle.set_status(txn_id, TransactionStatus::Aborted);
        let intent_bytes = ValueCodec::encode_strong_intent(txn_id, primitive(&Value::Int(7)), None);
        let (regular_version, regular_bytes) = regular(1000, primitive(&Value::Int(1)), None);
        let mut resolver = IntentResolver::new(&oracle, ts(4000));
        let versions = [
            (EntryKind::Intent(IntentStrength::Strong), version(500), intent_bytes),
            (EntryKind::Regular, regular_version, regular_bytes),
        ];
        let (cell, _) = resolve_cell(ts(4000), Timestamp::MIN, &versions, &mut resolver).unwrap();
        assert!(cell.is_some());
    }
}
