// Copyright (c) 2025
// This file is licensed under the AGPL-3.0-or-later

//! The transaction-status oracle contract (§6), plus a scriptable test
//! double used by the crate's own test suite in place of a real
//! distributed-transaction coordinator.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::timestamp::Timestamp;
use crate::value::TransactionId;

/// The outcome of a transaction as seen at a particular read time (§4.3).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TransactionStatus {
    /// Committed at the given timestamp.
    Committed(Timestamp),
    /// Still in flight; not yet committed or aborted.
    Pending,
    /// Aborted; its writes are never visible.
    Aborted,
    /// The oracle has no record of the transaction. Treated like `Aborted`
    /// for visibility purposes (§4.3), but kept distinct since callers may
    /// want to distinguish "known gone" from "never existed here".
    Unknown,
}

/// External collaborator this crate only consumes (§6 "Transaction-status
/// oracle contract").
pub trait TransactionStatusOracle {
    /// The status of `txn_id` as observed at `read_ts`.
    fn status(&self, txn_id: TransactionId, read_ts: Timestamp) -> TransactionStatus;

    /// A fast path for transactions whose commit record is available
    /// locally, bypassing a full `status` call. Returns `None` when no
    /// local record exists.
    fn local_commit_time(&self, txn_id: TransactionId) -> Option<Timestamp>;
}

/// A scriptable oracle for tests: statuses are registered up front and
/// returned verbatim, independent of the queried read timestamp (tests that
/// need read-time-dependent behavior register a `Committed` status and pick
/// read timestamps around its commit time instead).
#[derive(Clone, Default)]
pub struct TestOracle {
    statuses: RefCell<HashMap<TransactionId, TransactionStatus>>,
    local_commits: RefCell<HashMap<TransactionId, Timestamp>>,
}

impl TestOracle {
    /// An oracle with no registered transactions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the status to return for `txn_id`.
    pub fn set_status(&self, txn_id: TransactionId, status: TransactionStatus) {
        self.statuses.borrow_mut().insert(txn_id, status);
    }

    /// Registers a local commit-time fast-path record for `txn_id`.
    pub fn set_local_commit_time(&self, txn_id: TransactionId, commit_ts: Timestamp) {
        self.local_commits.borrow_mut().insert(txn_id, commit_ts);
    }
}

impl TransactionStatusOracle for TestOracle {
    fn status(&self, txn_id: TransactionId, _read_ts: Timestamp) -> TransactionStatus {
        self.statuses.borrow().get(&txn_id).copied().unwrap_or(TransactionStatus::Unknown)
    }

    fn local_commit_time(&self, txn_id: TransactionId) -> Option<Timestamp> {
        self.local_commits.borrow().get(&txn_id).copied()
    }
}
