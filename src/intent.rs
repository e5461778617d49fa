// Copyright (c) 2025
// This file is licensed under the AGPL-3.0-or-later

//! Intent Resolver (C3): turns a provisional write into either a regular
//! write at its commit timestamp or a decision that it is invisible, via
//! the transaction-status oracle (§4.3).

use std::collections::HashMap;

use crate::error::Error;
use crate::oracle::{TransactionStatus, TransactionStatusOracle};
use crate::timestamp::Timestamp;
use crate::value::TransactionId;
use crate::Result;

/// The outcome of resolving one intent against a read timestamp.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum IntentResolution {
    /// The intent counts as a regular write at `commit_ts` (not the
    /// provisional timestamp it was written under).
    Visible(Timestamp),
    /// The intent's owning transaction did not commit at or before the read
    /// timestamp.
    Invisible,
}

/// What a prior resolution of a transaction settled to, remembered so a
/// second intent from the same transaction doesn't call the oracle again.
#[derive(Clone, Copy)]
enum CachedResolution {
    Visible(Timestamp),
    Invisible,
    TryAgain,
}

/// Resolves intents for a single `NextRow` call. Memoization is scoped to
/// one instance; construct a fresh resolver per row (§4.3 "no caching
/// persists across rows").
pub struct IntentResolver<'a, O: TransactionStatusOracle> {
    oracle: &'a O,
    read_ts: Timestamp,
    cache: HashMap<TransactionId, CachedResolution>,
}

impl<'a, O: TransactionStatusOracle> IntentResolver<'a, O> {
    /// A fresh resolver with an empty cache, querying `oracle` at `read_ts`.
    pub fn new(oracle: &'a O, read_ts: Timestamp) -> Self {
        Self { oracle, read_ts, cache: HashMap::new() }
    }

    /// Resolves `txn_id`'s intent, consulting the oracle only on the first
    /// call for a given transaction within this resolver's lifetime.
    pub fn resolve(&mut self, txn_id: TransactionId) -> Result<IntentResolution> {
        if let Some(cached) = self.cache.get(&txn_id) {
            return Self::resolution_of(txn_id, *cached);
        }
        let cached = self.resolve_uncached(txn_id);
        self.cache.insert(txn_id, cached);
        Self::resolution_of(txn_id, cached)
    }

    fn resolve_uncached(&self, txn_id: TransactionId) -> CachedResolution {
        if let Some(commit_ts) = self.oracle.local_commit_time(txn_id) {
            return if commit_ts <= self.read_ts {
                CachedResolution::Visible(commit_ts)
            } else {
                CachedResolution::Invisible
            };
        }
        match self.oracle.status(txn_id, self.read_ts) {
            TransactionStatus::Committed(commit_ts) if commit_ts <= self.read_ts => {
                CachedResolution::Visible(commit_ts)
            }
            TransactionStatus::Committed(_) => CachedResolution::Invisible,
            TransactionStatus::Aborted => CachedResolution::Invisible,
            TransactionStatus::Pending | TransactionStatus::Unknown => CachedResolution::TryAgain,
        }
    }

    fn resolution_of(txn_id: TransactionId, cached: CachedResolution) -> Result<IntentResolution> {
        match cached {
            CachedResolution::Visible(ts) => Ok(IntentResolution::Visible(ts)),
            CachedResolution::Invisible => Ok(IntentResolution::Invisible),
            CachedResolution::TryAgain => {
                tracing::debug!(txn_id = %txn_id.0, "intent resolution forced try-again");
                Err(Error::TryAgain { txn_id: txn_id.0 })
            }
        }
    }
}
