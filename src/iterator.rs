// Copyright (c) 2025
// This file is licensed under the AGPL-3.0-or-later

//! Iterator Facade (C7): `Init` / `HasNext` / `NextRow` with idempotent
//! lookahead over a snapshot of the ordered store (§4.7).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::assembler::{assemble_row, is_key_only_projection};
use crate::error::Error;
use crate::intent::IntentResolver;
use crate::oracle::TransactionStatusOracle;
use crate::schema::{Projection, Schema};
use crate::store::OrderedStore;
use crate::timestamp::Timestamp;
use crate::walker::DocumentWalker;
use crate::Result;

pub use crate::assembler::Row;

/// A cooperative cancellation flag shared between the caller and an
/// in-flight iterator (§5 "Cancellation").
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// A fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the token cancelled. Visible to every clone.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether [`Self::cancel`] has been called on this token or a clone of it.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// The read context a row iterator is configured with (§3 "Read context",
/// §10.3 of the ambient stack).
#[derive(Clone, Default)]
pub struct ReadContext {
    /// The MVCC snapshot timestamp visible values are resolved against.
    pub read_timestamp: Timestamp,
    /// Absent for non-transactional reads: intent entries are then ignored
    /// unconditionally by the walker (§4.3).
    pub transactional: bool,
    /// First document key to emit a row for, inclusive.
    pub lower_bound: Option<Vec<u8>>,
    /// A wall-clock deadline past which the iterator reports cancellation.
    pub deadline: Option<Instant>,
    /// An externally-triggerable cancellation flag, checked alongside
    /// `deadline`.
    pub cancellation: Option<CancellationToken>,
}

impl ReadContext {
    /// A context with no lower bound, deadline, or cancellation configured.
    pub fn new(read_timestamp: Timestamp) -> Self {
        Self { read_timestamp, ..Self::default() }
    }

    /// Enables transactional reads: intent entries are resolved rather than
    /// ignored.
    pub fn transactional(mut self) -> Self {
        self.transactional = true;
        self
    }

    /// Sets the first document key to emit a row for.
    pub fn with_lower_bound(mut self, lower_bound: Vec<u8>) -> Self {
        self.lower_bound = Some(lower_bound);
        self
    }

    /// Sets a wall-clock deadline for the iterator.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Attaches a cancellation token for the iterator to poll.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation.as_ref().is_some_and(CancellationToken::is_cancelled)
            || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// Materializes logical rows from an ordered store snapshot at a fixed read
/// timestamp, for a caller-supplied projection (§4.7, §6 "Iterator
/// interface"). Single-use, forward-only, owned by one thread (§5).
pub struct RowIterator<'a, St: OrderedStore, Sc, O> {
    store: &'a St,
    schema: &'a Sc,
    projection: &'a Projection,
    oracle: &'a O,
    context: ReadContext,
    key_only_projection: bool,
    walker: Option<DocumentWalker<St::Cursor>>,
    cached: Option<Result<Row>>,
    exhausted: bool,
}

impl<'a, St, Sc, O> RowIterator<'a, St, Sc, O>
where
    St: OrderedStore,
    Sc: Schema,
    O: TransactionStatusOracle,
{
    /// Constructs an iterator. No store access happens until [`Self::init`]
    /// is called (§6 "Iterator interface" constructor).
    pub fn new(
        store: &'a St,
        schema: &'a Sc,
        projection: &'a Projection,
        oracle: &'a O,
        context: ReadContext,
    ) -> Result<Self> {
        let key_only_projection = is_key_only_projection(schema, projection.column_ids())?;
        Ok(Self {
            store,
            schema,
            projection,
            oracle,
            context,
            key_only_projection,
            walker: None,
            cached: None,
            exhausted: false,
        })
    }

    /// Acquires a store snapshot and positions the walker at the configured
    /// lower bound (§4.7, §5 "snapshot acquired at Init").
    pub fn init(&mut self) -> Result<()> {
        let cursor = self.store.snapshot();
        let mut walker = DocumentWalker::new(cursor, self.context.read_timestamp, self.context.transactional);
        walker.init(self.context.lower_bound.as_deref());
        self.walker = Some(walker);
        tracing::trace!(
            has_lower_bound = self.context.lower_bound.is_some(),
            read_ts = %self.context.read_timestamp,
            "iterator initialized"
        );
        Ok(())
    }

    /// Idempotent lookahead (§4.7 "HasNext"). Repeated calls without an
    /// intervening `next_row` return the same result and perform no further
    /// work (P6).
    pub fn has_next(&mut self) -> Result<bool> {
        if self.exhausted {
            return Ok(false);
        }
        if let Some(cached) = &self.cached {
            return match cached {
                Ok(_) => Ok(true),
                Err(err) => Err(err.clone()),
            };
        }
        if self.context.is_cancelled() {
            self.cached = Some(Err(Error::Cancelled));
            return Err(Error::Cancelled);
        }

        match self.materialize_next_row() {
            Ok(Some(row)) => {
                self.cached = Some(Ok(row));
                Ok(true)
            }
            Ok(None) => {
                self.exhausted = true;
                tracing::trace!("iterator exhausted");
                Ok(false)
            }
            Err(err) => {
                self.cached = Some(Err(err.clone()));
                Err(err)
            }
        }
    }

    /// Consumes the cached row (§4.7 "NextRow"). Calls `has_next` first if
    /// no row is cached yet; invalidates the cache before returning.
    pub fn next_row(&mut self, out: &mut Row) -> Result<()> {
        if self.cached.is_none() {
            self.has_next()?;
        }
        match self.cached.take() {
            Some(Ok(row)) => {
                *out = row;
                Ok(())
            }
            Some(Err(err)) => Err(err),
            None => Err(Error::Exhausted),
        }
    }

    /// Drives the walker (and, transitively, the visibility filter and
    /// intent resolver) until it finds a document worth emitting as a row,
    /// or runs out of documents (§4.5 steps 1–5).
    fn materialize_next_row(&mut self) -> Result<Option<Row>> {
        let walker = self.walker.as_mut().expect("init() must be called before has_next()");
        loop {
            if self.context.is_cancelled() {
                return Err(Error::Cancelled);
            }

            // A fresh resolver per document: memoization is scoped to one
            // row materialization attempt, never shared across rows (§4.3).
            let mut resolver = IntentResolver::new(self.oracle, self.context.read_timestamp);
            let Some(document) = walker.next_document(&mut resolver)? else {
                return Ok(None);
            };

            if document.tombstoned && document.cells.is_empty() && !self.key_only_projection {
                continue;
            }

            let key_values = self.schema.decode_primary_key(&document.doc_key)?;
            let row = assemble_row(self.schema, self.projection.column_ids(), &key_values, &document.cells)?;
            return Ok(Some(row));
        }
    }
}
