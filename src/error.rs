// Copyright (c) 2025
// This file is licensed under the AGPL-3.0-or-later

use crate::key::KeyError;
use crate::schema::SchemaError;
use crate::value::ValueError;

/// Errors produced or propagated by the row iterator.
///
/// Mirrors the error kinds a caller must distinguish: `Corruption` is fatal
/// and never retried, `TryAgain` asks the caller to retry once transaction
/// status settles, `Cancelled` and `IoError` are terminal, and `Exhausted`
/// is a caller-side usage error (calling `next_row` past the end).
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Undecodable key or value, or a value whose type does not match the
    /// schema's declared column type.
    #[error("corruption: {0}")]
    Corruption(String),

    /// A provisional write's transaction was `Pending` or `Unknown` at a
    /// point that affects the row currently being materialized. The
    /// iterator's position is considered invalid after this error; the
    /// caller is expected to retry later with updated transaction status.
    #[error("try again: transaction {txn_id} has not settled")]
    TryAgain {
        /// The transaction whose status forced the retry.
        txn_id: uuid::Uuid,
    },

    /// The read context's cancellation token fired or its deadline elapsed.
    #[error("cancelled")]
    Cancelled,

    /// Propagated from the underlying ordered store.
    #[error("io error: {0}")]
    Io(String),

    /// `next_row` was called without a pending row and after `has_next`
    /// returned `false`.
    #[error("iterator exhausted")]
    Exhausted,
}

impl From<KeyError> for Error {
    fn from(err: KeyError) -> Self {
        Error::Corruption(err.to_string())
    }
}

impl From<ValueError> for Error {
    fn from(err: ValueError) -> Self {
        Error::Corruption(err.to_string())
    }
}

impl From<SchemaError> for Error {
    fn from(err: SchemaError) -> Self {
        Error::Corruption(err.to_string())
    }
}

impl Error {
    /// True for errors that are terminal for the iterator: every subsequent
    /// call should return the same error rather than attempt more work.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Error::Exhausted)
    }
}
