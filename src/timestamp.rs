// Copyright (c) 2025
// This file is licensed under the AGPL-3.0-or-later

//! Hybrid timestamps and write indices (data model §3).

use std::fmt;

/// A hybrid-logical timestamp: a physical component (wall-clock-derived) and
/// a logical component that disambiguates writes within the same physical
/// tick. Larger values are later. Field declaration order matches comparison
/// order: `physical` is the major key, `logical` the minor key.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct Timestamp {
    physical: u64,
    logical: u32,
}

impl Timestamp {
    /// Strictly earlier than any timestamp a real write could carry.
    pub const MIN: Timestamp = Timestamp { physical: 0, logical: 0 };

    /// Represents the absence of a timestamp (e.g. no local commit record).
    /// Not comparable against real timestamps in a meaningful way; callers
    /// must check `is_invalid` before using a value that may be `INVALID`.
    pub const INVALID: Timestamp = Timestamp { physical: u64::MAX, logical: u32::MAX };

    /// Builds a timestamp from its physical and logical components.
    pub fn new(physical: u64, logical: u32) -> Self {
        Self { physical, logical }
    }

    /// The wall-clock-derived component.
    pub fn physical(&self) -> u64 {
        self.physical
    }

    /// The component that disambiguates writes within the same physical
    /// tick.
    pub fn logical(&self) -> u32 {
        self.logical
    }

    /// True for [`Self::INVALID`].
    pub fn is_invalid(&self) -> bool {
        *self == Self::INVALID
    }

    /// Microseconds elapsed between `earlier` and `self`, saturating at zero
    /// rather than underflowing if `self` is not actually later. The
    /// logical component is ignored: it only disambiguates writes within
    /// the same physical tick and never amounts to a whole microsecond.
    pub fn micros_since(&self, earlier: Timestamp) -> u64 {
        self.physical.saturating_sub(earlier.physical)
    }

    /// Encodes the timestamp so that descending logical order becomes
    /// ascending byte order (§6 `inverted(timestamp)`), matching the
    /// sign-bit-flip trick the keycode serializer uses for signed integers,
    /// applied here as a full bitwise complement since both fields are
    /// already unsigned and big-endian.
    pub(crate) fn encode_inverted(&self, out: &mut Vec<u8>) {
        out.extend(self.physical.to_be_bytes().map(|b| !b));
        out.extend(self.logical.to_be_bytes().map(|b| !b));
    }

    pub(crate) fn decode_inverted(bytes: &[u8]) -> Option<(Self, &[u8])> {
        if bytes.len() < 12 {
            return None;
        }
        let (head, rest) = bytes.split_at(12);
        let physical = u64::from_be_bytes(std::array::from_fn(|i| !head[i]));
        let logical = u32::from_be_bytes(std::array::from_fn(|i| !head[8 + i]));
        Some((Self { physical, logical }, rest))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.physical, self.logical)
    }
}

/// Disambiguates multiple writes carrying the same [`Timestamp`] within a
/// single write batch. `(Timestamp, WriteIndex)` forms the full version
/// order (data model §3).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct WriteIndex(u32);

impl WriteIndex {
    /// The first write index in a batch.
    pub const ZERO: WriteIndex = WriteIndex(0);

    /// Builds a write index from its raw ordinal.
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub(crate) fn encode_inverted(&self, out: &mut Vec<u8>) {
        out.extend(self.0.to_be_bytes().map(|b| !b));
    }

    pub(crate) fn decode_inverted(bytes: &[u8]) -> Option<(Self, &[u8])> {
        if bytes.len() < 4 {
            return None;
        }
        let (head, rest) = bytes.split_at(4);
        let value = u32::from_be_bytes(std::array::from_fn(|i| !head[i]));
        Some((Self(value), rest))
    }
}

/// The full version order of a write: commit time first, write index as the
/// tiebreaker. Ties are impossible by invariant (§4.4 edge rules).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Version {
    /// The write's commit (or provisional-write) timestamp.
    pub timestamp: Timestamp,
    /// Tiebreaker among writes sharing the same `timestamp`.
    pub write_index: WriteIndex,
}

impl Version {
    /// Pairs a timestamp with its write-index tiebreaker.
    pub fn new(timestamp: Timestamp, write_index: WriteIndex) -> Self {
        Self { timestamp, write_index }
    }
}
