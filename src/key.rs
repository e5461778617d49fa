// Copyright (c) 2025
// This file is licensed under the AGPL-3.0-or-later

// The byte-string escape/terminator scheme used to delimit the document-key
// segment below is the same order-preserving trick the keycode serializer
// (encoding/keycode/serialize.rs) uses for byte slices, applied here to a
// single opaque field directly rather than through the full serde machinery.

//! Key Codec (C1): decodes the bit-exact layout of §6 into its logical
//! pieces without allocating beyond what escaped bytes require.

use std::borrow::Cow;
use std::fmt;

use crate::timestamp::{Timestamp, Version, WriteIndex};

/// A column identifier: an integer tag stable across schema versions.
pub type ColumnId = u32;

const VERSION_LEN: usize = 12 /* timestamp */ + 4 /* write index */;
const KIND_REGULAR: u8 = 0;
const KIND_INTENT: u8 = 1;
const STRENGTH_WEAK: u8 = 0;
const STRENGTH_STRONG: u8 = 1;

/// Errors produced while decoding a stored-entry key.
#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone)]
pub enum KeyError {
    /// The byte string is too short to contain a version suffix.
    #[error("key too short to contain a version suffix")]
    Truncated,
    /// The trailing kind tag byte is not a recognized [`EntryKind`].
    #[error("unrecognized kind tag {0}")]
    UnknownKind(u8),
    /// The intent strength tag byte is not a recognized [`IntentStrength`].
    #[error("unrecognized intent strength tag {0}")]
    UnknownStrength(u8),
    /// The document-key segment has no terminator.
    #[error("unterminated document-key segment")]
    UnterminatedDocKey,
    /// The document-key segment contains a `0x00` byte not followed by a
    /// valid escape or terminator byte.
    #[error("invalid escape sequence in document-key segment")]
    InvalidEscape,
    /// The sub-path segment's byte length does not decode to a whole number
    /// of 4-byte column ids.
    #[error("sub-path segment length {0} is not a multiple of 4")]
    MisalignedSubPath(usize),
}

/// Whether a stored entry is a committed/provisional regular write or a
/// transactional intent, and at what strength (§3 "Stored entry").
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EntryKind {
    /// A committed or provisional regular write.
    Regular,
    /// Ancestor-path placeholder (`Weak`) or payload-bearing (`Strong`).
    Intent(IntentStrength),
}

/// Whether an intent is a payload-bearing write or an ancestor-path
/// placeholder marking that some descendant path has a pending write.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum IntentStrength {
    /// Placeholder only; carries no payload of its own.
    Weak,
    /// Carries the payload the owning transaction would write if committed.
    Strong,
}

/// An ordered sequence of path components within a document. Empty denotes
/// the document itself (used by document-level tombstones); row-oriented
/// tables use single-component paths `[column_id]`.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct SubPath(Vec<ColumnId>);

impl SubPath {
    /// The empty path, denoting the document itself.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// A single-component path naming one row-table column.
    pub fn column(id: ColumnId) -> Self {
        Self(vec![id])
    }

    /// True for the empty (document-level) path.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// The column id for a single-component (row-table) path, if any.
    pub fn as_column(&self) -> Option<ColumnId> {
        match self.0.as_slice() {
            [id] => Some(*id),
            _ => None,
        }
    }

    /// The path's components, outermost first.
    pub fn components(&self) -> &[ColumnId] {
        &self.0
    }

    /// A leading component-count byte makes the empty path sort strictly
    /// before every non-empty one: without it, an empty path's encoding is
    /// zero bytes, so the very next byte compared would be the version
    /// suffix rather than a path component, and for small column ids (whose
    /// leading byte is `0x00`) that next byte can sort *before* a realistic
    /// inverted-timestamp's leading byte — breaking the walker's assumption
    /// that root-path entries are the leading entries of a document (§4.5
    /// step 1).
    fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.0.len() as u8);
        for id in &self.0 {
            out.extend(id.to_be_bytes());
        }
    }

    /// Decodes a sub-path from its encoded bytes, returning what follows.
    fn decode(bytes: &[u8]) -> Result<(Self, &[u8]), KeyError> {
        let (&count, rest) = bytes.split_first().ok_or(KeyError::Truncated)?;
        let len = count as usize * 4;
        if rest.len() < len {
            return Err(KeyError::MisalignedSubPath(rest.len()));
        }
        let (components, tail) = rest.split_at(len);
        let path = Self(components.chunks_exact(4).map(|c| u32::from_be_bytes(c.try_into().unwrap())).collect());
        Ok((path, tail))
    }
}

impl fmt::Display for SubPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.iter().map(|c| c.to_string()).collect::<Vec<_>>().join("."))
    }
}

/// A decoded stored-entry key (§3, §6).
#[derive(Debug)]
pub struct DecodedKey<'a> {
    /// Logical (unescaped) document-key bytes.
    pub doc_key: Cow<'a, [u8]>,
    /// The entry's sub-document path.
    pub sub_path: SubPath,
    /// Whether the entry is a regular write or a transactional intent.
    pub kind: EntryKind,
    /// The entry's commit/provisional-write version.
    pub version: Version,
}

/// Order-preserving codec for stored-entry keys (§6 "Key byte layout"). A
/// stateless namespace for the encode/decode associated functions below.
pub struct KeyCodec;

impl KeyCodec {
    /// Builds a regular-entry key.
    pub fn encode_regular(doc_key: &[u8], sub_path: &SubPath, version: Version) -> Vec<u8> {
        let mut out = Vec::with_capacity(doc_key.len() + 8 + sub_path.components().len() * 4 + VERSION_LEN + 1);
        encode_terminated(doc_key, &mut out);
        sub_path.encode(&mut out);
        version.timestamp.encode_inverted(&mut out);
        version.write_index.encode_inverted(&mut out);
        out.push(KIND_REGULAR);
        out
    }

    /// Builds an intent-entry key.
    pub fn encode_intent(
        doc_key: &[u8],
        sub_path: &SubPath,
        strength: IntentStrength,
        version: Version,
    ) -> Vec<u8> {
        let mut out = Vec::with_capacity(doc_key.len() + 8 + sub_path.components().len() * 4 + VERSION_LEN + 2);
        encode_terminated(doc_key, &mut out);
        sub_path.encode(&mut out);
        out.push(match strength {
            IntentStrength::Weak => STRENGTH_WEAK,
            IntentStrength::Strong => STRENGTH_STRONG,
        });
        version.timestamp.encode_inverted(&mut out);
        version.write_index.encode_inverted(&mut out);
        out.push(KIND_INTENT);
        out
    }

    /// Decodes a stored-entry key into its logical pieces.
    pub fn decode(bytes: &[u8]) -> Result<DecodedKey<'_>, KeyError> {
        let (&kind_tag, rest) = bytes.split_last().ok_or(KeyError::Truncated)?;
        if rest.len() < VERSION_LEN {
            return Err(KeyError::Truncated);
        }
        let (before_version, version_region) = rest.split_at(rest.len() - VERSION_LEN);
        let (timestamp, after_ts) =
            Timestamp::decode_inverted(version_region).ok_or(KeyError::Truncated)?;
        let (write_index, _) = WriteIndex::decode_inverted(after_ts).ok_or(KeyError::Truncated)?;
        let version = Version::new(timestamp, write_index);

        let (kind, before_path) = match kind_tag {
            KIND_REGULAR => (EntryKind::Regular, before_version),
            KIND_INTENT => {
                let (&strength_tag, rest) =
                    before_version.split_last().ok_or(KeyError::Truncated)?;
                let strength = match strength_tag {
                    STRENGTH_WEAK => IntentStrength::Weak,
                    STRENGTH_STRONG => IntentStrength::Strong,
                    other => return Err(KeyError::UnknownStrength(other)),
                };
                (EntryKind::Intent(strength), rest)
            }
            other => return Err(KeyError::UnknownKind(other)),
        };

        let (doc_key, _, sub_path_bytes) = decode_terminated(before_path)?;
        let (sub_path, _) = SubPath::decode(sub_path_bytes)?;

        Ok(DecodedKey { doc_key, sub_path, kind, version })
    }

    /// The byte prefix shared by every entry of the document that `bytes`
    /// belongs to (§4.1). A plain byte comparison against this prefix tells
    /// the walker whether a subsequent store key is still inside the same
    /// document.
    pub fn doc_key_bytes(bytes: &[u8]) -> Result<&[u8], KeyError> {
        let span = terminated_span(bytes)?;
        Ok(&bytes[..span])
    }

    /// The byte prefix shared by every version of one `(doc_key, sub_path)`
    /// (§4.1), used to seek past a fully-shadowed cell in O(log n).
    pub fn path_prefix(bytes: &[u8]) -> Result<&[u8], KeyError> {
        let doc_span = terminated_span(bytes)?;
        let decoded = Self::decode(bytes)?;
        let path_len = 1 /* component count */ + decoded.sub_path.components().len() * 4;
        Ok(&bytes[..doc_span + path_len])
    }

    /// The smallest key byte string guaranteed to sort strictly after every
    /// key sharing `prefix`, or `None` if `prefix` is all `0xff` (no finite
    /// successor exists, meaning the caller should scan to the end of the
    /// store instead of seeking).
    pub fn upper_bound(prefix: &[u8]) -> Option<Vec<u8>> {
        let mut bound = prefix.to_vec();
        while let Some(&last) = bound.last() {
            if last == 0xff {
                bound.pop();
            } else {
                *bound.last_mut().unwrap() += 1;
                return Some(bound);
            }
        }
        None
    }
}

/// Appends `bytes` using the same escape-and-terminate scheme as the keycode
/// serializer's byte-string encoding (0x00 escaped as 0x00 0xff, terminated
/// by 0x00 0x00), so that the document-key segment of a stored key can be
/// located without knowing its internal structure.
fn encode_terminated(bytes: &[u8], out: &mut Vec<u8>) {
    for &byte in bytes {
        if byte == 0x00 {
            out.push(0x00);
            out.push(0xff);
        } else {
            out.push(byte);
        }
    }
    out.push(0x00);
    out.push(0x00);
}

/// Returns the length, in `bytes`, of the raw (escaped, terminator-included)
/// leading byte-string segment.
fn terminated_span(bytes: &[u8]) -> Result<usize, KeyError> {
    let mut iter = bytes.iter().enumerate();
    loop {
        match iter.next() {
            Some((_, 0x00)) => match iter.next() {
                Some((i, 0x00)) => return Ok(i + 1),
                Some((_, 0xff)) => {}
                _ => return Err(KeyError::InvalidEscape),
            },
            Some(_) => {}
            None => return Err(KeyError::UnterminatedDocKey),
        }
    }
}

/// Decodes the leading escaped byte-string segment, returning the logical
/// bytes (borrowed unless an escape was present), its raw span length, and
/// whatever follows it.
fn decode_terminated(bytes: &[u8]) -> Result<(Cow<'_, [u8]>, usize, &[u8]), KeyError> {
    let span = terminated_span(bytes)?;
    let raw = &bytes[..span - 2]; // exclude the 0x00 0x00 terminator
    let logical: Cow<'_, [u8]> = if raw.contains(&0x00) {
        let mut decoded = Vec::with_capacity(raw.len());
        let mut i = 0;
        while i < raw.len() {
            if raw[i] == 0x00 {
                decoded.push(0x00);
                i += 2; // skip the 0xff escape byte
            } else {
                decoded.push(raw[i]);
                i += 1;
            }
        }
        Cow::Owned(decoded)
    } else {
        Cow::Borrowed(raw)
    };
    Ok((logical, span, &bytes[span..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(physical: u64, logical: u32, write_index: u32) -> Version {
        Version::new(Timestamp::new(physical, logical), WriteIndex::new(write_index))
    }

    #[test]
    fn regular_roundtrip() {
        let key = KeyCodec::encode_regular(b"row1", &SubPath::column(30), version(1000, 0, 0));
        let decoded = KeyCodec::decode(&key).unwrap();
        assert_eq!(decoded.doc_key.as_ref(), b"row1");
        assert_eq!(decoded.sub_path, SubPath::column(30));
        assert_eq!(decoded.kind, EntryKind::Regular);
        assert_eq!(decoded.version, version(1000, 0, 0));
    }

    #[test]
    fn intent_roundtrip() {
        let key = KeyCodec::encode_intent(
            b"row1",
            &SubPath::root(),
            IntentStrength::Weak,
            version(500, 0, 0),
        );
        let decoded = KeyCodec::decode(&key).unwrap();
        assert_eq!(decoded.kind, EntryKind::Intent(IntentStrength::Weak));
        assert!(decoded.sub_path.is_root());
    }

    #[test]
    fn doc_key_with_embedded_zero_byte_roundtrips() {
        let raw = b"ro\x00w1";
        let key = KeyCodec::encode_regular(raw, &SubPath::column(1), version(1, 0, 0));
        let decoded = KeyCodec::decode(&key).unwrap();
        assert_eq!(decoded.doc_key.as_ref(), raw);
    }

    #[test]
    fn newer_versions_sort_before_older_ones() {
        let older = KeyCodec::encode_regular(b"row1", &SubPath::column(1), version(100, 0, 0));
        let newer = KeyCodec::encode_regular(b"row1", &SubPath::column(1), version(200, 0, 0));
        assert!(newer < older);
    }

    #[test]
    fn doc_key_bytes_is_a_true_prefix_shared_across_sub_paths() {
        let a = KeyCodec::encode_regular(b"row1", &SubPath::column(1), version(100, 0, 0));
        let b = KeyCodec::encode_regular(b"row1", &SubPath::column(2), version(50, 0, 0));
        assert_eq!(KeyCodec::doc_key_bytes(&a).unwrap(), KeyCodec::doc_key_bytes(&b).unwrap());
    }

    #[test]
    fn different_documents_have_different_doc_key_bytes() {
        let a = KeyCodec::encode_regular(b"row1", &SubPath::column(1), version(100, 0, 0));
        let b = KeyCodec::encode_regular(b"row2", &SubPath::column(1), version(100, 0, 0));
        assert_ne!(KeyCodec::doc_key_bytes(&a).unwrap(), KeyCodec::doc_key_bytes(&b).unwrap());
    }

    #[test]
    fn path_prefix_excludes_version_suffix() {
        let a = KeyCodec::encode_regular(b"row1", &SubPath::column(1), version(100, 0, 0));
        let b = KeyCodec::encode_regular(b"row1", &SubPath::column(1), version(50, 0, 0));
        assert_eq!(KeyCodec::path_prefix(&a).unwrap(), KeyCodec::path_prefix(&b).unwrap());
    }

    #[test]
    fn upper_bound_sorts_after_every_key_with_the_prefix() {
        let a = KeyCodec::encode_regular(b"row1", &SubPath::column(1), version(100, 0, 0));
        let prefix = KeyCodec::path_prefix(&a).unwrap().to_vec();
        let bound = KeyCodec::upper_bound(&prefix).unwrap();
        assert!(bound > a);
        assert!(bound.as_slice() > prefix.as_slice());
    }

    #[test]
    fn malformed_key_is_rejected() {
        assert!(KeyCodec::decode(&[]).is_err());
        assert!(KeyCodec::decode(&[0u8; 5]).is_err());
    }
}
