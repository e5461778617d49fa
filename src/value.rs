// Copyright (c) 2025
// This file is licensed under the AGPL-3.0-or-later

//! Value Codec (C2): decodes a stored value byte-string into `{ payload,
//! ttl }`, and additionally extracts the owning transaction id for intent
//! values (§4.2).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies the wire shape of a primitive payload. Interpreting the raw
/// bytes beyond this tag is the schema's responsibility (§6 "Schema
/// contract"); the codec itself never branches on it.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum PayloadType {
    /// A single `0`/`1` byte.
    Bool,
    /// An 8-byte big-endian `i64`.
    Int,
    /// An 8-byte big-endian `f64`.
    Float,
    /// UTF-8 bytes.
    Text,
    /// Opaque bytes.
    Bytes,
}

/// A decoded value payload (§4.2): either a deletion marker or an opaque
/// primitive the schema can interpret.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub enum Payload {
    /// Marks the cell or document as deleted at this version.
    Tombstone,
    /// A live value, typed by `type_tag` and schema-interpretable from
    /// `bytes`.
    Primitive {
        /// The payload's wire type.
        type_tag: PayloadType,
        /// The encoded value bytes.
        bytes: Vec<u8>,
    },
}

impl Payload {
    /// True for [`Payload::Tombstone`].
    pub fn is_tombstone(&self) -> bool {
        matches!(self, Payload::Tombstone)
    }
}

/// The id of a transaction that authored an intent (§3 "Stored entry").
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct TransactionId(
    /// The underlying transaction identifier.
    pub Uuid,
);

/// A typed logical value, used both for assembled row cells and for the
/// tuple of primary-key columns packed into a document key (§6 "Schema
/// contract"). Kept deliberately small: it covers exactly the primitive
/// shapes [`PayloadType`] names.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub enum Value {
    /// A boolean.
    Bool(bool),
    /// A signed 64-bit integer.
    Int(i64),
    /// A 64-bit float.
    Float(f64),
    /// UTF-8 text.
    Text(String),
    /// Opaque bytes.
    Bytes(#[serde(with = "serde_bytes")] Vec<u8>),
}

impl Value {
    /// The [`PayloadType`] this value would encode as.
    pub fn payload_type(&self) -> PayloadType {
        match self {
            Value::Bool(_) => PayloadType::Bool,
            Value::Int(_) => PayloadType::Int,
            Value::Float(_) => PayloadType::Float,
            Value::Text(_) => PayloadType::Text,
            Value::Bytes(_) => PayloadType::Bytes,
        }
    }
}

/// A regular entry's decoded value.
#[derive(Clone, PartialEq, Debug)]
pub struct DecodedValue {
    /// The entry's payload.
    pub payload: Payload,
    /// Time-to-live from the entry's write time, if any.
    pub ttl: Option<Duration>,
}

/// A strong intent's decoded value, additionally naming its owning
/// transaction. Weak intents carry no payload of their own — they only mark
/// that some descendant path has a pending write — so [`ValueCodec::decode_intent`]
/// represents them as a bare transaction id with no [`DecodedIntentValue`].
#[derive(Clone, PartialEq, Debug)]
pub struct DecodedIntentValue {
    /// The transaction that authored this intent.
    pub transaction_id: TransactionId,
    /// The payload the transaction would write if committed.
    pub value: DecodedValue,
}

/// Errors produced while decoding a stored value.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValueError {
    /// The bytes could not be decoded as the expected wire shape.
    #[error("malformed value payload: {0}")]
    Malformed(String),
}

/// On-wire representation of a regular entry's value. `ttl_millis` is kept
/// as a plain integer rather than `std::time::Duration` since the latter has
/// no stable serde mapping; the public API converts at the boundary.
#[derive(Serialize, Deserialize)]
struct RegularWire {
    ttl_millis: Option<u64>,
    payload: Payload,
}

#[derive(Serialize, Deserialize)]
struct IntentWire {
    transaction_id: TransactionId,
    ttl_millis: Option<u64>,
    payload: Option<Payload>,
}

/// A stateless namespace for the value encode/decode associated functions
/// below (§4.2 "Value Codec").
pub struct ValueCodec;

impl ValueCodec {
    /// Encodes a typed value into the opaque `(type_tag, bytes)` shape a
    /// [`Payload::Primitive`] carries (§4.2).
    pub fn encode_primitive(value: &Value) -> (PayloadType, Vec<u8>) {
        let bytes = match value {
            Value::Bool(v) => vec![*v as u8],
            Value::Int(v) => v.to_be_bytes().to_vec(),
            Value::Float(v) => v.to_be_bytes().to_vec(),
            Value::Text(v) => v.as_bytes().to_vec(),
            Value::Bytes(v) => v.clone(),
        };
        (value.payload_type(), bytes)
    }

    /// Interprets an opaque `(type_tag, bytes)` pair as a typed value. This
    /// is the schema-side counterpart of [`Self::encode_primitive`]; the
    /// codec itself never calls it.
    pub fn decode_primitive(type_tag: PayloadType, bytes: &[u8]) -> Result<Value, ValueError> {
        match type_tag {
            PayloadType::Bool => match bytes {
                [0] => Ok(Value::Bool(false)),
                [1] => Ok(Value::Bool(true)),
                _ => Err(ValueError::Malformed(format!("invalid bool bytes {bytes:?}"))),
            },
            PayloadType::Int => {
                let array: [u8; 8] = bytes
                    .try_into()
                    .map_err(|_| ValueError::Malformed(format!("invalid int bytes {bytes:?}")))?;
                Ok(Value::Int(i64::from_be_bytes(array)))
            }
            PayloadType::Float => {
                let array: [u8; 8] = bytes
                    .try_into()
                    .map_err(|_| ValueError::Malformed(format!("invalid float bytes {bytes:?}")))?;
                Ok(Value::Float(f64::from_be_bytes(array)))
            }
            PayloadType::Text => String::from_utf8(bytes.to_vec())
                .map(Value::Text)
                .map_err(|e| ValueError::Malformed(e.to_string())),
            PayloadType::Bytes => Ok(Value::Bytes(bytes.to_vec())),
        }
    }

    /// Encodes a regular entry's value: a payload plus an optional TTL.
    pub fn encode_regular(payload: Payload, ttl: Option<Duration>) -> Vec<u8> {
        let wire = RegularWire { ttl_millis: ttl.map(|d| d.as_millis() as u64), payload };
        postcard::to_stdvec(&wire).expect("regular value encoding is infallible")
    }

    /// Decodes a regular entry's value.
    pub fn decode_regular(bytes: &[u8]) -> Result<DecodedValue, ValueError> {
        let wire: RegularWire =
            postcard::from_bytes(bytes).map_err(|e| ValueError::Malformed(e.to_string()))?;
        Ok(DecodedValue { payload: wire.payload, ttl: wire.ttl_millis.map(Duration::from_millis) })
    }

    /// Encodes a weak intent: a placeholder marking a pending descendant
    /// write, carrying no payload of its own.
    pub fn encode_weak_intent(transaction_id: TransactionId) -> Vec<u8> {
        let wire = IntentWire { transaction_id, ttl_millis: None, payload: None };
        postcard::to_stdvec(&wire).expect("intent encoding is infallible")
    }

    /// Encodes a strong intent: the payload the transaction would write if
    /// committed.
    pub fn encode_strong_intent(
        transaction_id: TransactionId,
        payload: Payload,
        ttl: Option<Duration>,
    ) -> Vec<u8> {
        let wire = IntentWire {
            transaction_id,
            ttl_millis: ttl.map(|d| d.as_millis() as u64),
            payload: Some(payload),
        };
        postcard::to_stdvec(&wire).expect("intent encoding is infallible")
    }

    /// Decodes an intent value. Returns `Ok(Some(_))` for a strong intent
    /// (payload present) and `Ok(None)` for a weak one.
    pub fn decode_intent(
        bytes: &[u8],
    ) -> Result<(TransactionId, Option<DecodedIntentValue>), ValueError> {
        let wire: IntentWire =
            postcard::from_bytes(bytes).map_err(|e| ValueError::Malformed(e.to_string()))?;
        let decoded = wire.payload.map(|payload| DecodedIntentValue {
            transaction_id: wire.transaction_id,
            value: DecodedValue { payload, ttl: wire.ttl_millis.map(Duration::from_millis) },
        });
        Ok((wire.transaction_id, decoded))
    }
}
