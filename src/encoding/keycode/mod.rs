// Copyright (c) 2025
// This file is licensed under the AGPL-3.0-or-later

// This file includes portions of code from https://github.com/erikgrinaker/toydb (Apache 2 License).
// Original Apache 2 License Copyright (c) erikgrinaker 2024.

//! Keycode is an order-preserving binary encoding for use in keys: the byte
//! ordering of an encoded value matches the logical ordering of the original
//! Rust value. It is not self-describing and only supports the small set of
//! types actually needed for key encoding (see `Serializer`/`Deserializer`).

pub use error::Error;
use serde::{Deserialize, Serialize};

mod deserialize;
pub(crate) mod error;
mod serialize;

/// The result type returned by [`serialize`]/[`deserialize`].
pub type Result<T> = std::result::Result<T, Error>;

/// Serializes a key to a binary byte vector using Keycode.
pub fn serialize<T: Serialize>(value: &T) -> Vec<u8> {
    let mut serializer = serialize::Serializer { output: Vec::new() };
    // The only `Serialize` implementations used for keys are the ones the
    // crate defines over fixed, total encodings — they cannot fail.
    value.serialize(&mut serializer).expect("key serialization is infallible");
    serializer.output
}

/// Deserializes a key from a byte slice using Keycode.
pub fn deserialize<'de, T: Deserialize<'de>>(bytes: &'de [u8]) -> Result<T> {
    let mut deserializer = deserialize::Deserializer::from_bytes(bytes);
    T::deserialize(&mut deserializer)
}
