// Copyright (c) 2025
// This file is licensed under the AGPL-3.0-or-later

//! A minimal in-crate schema and projection implementation (§6 "Schema
//! contract"). The iterator only consumes the [`Schema`] trait; this module
//! also provides one concrete implementation so the crate is independently
//! testable without a real catalog crate, the same way `base::schema`
//! provides concrete `Table`/`Column` types alongside the traits that
//! describe them.

use crate::encoding::keycode;
use crate::key::ColumnId;
use crate::value::{PayloadType, Value};

/// Errors produced while resolving or decoding against a [`Schema`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SchemaError {
    /// A projected column id has no matching schema column.
    #[error("unknown column id {0}")]
    UnknownColumn(ColumnId),
    /// A projected column name has no matching schema column.
    #[error("column name {0:?} not found in schema")]
    UnknownColumnName(String),
    /// A document key's primary-key tuple could not be decoded.
    #[error("failed to decode primary-key columns: {0}")]
    PrimaryKeyDecode(String),
}

/// The wire type of a column's values, matching [`PayloadType`] one-for-one.
pub type ColumnType = PayloadType;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Column {
    /// Stable column identifier, as stored in sub-path and cell-map keys.
    pub id: ColumnId,
    /// Human-readable column name, used to resolve [`Projection::from_names`].
    pub name: String,
    /// The column's declared wire type.
    pub column_type: ColumnType,
}

/// Describes a row-oriented table: an ordered list of columns, the leading
/// `key_column_count` of which form the document key's primary-key tuple
/// (§3 "Document key", §6 "Schema contract").
pub trait Schema {
    /// The number of declared columns.
    fn column_count(&self) -> usize;
    /// The column id at `index`, in declared order.
    fn column_id(&self, index: usize) -> Option<ColumnId>;
    /// The declared wire type for the column with the given id.
    fn column_type(&self, id: ColumnId) -> Option<ColumnType>;
    /// How many of the leading declared columns form the primary-key tuple.
    fn key_column_count(&self) -> usize;

    /// Decodes the primary-key column values out of a document key's
    /// logical bytes (the unescaped `doc_key` returned by
    /// [`crate::key::KeyCodec::decode`]), in key-column order.
    fn decode_primary_key(&self, doc_key: &[u8]) -> Result<Vec<Value>, SchemaError>;
}

/// A concrete, in-memory table schema.
#[derive(Clone, Debug)]
pub struct TableSchema {
    columns: Vec<Column>,
    key_column_count: usize,
}

impl TableSchema {
    /// `columns` must list key columns first, `key_column_count` of them.
    pub fn new(columns: Vec<Column>, key_column_count: usize) -> Self {
        assert!(key_column_count <= columns.len(), "key_column_count exceeds column count");
        Self { columns, key_column_count }
    }

    /// Looks up a column by its declared name.
    pub fn column_by_name(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// The schema's columns, in declared order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }
}

impl Schema for TableSchema {
    fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn column_id(&self, index: usize) -> Option<ColumnId> {
        self.columns.get(index).map(|c| c.id)
    }

    fn column_type(&self, id: ColumnId) -> Option<ColumnType> {
        self.columns.iter().find(|c| c.id == id).map(|c| c.column_type)
    }

    fn key_column_count(&self) -> usize {
        self.key_column_count
    }

    fn decode_primary_key(&self, doc_key: &[u8]) -> Result<Vec<Value>, SchemaError> {
        // The primary-key tuple was packed key-column-by-key-column using
        // the same order-preserving Keycode engine the stored-entry key
        // itself is built on, so decoding it back is a plain tuple decode.
        let values: Vec<Value> =
            keycode::deserialize(doc_key).map_err(|e| SchemaError::PrimaryKeyDecode(e.0))?;
        if values.len() != self.key_column_count {
            return Err(SchemaError::PrimaryKeyDecode(format!(
                "expected {} key columns, decoded {}",
                self.key_column_count,
                values.len()
            )));
        }
        Ok(values)
    }
}

/// Encodes a primary-key tuple into document-key bytes using the same
/// order-preserving Keycode engine, for test fixtures and callers that
/// produce document keys outside the write path this crate does not model.
pub fn encode_doc_key(key_values: &[Value]) -> Vec<u8> {
    keycode::serialize(&key_values.to_vec())
}

/// An ordered list of column ids to materialize (§3 "Projection"). Key
/// columns may or may not be included; non-included non-key columns are
/// never decoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Projection {
    column_ids: Vec<ColumnId>,
    /// How many of `column_ids`, from the front, are key columns — set when
    /// the projection was built from a schema's key-prefix count.
    key_prefix_count: usize,
}

impl Projection {
    /// Builds a projection from explicit column ids, with no key prefix.
    pub fn new(column_ids: Vec<ColumnId>) -> Self {
        Self { column_ids, key_prefix_count: 0 }
    }

    /// Builds a projection by column name, resolving a leading
    /// `key_prefix_count` of names against the schema's key columns.
    pub fn from_names(
        schema: &TableSchema,
        names: &[&str],
        key_prefix_count: usize,
    ) -> Result<Self, SchemaError> {
        let column_ids = names
            .iter()
            .map(|name| {
                schema
                    .column_by_name(name)
                    .map(|c| c.id)
                    .ok_or_else(|| SchemaError::UnknownColumnName(name.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { column_ids, key_prefix_count })
    }

    /// The projected column ids, in projection order.
    pub fn column_ids(&self) -> &[ColumnId] {
        &self.column_ids
    }

    /// How many of [`Self::column_ids`], from the front, are key columns.
    pub fn key_prefix_count(&self) -> usize {
        self.key_prefix_count
    }

    /// Whether the projection includes the given column id.
    pub fn contains(&self, id: ColumnId) -> bool {
        self.column_ids.contains(&id)
    }
}
