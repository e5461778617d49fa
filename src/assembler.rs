// Copyright (c) 2025
// This file is licensed under the AGPL-3.0-or-later

//! Row Assembler (C6): turns a walked document's cell map into the caller's
//! requested projection, decoding each column against the schema's declared
//! type (§4.6).

use crate::error::Error;
use crate::schema::Schema;
use crate::value::{Value, ValueCodec};
use crate::visibility::VisibleCell;
use crate::Result;
use std::collections::HashMap;

use crate::key::ColumnId;

/// An assembled row, one value per projected column, in projection order.
/// `None` marks a column with no visible write (NULL).
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Row(
    /// One value per projected column, in projection order.
    pub Vec<Option<Value>>,
);

/// Assembles one row from a walked document's key values and cell map
/// (§4.5 step 4, §4.6).
///
/// `key_values` are the document's decoded primary-key columns, in schema
/// key-column order; `cells` holds the visible non-key cells the walker
/// found, keyed by column id.
pub fn assemble_row<S: Schema>(
    schema: &S,
    projection_column_ids: &[ColumnId],
    key_values: &[Value],
    cells: &HashMap<ColumnId, VisibleCell>,
) -> Result<Row> {
    let mut out = Vec::with_capacity(projection_column_ids.len());
    for &column_id in projection_column_ids {
        let index = schema_column_index(schema, column_id)?;
        let value = if index < key_values.len() {
            Some(key_values[index].clone())
        } else if let Some(cell) = cells.get(&column_id) {
            let column_type = schema
                .column_type(column_id)
                .ok_or(Error::Corruption(format!("unknown column id {column_id}")))?;
            if cell.type_tag != column_type {
                return Err(Error::Corruption(format!(
                    "column {column_id} has stored type {:?} but schema declares {:?}",
                    cell.type_tag, column_type
                )));
            }
            Some(ValueCodec::decode_primitive(cell.type_tag, &cell.bytes)?)
        } else {
            None
        };
        out.push(value);
    }
    Ok(Row(out))
}

/// The column's position among the schema's declared columns, used to tell
/// a key column (materialized from `key_values`) apart from a regular one
/// (looked up in the cell map).
fn schema_column_index<S: Schema>(schema: &S, column_id: ColumnId) -> Result<usize> {
    (0..schema.column_count())
        .find(|&i| schema.column_id(i) == Some(column_id))
        .ok_or_else(|| Error::Corruption(format!("unknown column id {column_id}")))
}

/// Whether every column in `column_ids` is a primary-key column (§4.5 step 5
/// "the projection includes only key columns" exception).
pub fn is_key_only_projection<S: Schema>(schema: &S, column_ids: &[ColumnId]) -> Result<bool> {
    for &column_id in column_ids {
        if schema_column_index(schema, column_id)? >= schema.key_column_count() {
            return Ok(false);
        }
    }
    Ok(true)
}
