//! Row-event decoder (§4.6): turns `WRITE_ROWS`/`UPDATE_ROWS`/`DELETE_ROWS`
//! payloads into one or two records per row, against the column layout a
//! `TableMapEvent` already established.

use crate::column_type::{decode_cell, ColumnValue};
use crate::table_map::TableMapEvent;
use common::codec::Cursor;
use common::err::{CResult, ReError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowsEventKind {
    Write,
    Update,
    Delete,
}

/// The four record shapes an Avro schema's `event_type` field distinguishes (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowRecordKind {
    Insert,
    UpdateBefore,
    UpdateAfter,
    Delete,
}

#[derive(Debug, Clone)]
pub struct DecodedRow {
    pub kind: RowRecordKind,
    pub values: Vec<ColumnValue>,
}

fn bit_is_set(bitmap: &[u8], idx: usize) -> bool {
    bitmap
        .get(idx / 8)
        .map(|byte| byte & (1 << (idx % 8)) != 0)
        .unwrap_or(false)
}

fn decode_one_image(
    cursor: &mut Cursor,
    table_map: &TableMapEvent,
    present: &[u8],
) -> CResult<Vec<ColumnValue>> {
    let column_count = table_map.columns.len();
    let n_present = (0..column_count).filter(|&i| bit_is_set(present, i)).count();
    let null_bitmap_len = (n_present + 7) / 8;
    let null_bitmap = cursor.read_bytes(null_bitmap_len)?.to_vec();

    let mut values = vec![ColumnValue::Null; column_count];
    let mut j = 0usize;
    for (i, value_slot) in values.iter_mut().enumerate() {
        if !bit_is_set(present, i) {
            continue;
        }
        if bit_is_set(&null_bitmap, j) {
            *value_slot = ColumnValue::Null;
        } else {
            *value_slot = decode_cell(cursor, &table_map.columns[i])?;
        }
        j += 1;
    }
    Ok(values)
}

/// Decodes a whole rows-event body. `cursor` must already be positioned
/// past the `(table_id, flags, [v2 extra-data])` post-header prefix.
pub fn decode_rows_event(
    cursor: &mut Cursor,
    table_map: &TableMapEvent,
    kind: RowsEventKind,
) -> CResult<Vec<DecodedRow>> {
    let column_count = cursor.read_lenenc_int()? as usize;
    if column_count != table_map.columns.len() {
        return Err(ReError::ColumnCountMismatch {
            expected: table_map.columns.len(),
            actual: column_count,
        });
    }

    let bitmap_len = (column_count + 7) / 8;
    let columns_present = cursor.read_bytes(bitmap_len)?.to_vec();
    let columns_update = if kind == RowsEventKind::Update {
        Some(cursor.read_bytes(bitmap_len)?.to_vec())
    } else {
        None
    };

    let mut rows = Vec::new();
    while cursor.remaining() > 0 {
        let before = decode_one_image(cursor, table_map, &columns_present)?;
        let primary_kind = match kind {
            RowsEventKind::Write => RowRecordKind::Insert,
            RowsEventKind::Delete => RowRecordKind::Delete,
            RowsEventKind::Update => RowRecordKind::UpdateBefore,
        };
        rows.push(DecodedRow {
            kind: primary_kind,
            values: before,
        });

        if let Some(update_bitmap) = &columns_update {
            let after = decode_one_image(cursor, table_map, update_bitmap)?;
            rows.push(DecodedRow {
                kind: RowRecordKind::UpdateAfter,
                values: after,
            });
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::column_type::{ColumnDef, ColumnTypeCode};

    fn table_map(columns: Vec<ColumnDef>) -> TableMapEvent {
        TableMapEvent {
            table_id: 1,
            flags: 0,
            database: "test".to_string(),
            table: "t".to_string(),
            columns,
            null_bitmap: vec![],
        }
    }

    #[test]
    fn decodes_insert_row() {
        let tm = table_map(vec![ColumnDef {
            code: ColumnTypeCode::Long,
            metadata: vec![],
        }]);
        let mut bytes = vec![1u8]; // column count, lenenc 1-byte form
        bytes.push(0b0000_0001); // columns_present
        bytes.push(0b0000_0000); // null_bitmap: not null
        bytes.extend_from_slice(&42i32.to_le_bytes());

        let mut cursor = Cursor::new(&bytes);
        let rows = decode_rows_event(&mut cursor, &tm, RowsEventKind::Write).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].kind, RowRecordKind::Insert);
        assert_eq!(rows[0].values, vec![ColumnValue::Int(42)]);
    }

    #[test]
    fn decodes_update_emits_before_and_after() {
        let tm = table_map(vec![ColumnDef {
            code: ColumnTypeCode::Long,
            metadata: vec![],
        }]);
        let mut bytes = vec![1u8];
        bytes.push(0b0000_0001); // columns_present (before)
        bytes.push(0b0000_0001); // columns_update (after)
        bytes.push(0b0000_0000); // before null bitmap
        bytes.extend_from_slice(&1i32.to_le_bytes());
        bytes.push(0b0000_0000); // after null bitmap
        bytes.extend_from_slice(&2i32.to_le_bytes());

        let mut cursor = Cursor::new(&bytes);
        let rows = decode_rows_event(&mut cursor, &tm, RowsEventKind::Update).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].kind, RowRecordKind::UpdateBefore);
        assert_eq!(rows[1].kind, RowRecordKind::UpdateAfter);
    }

    #[test]
    fn column_count_mismatch_is_an_error() {
        let tm = table_map(vec![ColumnDef {
            code: ColumnTypeCode::Long,
            metadata: vec![],
        }]);
        let bytes = vec![2u8, 0, 0];
        let mut cursor = Cursor::new(&bytes);
        assert!(decode_rows_event(&mut cursor, &tm, RowsEventKind::Write).is_err());
    }
}
