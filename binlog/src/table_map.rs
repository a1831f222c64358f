//! `TABLE_MAP_EVENT` parsing (§4.5): binds a binlog `table_id` to the
//! database/table name and per-column type/metadata that subsequent row
//! events are decoded against.

use crate::column_type::{ColumnDef, ColumnTypeCode};
use crate::header::RowEventFlag;
use common::codec::Cursor;
use common::err::{CResult, ReError};

/// Dummy table id signalling a release-all-maps sentinel (§4.6).
pub const DUMMY_TABLE_ID: u64 = 0x00ff_ffff;

#[derive(Debug, Clone)]
pub struct TableMapEvent {
    pub table_id: u64,
    pub flags: u16,
    pub database: String,
    pub table: String,
    pub columns: Vec<ColumnDef>,
    pub null_bitmap: Vec<u8>,
}

impl TableMapEvent {
    /// `table_id_len` is 4 or 6 bytes depending on what the format
    /// description's post-header length table records for this event type.
    pub fn parse(cursor: &mut Cursor, table_id_len: usize) -> CResult<TableMapEvent> {
        let id_bytes = cursor.read_bytes(table_id_len)?;
        let mut padded = [0u8; 8];
        padded[..table_id_len].copy_from_slice(id_bytes);
        let table_id = u64::from_le_bytes(padded);

        let flags = cursor.read_u16()?;

        let (db_len, db_bytes) = cursor.read_fixed_len_str()?;
        let database = String::from_utf8_lossy(db_bytes).into_owned();
        cursor.skip(1)?; // NUL terminator
        let _ = db_len;

        let (table_len, table_bytes) = cursor.read_fixed_len_str()?;
        let table = String::from_utf8_lossy(table_bytes).into_owned();
        cursor.skip(1)?;
        let _ = table_len;

        let column_count = cursor.read_lenenc_int()? as usize;
        let type_codes = cursor.read_bytes(column_count)?.to_vec();

        let metadata_len = cursor.read_lenenc_int()? as usize;
        let metadata_blob = cursor.read_bytes(metadata_len)?;
        let mut meta_cursor = Cursor::new(metadata_blob);

        let mut columns = Vec::with_capacity(column_count);
        for &code in &type_codes {
            let code = ColumnTypeCode::try_from(code)
                .map_err(|_| ReError::UnknownColumnType(code))?;
            let width = ColumnDef::metadata_len(code);
            let metadata = meta_cursor.read_bytes(width)?.to_vec();
            columns.push(ColumnDef { code, metadata });
        }

        let bitmap_len = (column_count + 7) / 8;
        let null_bitmap = cursor.read_bytes(bitmap_len)?.to_vec();

        Ok(TableMapEvent {
            table_id,
            flags,
            database,
            table,
            columns,
            null_bitmap,
        })
    }

    pub fn is_release_sentinel(&self) -> bool {
        self.table_id == DUMMY_TABLE_ID
            && RowEventFlag::from_bits_truncate(self.flags).contains(RowEventFlag::STMT_END)
    }
}
