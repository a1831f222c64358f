//! Bridges a decoded binlog row (§4.6/§4.7) onto the Avro binary record
//! layout `avro::schema::build_table_schema` defines: `GTID`, `timestamp`,
//! `event_type`, then one nullable field per source column, in that order.

use avro::value::{encode_nullable, encode_value, AvroValue};
use binlog::column_type::ColumnValue;
use binlog::gtid::Gtid;
use binlog::row::{DecodedRow, RowRecordKind};

fn event_type_index(kind: RowRecordKind) -> i32 {
    match kind {
        RowRecordKind::Insert => 0,
        RowRecordKind::UpdateBefore => 1,
        RowRecordKind::UpdateAfter => 2,
        RowRecordKind::Delete => 3,
    }
}

fn to_avro_value(value: &ColumnValue) -> Option<AvroValue> {
    match value {
        ColumnValue::Null => None,
        ColumnValue::Int(n) => Some(AvroValue::Long(*n)),
        ColumnValue::Float(f) => Some(AvroValue::Float(*f)),
        ColumnValue::Double(d) => Some(AvroValue::Double(*d)),
        ColumnValue::String(s) => Some(AvroValue::String(s.clone())),
        ColumnValue::Bytes(b) => Some(AvroValue::Bytes(b.clone())),
        ColumnValue::Temporal(s) => Some(AvroValue::String(s.clone())),
    }
}

pub fn encode_row(gtid: &Gtid, timestamp: u32, row: &DecodedRow) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_value(&mut buf, &AvroValue::String(gtid.to_string()));
    encode_value(&mut buf, &AvroValue::Int(timestamp as i32));
    encode_value(&mut buf, &AvroValue::Enum(event_type_index(row.kind)));
    for value in &row.values {
        encode_nullable(&mut buf, &to_avro_value(value));
    }
    buf
}
