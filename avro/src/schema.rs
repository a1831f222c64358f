//! Avro schema materialization for one table version (§4.5).
//!
//! Every generated record schema opens with `GTID`, `timestamp`, and
//! `event_type` before the source table's own columns, and every column
//! field is nullable: any cell can carry SQL `NULL` independent of its
//! declared MySQL type.

use serde_json::{json, Value};

/// The Avro primitive a decoded MySQL column value maps onto. The binlog
/// crate's `ColumnValue` variants are mapped to these by the caller
/// (`cdc::registry`), keeping this crate free of any MySQL-specific type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvroFieldType {
    Long,
    Float,
    Double,
    String,
    Bytes,
}

impl AvroFieldType {
    fn avro_name(self) -> &'static str {
        match self {
            AvroFieldType::Long => "long",
            AvroFieldType::Float => "float",
            AvroFieldType::Double => "double",
            AvroFieldType::String => "string",
            AvroFieldType::Bytes => "bytes",
        }
    }
}

pub struct ColumnSchema {
    pub name: String,
    pub avro_type: AvroFieldType,
}

/// Builds the full Avro record schema for `{database}.{table}` at `version`.
pub fn build_table_schema(
    database: &str,
    table: &str,
    version: u32,
    columns: &[ColumnSchema],
) -> Value {
    let mut fields = vec![
        json!({"name": "GTID", "type": "string"}),
        json!({"name": "timestamp", "type": "int"}),
        json!({
            "name": "event_type",
            "type": {
                "type": "enum",
                "name": "EventType",
                "symbols": ["insert", "update_before", "update_after", "delete"],
            },
        }),
    ];
    for column in columns {
        fields.push(json!({
            "name": column.name,
            "type": ["null", column.avro_type.avro_name()],
            "default": null,
        }));
    }

    json!({
        "type": "record",
        "name": format!("{table}_v{version}"),
        "namespace": database,
        "fields": fields,
    })
}

/// Renders a schema to the compact JSON text stored in the Avro container
/// header and returned for `.avsc` schema-preamble requests (§4.9).
pub fn schema_to_string(schema: &Value) -> String {
    schema.to_string()
}
