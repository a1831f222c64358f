//! Read-side helpers for the Avro Object Container File format.
//!
//! The writer only ever appends; these helpers exist for the client
//! session engine (§4.9), which needs to replay a finalized file's header
//! as a schema preamble and then walk its data blocks one at a time,
//! either passing them through whole (Avro clients) or decoding their
//! records (JSON clients).

use crate::writer::{decode_header, SYNC_MARKER_LEN};
use common::codec::zigzag_decode;
use common::err::{CResult, ReError};
use serde_json::Value;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

pub struct AvroHeader {
    pub schema: Value,
    /// The exact header bytes (magic, schema metadata, sync marker) sent
    /// verbatim as the Avro-format schema preamble.
    pub header_bytes: Vec<u8>,
    /// Byte offset of the first data block, i.e. `header_bytes.len()`.
    pub data_start: u64,
}

pub fn read_header(path: &str) -> CResult<AvroHeader> {
    let mut file = File::open(path)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    let (schema, _sync_marker, header_len) = decode_header(&bytes)?;
    Ok(AvroHeader {
        schema,
        header_bytes: bytes[..header_len].to_vec(),
        data_start: header_len as u64,
    })
}

pub struct Block {
    pub records: u64,
    /// The decoded record payload bytes (records back-to-back, no framing).
    pub payload: Vec<u8>,
    /// The whole wire block (`zigzag(records) | zigzag(datasize) | payload
    /// | sync_marker`) — what an Avro-format client receives unchanged.
    pub raw: Vec<u8>,
    pub next_offset: u64,
}

/// Reads one block starting at `offset`, or `Ok(None)` if `offset` is at
/// end-of-file (no more blocks yet).
pub fn read_block_at(path: &str, offset: u64) -> CResult<Option<Block>> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    if bytes.is_empty() {
        return Ok(None);
    }

    let mut pos = 0usize;
    let (records, used) = zigzag_decode(&bytes)?;
    pos += used;
    let (datasize, used) = zigzag_decode(&bytes[pos..])?;
    pos += used;
    let datasize = datasize as usize;

    if bytes.len() < pos + datasize + SYNC_MARKER_LEN {
        return Err(ReError::Truncated {
            offset,
            reason: "avro data block truncated before sync marker".to_string(),
        });
    }

    let payload = bytes[pos..pos + datasize].to_vec();
    pos += datasize + SYNC_MARKER_LEN;

    Ok(Some(Block {
        records: records as u64,
        payload,
        raw: bytes[..pos].to_vec(),
        next_offset: offset + pos as u64,
    }))
}

/// Decodes every record in `payload` into a JSON object keyed by field
/// name, following the fixed `GTID, timestamp, event_type, <columns...>`
/// layout `build_table_schema` produces (§4.5, §4.9 JSON streaming path).
pub fn decode_records(payload: &[u8], schema: &Value) -> CResult<Vec<Value>> {
    let fields = schema["fields"]
        .as_array()
        .ok_or_else(|| ReError::new("avro schema missing `fields` array"))?;
    let symbols: Vec<String> = fields
        .get(2)
        .and_then(|f| f["type"]["symbols"].as_array())
        .ok_or_else(|| ReError::new("avro schema missing `event_type` symbols"))?
        .iter()
        .map(|s| s.as_str().unwrap_or_default().to_string())
        .collect();
    let column_fields = &fields[3.min(fields.len())..];

    let mut records = Vec::new();
    let mut pos = 0usize;
    while pos < payload.len() {
        let mut obj = serde_json::Map::new();

        let (gtid_len, used) = zigzag_decode(&payload[pos..])?;
        pos += used;
        let gtid_len = gtid_len as usize;
        obj.insert(
            "GTID".to_string(),
            Value::String(String::from_utf8_lossy(&payload[pos..pos + gtid_len]).into_owned()),
        );
        pos += gtid_len;

        let (timestamp, used) = zigzag_decode(&payload[pos..])?;
        pos += used;
        obj.insert("timestamp".to_string(), Value::from(timestamp));

        let (event_idx, used) = zigzag_decode(&payload[pos..])?;
        pos += used;
        let event_name = symbols.get(event_idx as usize).cloned().unwrap_or_default();
        obj.insert("event_type".to_string(), Value::String(event_name));

        for field in column_fields {
            let name = field["name"].as_str().unwrap_or_default().to_string();
            let avro_type = field["type"][1].as_str().unwrap_or("string");

            let (branch, used) = zigzag_decode(&payload[pos..])?;
            pos += used;
            if branch == 0 {
                obj.insert(name, Value::Null);
                continue;
            }

            let value = match avro_type {
                "long" => {
                    let (n, used) = zigzag_decode(&payload[pos..])?;
                    pos += used;
                    Value::from(n)
                }
                "float" => {
                    let v = f32::from_le_bytes(payload[pos..pos + 4].try_into().unwrap());
                    pos += 4;
                    Value::from(v)
                }
                "double" => {
                    let v = f64::from_le_bytes(payload[pos..pos + 8].try_into().unwrap());
                    pos += 8;
                    Value::from(v)
                }
                "bytes" => {
                    let (len, used) = zigzag_decode(&payload[pos..])?;
                    pos += used;
                    let len = len as usize;
                    let encoded = hex::encode(&payload[pos..pos + len]);
                    pos += len;
                    Value::String(encoded)
                }
                _ => {
                    let (len, used) = zigzag_decode(&payload[pos..])?;
                    pos += used;
                    let len = len as usize;
                    let s = String::from_utf8_lossy(&payload[pos..pos + len]).into_owned();
                    pos += len;
                    Value::String(s)
                }
            };
            obj.insert(name, value);
        }

        records.push(Value::Object(obj));
    }
    Ok(records)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::schema::{build_table_schema, ColumnSchema};
    use crate::value::{encode_nullable, encode_value, AvroValue};
    use crate::writer::AvroWriter;

    #[test]
    fn reads_header_and_single_block() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.000001.avro");
        let path = path.to_str().unwrap();

        let columns = vec![ColumnSchema {
            name: "a".to_string(),
            avro_type: crate::schema::AvroFieldType::Long,
        }];
        let schema = build_table_schema("d", "t", 1, &columns);

        let mut writer = AvroWriter::open_or_create(path, &schema).unwrap();
        let mut record = Vec::new();
        encode_value(&mut record, &AvroValue::String("0-1-1".to_string()));
        encode_value(&mut record, &AvroValue::Int(100));
        encode_value(&mut record, &AvroValue::Enum(0));
        encode_nullable(&mut record, &Some(AvroValue::Long(10)));
        writer.append_record(&record);
        writer.finalize().unwrap();
        drop(writer);

        let header = read_header(path).unwrap();
        assert_eq!(header.schema["name"], "t_v1");

        let block = read_block_at(path, header.data_start).unwrap().unwrap();
        assert_eq!(block.records, 1);

        let decoded = decode_records(&block.payload, &header.schema).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0]["GTID"], "0-1-1");
        assert_eq!(decoded[0]["a"], 10);
    }
}
