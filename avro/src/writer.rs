//! Avro Object Container File writer (§4.2).
//!
//! ```text
//! header: "Obj\x01" | metadata map (avro.schema, avro.codec) | sync marker (16 bytes)
//! block:  zigzag(records) | zigzag(datasize) | payload | sync marker
//! ```
//!
//! One writer owns one table version's file. `open_or_create` supports
//! resuming an existing file, verifying its embedded schema matches the
//! one the table-map registry holds in memory (§3, `AvroTable` invariant).

use common::codec::zigzag_encode;
use common::err::{CResult, ReError};
use common::file_util::truncate_to;
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};

const MAGIC: &[u8; 4] = b"Obj\x01";
pub const SYNC_MARKER_LEN: usize = 16;

#[derive(Default)]
struct DataBlock {
    records: u64,
    buf: Vec<u8>,
}

pub struct AvroWriter {
    file: File,
    sync_marker: [u8; SYNC_MARKER_LEN],
    block: DataBlock,
}

impl AvroWriter {
    /// Creates `path` fresh (writing the header) if it does not exist, or
    /// opens it for append, verifying the embedded schema checksum matches
    /// `schema` byte-exact.
    pub fn open_or_create(path: &str, schema: &Value) -> CResult<AvroWriter> {
        if std::path::Path::new(path).exists() {
            Self::open_for_append(path, schema)
        } else {
            Self::create(path, schema)
        }
    }

    fn create(path: &str, schema: &Value) -> CResult<AvroWriter> {
        let mut file = File::create(path)?;
        let sync_marker = random_sync_marker();
        let header = encode_header(schema, &sync_marker);
        file.write_all(&header)?;
        file.flush()?;
        Ok(AvroWriter {
            file,
            sync_marker,
            block: DataBlock::default(),
        })
    }

    fn open_for_append(path: &str, schema: &Value) -> CResult<AvroWriter> {
        let mut file = OpenOptions::new().read(true).append(true).open(path)?;
        let mut existing = Vec::new();
        file.seek(SeekFrom::Start(0))?;
        file.read_to_end(&mut existing)?;
        let (existing_schema, sync_marker, _header_len) = decode_header(&existing)?;

        let want = crc32fast::hash(schema.to_string().as_bytes());
        let have = crc32fast::hash(existing_schema.to_string().as_bytes());
        if want != have {
            return Err(ReError::SchemaError {
                database: String::new(),
                table: path.to_string(),
                version: 0,
                reason: "on-disk Avro schema does not match the in-memory schema".to_string(),
            });
        }

        file.seek(SeekFrom::End(0))?;
        Ok(AvroWriter {
            file,
            sync_marker,
            block: DataBlock::default(),
        })
    }

    /// Appends one already-encoded Avro record to the current in-memory block.
    pub fn append_record(&mut self, record_bytes: &[u8]) {
        self.block.buf.extend_from_slice(record_bytes);
        self.block.records += 1;
    }

    pub fn pending_records(&self) -> u64 {
        self.block.records
    }

    /// Finalizes the current block to disk. On any I/O failure, truncates
    /// the file back to the position it held before this call and leaves
    /// the in-memory block untouched so the caller can retry (§4.2).
    pub fn finalize(&mut self) -> CResult<()> {
        if self.block.records == 0 {
            return Ok(());
        }
        let before = self.file.stream_position()?;
        match self.write_block() {
            Ok(()) => {
                self.block = DataBlock::default();
                Ok(())
            }
            Err(e) => {
                truncate_to(&mut self.file, before)?;
                Err(e)
            }
        }
    }

    fn write_block(&mut self) -> CResult<()> {
        let mut out = Vec::with_capacity(self.block.buf.len() + 32);
        out.extend(zigzag_encode(self.block.records as i64));
        out.extend(zigzag_encode(self.block.buf.len() as i64));
        out.extend_from_slice(&self.block.buf);
        out.extend_from_slice(&self.sync_marker);
        self.file.write_all(&out)?;
        self.file.flush()?;
        Ok(())
    }
}

fn random_sync_marker() -> [u8; SYNC_MARKER_LEN] {
    use rand::RngCore;
    let mut marker = [0u8; SYNC_MARKER_LEN];
    rand::thread_rng().fill_bytes(&mut marker);
    marker
}

fn encode_avro_map_entry(out: &mut Vec<u8>, key: &str, value: &[u8]) {
    out.extend(zigzag_encode(key.len() as i64));
    out.extend_from_slice(key.as_bytes());
    out.extend(zigzag_encode(value.len() as i64));
    out.extend_from_slice(value);
}

fn encode_header(schema: &Value, sync_marker: &[u8; SYNC_MARKER_LEN]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);

    let schema_text = schema.to_string();
    // One block of two metadata entries, then a zero-count terminator.
    out.extend(zigzag_encode(2));
    encode_avro_map_entry(&mut out, "avro.schema", schema_text.as_bytes());
    encode_avro_map_entry(&mut out, "avro.codec", b"null");
    out.extend(zigzag_encode(0));

    out.extend_from_slice(sync_marker);
    out
}

fn zigzag_decode_at(bytes: &[u8], pos: &mut usize) -> CResult<i64> {
    let (value, used) = common::codec::zigzag_decode(&bytes[*pos..])?;
    *pos += used;
    Ok(value)
}

/// Parses the Avro header from `bytes`, returning the schema, sync marker,
/// and the header's total byte length (where the first data block starts) —
/// used by the reader side to replay the header as a schema preamble (§4.9).
pub(crate) fn decode_header(bytes: &[u8]) -> CResult<(Value, [u8; SYNC_MARKER_LEN], usize)> {
    if bytes.len() < 4 || &bytes[0..4] != MAGIC {
        return Err(ReError::new("Avro magic marker bytes are not correct"));
    }
    let mut pos = 4;
    let mut schema_text = None;
    loop {
        let count = zigzag_decode_at(bytes, &mut pos)?;
        if count == 0 {
            break;
        }
        for _ in 0..count {
            let key_len = zigzag_decode_at(bytes, &mut pos)? as usize;
            let key = String::from_utf8_lossy(&bytes[pos..pos + key_len]).into_owned();
            pos += key_len;
            let val_len = zigzag_decode_at(bytes, &mut pos)? as usize;
            let value = bytes[pos..pos + val_len].to_vec();
            pos += val_len;
            if key == "avro.schema" {
                schema_text = Some(String::from_utf8_lossy(&value).into_owned());
            }
        }
    }
    let schema_text = schema_text.ok_or_else(|| ReError::new("Avro header missing avro.schema entry"))?;
    let schema: Value = serde_json::from_str(&schema_text).map_err(|e| ReError::new(e.to_string()))?;

    if bytes.len() < pos + SYNC_MARKER_LEN {
        return Err(ReError::new("Avro header truncated before sync marker"));
    }
    let mut sync_marker = [0u8; SYNC_MARKER_LEN];
    sync_marker.copy_from_slice(&bytes[pos..pos + SYNC_MARKER_LEN]);
    Ok((schema, sync_marker, pos + SYNC_MARKER_LEN))
}
