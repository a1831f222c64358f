//! Client session engine (§4.9): per-client streaming state machine.
//!
//! ```text
//! Unregistered --REGISTER--> Registered --REQUEST-DATA--> RequestData
//! RequestData --(drain callback)--> RequestData
//! any --(protocol or I/O error)--> Errored
//! ```
//!
//! No actor framework or network listener is pulled in here (that's out of
//! scope per §1): `ClientSession<W>` is generic over any `Write`, so an
//! external listener drives it over a `TcpStream` or, in tests, a `Vec<u8>`.

use crate::protocol::{self, ClientRequest, Format};
use binlog::gtid::Gtid;
use common::err::{CResult, ReError};
use serde_json::Value;
use std::io::Write;
use std::path::Path;

/// Bytes' worth of blocks/records sent per drain invocation before
/// yielding back to the caller (§4.9). Not specified numerically by the
/// external interface; chosen to keep one drain call bounded without
/// fragmenting a typical Avro data block.
pub const AVRO_DATA_BURST_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unregistered,
    Registered,
    RequestData,
    Errored,
}

pub struct ClientSession<W: Write> {
    state: SessionState,
    format: Format,
    uuid: Option<String>,
    avro_dir: String,

    filestem: Option<String>,
    version: u32,
    current_path: Option<String>,
    current_schema: Option<Value>,
    read_offset: u64,

    requested_gtid: Option<Gtid>,
    seek_satisfied: bool,
    busy: bool,

    writer: W,
}

impl<W: Write> ClientSession<W> {
    pub fn new(avro_dir: impl Into<String>, writer: W) -> Self {
        ClientSession {
            state: SessionState::Unregistered,
            format: Format::Avro,
            uuid: None,
            avro_dir: avro_dir.into(),
            filestem: None,
            version: 1,
            current_path: None,
            current_schema: None,
            read_offset: 0,
            requested_gtid: None,
            seek_satisfied: true,
            busy: false,
            writer,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn writeln(&mut self, line: &str) -> CResult<()> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn fail(&mut self, reason: impl Into<String>) -> CResult<()> {
        self.state = SessionState::Errored;
        Err(ReError::Protocol(reason.into()))
    }

    /// Feeds one line from the client into the state machine.
    pub fn handle_line(&mut self, line: &str) -> CResult<()> {
        match protocol::parse_line(line) {
            ClientRequest::Register { uuid, format } => self.handle_register(uuid, format),
            ClientRequest::RequestData { filestem, gtid } => self.handle_request_data(filestem, gtid),
            ClientRequest::Unknown(text) => {
                let echo = format!("ECHO:{text}");
                self.writeln(&echo)
            }
        }
    }

    fn handle_register(&mut self, uuid: String, format: Format) -> CResult<()> {
        if self.state != SessionState::Unregistered {
            self.writeln(protocol::ERR_REGISTRATION_FAILED)?;
            return self.fail("REGISTER received outside the Unregistered state");
        }
        self.uuid = Some(uuid);
        self.format = format;
        self.state = SessionState::Registered;
        self.writeln("OK")
    }

    fn handle_request_data(&mut self, filestem: String, gtid: Option<Gtid>) -> CResult<()> {
        if self.state != SessionState::Registered && self.state != SessionState::RequestData {
            return self.fail("REQUEST-DATA received before REGISTER");
        }
        if self.avro_dir.is_empty() {
            self.writeln(protocol::ERR_AVRO_FILE_NOT_SPECIFIED)?;
            return Ok(());
        }
        if filestem.is_empty() {
            self.writeln(protocol::ERR_REQUEST_DATA_NO_DATA)?;
            return Ok(());
        }

        let (stem, version) = resolve_stem_and_version(&filestem);
        let path = self.file_path(&stem, version);
        if !Path::new(&path).exists() {
            self.writeln(&protocol::err_no_file(&path))?;
            return Ok(());
        }

        self.filestem = Some(stem);
        self.version = version;
        self.requested_gtid = gtid;
        self.seek_satisfied = gtid.is_none();
        self.open_file_and_send_preamble(path)?;

        self.state = SessionState::RequestData;
        self.drain()?;
        Ok(())
    }

    fn file_path(&self, stem: &str, version: u32) -> String {
        format!("{}/{}.{:06}.avro", self.avro_dir, stem, version)
    }

    fn open_file_and_send_preamble(&mut self, path: String) -> CResult<()> {
        let header = avro::reader::read_header(&path)?;
        match self.format {
            Format::Avro => {
                self.writer.write_all(&header.header_bytes)?;
            }
            Format::Json => {
                self.writeln(&avro::schema::schema_to_string(&header.schema))?;
            }
        }
        self.read_offset = header.data_start;
        self.current_schema = Some(header.schema);
        self.current_path = Some(path);
        self.writer.flush()?;
        Ok(())
    }

    /// Streaming callback (§4.9): drains up to `AVRO_DATA_BURST_SIZE`
    /// bytes' worth of data, honoring the busy flag. Returns whether more
    /// data remains (or a rotation happened), in which case the caller
    /// should re-post a write-ready event.
    pub fn drain(&mut self) -> CResult<bool> {
        if self.busy || self.state != SessionState::RequestData {
            return Ok(false);
        }
        self.busy = true;
        let result = self.drain_inner();
        self.busy = false;
        if result.is_err() {
            self.state = SessionState::Errored;
        }
        result
    }

    fn drain_inner(&mut self) -> CResult<bool> {
        let mut sent = 0usize;
        let mut more = false;

        loop {
            let Some(path) = self.current_path.clone() else {
                break;
            };
            let block = avro::reader::read_block_at(&path, self.read_offset)?;
            let Some(block) = block else {
                if self.rotate_to_next_version()? {
                    more = true;
                    continue;
                }
                break;
            };

            match self.format {
                Format::Avro => {
                    self.writer.write_all(&block.raw)?;
                    sent += block.raw.len();
                }
                Format::Json => {
                    let schema = self
                        .current_schema
                        .clone()
                        .ok_or_else(|| ReError::new("no schema loaded for an open JSON session"))?;
                    let records = avro::reader::decode_records(&block.payload, &schema)?;
                    for record in records {
                        if !self.seek_satisfied {
                            if self.row_satisfies_seek(&record) {
                                self.seek_satisfied = true;
                            } else {
                                continue;
                            }
                        }
                        let line = serde_json::to_string(&record).map_err(|e| ReError::new(e.to_string()))?;
                        sent += line.len();
                        self.writeln(&line)?;
                    }
                }
            }
            self.read_offset = block.next_offset;

            if sent >= AVRO_DATA_BURST_SIZE {
                more = true;
                break;
            }
        }

        self.writer.flush()?;
        Ok(more)
    }

    fn rotate_to_next_version(&mut self) -> CResult<bool> {
        let Some(stem) = self.filestem.clone() else {
            return Ok(false);
        };
        let next_version = self.version + 1;
        let next_path = self.file_path(&stem, next_version);
        if !Path::new(&next_path).exists() {
            return Ok(false);
        }
        self.version = next_version;
        self.open_file_and_send_preamble(next_path)?;
        Ok(true)
    }

    fn row_satisfies_seek(&self, record: &Value) -> bool {
        let Some(req) = &self.requested_gtid else {
            return true;
        };
        let Some(row_gtid) = record["GTID"].as_str().and_then(Gtid::parse) else {
            return false;
        };
        row_gtid.domain == req.domain && row_gtid.server_id == req.server_id && row_gtid.sequence >= req.sequence
    }
}

fn resolve_stem_and_version(filestem: &str) -> (String, u32) {
    if let Some((stem, suffix)) = filestem.rsplit_once('.') {
        if suffix.len() == 6 && !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(version) = suffix.parse() {
                return (stem.to_string(), version);
            }
        }
    }
    (filestem.to_string(), 1)
}

#[cfg(test)]
mod test {
    use super::*;
    use avro::schema::{build_table_schema, AvroFieldType, ColumnSchema};
    use avro::value::{encode_nullable, encode_value, AvroValue};
    use avro::writer::AvroWriter;

    fn write_sample_file(dir: &Path, name: &str, rows: &[(&str, i32, i64)]) {
        let path = dir.join(name);
        let columns = vec![ColumnSchema {
            name: "a".to_string(),
            avro_type: AvroFieldType::Long,
        }];
        let schema = build_table_schema("d", "t", 1, &columns);
        let mut writer = AvroWriter::open_or_create(path.to_str().unwrap(), &schema).unwrap();
        for (gtid, ts, value) in rows {
            let mut record = Vec::new();
            encode_value(&mut record, &AvroValue::String(gtid.to_string()));
            encode_value(&mut record, &AvroValue::Int(*ts));
            encode_value(&mut record, &AvroValue::Enum(0));
            encode_nullable(&mut record, &Some(AvroValue::Long(*value)));
            writer.append_record(&record);
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn register_then_request_data_streams_avro_blocks() {
        let dir = tempfile::tempdir().unwrap();
        write_sample_file(dir.path(), "d.t.000001.avro", &[("0-1-1", 1, 10)]);

        let mut session = ClientSession::new(dir.path().to_str().unwrap(), Vec::new());
        session
            .handle_line("REGISTER UUID=123e4567-e89b-12d3-a456-426614174000")
            .unwrap();
        assert_eq!(session.state(), SessionState::Registered);

        session.handle_line("REQUEST-DATA d.t").unwrap();
        assert_eq!(session.state(), SessionState::RequestData);
    }

    #[test]
    fn missing_file_reports_no_file_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = ClientSession::new(dir.path().to_str().unwrap(), Vec::new());
        session
            .handle_line("REGISTER UUID=123e4567-e89b-12d3-a456-426614174000")
            .unwrap();
        session.handle_line("REQUEST-DATA ghost").unwrap();
        assert_eq!(session.state(), SessionState::Registered);
    }

    #[test]
    fn json_client_seeks_to_requested_gtid() {
        let dir = tempfile::tempdir().unwrap();
        write_sample_file(
            dir.path(),
            "d.t.000001.avro",
            &[("0-1-1", 1, 1), ("0-1-5", 2, 5), ("0-1-9", 3, 9)],
        );

        let mut session = ClientSession::new(dir.path().to_str().unwrap(), Vec::new());
        session
            .handle_line("REGISTER UUID=123e4567-e89b-12d3-a456-426614174000, TYPE=JSON")
            .unwrap();
        session.handle_line("REQUEST-DATA d.t 0-1-5").unwrap();

        let out = String::from_utf8(session.writer.clone()).unwrap();
        assert!(out.contains("0-1-5"));
        assert!(!out.contains("0-1-1\""));
    }

    #[test]
    fn request_data_with_no_avro_dir_configured_errors() {
        let mut session = ClientSession::new("", Vec::new());
        session
            .handle_line("REGISTER UUID=123e4567-e89b-12d3-a456-426614174000")
            .unwrap();
        session.handle_line("REQUEST-DATA d.t").unwrap();
        let out = String::from_utf8(session.writer.clone()).unwrap();
        assert!(out.contains(protocol::ERR_AVRO_FILE_NOT_SPECIFIED));
        assert_eq!(session.state(), SessionState::Registered);
    }

    #[test]
    fn unknown_command_is_echoed_back() {
        let mut session = ClientSession::new("/tmp", Vec::new());
        session.handle_line("PING").unwrap();
        let out = String::from_utf8(session.writer.clone()).unwrap();
        assert_eq!(out.trim_end(), "ECHO:PING");
    }
}
