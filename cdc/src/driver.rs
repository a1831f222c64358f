//! Conversion driver (§4.8): the single blocking loop that frames events,
//! routes them to the DDL tracker, table-map registry, and row decoder,
//! flushes Avro writers on threshold, and persists a resumable checkpoint.
//!
//! Grounded on the teacher's `decoder/file_binlog_reader.rs` iteration
//! style, generalized into an explicit state machine around one
//! `BinlogFramer` at a time (no tokio: this loop is intentionally
//! synchronous and blocking per §5).

use crate::checkpoint::ConversionCheckpoint;
use crate::encode::encode_row;
use crate::registry::TableMapRegistry;
use binlog::b_type::EventType;
use binlog::ddl::DdlTracker;
use binlog::gtid::Gtid;
use binlog::gtid_event::GtidEventBody;
use binlog::query_event::QueryEvent;
use binlog::reader::{BinlogFramer, RawEvent};
use binlog::row::{decode_rows_event, RowsEventKind};
use binlog::table_map::TableMapEvent;
use common::codec::Cursor;
use common::config::AvroConverterConfig;
use common::err::{CResult, ReError};
use std::path::Path;
use tracing::warn;

/// What stopped the loop; neither variant is an error (§4.8 steps 6-7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverOutcome {
    /// No next sequentially numbered binlog file exists yet.
    LastFile,
    /// End-of-file was reached mid-transaction; retry from the checkpoint.
    OpenTransaction,
}

fn rows_event_kind(event_type: EventType) -> Option<RowsEventKind> {
    match event_type {
        EventType::WriteRowsEventV1 | EventType::WriteRowsEventV2 => Some(RowsEventKind::Write),
        EventType::UpdateRowsEventV1 | EventType::UpdateRowsEventV2 => Some(RowsEventKind::Update),
        EventType::DeleteRowsEventV1 | EventType::DeleteRowsEventV2 => Some(RowsEventKind::Delete),
        _ => None,
    }
}

pub struct ConversionDriver {
    binlog_dir: String,
    fileroot: String,
    row_target: u64,
    trx_target: u64,
    checkpoint_path: String,

    ddl: DdlTracker,
    registry: TableMapRegistry,

    framer: Option<BinlogFramer>,
    current_file: String,
    current_position: u64,
    row_count: u64,
    trx_count: u64,
    current_gtid: Gtid,
    open_transaction: bool,
}

impl ConversionDriver {
    pub fn new(
        config: &AvroConverterConfig,
        checkpoint_path: impl Into<String>,
        ddl_sidecar_path: impl Into<String>,
    ) -> CResult<Self> {
        let checkpoint_path = checkpoint_path.into();
        let (current_file, current_position, current_gtid) =
            match ConversionCheckpoint::load(&checkpoint_path)? {
                Some(cp) => (cp.file, cp.position, cp.gtid),
                None => (config.binlog.file.clone(), config.binlog.position, Gtid::new(0, 0, 0)),
            };

        Ok(ConversionDriver {
            binlog_dir: config.binlog.binlog_path.clone(),
            fileroot: config.binlog.fileroot.clone(),
            row_target: config.avro.row_target,
            trx_target: config.avro.trx_target,
            checkpoint_path,
            ddl: DdlTracker::new(ddl_sidecar_path),
            registry: TableMapRegistry::new(config.avro.avro_dir.clone()),
            framer: None,
            current_file,
            current_position,
            row_count: 0,
            trx_count: 0,
            current_gtid,
            open_transaction: false,
        })
    }

    /// Runs until the next binlog file doesn't exist yet (§4.8 step 6) or
    /// an incomplete transaction is left at end-of-file (step 7). A decode
    /// or I/O error on the binlog stream itself propagates to the caller,
    /// leaving `safe_position` at the last persisted checkpoint (step 2, §7).
    pub fn run(&mut self) -> CResult<DriverOutcome> {
        loop {
            if self.framer.is_none() {
                self.open_current_file()?;
            }

            let event = self.framer.as_mut().unwrap().read_next()?;
            let event = match event {
                Some(event) => event,
                None => {
                    if self.open_transaction {
                        return Ok(DriverOutcome::OpenTransaction);
                    }
                    match self.next_file_name() {
                        Some(next) => {
                            self.current_file = next;
                            self.current_position = 4;
                            self.framer = None;
                            continue;
                        }
                        None => return Ok(DriverOutcome::LastFile),
                    }
                }
            };

            self.dispatch(event)?;
        }
    }

    fn open_current_file(&mut self) -> CResult<()> {
        let path = format!("{}/{}", self.binlog_dir, self.current_file);
        let framer = if self.current_position > 4 {
            BinlogFramer::open_at(&path, self.current_position)?
        } else {
            BinlogFramer::open(&path)?
        };
        self.framer = Some(framer);
        Ok(())
    }

    /// `{fileroot}.{seq:06d}` naming (§4.8 step 6), applied uniformly for
    /// both an observed `ROTATE_EVENT`/`STOP_EVENT` and a plain end-of-file:
    /// this converter does not parse `ROTATE_EVENT`'s payload for an
    /// explicit next-file name, since binlog file sequences are always
    /// contiguous on disk under this naming scheme.
    fn next_file_name(&self) -> Option<String> {
        let (_, seq_str) = self.current_file.rsplit_once('.')?;
        let seq: u64 = seq_str.parse().ok()?;
        let next = format!("{}.{:06}", self.fileroot, seq + 1);
        let path = format!("{}/{}", self.binlog_dir, next);
        Path::new(&path).exists().then_some(next)
    }

    fn post_header_len(&self, event_type: u8) -> usize {
        match self.framer.as_ref().unwrap().post_header_len(event_type) {
            0 => 6,
            n => n as usize,
        }
    }

    fn dispatch(&mut self, event: RawEvent) -> CResult<()> {
        let Some(event_type) = event.header.event_type() else {
            return Ok(());
        };

        match event_type {
            EventType::GtidEvent => self.handle_gtid_event(&event),
            EventType::QueryEvent => self.handle_query_event(&event),
            EventType::TableMapEvent => self.handle_table_map_event(&event),
            EventType::XidEvent => self.handle_commit(),
            _ if event_type.is_row_event() => self.handle_row_event(&event, event_type),
            _ => Ok(()),
        }
    }

    /// A `GTID_EVENT` opens the next transaction's identity (§3): `domain`
    /// and `sequence` come from its body, `server_id` from the shared
    /// header. Standalone events (plain DDL) have no matching `XID_EVENT`,
    /// so they never mark a transaction open (§4.4, §4.8).
    fn handle_gtid_event(&mut self, event: &RawEvent) -> CResult<()> {
        let body = match GtidEventBody::parse(&event.payload) {
            Ok(b) => b,
            Err(e) => {
                warn!("skipping malformed GTID_EVENT at offset {}: {e}", event.offset);
                return Ok(());
            }
        };
        self.current_gtid = Gtid::new(body.domain, event.header.server_id, body.sequence);
        self.open_transaction = !body.is_standalone();
        Ok(())
    }

    fn handle_query_event(&mut self, event: &RawEvent) -> CResult<()> {
        let query = match QueryEvent::parse(&event.payload) {
            Ok(q) => q,
            Err(e) => {
                warn!("skipping malformed QUERY_EVENT at offset {}: {e}", event.offset);
                return Ok(());
            }
        };

        let trimmed = query.sql.trim();
        if trimmed.eq_ignore_ascii_case("BEGIN") {
            self.open_transaction = true;
            return Ok(());
        }
        if trimmed.eq_ignore_ascii_case("COMMIT") {
            // Non-transactional commit (§4.4): the driver treats the
            // preceding row events as committed, same as an XID_EVENT.
            return self.handle_commit();
        }

        if let Err(e) = self.ddl.handle_query(&query.database, &query.sql, self.current_gtid) {
            warn!("DDL tracker error at offset {}: {e}", event.offset);
        }
        Ok(())
    }

    fn handle_table_map_event(&mut self, event: &RawEvent) -> CResult<()> {
        let table_id_len = self.post_header_len(event.header.event_type);
        let mut cursor = Cursor::new(&event.payload);
        let parsed = match TableMapEvent::parse(&mut cursor, table_id_len) {
            Ok(p) => p,
            Err(e) => {
                warn!("skipping malformed TABLE_MAP_EVENT at offset {}: {e}", event.offset);
                return Ok(());
            }
        };

        if parsed.is_release_sentinel() {
            return Ok(());
        }

        let key = format!("{}.{}", parsed.database, parsed.table);
        let create = match self.ddl.get(&key) {
            Some(create) => create.clone(),
            None => {
                let err = ReError::UnknownTable(key);
                warn!("{err}, dropping its events until a CREATE is observed");
                return Ok(());
            }
        };

        if let Err(e) = self.registry.handle_table_map_event(parsed, &create) {
            warn!("table-map registry error for `{key}`: {e}");
        }
        Ok(())
    }

    fn handle_row_event(&mut self, event: &RawEvent, event_type: EventType) -> CResult<()> {
        let table_id_len = self.post_header_len(event.header.event_type);
        let mut cursor = Cursor::new(&event.payload);

        let id_bytes = cursor.read_bytes(table_id_len)?;
        let mut padded = [0u8; 8];
        padded[..table_id_len].copy_from_slice(id_bytes);
        let table_id = u64::from_le_bytes(padded);
        let _flags = cursor.read_u16()?;

        if event_type.row_event_version() == 2 {
            let extra_len = cursor.read_u16()? as usize;
            if extra_len > 2 {
                cursor.skip(extra_len - 2)?;
            }
        }

        let active = match self.registry.lookup_active(table_id) {
            Some(active) => active,
            None => {
                warn!("row event references unmapped table_id {table_id}, skipping");
                return Ok(());
            }
        };

        let kind = rows_event_kind(event_type).expect("dispatch only routes row events here");
        let rows = match decode_rows_event(&mut cursor, &active.table_map, kind) {
            Ok(rows) => rows,
            Err(e) => {
                warn!("row decode error at offset {}: {e}", event.offset);
                return Ok(());
            }
        };

        self.current_gtid = self.current_gtid.next_event();
        {
            let mut writer = active.writer.lock().unwrap();
            for row in &rows {
                let bytes = encode_row(&self.current_gtid, event.header.timestamp, row);
                writer.append_record(&bytes);
            }
        }
        self.row_count += rows.len() as u64;
        Ok(())
    }

    fn handle_commit(&mut self) -> CResult<()> {
        self.open_transaction = false;
        self.trx_count += 1;
        if self.row_count >= self.row_target || self.trx_count >= self.trx_target {
            self.flush_and_checkpoint()?;
        }
        Ok(())
    }

    fn flush_and_checkpoint(&mut self) -> CResult<()> {
        self.registry.flush_all();
        let checkpoint = ConversionCheckpoint::new(
            self.current_file.clone(),
            self.framer.as_ref().unwrap().offset(),
            self.current_gtid,
        );
        checkpoint.save(&self.checkpoint_path)?;
        self.row_count = 0;
        self.trx_count = 0;
        Ok(())
    }
}
