//! Binlog event type codes, MariaDB 10 numbering (§4.3, `MAX_EVENT_TYPE_MARIADB10 = 0xa3`).
//!
//! The MariaDB-specific codes above `0x9f` (`ANNOTATE_ROWS`, `BINLOG_CHECKPOINT`,
//! `GTID_EVENT`, `GTID_LIST_EVENT`) replace MySQL 5.6+'s UUID-based GTID
//! events; everything below that is shared with upstream MySQL numbering.

use num_enum::{IntoPrimitive, TryFromPrimitive};

pub const MAX_EVENT_TYPE_MARIADB10: u8 = 0xa3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum EventType {
    UnknownEvent = 0,
    StartEventV3 = 1,
    QueryEvent = 2,
    StopEvent = 3,
    RotateEvent = 4,
    IntvarEvent = 5,
    LoadEvent = 6,
    SlaveEvent = 7,
    CreateFileEvent = 8,
    AppendBlockEvent = 9,
    ExecLoadEvent = 10,
    DeleteFileEvent = 11,
    NewLoadEvent = 12,
    RandEvent = 13,
    UserVarEvent = 14,
    FormatDescriptionEvent = 15,
    XidEvent = 16,
    BeginLoadQueryEvent = 17,
    ExecuteLoadQueryEvent = 18,
    TableMapEvent = 19,
    PreGaWriteRowsEvent = 20,
    PreGaUpdateRowsEvent = 21,
    PreGaDeleteRowsEvent = 22,
    WriteRowsEventV1 = 23,
    UpdateRowsEventV1 = 24,
    DeleteRowsEventV1 = 25,
    IncidentEvent = 26,
    HeartbeatLogEvent = 27,
    IgnorableLogEvent = 28,
    RowsQueryLogEvent = 29,
    WriteRowsEventV2 = 30,
    UpdateRowsEventV2 = 31,
    DeleteRowsEventV2 = 32,
    GtidLogEvent = 33,
    AnonymousGtidLogEvent = 34,
    PreviousGtidsLogEvent = 35,

    // MariaDB-specific, above the MySQL range.
    AnnotateRowsEvent = 0xa0,
    BinlogCheckpointEvent = 0xa1,
    GtidEvent = 0xa2,
    GtidListEvent = 0xa3,
}

impl EventType {
    pub fn is_row_event(self) -> bool {
        matches!(
            self,
            EventType::WriteRowsEventV1
                | EventType::UpdateRowsEventV1
                | EventType::DeleteRowsEventV1
                | EventType::WriteRowsEventV2
                | EventType::UpdateRowsEventV2
                | EventType::DeleteRowsEventV2
        )
    }

    /// Row-event format version, used to size the post-header's extra-data
    /// block (present only in v2, §4.6).
    pub fn row_event_version(self) -> u8 {
        match self {
            EventType::WriteRowsEventV1
            | EventType::UpdateRowsEventV1
            | EventType::DeleteRowsEventV1 => 1,
            EventType::WriteRowsEventV2
            | EventType::UpdateRowsEventV2
            | EventType::DeleteRowsEventV2 => 2,
            _ => 0,
        }
    }
}
