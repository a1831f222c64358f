//! The 19-byte binlog event header and file-level framing (§4.3).
//!
//! ```text
//!                      [startPos : Len]
//! +=====================================+
//! | timestamp          0 : 4            |
//! +---------------------------------------+
//! | event_type         4 : 1            |
//! +---------------------------------------+
//! | server_id          5 : 4            |
//! +---------------------------------------+
//! | event_size         9 : 4            |
//! +---------------------------------------+
//! | next_pos          13 : 4            |
//! +---------------------------------------+
//! | flags             17 : 2            |
//! +=====================================+
//! ```
//! Every binlog file opens with the 4 byte magic `0xfe 'b' 'i' 'n'`.

use crate::b_type::EventType;
use bitflags::bitflags;
use common::err::{CResult, ReError};
use nom::{
    bytes::complete::tag,
    number::complete::{le_u16, le_u32, le_u8},
    IResult,
};
use serde::Serialize;

pub const MAGIC: [u8; 4] = [0xfe, 0x62, 0x69, 0x6e];
pub const HEADER_LEN: usize = 19;

bitflags! {
    /// Row/table-map event post-header flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
    pub struct RowEventFlag: u16 {
        /// Last event of a statement; combined with the dummy table id
        /// `0x00ffffff`, signals a release-all-maps sentinel (§4.6).
        const STMT_END = 0x0001;
        const NO_FOREIGN_KEY_CHECKS = 0x0002;
        const RELAXED_UNIQUE_CHECKS = 0x0004;
        const COMPLETE_ROWS = 0x0008;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EventHeader {
    pub timestamp: u32,
    pub event_type: u8,
    pub server_id: u32,
    pub event_size: u32,
    pub next_pos: u32,
    pub flags: u16,
}

impl EventHeader {
    /// Recognizes the 4 byte magic at the start of a binlog file.
    pub fn check_magic(i: &[u8]) -> IResult<&[u8], &[u8]> {
        tag(MAGIC)(i)
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], EventHeader> {
        let (i, timestamp) = le_u32(input)?;
        let (i, event_type) = le_u8(i)?;
        let (i, server_id) = le_u32(i)?;
        let (i, event_size) = le_u32(i)?;
        let (i, next_pos) = le_u32(i)?;
        let (i, flags) = le_u16(i)?;
        Ok((
            i,
            EventHeader {
                timestamp,
                event_type,
                server_id,
                event_size,
                next_pos,
                flags,
            },
        ))
    }

    pub fn event_type(&self) -> Option<EventType> {
        EventType::try_from(self.event_type).ok()
    }

    /// Length of the event body, excluding the 19 byte header (§4.3): the
    /// reader must never trust `event_size` blindly when it would run past
    /// the file's current length.
    pub fn body_len(&self) -> usize {
        self.event_size as usize - HEADER_LEN
    }
}

/// The `FORMAT_DESCRIPTION_EVENT` body: binlog version, server version
/// string, and the post-header length table used to size every later
/// event's fixed portion, plus whether a trailing CRC32 checksum is present.
#[derive(Debug, Clone, Serialize)]
pub struct FormatDescriptionEvent {
    pub binlog_version: u16,
    pub server_version: String,
    pub create_timestamp: u32,
    pub event_header_length: u8,
    pub post_header_lengths: Vec<u8>,
    pub checksum_present: bool,
}

impl FormatDescriptionEvent {
    /// The last byte of the post-header-length array, when present, carries
    /// the checksum algorithm descriptor (1 == CRC32). A server old enough
    /// to omit it writes no trailing byte at all.
    pub fn parse(body: &[u8]) -> CResult<Self> {
        if body.len() < 2 + 50 + 1 {
            return Err(ReError::new("FORMAT_DESCRIPTION_EVENT body too short"));
        }
        let binlog_version = u16::from_le_bytes([body[0], body[1]]);
        let server_version_raw = &body[2..52];
        let end = server_version_raw
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(server_version_raw.len());
        let server_version = String::from_utf8_lossy(&server_version_raw[..end]).into_owned();
        let create_timestamp = u32::from_le_bytes([body[52], body[53], body[54], body[55]]);
        let event_header_length = body[56];
        let rest = &body[57..];
        let checksum_present = rest.last() == Some(&1);
        let post_header_lengths = if checksum_present {
            rest[..rest.len() - 1].to_vec()
        } else {
            rest.to_vec()
        };
        Ok(FormatDescriptionEvent {
            binlog_version,
            server_version,
            create_timestamp,
            event_header_length,
            post_header_lengths,
            checksum_present,
        })
    }
}
