//! File-backed binlog event framer (§4.3, §4.8 steps 1-2): owns the open
//! file descriptor, advances through events, and learns the checksum and
//! post-header-length layout from the leading `FORMAT_DESCRIPTION_EVENT`.

use crate::header::{EventHeader, FormatDescriptionEvent, HEADER_LEN, MAGIC};
use crate::b_type::{EventType, MAX_EVENT_TYPE_MARIADB10};
use common::err::{CResult, ReError};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

pub struct RawEvent {
    pub header: EventHeader,
    /// Payload with checksum bytes already stripped. `QUERY_EVENT` payloads
    /// additionally carry a trailing NUL so their SQL text can be treated
    /// as NUL-terminated (§4.3); other event types get none, since their
    /// decoders size every field explicitly and a stray trailing byte would
    /// otherwise read as one more (corrupt) row image.
    pub payload: Vec<u8>,
    pub offset: u64,
}

pub struct BinlogFramer {
    file: File,
    offset: u64,
    checksum_present: bool,
    post_header_lengths: Vec<u8>,
}

impl BinlogFramer {
    /// Opens `path` and validates the 4-byte magic, positioning the cursor
    /// at offset 4 to read the first (`FORMAT_DESCRIPTION_EVENT`) event.
    pub fn open(path: &str) -> CResult<Self> {
        let mut file = File::open(path)?;
        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if EventHeader::check_magic(&magic).is_err() {
            return Err(ReError::new(format!("`{path}` is missing the binlog magic header")));
        }
        Ok(BinlogFramer {
            file,
            offset: 4,
            checksum_present: false,
            post_header_lengths: Vec::new(),
        })
    }

    /// Resumes framing at `offset` in an already-open file (checkpoint restart).
    pub fn open_at(path: &str, offset: u64) -> CResult<Self> {
        let mut framer = Self::open(path)?;
        if offset > 4 {
            framer.file.seek(SeekFrom::Start(offset))?;
            framer.offset = offset;
        }
        Ok(framer)
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Reads the next event, or `Ok(None)` at a clean end-of-file (the
    /// driver then decides whether to rotate, per §4.8 step 5-6).
    pub fn read_next(&mut self) -> CResult<Option<RawEvent>> {
        let start_offset = self.offset;
        let mut header_buf = [0u8; HEADER_LEN];
        match read_exact_or_eof(&mut self.file, &mut header_buf)? {
            false => return Ok(None),
            true => {}
        }

        let (_, header) = EventHeader::parse(&header_buf).map_err(|_| ReError::Truncated {
            offset: start_offset,
            reason: "malformed 19-byte event header".to_string(),
        })?;

        if header.event_size < HEADER_LEN as u32 {
            return Err(ReError::Truncated {
                offset: start_offset,
                reason: format!("event_size {} below minimum header length", header.event_size),
            });
        }
        if header.event_type > MAX_EVENT_TYPE_MARIADB10 {
            return Err(ReError::Truncated {
                offset: start_offset,
                reason: format!("event_type {} exceeds MAX_EVENT_TYPE_MARIADB10", header.event_type),
            });
        }
        if header.next_pos > 0
            && (header.next_pos as u64 != start_offset + header.event_size as u64
                || header.next_pos as u64 <= start_offset)
        {
            return Err(ReError::Truncated {
                offset: start_offset,
                reason: format!(
                    "next_pos {} inconsistent with offset {start_offset} + event_size {}",
                    header.next_pos, header.event_size
                ),
            });
        }

        let mut body_len = header.body_len();
        if self.checksum_present && body_len >= 4 {
            body_len -= 4;
        }

        let mut payload = vec![0u8; body_len];
        self.file.read_exact(&mut payload)?;
        if self.checksum_present {
            let mut checksum = [0u8; 4];
            self.file.read_exact(&mut checksum)?;
        }
        if header.event_type() == Some(EventType::QueryEvent) {
            payload.push(0); // NUL terminator QUERY_EVENT's SQL text relies on
        }

        if header.event_type() == Some(EventType::FormatDescriptionEvent) {
            let fde = FormatDescriptionEvent::parse(&payload)?;
            self.checksum_present = fde.checksum_present;
            self.post_header_lengths = fde.post_header_lengths;
        }

        self.offset = if header.next_pos > 0 {
            header.next_pos as u64
        } else {
            start_offset + header.event_size as u64
        };

        Ok(Some(RawEvent {
            header,
            payload,
            offset: start_offset,
        }))
    }

    /// Post-header length the leading `FORMAT_DESCRIPTION_EVENT` recorded
    /// for `event_type`, used to size `TABLE_MAP_EVENT`'s table-id field.
    pub fn post_header_len(&self, event_type: u8) -> u8 {
        self.post_header_lengths
            .get(event_type as usize)
            .copied()
            .unwrap_or(0)
    }
}

fn read_exact_or_eof(file: &mut File, buf: &mut [u8]) -> CResult<bool> {
    let mut total = 0;
    while total < buf.len() {
        let n = file.read(&mut buf[total..])?;
        if n == 0 {
            if total == 0 {
                return Ok(false);
            }
            return Err(ReError::Truncated {
                offset: 0,
                reason: "event header truncated at end of file".to_string(),
            });
        }
        total += n;
    }
    Ok(true)
}
