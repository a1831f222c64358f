//! MariaDB `GTID_EVENT` (type `0xa2`) body (§3, GLOSSARY "GTID"): carries the
//! `domain`/`sequence` pair a transaction commits under. `server_id` is not
//! repeated here — it comes from the event's shared 19-byte header.
//!
//! Wire layout (after the post-header, which the format-description event
//! fixes at a per-server length we don't need to size since the remaining
//! fields are read positionally):
//!
//! ```text
//! sequence_number(8) | domain_id(4) | flags(1) [ | commit_id(8) if flags & FL_GROUP_COMMIT_ID ]
//! ```

use bitflags::bitflags;
use common::codec::Cursor;
use common::err::CResult;

bitflags! {
    /// <https://mariadb.com/kb/en/gtid_event/>
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GtidEventFlag: u8 {
        /// Transaction has no matching `COMMIT`/`XID_EVENT` (e.g. standalone DDL).
        const STANDALONE = 0x01;
        const GROUP_COMMIT_ID = 0x02;
        const TRANSACTIONAL = 0x04;
        const ALLOW_PARALLEL = 0x08;
        const WAITED = 0x10;
        const DDL = 0x20;
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GtidEventBody {
    pub sequence: u64,
    pub domain: u32,
    pub flags: GtidEventFlag,
}

impl GtidEventBody {
    pub fn parse(body: &[u8]) -> CResult<Self> {
        let mut cursor = Cursor::new(body);
        let sequence = cursor.read_u64()?;
        let domain = cursor.read_u32()?;
        let flags = GtidEventFlag::from_bits_truncate(cursor.read_u8()?);
        Ok(GtidEventBody { sequence, domain, flags })
    }

    /// A standalone transaction (plain DDL) commits immediately: no
    /// `XID_EVENT`/`COMMIT` follows it in the stream (§4.4, §4.8).
    pub fn is_standalone(&self) -> bool {
        self.flags.contains(GtidEventFlag::STANDALONE)
    }
}
