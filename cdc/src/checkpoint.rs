//! Resumable conversion checkpoint (§3, §6): `(binlog_filename, byte_offset,
//! gtid)` persisted as the INI-shaped `avro-conversion.ini`.
//!
//! Grounded on the teacher's `metadata/gtid_manager.rs` persistence style,
//! narrowed to the plain key=value format the spec's external interface
//! names, written via [`common::file_util::write_atomic`] for the same
//! crash-safety the DDL sidecar and Avro writer already rely on.

use binlog::gtid::Gtid;
use common::err::{CResult, ReError};
use common::file_util::write_atomic;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionCheckpoint {
    pub file: String,
    pub position: u64,
    pub gtid: Gtid,
}

impl ConversionCheckpoint {
    pub fn new(file: impl Into<String>, position: u64, gtid: Gtid) -> Self {
        ConversionCheckpoint {
            file: file.into(),
            position,
            gtid,
        }
    }

    /// Reads the checkpoint file if it exists; absence is not an error
    /// (the driver starts from the configured `BinlogConfig` instead).
    pub fn load(path: impl AsRef<Path>) -> CResult<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(path)?;
        Self::parse(&text).map(Some)
    }

    fn parse(text: &str) -> CResult<Self> {
        let mut position = None;
        let mut gtid = None;
        let mut file = None;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('[') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            match key.trim() {
                "position" => {
                    position = value.trim().parse::<u64>().ok();
                }
                "gtid" => {
                    gtid = Gtid::parse(value.trim());
                }
                "file" => {
                    file = Some(value.trim().to_string());
                }
                _ => {}
            }
        }

        Ok(ConversionCheckpoint {
            file: file.ok_or_else(|| ReError::Checkpoint("missing `file` key".to_string()))?,
            position: position.ok_or_else(|| ReError::Checkpoint("missing `position` key".to_string()))?,
            gtid: gtid.ok_or_else(|| ReError::Checkpoint("missing or malformed `gtid` key".to_string()))?,
        })
    }

    /// Writes the checkpoint atomically (write-temp-then-rename), so a
    /// reader never observes a half-written file (§3, §5).
    pub fn save(&self, path: impl AsRef<Path>) -> CResult<()> {
        let text = format!(
            "[avro-conversion]\nposition={}\ngtid={}\nfile={}\n",
            self.position, self.gtid.to_checkpoint_string(), self.file
        );
        write_atomic(path.as_ref().to_str().ok_or_else(|| ReError::new("checkpoint path is not valid UTF-8"))?, text.as_bytes())
    }
}
