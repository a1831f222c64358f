use std::io;
use thiserror::Error;

/// Single error currency for the whole workspace: byte decoding, binlog
/// framing, schema tracking and the client protocol all return `ReError`.
///
/// Policy per component is described at the call site (§7 of the design
/// doc): decode/schema errors are logged and the offending event or row is
/// skipped, I/O errors on the binlog stream stop the conversion loop, I/O
/// errors on Avro writes are retried after a truncate, protocol errors
/// close the client session.
#[derive(Debug, Error)]
pub enum ReError {
    #[error("short buffer: need {needed} more byte(s), have {have}")]
    ShortBuffer { needed: usize, have: usize },

    #[error("unknown mysql column type code {0}")]
    UnknownColumnType(u8),

    #[error("column count mismatch: table-map declares {expected}, row event has {actual}")]
    ColumnCountMismatch { expected: usize, actual: usize },

    #[error("binlog stream truncated at offset {offset}: {reason}")]
    Truncated { offset: u64, reason: String },

    #[error("no CREATE TABLE seen for `{0}`")]
    UnknownTable(String),

    #[error("avro schema for `{database}.{table}` version {version} could not be built: {reason}")]
    SchemaError {
        database: String,
        table: String,
        version: u32,
        reason: String,
    },

    #[error("client protocol error: {0}")]
    Protocol(String),

    #[error("checkpoint file is malformed: {0}")]
    Checkpoint(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("invalid utf-8 in binlog payload: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("{0}")]
    Other(String),
}

impl ReError {
    /// Catch-all constructor for call sites where no dedicated variant
    /// fits, mirroring the teacher's `ReError::String`/`ReError::Error`.
    pub fn new(msg: impl Into<String>) -> Self {
        ReError::Other(msg.into())
    }
}

pub type CResult<T> = Result<T, ReError>;
