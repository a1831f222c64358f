use serde::{Deserialize, Serialize};

/// Top level configuration, loaded from a TOML file by [`super::read_config`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvroConverterConfig {
    pub base: BaseConfig,
    pub binlog: BinlogConfig,
    pub avro: AvroConfig,
    #[serde(default)]
    pub listen: ListenConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseConfig {
    /// Directory tracing writes rolling log files to.
    pub log_dir: Option<String>,
}

/// Where the binlog files live and how they are named.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinlogConfig {
    /// Directory containing the binlog files.
    pub binlog_path: String,

    /// The common prefix shared by rotated files, e.g. `mysql-bin` for
    /// `mysql-bin.000001`, `mysql-bin.000002`, ...
    pub fileroot: String,

    /// Binlog file currently being consumed, e.g. `mysql-bin.000005`.
    pub file: String,

    /// Starting byte offset within `file`.
    pub position: u64,
}

/// Avro conversion thresholds and output location (§4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvroConfig {
    /// Directory the `{db}.{table}.{version:06d}.avro` files are written to.
    pub avro_dir: String,

    /// Flush once this many rows have been decoded since the last flush.
    #[serde(default = "default_row_target")]
    pub row_target: u64,

    /// Flush once this many transactions have committed since the last flush.
    #[serde(default = "default_trx_target")]
    pub trx_target: u64,
}

fn default_row_target() -> u64 {
    1000
}

fn default_trx_target() -> u64 {
    50
}

/// The line-protocol listener address; owned by the thin CLI driver, not
/// the core conversion/session logic (§1 scope note).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenConfig {
    pub addr: String,
}

impl Default for ListenConfig {
    fn default() -> Self {
        ListenConfig {
            addr: "127.0.0.1:4406".to_string(),
        }
    }
}

impl Default for BaseConfig {
    fn default() -> Self {
        BaseConfig {
            log_dir: Some("/tmp/cdc-avro/logs".to_string()),
        }
    }
}

impl Default for BinlogConfig {
    fn default() -> Self {
        BinlogConfig {
            binlog_path: "/tmp/cdc-avro/binlog".to_string(),
            fileroot: "mysql-bin".to_string(),
            file: "mysql-bin.000001".to_string(),
            position: 4,
        }
    }
}

impl Default for AvroConfig {
    fn default() -> Self {
        AvroConfig {
            avro_dir: "/tmp/cdc-avro/avro".to_string(),
            row_target: default_row_target(),
            trx_target: default_trx_target(),
        }
    }
}

impl Default for AvroConverterConfig {
    fn default() -> Self {
        AvroConverterConfig {
            base: BaseConfig::default(),
            binlog: BinlogConfig::default(),
            avro: AvroConfig::default(),
            listen: ListenConfig::default(),
        }
    }
}
