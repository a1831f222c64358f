mod config;

pub use config::{AvroConfig, AvroConverterConfig, BaseConfig, BinlogConfig, ListenConfig};

use crate::err::ReError;
use std::fs;
use std::path::Path;

/// Reads and parses the TOML config file at `path`.
pub fn read_config<P: AsRef<Path>>(path: P) -> Result<AvroConverterConfig, ReError> {
    let s = fs::read_to_string(path)?;
    toml::from_str(&s).map_err(|e| ReError::Config(e.to_string()))
}
