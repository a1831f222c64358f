use crate::err::CResult;
use std::fs::File;
use std::io::{Seek, SeekFrom, Write};

/// Truncates `file` back to `len` bytes and seeks to the new end. Used by
/// the Avro writer to undo a partially written block on I/O failure (§4.2,
/// §7): the file must never retain a half-written block.
pub fn truncate_to(file: &mut File, len: u64) -> CResult<()> {
    file.set_len(len)?;
    file.seek(SeekFrom::End(0))?;
    Ok(())
}

/// Writes `contents` to `{path}.tmp` and renames it over `path` so the
/// update is atomic — used for the checkpoint file and the DDL sidecar.
pub fn write_atomic(path: &str, contents: &[u8]) -> CResult<()> {
    let tmp = format!("{path}.tmp");
    {
        let mut f = File::create(&tmp)?;
        f.write_all(contents)?;
        f.flush()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}