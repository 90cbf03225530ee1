//! Bit-exact on-disk framing shared by the classic and compact index
//! formats (spec.md §6.1).

pub mod classic;
pub mod compact;

use crate::error::{CobsError, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};
use std::path::Path;

pub const OUTER_MAGIC: &[u8; 6] = b"INSIIN";
pub const OUTER_VERSION: u32 = 1;

pub fn write_outer_header(w: &mut impl Write) -> std::io::Result<()> {
    w.write_all(OUTER_MAGIC)?;
    w.write_u32::<LittleEndian>(OUTER_VERSION)
}

pub fn read_outer_header(r: &mut impl Read, path: &Path) -> Result<()> {
    let mut magic = [0u8; 6];
    r.read_exact(&mut magic)
        .map_err(|e| CobsError::format(path, format!("truncated outer header: {e}")))?;
    if &magic != OUTER_MAGIC {
        return Err(CobsError::format(path, "outer magic mismatch"));
    }
    let version = r
        .read_u32::<LittleEndian>()
        .map_err(|e| CobsError::format(path, format!("truncated version: {e}")))?;
    if version != OUTER_VERSION {
        return Err(CobsError::format(path, format!("unsupported version {version}")));
    }
    Ok(())
}

pub fn write_magic(w: &mut impl Write, magic: &[u8]) -> std::io::Result<()> {
    w.write_all(magic)
}

pub fn read_and_check_magic(r: &mut impl Read, expect: &[u8], path: &Path) -> Result<()> {
    let mut buf = vec![0u8; expect.len()];
    r.read_exact(&mut buf)
        .map_err(|e| CobsError::format(path, format!("truncated magic: {e}")))?;
    if buf != expect {
        return Err(CobsError::format(
            path,
            format!(
                "magic mismatch: expected {:?}, got {:?}",
                String::from_utf8_lossy(expect),
                String::from_utf8_lossy(&buf)
            ),
        ));
    }
    Ok(())
}

/// Writes `name` newline-terminated, matching the file-name list framing
/// used by both index variants.
pub fn write_name(w: &mut impl Write, name: &str) -> std::io::Result<()> {
    w.write_all(name.as_bytes())?;
    w.write_all(b"\n")
}

pub fn read_name(r: &mut impl Read, path: &Path) -> Result<String> {
    let mut bytes = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        r.read_exact(&mut byte)
            .map_err(|e| CobsError::format(path, format!("truncated file name: {e}")))?;
        if byte[0] == b'\n' {
            break;
        }
        bytes.push(byte[0]);
    }
    String::from_utf8(bytes).map_err(|e| CobsError::format(path, format!("non-UTF-8 file name: {e}")))
}
