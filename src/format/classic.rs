//! Classic index (`.cobs_classic`): one `(m, h)` parameter pair, `w`
//! documents, row-major payload (spec.md §6.2).

use super::{read_and_check_magic, read_name, read_outer_header, write_magic, write_name, write_outer_header};
use crate::bitmap::row_size_bytes;
use crate::error::{CobsError, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub const INNER_MAGIC: &[u8] = b"CLASSIC_INDEX";
pub const INNER_VERSION: u32 = 1;

#[derive(Debug, Clone)]
pub struct ClassicHeader {
    pub term_size: u32,
    pub canonical: bool,
    pub sig_size: u64,
    pub num_hashes: u64,
    pub file_names: Vec<String>,
}

impl ClassicHeader {
    pub fn nfiles(&self) -> u32 {
        self.file_names.len() as u32
    }

    pub fn row_bytes(&self) -> u64 {
        row_size_bytes(self.nfiles() as u64)
    }

    /// Checks that every sub-index being combined agrees on parameters,
    /// per spec.md §7's format-error definition.
    pub fn compatible_with(&self, other: &ClassicHeader) -> bool {
        self.term_size == other.term_size
            && self.canonical == other.canonical
            && self.sig_size == other.sig_size
            && self.num_hashes == other.num_hashes
    }
}

fn write_header(w: &mut impl Write, header: &ClassicHeader) -> std::io::Result<()> {
    write_outer_header(w)?;
    write_magic(w, INNER_MAGIC)?;
    w.write_u32::<LittleEndian>(INNER_VERSION)?;
    w.write_u32::<LittleEndian>(header.term_size)?;
    w.write_u8(header.canonical as u8)?;
    w.write_u64::<LittleEndian>(header.sig_size)?;
    w.write_u64::<LittleEndian>(header.num_hashes)?;
    w.write_u32::<LittleEndian>(header.nfiles())?;
    for name in &header.file_names {
        write_name(w, name)?;
    }
    Ok(())
}

/// Writes a complete classic index: header, `m` rows supplied one at a
/// time by `row_provider` (so callers never need the whole payload
/// resident), then the closing magic.
pub fn write_classic_index(
    path: impl AsRef<Path>,
    header: &ClassicHeader,
    mut row_provider: impl FnMut(u64) -> std::io::Result<Vec<u8>>,
) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(CobsError::Io)?;
    let mut w = BufWriter::new(file);
    write_header(&mut w, header).map_err(CobsError::Io)?;

    let row_bytes = header.row_bytes() as usize;
    for r in 0..header.sig_size {
        let row = row_provider(r).map_err(CobsError::Io)?;
        if row.len() != row_bytes {
            return Err(CobsError::format(
                path,
                format!("row {r} has {} bytes, expected {row_bytes}", row.len()),
            ));
        }
        w.write_all(&row).map_err(CobsError::Io)?;
    }
    write_magic(&mut w, INNER_MAGIC).map_err(CobsError::Io)?;
    w.flush().map_err(CobsError::Io)?;
    Ok(())
}

/// Reads the header and validates the closing magic is present and
/// correctly positioned, without materializing the payload. Returns the
/// header plus the byte offset the payload starts at.
pub fn read_header(path: impl AsRef<Path>) -> Result<(ClassicHeader, u64)> {
    let path = path.as_ref();
    let file = File::open(path).map_err(CobsError::Io)?;
    let mut r = std::io::BufReader::new(file);

    read_outer_header(&mut r, path)?;
    read_and_check_magic(&mut r, INNER_MAGIC, path)?;
    let inner_ver = r
        .read_u32::<LittleEndian>()
        .map_err(|e| CobsError::format(path, format!("truncated inner version: {e}")))?;
    if inner_ver != INNER_VERSION {
        return Err(CobsError::format(path, format!("unsupported inner version {inner_ver}")));
    }
    let term_size = r
        .read_u32::<LittleEndian>()
        .map_err(|e| CobsError::format(path, format!("truncated term_size: {e}")))?;
    let canonical = r.read_u8().map_err(|e| CobsError::format(path, format!("truncated canonical: {e}")))? != 0;
    let sig_size = r
        .read_u64::<LittleEndian>()
        .map_err(|e| CobsError::format(path, format!("truncated sig_size: {e}")))?;
    let num_hashes = r
        .read_u64::<LittleEndian>()
        .map_err(|e| CobsError::format(path, format!("truncated num_hashes: {e}")))?;
    let nfiles = r
        .read_u32::<LittleEndian>()
        .map_err(|e| CobsError::format(path, format!("truncated nfiles: {e}")))?;

    let mut file_names = Vec::with_capacity(nfiles as usize);
    for _ in 0..nfiles {
        file_names.push(read_name(&mut r, path)?);
    }

    let header = ClassicHeader {
        term_size,
        canonical,
        sig_size,
        num_hashes,
        file_names,
    };
    let payload_offset = r.stream_position().map_err(CobsError::Io)?;

    let payload_len = sig_size * header.row_bytes();
    let closing_offset = payload_offset + payload_len;
    r.seek(SeekFrom::Start(closing_offset)).map_err(CobsError::Io)?;
    read_and_check_magic(&mut r, INNER_MAGIC, path)
        .map_err(|_| CobsError::format(path, "closing magic mismatch or truncated payload"))?;

    Ok((header, payload_offset))
}

/// Reads the header and the whole payload into memory; used by tests and
/// by the `load_complete_index` code path (spec.md §6.5).
pub fn read_complete(path: impl AsRef<Path>) -> Result<(ClassicHeader, Vec<u8>)> {
    let path = path.as_ref();
    let (header, payload_offset) = read_header(path)?;
    let mut file = File::open(path).map_err(CobsError::Io)?;
    file.seek(SeekFrom::Start(payload_offset)).map_err(CobsError::Io)?;
    let payload_len = (header.sig_size * header.row_bytes()) as usize;
    let mut payload = vec![0u8; payload_len];
    file.read_exact(&mut payload).map_err(CobsError::Io)?;
    Ok((header, payload))
}

pub fn is_complete(path: impl AsRef<Path>) -> bool {
    read_header(path.as_ref()).is_ok()
}

pub fn default_path(base: &Path, stem: &str) -> PathBuf {
    base.join(format!("{stem}.cobs_classic"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn header(names: &[&str], m: u64, h: u64) -> ClassicHeader {
        ClassicHeader {
            term_size: 31,
            canonical: true,
            sig_size: m,
            num_hashes: h,
            file_names: names.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn round_trips_header_and_payload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.cobs_classic");
        let hdr = header(&["a", "b", "c"], 16, 3);
        let row_bytes = hdr.row_bytes() as usize;

        write_classic_index(&path, &hdr, |r| Ok(vec![r as u8; row_bytes])).unwrap();

        let (read_hdr, payload) = read_complete(&path).unwrap();
        assert_eq!(read_hdr.file_names, vec!["a", "b", "c"]);
        assert_eq!(read_hdr.sig_size, 16);
        assert_eq!(payload.len(), 16 * row_bytes);
        assert_eq!(&payload[0..row_bytes], &vec![0u8; row_bytes][..]);
    }

    #[test]
    fn detects_truncated_payload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.cobs_classic");
        let hdr = header(&["a"], 8, 1);
        write_classic_index(&path, &hdr, |r| Ok(vec![r as u8; 1])).unwrap();

        // Corrupt: chop off the closing magic.
        let len = std::fs::metadata(&path).unwrap().len();
        let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(len - 5).unwrap();

        assert!(!is_complete(&path));
    }

    #[test]
    fn rejects_row_length_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.cobs_classic");
        let hdr = header(&["a"], 4, 1);
        let err = write_classic_index(&path, &hdr, |_| Ok(vec![0u8; 99]));
        assert!(err.is_err());
    }
}
