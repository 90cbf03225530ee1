//! Compact index (`.cobs_compact`): a horizontal concatenation of
//! parameter blocks sharing a page-aligned row size `g` (spec.md §6.3).

use super::{read_and_check_magic, read_name, read_outer_header, write_magic, write_name, write_outer_header};
use crate::error::{CobsError, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub const INNER_MAGIC: &[u8] = b"COMPACT_INDEX";
pub const INNER_VERSION: u32 = 1;

/// One parameter block's `(m, h)` pair.
#[derive(Debug, Clone, Copy)]
pub struct BlockParams {
    pub sig_size: u64,
    pub num_hashes: u64,
}

#[derive(Debug, Clone)]
pub struct CompactHeader {
    pub term_size: u32,
    pub canonical: bool,
    pub page_size: u64,
    pub params: Vec<BlockParams>,
    pub file_names: Vec<String>,
}

impl CompactHeader {
    pub fn nfiles(&self) -> u32 {
        self.file_names.len() as u32
    }

    pub fn nparams(&self) -> u32 {
        self.params.len() as u32
    }

    /// Byte length of block `p`'s payload (`g × sig_size_p`).
    pub fn block_len(&self, p: usize) -> u64 {
        self.page_size * self.params[p].sig_size
    }

    /// Byte offset of block `p`'s payload relative to the payload start.
    pub fn block_offset(&self, p: usize) -> u64 {
        self.params[..p].iter().enumerate().map(|(i, _)| self.block_len(i)).sum()
    }

    pub fn total_payload_len(&self) -> u64 {
        (0..self.params.len()).map(|p| self.block_len(p)).sum()
    }
}

fn header_bytes_len(header: &CompactHeader) -> u64 {
    // outer magic + version + inner magic + inner version + term_size +
    // canonical + nparams + nfiles + page_size
    let mut len = 6 + 4 + INNER_MAGIC.len() as u64 + 4 + 4 + 1 + 4 + 4 + 8;
    len += header.params.len() as u64 * 16; // sig_size u64 + num_hashes u64
    for name in &header.file_names {
        len += name.len() as u64 + 1;
    }
    len
}

fn write_header(w: &mut impl Write, header: &CompactHeader) -> std::io::Result<()> {
    write_outer_header(w)?;
    write_magic(w, INNER_MAGIC)?;
    w.write_u32::<LittleEndian>(INNER_VERSION)?;
    w.write_u32::<LittleEndian>(header.term_size)?;
    w.write_u8(header.canonical as u8)?;
    w.write_u32::<LittleEndian>(header.nparams())?;
    w.write_u32::<LittleEndian>(header.nfiles())?;
    w.write_u64::<LittleEndian>(header.page_size)?;
    for p in &header.params {
        w.write_u64::<LittleEndian>(p.sig_size)?;
        w.write_u64::<LittleEndian>(p.num_hashes)?;
    }
    for name in &header.file_names {
        write_name(w, name)?;
    }
    Ok(())
}

/// Writes a complete compact index. `row_provider(block, row)` must
/// return exactly `page_size` bytes.
pub fn write_compact_index(
    path: impl AsRef<Path>,
    header: &CompactHeader,
    mut row_provider: impl FnMut(usize, u64) -> std::io::Result<Vec<u8>>,
) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(CobsError::Io)?;
    let mut w = BufWriter::new(file);
    write_header(&mut w, header).map_err(CobsError::Io)?;

    let header_len = header_bytes_len(header);
    let padding = (header.page_size - header_len % header.page_size) % header.page_size;
    w.write_all(&vec![0u8; padding as usize]).map_err(CobsError::Io)?;

    let g = header.page_size as usize;
    for (p, params) in header.params.iter().enumerate() {
        for r in 0..params.sig_size {
            let row = row_provider(p, r).map_err(CobsError::Io)?;
            if row.len() != g {
                return Err(CobsError::format(
                    path,
                    format!("block {p} row {r} has {} bytes, expected page size {g}", row.len()),
                ));
            }
            w.write_all(&row).map_err(CobsError::Io)?;
        }
    }
    write_magic(&mut w, INNER_MAGIC).map_err(CobsError::Io)?;
    w.flush().map_err(CobsError::Io)?;
    Ok(())
}

pub fn read_header(path: impl AsRef<Path>) -> Result<(CompactHeader, u64)> {
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
    let nparams = r
        .read_u32::<LittleEndian>()
        .map_err(|e| CobsError::format(path, format!("truncated nparams: {e}")))?;
    let nfiles = r
        .read_u32::<LittleEndian>()
        .map_err(|e| CobsError::format(path, format!("truncated nfiles: {e}")))?;
    let page_size = r
        .read_u64::<LittleEndian>()
        .map_err(|e| CobsError::format(path, format!("truncated page_size: {e}")))?;

    let mut params = Vec::with_capacity(nparams as usize);
    for _ in 0..nparams {
        let sig_size = r
            .read_u64::<LittleEndian>()
            .map_err(|e| CobsError::format(path, format!("truncated sig_size: {e}")))?;
        let num_hashes = r
            .read_u64::<LittleEndian>()
            .map_err(|e| CobsError::format(path, format!("truncated num_hashes: {e}")))?;
        params.push(BlockParams { sig_size, num_hashes });
    }
    let mut file_names = Vec::with_capacity(nfiles as usize);
    for _ in 0..nfiles {
        file_names.push(read_name(&mut r, path)?);
    }

    let header = CompactHeader {
        term_size,
        canonical,
        page_size,
        params,
        file_names,
    };

    let header_len = r.stream_position().map_err(CobsError::Io)?;
    let padding = (header.page_size - header_len % header.page_size) % header.page_size;
    if padding != header.page_size {
        let mut pad_buf = vec![0u8; padding as usize];
        r.read_exact(&mut pad_buf).map_err(CobsError::Io)?;
    }
    let payload_offset = r.stream_position().map_err(CobsError::Io)?;
    if payload_offset % header.page_size != 0 {
        return Err(CobsError::format(path, "payload offset is not page-aligned"));
    }

    let closing_offset = payload_offset + header.total_payload_len();
    r.seek(SeekFrom::Start(closing_offset)).map_err(CobsError::Io)?;
    read_and_check_magic(&mut r, INNER_MAGIC, path)
        .map_err(|_| CobsError::format(path, "closing magic mismatch or truncated payload"))?;

    Ok((header, payload_offset))
}

pub fn read_complete(path: impl AsRef<Path>) -> Result<(CompactHeader, Vec<u8>)> {
    let path = path.as_ref();
    let (header, payload_offset) = read_header(path)?;
    let mut file = File::open(path).map_err(CobsError::Io)?;
    file.seek(SeekFrom::Start(payload_offset)).map_err(CobsError::Io)?;
    let mut payload = vec![0u8; header.total_payload_len() as usize];
    file.read_exact(&mut payload).map_err(CobsError::Io)?;
    Ok((header, payload))
}

pub fn default_path(base: &Path, stem: &str) -> PathBuf {
    base.join(format!("{stem}.cobs_compact"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn header(names: &[&str], blocks: &[(u64, u64)], g: u64) -> CompactHeader {
        CompactHeader {
            term_size: 31,
            canonical: true,
            page_size: g,
            params: blocks
                .iter()
                .map(|&(m, h)| BlockParams { sig_size: m, num_hashes: h })
                .collect(),
            file_names: names.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn payload_starts_page_aligned() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.cobs_compact");
        let hdr = header(&["a", "b"], &[(4, 3)], 16);

        write_compact_index(&path, &hdr, |_, r| Ok(vec![r as u8; 16])).unwrap();

        let (_, payload_offset) = read_header(&path).unwrap();
        assert_eq!(payload_offset % 16, 0);
    }

    #[test]
    fn round_trips_multi_block_payload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.cobs_compact");
        let hdr = header(&["a", "b", "c"], &[(2, 3), (5, 2)], 8);

        write_compact_index(&path, &hdr, |p, r| {
            let mut row = vec![0u8; 8];
            row[0] = p as u8;
            row[1] = r as u8;
            Ok(row)
        })
        .unwrap();

        let (read_hdr, payload) = read_complete(&path).unwrap();
        assert_eq!(read_hdr.params.len(), 2);
        assert_eq!(payload.len(), (8 * 2 + 8 * 5) as usize);
        // First row of block 1 starts right after block 0's payload.
        let block0_len = read_hdr.block_len(0) as usize;
        assert_eq!(payload[block0_len], 1);
    }
}
