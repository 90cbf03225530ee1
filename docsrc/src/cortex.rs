use crate::bases::unpack;
use crate::error::{DocSrcError, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::PathBuf;

const MAGIC: &[u8; 6] = b"CORTEX";
const VERSION: u32 = 6;

struct CortexHeader {
    kmer_size: u32,
    num_words_per_kmer: u32,
    num_colors: u32,
    data_begin: u64,
    data_end: u64,
}

fn check_magic(r: &mut impl Read, path: &PathBuf) -> Result<()> {
    let mut buf = [0u8; 6];
    r.read_exact(&mut buf)
        .map_err(|e| DocSrcError::io(path.clone(), e))?;
    if &buf != MAGIC {
        return Err(DocSrcError::malformed(path.clone(), "cortex", "magic number not found"));
    }
    Ok(())
}

fn read_header(r: &mut (impl Read + Seek), path: &PathBuf) -> Result<CortexHeader> {
    check_magic(r, path)?;
    let version = r.read_u32::<LittleEndian>().map_err(|e| DocSrcError::io(path.clone(), e))?;
    if version != VERSION {
        return Err(DocSrcError::malformed(
            path.clone(),
            "cortex",
            format!("unsupported version {version}"),
        ));
    }
    let kmer_size = r.read_u32::<LittleEndian>().map_err(|e| DocSrcError::io(path.clone(), e))?;
    let num_words_per_kmer = r.read_u32::<LittleEndian>().map_err(|e| DocSrcError::io(path.clone(), e))?;
    let num_colors = r.read_u32::<LittleEndian>().map_err(|e| DocSrcError::io(path.clone(), e))?;
    if num_colors != 1 {
        return Err(DocSrcError::malformed(
            path.clone(),
            "cortex",
            format!("{num_colors} colors, must be 1"),
        ));
    }

    for _ in 0..num_colors {
        r.read_u32::<LittleEndian>().map_err(|e| DocSrcError::io(path.clone(), e))?; // mean read length
        r.read_u64::<LittleEndian>().map_err(|e| DocSrcError::io(path.clone(), e))?; // total length
    }
    for _ in 0..num_colors {
        let name_len = r.read_u32::<LittleEndian>().map_err(|e| DocSrcError::io(path.clone(), e))?;
        let mut name = vec![0u8; name_len as usize];
        r.read_exact(&mut name).map_err(|e| DocSrcError::io(path.clone(), e))?;
    }
    let mut skip = vec![0u8; 16 * num_colors as usize];
    r.read_exact(&mut skip).map_err(|e| DocSrcError::io(path.clone(), e))?;
    for _ in 0..num_colors {
        let mut ignore12 = [0u8; 12];
        r.read_exact(&mut ignore12).map_err(|e| DocSrcError::io(path.clone(), e))?;
        let graph_name_len = r.read_u32::<LittleEndian>().map_err(|e| DocSrcError::io(path.clone(), e))?;
        let mut graph_name = vec![0u8; graph_name_len as usize];
        r.read_exact(&mut graph_name).map_err(|e| DocSrcError::io(path.clone(), e))?;
    }
    check_magic(r, path)?;

    let data_begin = r.stream_position().map_err(|e| DocSrcError::io(path.clone(), e))?;
    let data_end = r.seek(SeekFrom::End(0)).map_err(|e| DocSrcError::io(path.clone(), e))?;
    r.seek(SeekFrom::Start(data_begin)).map_err(|e| DocSrcError::io(path.clone(), e))?;

    Ok(CortexHeader {
        kmer_size,
        num_words_per_kmer,
        num_colors,
        data_begin,
        data_end,
    })
}

fn decode_kmer(kmer_data: &[u8], kmer_size: usize) -> Vec<u8> {
    let packed_size = (kmer_size + 3) / 4;
    let mut kmer = Vec::with_capacity(kmer_size);
    for i in 0..packed_size {
        let byte = kmer_data[packed_size - 1 - i];
        let bases = unpack(std::slice::from_ref(&byte), 4);
        if i == 0 && kmer_size % 4 != 0 {
            let skip = 4 - (kmer_size % 4);
            kmer.extend_from_slice(&bases[skip..]);
        } else {
            kmer.extend_from_slice(&bases);
        }
    }
    kmer
}

/// Reader for Cortex `.ctx` graph files: version 6, single color, fixed
/// k-mer size. Each stored k-mer is unpacked and, when `term_size` is
/// smaller than the file's own k-mer size, slid across (spec.md §4.3).
pub struct CortexFile {
    path: PathBuf,
}

impl CortexFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn open_header(&self) -> Result<(BufReader<File>, CortexHeader)> {
        let file = File::open(&self.path).map_err(|e| DocSrcError::io(self.path.clone(), e))?;
        let mut reader = BufReader::new(file);
        let header = read_header(&mut reader, &self.path)?;
        Ok((reader, header))
    }

    fn record_size(header: &CortexHeader) -> u64 {
        8 * header.num_words_per_kmer as u64 + 5 * header.num_colors as u64
    }

    fn num_kmers(header: &CortexHeader) -> u64 {
        (header.data_end - header.data_begin) / Self::record_size(header)
    }

    pub fn num_terms(&self, term_size: usize) -> Result<u64> {
        let (_, header) = self.open_header()?;
        let kmer_size = header.kmer_size as usize;
        if term_size > kmer_size {
            return Ok(0);
        }
        Ok(Self::num_kmers(&header) * (kmer_size - term_size + 1) as u64)
    }

    pub fn process_terms(&self, term_size: usize, mut callback: impl FnMut(&[u8])) -> Result<()> {
        let (mut reader, header) = self.open_header()?;
        let kmer_size = header.kmer_size as usize;
        if term_size > kmer_size {
            return Ok(());
        }
        let bytes_per_kmer = 8 * header.num_words_per_kmer as usize;
        let skip_per_record = 5 * header.num_colors as usize;
        let mut kmer_data = vec![0u8; bytes_per_kmer];

        for _ in 0..Self::num_kmers(&header) {
            reader
                .read_exact(&mut kmer_data)
                .map_err(|e| DocSrcError::io(self.path.clone(), e))?;
            let mut skip = vec![0u8; skip_per_record];
            reader
                .read_exact(&mut skip)
                .map_err(|e| DocSrcError::io(self.path.clone(), e))?;

            let kmer = decode_kmer(&kmer_data, kmer_size);
            for w in kmer.windows(term_size) {
                callback(w);
            }
        }
        Ok(())
    }
}
