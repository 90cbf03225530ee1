use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, Read, Seek};
use std::path::Path;

/// Default read-buffer size for all document readers.
pub const BUFSIZE: usize = 8 * 1024 * 1024;

pub fn open_file<P: AsRef<Path>>(path: P) -> io::Result<File> {
    File::open(&path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            io::Error::new(e.kind(), format!("file not found: {:?}", path.as_ref()))
        } else {
            e
        }
    })
}

fn is_gzipped(file: &mut File) -> io::Result<bool> {
    let mut buffer = [0u8; 2];
    if file.read(&mut buffer)? < 2 {
        file.rewind()?;
        return Ok(false);
    }
    file.rewind()?;
    Ok(buffer == [0x1F, 0x8B])
}

/// Opens `path` and transparently wraps it in a gzip decoder if the file
/// starts with the gzip magic bytes.
pub fn dyn_reader<P: AsRef<Path>>(path: P) -> io::Result<Box<dyn Read + Send>> {
    let mut file = open_file(path)?;
    if is_gzipped(&mut file)? {
        Ok(Box::new(GzDecoder::new(file)))
    } else {
        Ok(Box::new(file))
    }
}

/// Strips trailing `\n`/`\r` bytes in place.
pub fn trim_end(buffer: &mut Vec<u8>) {
    while let Some(&b'\n' | &b'\r') = buffer.last() {
        buffer.pop();
    }
}
