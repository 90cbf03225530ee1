//! Ambient helpers shared by the build and search paths, grounded in the
//! same small utility surface most CLI-adjacent Rust crates carry.

/// Formats a byte count as a human-readable size, for log lines.
pub fn format_bytes(size: f64) -> String {
    let suffixes = ["B", "KB", "MB", "GB", "TB", "PB", "EB"];
    let mut size = size;
    let mut current_suffix = &suffixes[0];

    for suffix in &suffixes[1..] {
        if size >= 1024.0 {
            current_suffix = suffix;
            size /= 1024.0;
        } else {
            break;
        }
    }

    format!("{:.2}{}", size, current_suffix)
}

#[cfg(unix)]
pub fn get_file_limit() -> usize {
    let mut limits = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    let result = unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut limits) };
    if result == 0 {
        limits.rlim_cur as usize
    } else {
        0
    }
}

#[cfg(unix)]
pub fn set_fd_limit(new_limit: u64) -> std::io::Result<()> {
    let rlim = libc::rlimit {
        rlim_cur: new_limit,
        rlim_max: new_limit,
    };
    let ret = unsafe { libc::setrlimit(libc::RLIMIT_NOFILE, &rlim) };
    if ret != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(windows)]
pub fn get_file_limit() -> usize {
    8192
}

#[cfg(windows)]
pub fn set_fd_limit(_new_limit: u64) -> std::io::Result<()> {
    Ok(())
}

/// Rounds `len` up to the next multiple of `align` (`align` must be a
/// power of two) — used for the SIMD scratch and AIO page-aligned
/// buffers (spec.md §9 "manual memory / aligned buffers").
pub fn align_up(len: usize, align: usize) -> usize {
    (len + align - 1) & !(align - 1)
}

/// The default alignment for `load_complete_index` reads: large enough
/// to satisfy `O_DIRECT` on every common filesystem and to keep a whole
/// index off the regular page cache.
pub const LOAD_COMPLETE_ALIGNMENT: usize = 2 * 1024 * 1024;

/// An over-allocate-and-offset buffer aligned to `alignment`, for
/// `O_DIRECT`-friendly reads and SIMD-friendly scratch (spec.md §9
/// "manual memory / aligned buffers").
pub struct AlignedBuffer {
    raw: Vec<u8>,
    offset: usize,
    len: usize,
}

impl AlignedBuffer {
    pub fn new(len: usize, alignment: usize) -> Self {
        let mut raw = vec![0u8; len + alignment];
        let addr = raw.as_ptr() as usize;
        let offset = align_up(addr, alignment) - addr;
        raw.truncate(len + alignment);
        Self { raw, offset, len }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.raw[self.offset..self.offset + self.len]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.raw[self.offset..self.offset + self.len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_kilobytes_and_megabytes() {
        assert_eq!(format_bytes(512.0), "512.00B");
        assert_eq!(format_bytes(2048.0), "2.00KB");
        assert_eq!(format_bytes(3.0 * 1024.0 * 1024.0), "3.00MB");
    }

    #[test]
    fn align_up_rounds_to_next_page() {
        assert_eq!(align_up(1, 4096), 4096);
        assert_eq!(align_up(4096, 4096), 4096);
        assert_eq!(align_up(4097, 4096), 8192);
    }

    #[test]
    fn aligned_buffer_is_aligned_and_sized() {
        let buf = AlignedBuffer::new(1000, 4096);
        assert_eq!(buf.as_slice().len(), 1000);
        assert_eq!(buf.as_slice().as_ptr() as usize % 4096, 0);
    }
}
