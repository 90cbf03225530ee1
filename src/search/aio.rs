//! Optional POSIX AIO backend for the compact format, using page-aligned
//! reads at depth `hashes × blocks` (spec.md §4.8). Linux only; gated
//! behind the `aio` feature since `io_submit`/`io_getevents` have no
//! portable equivalent.

#![cfg(target_os = "linux")]

use super::{Metadata, SearchFile};
use crate::error::{CobsError, Result};
use crate::format::compact;
use crate::utils::AlignedBuffer;
use std::fs::File;
use std::os::unix::io::AsRawFd;
use std::path::Path;

#[repr(C)]
#[derive(Clone, Copy)]
struct IoEvent {
    data: u64,
    obj: u64,
    res: i64,
    res2: i64,
}

#[repr(C)]
#[derive(Clone, Copy)]
struct IoCb {
    aio_data: u64,
    aio_key: u32,
    aio_rw_flags: u32,
    aio_lio_opcode: u16,
    aio_reqprio: i16,
    aio_fildes: u32,
    aio_buf: u64,
    aio_nbytes: u64,
    aio_offset: i64,
    aio_reserved2: u64,
    aio_flags: u32,
    aio_resfd: u32,
}

const IOCB_CMD_PREAD: u16 = 0;

type AioContext = u64;

unsafe fn io_setup(nr_events: u32, ctx: &mut AioContext) -> i32 {
    libc::syscall(libc::SYS_io_setup, nr_events, ctx as *mut AioContext) as i32
}

unsafe fn io_destroy(ctx: AioContext) -> i32 {
    libc::syscall(libc::SYS_io_destroy, ctx) as i32
}

unsafe fn io_submit(ctx: AioContext, iocbs: &mut [*mut IoCb]) -> i32 {
    libc::syscall(libc::SYS_io_submit, ctx, iocbs.len() as i64, iocbs.as_mut_ptr()) as i32
}

unsafe fn io_getevents(ctx: AioContext, min_nr: i64, events: &mut [IoEvent]) -> i32 {
    libc::syscall(
        libc::SYS_io_getevents,
        ctx,
        min_nr,
        events.len() as i64,
        events.as_mut_ptr(),
        std::ptr::null_mut::<libc::timespec>(),
    ) as i32
}

/// Requires `page_size % OS page size == 0`, per spec.md §7's usage-error
/// definition for the AIO backend.
pub struct CompactAioFile {
    metadata: Metadata,
    page_size: u64,
    block_offsets: Vec<u64>,
    file: File,
    ctx: AioContext,
}

impl CompactAioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let (header, payload_offset) = compact::read_header(path)?;
        let os_page = page_size();
        if header.page_size % os_page as u64 != 0 {
            return Err(CobsError::usage(format!(
                "page size {} is not a multiple of the OS page size {os_page}",
                header.page_size
            )));
        }

        let file = File::open(path).map_err(CobsError::Io)?;
        let mut ctx: AioContext = 0;
        let ret = unsafe { io_setup(128, &mut ctx) };
        if ret < 0 {
            return Err(CobsError::resource("io_setup failed"));
        }

        let block_offsets = (0..header.params.len())
            .map(|p| payload_offset + header.block_offset(p))
            .collect();
        let metadata = Metadata {
            term_size: header.term_size,
            canonical: header.canonical,
            blocks: header.params.iter().map(|p| (p.sig_size, p.num_hashes)).collect(),
            page_size: header.page_size,
            file_names: header.file_names,
        };

        Ok(Self {
            metadata,
            page_size: header.page_size,
            block_offsets,
            file,
            ctx,
        })
    }

    /// Issues one aligned `g`-byte read per `(block, row)` request
    /// concurrently and waits for all of them — `read_row_slice` uses
    /// this at depth 1; a depth-`hashes × blocks` caller can batch
    /// several requests through the same call (spec.md §4.8).
    fn read_pages(&self, requests: &[(usize, u64)]) -> Result<Vec<AlignedBuffer>> {
        let g = self.page_size as usize;
        let depth = requests.len();
        let mut buffers: Vec<AlignedBuffer> = (0..depth).map(|_| AlignedBuffer::new(g, g)).collect();
        let mut iocbs: Vec<IoCb> = Vec::with_capacity(depth);

        for (idx, &(block, row)) in requests.iter().enumerate() {
            let offset = *self
                .block_offsets
                .get(block)
                .ok_or_else(|| CobsError::usage(format!("block {block} out of range")))?
                as i64
                + (row * self.page_size) as i64;
            iocbs.push(IoCb {
                aio_data: idx as u64,
                aio_key: 0,
                aio_rw_flags: 0,
                aio_lio_opcode: IOCB_CMD_PREAD,
                aio_reqprio: 0,
                aio_fildes: self.file.as_raw_fd() as u32,
                aio_buf: buffers[idx].as_mut_slice().as_mut_ptr() as u64,
                aio_nbytes: g as u64,
                aio_offset: offset,
                aio_reserved2: 0,
                aio_flags: 0,
                aio_resfd: 0,
            });
        }

        let mut iocb_ptrs: Vec<*mut IoCb> = iocbs.iter_mut().map(|c| c as *mut IoCb).collect();
        let submitted = unsafe { io_submit(self.ctx, &mut iocb_ptrs) };
        if submitted < 0 || submitted as usize != depth {
            return Err(CobsError::resource("io_submit failed"));
        }

        let mut events = vec![
            IoEvent {
                data: 0,
                obj: 0,
                res: 0,
                res2: 0
            };
            depth
        ];
        let got = unsafe { io_getevents(self.ctx, depth as i64, &mut events) };
        if got < 0 || got as usize != depth {
            return Err(CobsError::resource("io_getevents failed"));
        }
        for ev in &events {
            if ev.res != g as i64 {
                return Err(CobsError::resource("short AIO read"));
            }
        }

        Ok(buffers)
    }
}

impl SearchFile for CompactAioFile {
    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn read_row_slice(&self, block: usize, row: u64, byte_offset: u64, len: u64) -> Result<Vec<u8>> {
        let pages = self.read_pages(&[(block, row)])?;
        let page = pages[0].as_slice();
        let start = byte_offset as usize;
        let end = start + len as usize;
        page.get(start..end)
            .map(|s| s.to_vec())
            .ok_or_else(|| CobsError::resource("row slice out of range"))
    }
}

impl Drop for CompactAioFile {
    fn drop(&mut self) {
        unsafe {
            io_destroy(self.ctx);
        }
    }
}

fn page_size() -> usize {
    unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
}
