//! Process-level configuration, carried explicitly rather than as global
//! mutable state (spec.md §9 "Global mutable state").

/// The two flags that affect I/O strategy, plus the thread pool size used
/// by build and query. Passed into constructors instead of living behind
/// a `OnceCell` singleton, so tests can exercise both settings side by
/// side.
#[derive(Debug, Clone, Copy)]
pub struct Environment {
    /// Forces a full read into an aligned buffer instead of lazy mmap.
    pub load_complete_index: bool,
    /// Suppresses the FASTA/FASTQ sidecar term-count cache.
    pub disable_cache: bool,
    pub threads: usize,
    /// Opens compact indexes through the POSIX AIO backend instead of mmap.
    #[cfg(feature = "aio")]
    pub use_aio: bool,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            load_complete_index: false,
            disable_cache: false,
            threads: num_cpus::get(),
            #[cfg(feature = "aio")]
            use_aio: false,
        }
    }
}

impl Environment {
    pub fn new(load_complete_index: bool, disable_cache: bool, threads: usize) -> Self {
        Self {
            load_complete_index,
            disable_cache,
            threads: threads.max(1),
            ..Self::default()
        }
    }
}
