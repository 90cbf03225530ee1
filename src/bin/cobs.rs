use clap::{Parser, Subcommand};
use cobs::build::classic::{self, ClassicBuildParams};
use cobs::build::compact::{self, CompactBuildParams};
use cobs::build::load_document_entries;
use cobs::env::Environment;
use cobs::error::CobsError;
use cobs::query::{query_multi, QueryOptions};
use cobs::search::{IndexFile, SearchFile};
use docsrc::scan_documents;
use std::path::PathBuf;
use std::time::Instant;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Approximate membership index for DNA sequence document collections")]
struct Args {
    #[clap(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build a classic (single-file) index from a directory of documents.
    BuildClassic(BuildClassicArgs),
    /// Build a compact (multi-parameter-block) index from a directory of documents.
    BuildCompact(BuildCompactArgs),
    /// Query one or more indexes with a sequence.
    Query(QueryArgs),
    /// Print an index's header fields without loading its payload.
    Inspect(InspectArgs),
}

#[derive(Parser, Debug)]
struct BuildClassicArgs {
    /// Directory of input documents.
    #[arg(long)]
    input_dir: PathBuf,
    /// Output index path.
    #[arg(long)]
    output: PathBuf,
    /// Scratch directory for intermediate batches.
    #[arg(long, default_value = "/tmp/cobs-build")]
    work_dir: PathBuf,
    #[arg(short = 'k', long, default_value_t = 31)]
    term_size: usize,
    #[arg(long, default_value_t = true)]
    canonical: bool,
    #[arg(long = "hashes", default_value_t = 3)]
    num_hashes: u64,
    #[arg(long = "fpr", default_value_t = 0.01)]
    false_positive_rate: f64,
    #[arg(long)]
    signature_size: Option<u64>,
    #[arg(long, default_value_t = 256 * 1024 * 1024)]
    mem_budget_bytes: u64,
    #[arg(long)]
    clobber: bool,
    #[arg(long = "continue")]
    continue_: bool,
}

#[derive(Parser, Debug)]
struct BuildCompactArgs {
    #[arg(long)]
    input_dir: PathBuf,
    #[arg(long)]
    output: PathBuf,
    /// Scratch directory for each bucket's classic sub-index build.
    #[arg(long, default_value = "/tmp/cobs-build-compact")]
    work_dir: PathBuf,
    #[arg(short = 'k', long, default_value_t = 31)]
    term_size: usize,
    #[arg(long, default_value_t = true)]
    canonical: bool,
    #[arg(long = "hashes", default_value_t = 3)]
    num_hashes: u64,
    #[arg(long = "fpr", default_value_t = 0.01)]
    false_positive_rate: f64,
    #[arg(long, default_value_t = 1 << 16)]
    page_size: u64,
    #[arg(long, default_value_t = 256 * 1024 * 1024)]
    mem_budget_bytes: u64,
    #[arg(long)]
    clobber: bool,
    #[arg(long = "continue")]
    continue_: bool,
}

#[derive(Parser, Debug)]
struct QueryArgs {
    /// One or more index files, searched together.
    #[arg(long = "index", required = true, num_args = 1..)]
    indexes: Vec<PathBuf>,
    #[arg(long)]
    sequence: String,
    #[arg(long, default_value_t = 0.0)]
    threshold: f64,
    #[arg(long, default_value_t = 0)]
    limit: usize,
    #[arg(long)]
    load_complete_index: bool,
    /// Opens compact indexes through the POSIX AIO backend (requires the
    /// `aio` feature).
    #[cfg(feature = "aio")]
    #[arg(long)]
    use_aio: bool,
}

#[derive(Parser, Debug)]
struct InspectArgs {
    #[arg(long)]
    index: PathBuf,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    match args.cmd {
        Commands::BuildClassic(a) => run_build_classic(a)?,
        Commands::BuildCompact(a) => run_build_compact(a)?,
        Commands::Query(a) => run_query(a)?,
        Commands::Inspect(a) => run_inspect(a)?,
    }
    Ok(())
}

fn run_build_classic(a: BuildClassicArgs) -> Result<(), CobsError> {
    let entries = scan_documents(&a.input_dir, docsrc::FileType::Any, a.term_size)?;
    let docs = load_document_entries(entries, a.term_size)?;
    log::info!("building classic index over {} documents", docs.len());

    let params = ClassicBuildParams {
        k: a.term_size,
        canonical: a.canonical,
        num_hashes: a.num_hashes,
        false_positive_rate: a.false_positive_rate,
        signature_size: a.signature_size,
        mem_budget_bytes: a.mem_budget_bytes,
        clobber: a.clobber,
        continue_: a.continue_,
    };

    let start = Instant::now();
    classic::build(&docs, &a.output, &a.work_dir, &params)?;
    log::info!("build finished in {:?}", start.elapsed());
    Ok(())
}

fn run_build_compact(a: BuildCompactArgs) -> Result<(), CobsError> {
    let entries = scan_documents(&a.input_dir, docsrc::FileType::Any, a.term_size)?;
    let docs = load_document_entries(entries, a.term_size)?;
    log::info!("building compact index over {} documents", docs.len());

    let params = CompactBuildParams {
        k: a.term_size,
        canonical: a.canonical,
        num_hashes: a.num_hashes,
        false_positive_rate: a.false_positive_rate,
        page_size: a.page_size,
        mem_budget_bytes: a.mem_budget_bytes,
        clobber: a.clobber,
        continue_: a.continue_,
    };

    let start = Instant::now();
    compact::build(&docs, &a.output, &a.work_dir, &params)?;
    log::info!("build finished in {:?}", start.elapsed());
    Ok(())
}

fn run_query(a: QueryArgs) -> Result<(), CobsError> {
    #[cfg(feature = "aio")]
    let env = Environment {
        load_complete_index: a.load_complete_index,
        use_aio: a.use_aio,
        ..Environment::default()
    };
    #[cfg(not(feature = "aio"))]
    let env = Environment {
        load_complete_index: a.load_complete_index,
        ..Environment::default()
    };
    let opened: Vec<IndexFile> = a
        .indexes
        .iter()
        .map(|p| IndexFile::open(p, &env))
        .collect::<Result<_, _>>()?;
    let refs: Vec<&dyn SearchFile> = opened.iter().map(|f| f as &dyn SearchFile).collect();

    let opts = QueryOptions {
        threshold: a.threshold,
        limit: a.limit,
    };
    let hits = query_multi(&refs, a.sequence.as_bytes(), &opts)?;
    for hit in hits {
        println!("{}\t{}", hit.score, hit.name);
    }
    Ok(())
}

fn run_inspect(a: InspectArgs) -> Result<(), CobsError> {
    let index = IndexFile::open(&a.index, &Environment::default())?;
    let meta = index.metadata();
    println!("term_size: {}", meta.term_size);
    println!("canonical: {}", meta.canonical);
    println!("num_blocks: {}", meta.num_blocks());
    println!("total_columns: {}", meta.total_columns());
    for (p, &(sig_size, num_hashes)) in meta.blocks.iter().enumerate() {
        println!("block {p}: sig_size={sig_size} num_hashes={num_hashes}");
    }
    Ok(())
}
