use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use flexi_logger::{AdaptiveFormat, Logger, WriteMode};
use lib_tb2048::prelude::*;
use lib_tb2048::tablebase::store::sqlite::default_filename;

/// Batch-builds a tablebase to completion (or until interrupted), checkpointing
/// progress to the chosen backend so the build can be resumed later.
#[derive(Clone, Debug, Parser)]
struct BuildTbOptions {
    #[arg(short, long)]
    log_level: Option<String>,

    #[arg(short, long)]
    size: usize,

    #[arg(short, long)]
    p4: f64,

    /// `memory` or `sqlite`.
    #[arg(long, default_value = "memory")]
    store: String,

    /// Sqlite file path; defaults to the standard `2048_tb_<N>-<p4>.sqlite` naming.
    #[arg(long)]
    path: Option<String>,

    /// Units of work per `partial_init` call.
    #[arg(short, long, default_value_t = 10_000)]
    batch: u64,

    #[arg(long)]
    max_depth: Option<u32>,
}

fn main() -> Result<()> {
    let options = BuildTbOptions::parse();
    let _logger = Logger::try_with_env_or_str(options.log_level.clone().unwrap_or("info".into()).as_str())?
        .write_mode(WriteMode::BufferAndFlush)
        .log_to_stderr()
        .adaptive_format_for_stderr(
            match cfg!(debug_assertions) {
                true => AdaptiveFormat::WithThread,
                _    => AdaptiveFormat::Default
            })
        .set_palette("b196;208;195;111;67".to_owned())
        .start()?;

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = interrupted.clone();
        ctrlc::set_handler(move || interrupted.store(true, Ordering::SeqCst)).context("installing SIGINT handler")?;
    }

    let store: Box<dyn GraphStore> = match options.store.as_str() {
        "memory" => Box::new(InMemoryStore::new()),
        "sqlite" => {
            let path = options.path.clone().unwrap_or_else(|| default_filename(options.size, options.p4));
            log::info!("buildtb: opening sqlite tablebase at {path}");
            Box::new(SqliteStore::open(&path, options.size)?)
        }
        other => return Err(anyhow!("unknown store backend {other:?}; expected \"memory\" or \"sqlite\"")),
    };
    let mut engine = TablebaseEngine::new(store, options.size, options.p4)?;

    let mut batches = 0u64;
    loop {
        if interrupted.load(Ordering::SeqCst) {
            log::info!("buildtb: interrupted, stopping at a clean batch boundary");
            break;
        }
        let done = engine.partial_init(options.batch, options.max_depth)?;
        batches += 1;
        log::info!("buildtb: completed batch {batches} ({} nodes so far)", engine.store().node_count()?);
        if done {
            log::info!("buildtb: build complete");
            break;
        }
    }
    Ok(())
}
