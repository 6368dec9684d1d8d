use bn254_ntt::{
    batch::{BatchExecutor, BatchStrategy},
    device::Queue,
    errors::NttError,
};
use clap::Parser;
use tracing_forest::{ForestLayer, util::LevelFilter};
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log2 of the transform size.
    #[arg(short = 'd', long, default_value = "18")]
    log2_dim: u32,

    /// Number of transforms per batch.
    #[arg(short = 'r', long, default_value = "4")]
    rounds: usize,

    /// Work-group size handed to every kernel.
    #[arg(short = 'w', long, default_value = "32")]
    wg_size: usize,

    /// Rounds in flight at once under the cohort strategy.
    #[arg(short = 'c', long, default_value = "4")]
    cohort_width: usize,
}

fn main() -> Result<(), NttError> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    Registry::default()
        .with(env_filter)
        .with(ForestLayer::default())
        .init();

    let args = Args::parse();
    let dim = 1usize << args.log2_dim;
    let queue = Queue::new();

    let strategies = [
        BatchStrategy::SharedInput,
        BatchStrategy::Cohort { width: args.cohort_width },
        BatchStrategy::IndependentInput,
    ];
    for strategy in strategies {
        let report = BatchExecutor::new(strategy).run(&queue, args.rounds, dim, args.wg_size)?;
        tracing::info!(
            ?strategy,
            rounds = args.rounds,
            dim,
            elapsed_us = report.elapsed_micros(),
            "batch complete"
        );
    }
    Ok(())
}
