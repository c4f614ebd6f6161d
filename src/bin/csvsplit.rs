use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

use kqlget::logging::init_tracing;
use kqlget::split::{split_csv, DEFAULT_SEED};

/// Randomly split INPUT_FILE into TRAIN_FILE and TEST_FILE with TEST_RATIO
/// between 0.0 and 1.0.
#[derive(Parser, Debug)]
#[command(name = "csvsplit", version, about, long_about = None)]
struct Cli {
    input_file: PathBuf,
    test_ratio: f64,
    train_file: PathBuf,
    test_file: PathBuf,

    /// Random seed
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,
}

fn main() {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();

    match split_csv(
        &cli.input_file,
        cli.test_ratio,
        &cli.train_file,
        &cli.test_file,
        cli.seed,
    ) {
        Ok(stats) => info!(
            train_rows = stats.train_rows,
            test_rows = stats.test_rows,
            "Split complete"
        ),
        Err(e) => {
            error!(kind = e.kind(), error = %e, "csvsplit failed");
            std::process::exit(e.exit_code());
        }
    }
}
