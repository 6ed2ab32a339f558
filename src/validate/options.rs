use clap::Parser;

/// Options for the empirical Monte-Carlo validator.
#[derive(Clone, Debug, Parser)]
pub struct ValidateOptions {
    #[arg(short, long)]
    pub log_level: Option<String>,

    #[arg(short, long)]
    pub size: usize,

    #[arg(short, long)]
    pub p4: f64,

    /// Number of simulated games to play.
    #[arg(short, long, default_value_t = 1000)]
    pub games: u64,

    /// `memory` or `sqlite`.
    #[arg(long, default_value = "memory")]
    pub store: String,

    /// Sqlite file path; defaults to the standard `2048_tb_<N>-<p4>.sqlite` naming.
    #[arg(long)]
    pub path: Option<String>,
}
