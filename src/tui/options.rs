use clap::Parser;

/// Options for the interactive terminal front-end.
#[derive(Clone, Debug, Parser)]
pub struct TuiOptions {
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Initial board side, `2..=8`.
    #[arg(short, long, default_value_t = 4)]
    pub size: usize,

    /// Probability that a spawned tile is "4" rather than "2".
    #[arg(short, long, default_value_t = 0.1)]
    pub p4: f64,
}
