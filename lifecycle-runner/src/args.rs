use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Settings file (TOML). Environment variables `LIFECYCLE__*` override it.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Instrument to trade
    #[arg(long, default_value = "BTCUSD")]
    pub symbol: String,

    /// Signed amount; negative opens a short
    #[arg(long, default_value_t = 0.5, allow_hyphen_values = true)]
    pub amount: f64,

    /// Store file, overrides `store_path` from the settings
    #[arg(long)]
    pub store: Option<PathBuf>,

    /// How long to hold the position before closing it
    #[arg(long, default_value_t = 0)]
    pub hold_ms: u64,
}
