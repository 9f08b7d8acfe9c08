//! Command line

use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "viking-bridge", version, about = "Viking Bio burner to smart-home attribute bridge", long_about = None)]
pub struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "VIKING_BRIDGE_CONFIG")]
    pub config: Option<PathBuf>,
}
