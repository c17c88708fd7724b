mod commands;
mod embedding_args;
mod input_output;
mod logging;

use clap::Parser;
use commands::Commands;

/// tvae: fit a text VAE, then encode or regenerate texts with its saved state.
#[derive(clap::Parser, Debug)]
pub struct Args {
    /// Subcommand to run.
    #[clap(subcommand)]
    pub command: Commands,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    args.command.run()
}
