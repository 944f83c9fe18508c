//! PharmAI CLI: drug label structuring tool.
//!
//! Turns Spanish summary-of-product-characteristics text files into
//! structured JSON records and prepares them for a retrieval assistant.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
