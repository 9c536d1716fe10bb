//! `intake`: serve the listing inquiry endpoint or run submissions by hand.
//!
//! Payloads from the "Request Info" form are validated and pushed into
//! HubSpot as a contact with marketing consent, linked to the listing.

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
