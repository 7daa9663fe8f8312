use anyhow::Result;
use chatsync::{app, cli::Cli};
use clap::Parser;

fn main() -> Result<()> {
    let cli = Cli::parse();
    app::run(cli)
}
