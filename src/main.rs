use anyhow::Result;
use clap::Parser;
use drawing_mentor::cli;

fn main() -> Result<()> {
    let args = cli::Args::parse();
    if let Err(err) = cli::dispatch(args) {
        // logging may not be initialised yet (bad config), so report on stderr directly
        eprintln!("error: {:#}", err);
        std::process::exit(1);
    }
    Ok(())
}
