use clap::Parser;
use console::style;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod config;
mod error;
mod hdiutil;
mod license;
mod platform;
mod probe;
mod updater;

fn main() {
    let cli = cli::Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = commands::update::execute(&cli) {
        eprintln!("{} {e}", style("error:").red().bold());
        std::process::exit(1);
    }
}

// RUST_LOG wins over --verbose.
fn init_logging(verbose: bool) {
    let default = if verbose { "burp_update=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}
