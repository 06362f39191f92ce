//! musabi CLI: synthesize the musabi stack.

use clap::Parser;
use musabi::cli::Cli;

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = musabi::cli::dispatch(cli.command.unwrap_or_default()) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
