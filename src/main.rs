use clap::Parser;
use tidywatch::cli::{self, WatchArgs};
use tidywatch::output::OutputFormatter;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = WatchArgs::parse();

    OutputFormatter::info(&format!(
        "tidywatch - sorting {} using rules from {}",
        args.directory.display(),
        args.config.display()
    ));
    if args.dry_run {
        OutputFormatter::dry_run_notice("No files will be moved.");
    }

    if let Err(e) = cli::run(args) {
        OutputFormatter::error(&e);
        std::process::exit(1);
    }
}
