//! Main entry point for the holocron CLI.

use clap::Parser;
use holocron_cli::Cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("holocron=debug")
    } else if cli.quiet {
        EnvFilter::new("holocron=error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "holocron=info".into())
    };
    // Responses go to stdout, so logs stay on stderr.
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match holocron_cli::run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(report) => {
            eprintln!("{report:?}");
            std::process::exit(1);
        }
    }
}
