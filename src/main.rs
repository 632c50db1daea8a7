use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use trqp_tspp::cli::Cli;
use trqp_tspp::commands::{handle_checks_command, handle_run_command, handle_verify_command};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so `--json` stdout stays parseable.
    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    if handle_run_command(&cli)? {
        return Ok(());
    }
    if handle_checks_command(&cli)? {
        return Ok(());
    }
    handle_verify_command(&cli)?;
    Ok(())
}
