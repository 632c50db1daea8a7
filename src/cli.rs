use crate::domain::constants::{DEFAULT_BURST, DEFAULT_TIMEOUT_SECS};
use crate::domain::models::AssuranceLevel;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "trqp-tspp",
    version,
    about = "TSPP-TRQP-0.1 conformance engine for Trust Registry Query Protocol deployments"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Output machine-readable JSON")]
    pub json: bool,
    #[arg(
        long,
        global = true,
        env = "RUST_LOG",
        default_value = "warn",
        help = "Log filter (tracing EnvFilter syntax); logs go to stderr"
    )]
    pub log_level: String,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Probe a SUT and emit the conformance report.
    Run(RunArgs),
    /// Print the check -> requirement traceability table.
    Checks,
    /// Verify a saved response envelope against a saved JWKS document.
    Verify {
        #[arg(long, help = "Signed response body (JSON file)")]
        envelope: PathBuf,
        #[arg(long, help = "Key set document with a `keys` array (JSON file)")]
        jwks: PathBuf,
    },
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[arg(long, env = "TRQP_BASE_URL", help = "Base URL of the system under test")]
    pub base_url: String,
    #[arg(long, env = "TRQP_BEARER_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
    #[arg(
        long,
        env = "TRQP_DPOP",
        hide_env_values = true,
        help = "Proof-of-possession header value passed through as DPoP"
    )]
    pub dpop: Option<String>,
    #[arg(long, env = "TSPP_EXPECT_AL", help = "Expected assurance level (AL1..AL4)")]
    pub expect_al: Option<AssuranceLevel>,
    #[arg(long, env = "TSPP_REPORT_PATH", help = "Write the JSON report here")]
    pub report: Option<PathBuf>,
    #[arg(long, env = "TSPP_QUERIES", help = "Override the bundled query fixtures")]
    pub queries: Option<PathBuf>,
    #[arg(long, env = "TSPP_BRIDGE_FIXTURES")]
    pub bridge_fixtures: Option<PathBuf>,
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,
    #[arg(long, default_value_t = 1, help = "Worker threads for non-exclusive checks")]
    pub jobs: usize,
    #[arg(long, help = "Skip checks not yet started after this many seconds")]
    pub deadline_secs: Option<u64>,
    #[arg(long, default_value_t = DEFAULT_BURST, help = "Request cap for the 429 probe")]
    pub burst: usize,
}
