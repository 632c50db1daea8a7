use crate::cli::RunArgs;
use crate::domain::constants::DEFAULT_BURST;
use crate::domain::models::{AssuranceLevel, BridgeFixtures, QueryFixtures, ReportTarget};
use crate::services::client::ClientConfig;
use anyhow::Context;
use std::path::{Path, PathBuf};
use std::time::Duration;

const BUNDLED_QUERIES: &str = include_str!("../../fixtures/queries.json");

/// Read-only inputs every check sees.
#[derive(Debug, Clone)]
pub struct SuiteSettings {
    pub expected_level: Option<AssuranceLevel>,
    pub queries: QueryFixtures,
    pub bridge_fixtures: Option<BridgeFixtures>,
    /// Upper bound on requests the rate-limit probe may issue.
    pub burst: usize,
}

impl SuiteSettings {
    pub fn new(expected_level: Option<AssuranceLevel>) -> anyhow::Result<Self> {
        Ok(Self {
            expected_level,
            queries: bundled_queries()?,
            bridge_fixtures: None,
            burst: DEFAULT_BURST,
        })
    }

    /// Level used to gate checks. Without an expectation only baseline
    /// checks are mandatory.
    pub fn gating_level(&self) -> AssuranceLevel {
        self.expected_level.unwrap_or(AssuranceLevel::Al1)
    }
}

pub fn bundled_queries() -> anyhow::Result<QueryFixtures> {
    serde_json::from_str(BUNDLED_QUERIES).context("bundled query fixtures are invalid")
}

pub fn load_queries(path: Option<&Path>) -> anyhow::Result<QueryFixtures> {
    let Some(path) = path else {
        return bundled_queries();
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read query fixtures {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse query fixtures {}", path.display()))
}

pub fn load_bridge_fixtures(path: &Path) -> anyhow::Result<BridgeFixtures> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read bridge fixtures {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse bridge fixtures {}", path.display()))
}

/// Everything one `run` needs, resolved from flags and environment.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub client: ClientConfig,
    pub suite: SuiteSettings,
    pub jobs: usize,
    pub deadline: Option<Duration>,
    pub report_path: Option<PathBuf>,
}

impl RunConfig {
    pub fn from_args(args: &RunArgs) -> anyhow::Result<Self> {
        let base_url = args.base_url.trim();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            anyhow::bail!("base url must be http(s): {}", base_url);
        }
        if args.timeout_secs == 0 {
            anyhow::bail!("--timeout-secs must be at least 1");
        }
        let bridge_fixtures = args
            .bridge_fixtures
            .as_deref()
            .map(load_bridge_fixtures)
            .transpose()?;
        Ok(Self {
            client: ClientConfig {
                base_url: base_url.to_string(),
                token: non_empty(args.token.as_deref()),
                dpop: non_empty(args.dpop.as_deref()),
                timeout: Duration::from_secs(args.timeout_secs),
            },
            suite: SuiteSettings {
                expected_level: args.expect_al,
                queries: load_queries(args.queries.as_deref())?,
                bridge_fixtures,
                burst: args.burst.max(1),
            },
            jobs: args.jobs.max(1),
            deadline: args.deadline_secs.map(Duration::from_secs),
            report_path: args.report.clone(),
        })
    }

    pub fn target(&self) -> ReportTarget {
        ReportTarget {
            base_url: self.client.base_url.trim_end_matches('/').to_string(),
            expected_assurance_level: self.suite.expected_level,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
