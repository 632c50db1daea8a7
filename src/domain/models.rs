use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Serialize)]
pub struct JsonOut<T: Serialize> {
    pub ok: bool,
    pub data: T,
}

/// Ordered assurance tiers; higher tiers add controls on top of lower ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AssuranceLevel {
    #[serde(rename = "AL1")]
    Al1,
    #[serde(rename = "AL2")]
    Al2,
    #[serde(rename = "AL3")]
    Al3,
    #[serde(rename = "AL4")]
    Al4,
}

impl AssuranceLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Al1 => "AL1",
            Self::Al2 => "AL2",
            Self::Al3 => "AL3",
            Self::Al4 => "AL4",
        }
    }
}

impl fmt::Display for AssuranceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssuranceLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AL1" => Ok(Self::Al1),
            "AL2" => Ok(Self::Al2),
            "AL3" => Ok(Self::Al3),
            "AL4" => Ok(Self::Al4),
            other => Err(format!("unknown assurance level: {other} (expected AL1..AL4)")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeOperation {
    Authorization,
    Recognition,
    Metadata,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignaturePreference {
    None,
    Jws,
}

impl SignaturePreference {
    pub fn as_header(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Jws => "jws",
        }
    }
}

#[derive(Clone, Debug)]
pub struct ProbeRequest {
    pub operation: ProbeOperation,
    pub body: Option<Value>,
    pub signature: SignaturePreference,
}

impl ProbeRequest {
    pub fn metadata() -> Self {
        Self {
            operation: ProbeOperation::Metadata,
            body: None,
            signature: SignaturePreference::None,
        }
    }

    pub fn authorization(body: Value, signature: SignaturePreference) -> Self {
        Self {
            operation: ProbeOperation::Authorization,
            body: Some(body),
            signature,
        }
    }

    pub fn recognition(body: Value, signature: SignaturePreference) -> Self {
        Self {
            operation: ProbeOperation::Recognition,
            body: Some(body),
            signature,
        }
    }
}

/// Captured HTTP exchange. Header names are stored lowercased.
#[derive(Clone, Debug)]
pub struct ProbeResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
    /// `None` when the body is not JSON; callers report that, it is not an error.
    pub json: Option<Value>,
    pub request_id: String,
    pub elapsed: Duration,
}

impl ProbeResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn json_object(&self) -> Option<&Map<String, Value>> {
        self.json.as_ref().and_then(Value::as_object)
    }

    pub fn body_snippet(&self, limit: usize) -> String {
        String::from_utf8_lossy(&self.body)
            .chars()
            .take(limit)
            .collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeKind {
    Pass,
    Fail,
    Skip,
    NotApplicable,
    Error,
    Xfail,
}

impl OutcomeKind {
    pub const ALL: [OutcomeKind; 6] = [
        Self::Pass,
        Self::Fail,
        Self::Skip,
        Self::NotApplicable,
        Self::Error,
        Self::Xfail,
    ];

    /// FAIL and ERROR make a run non-conformant; everything else does not.
    pub fn is_blocking(self) -> bool {
        matches!(self, Self::Fail | Self::Error)
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Skip => "SKIP",
            Self::NotApplicable => "NOT_APPLICABLE",
            Self::Error => "ERROR",
            Self::Xfail => "XFAIL",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckOutcome {
    pub check_id: String,
    pub name: String,
    pub outcome: OutcomeKind,
    pub duration_seconds: f64,
    pub requirement_ids: Vec<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportTarget {
    pub base_url: String,
    pub expected_assurance_level: Option<AssuranceLevel>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReportSummary {
    pub exit_status: i32,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub not_applicable: usize,
    pub error: usize,
    pub xfailed: usize,
    pub total: usize,
}

impl ReportSummary {
    pub fn count(&self, kind: OutcomeKind) -> usize {
        match kind {
            OutcomeKind::Pass => self.passed,
            OutcomeKind::Fail => self.failed,
            OutcomeKind::Skip => self.skipped,
            OutcomeKind::NotApplicable => self.not_applicable,
            OutcomeKind::Error => self.error,
            OutcomeKind::Xfail => self.xfailed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConformanceReport {
    pub profile: String,
    pub generated_at: String,
    pub target: ReportTarget,
    pub summary: ReportSummary,
    pub results: Vec<CheckOutcome>,
}

impl ConformanceReport {
    pub fn conformant(&self) -> bool {
        self.summary.exit_status == 0
    }
}

/// Blocks of `/.well-known/trqp-metadata` that a single check owns. Each
/// block is read on its own; the bundled schema decides what is mandatory.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransparencyDecl {
    pub change_log_uri: Option<String>,
    pub published_at: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeyProtectionDecl {
    pub protection: Option<String>,
    pub evidence_uri: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MonitoringDecl {
    pub evidence_retention_days: Option<Value>,
    pub incident_contact: Option<Value>,
    pub runbook_uri: Option<String>,
}

/// Named request bodies the probes send.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryFixtures {
    pub authorization_valid: Value,
    pub recognition_valid: Value,
    pub authorization_unknown_entity: Value,
    pub authorization_with_unknown_context_key: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BridgeFixtures {
    #[serde(default)]
    pub cases: Vec<BridgeCase>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BridgeCase {
    pub query: Value,
    pub expected: Map<String, Value>,
}

#[derive(Serialize, Clone)]
pub struct CheckListing {
    pub check_id: String,
    pub name: String,
    pub applicability: String,
    pub exclusive: bool,
    pub requirement_ids: Vec<String>,
}

/// Result of the offline `verify` command.
#[derive(Serialize)]
pub struct VerifyReport {
    pub signed: bool,
    pub key_count: usize,
    pub verified: bool,
    pub kid: Option<String>,
    pub payload_bound: Option<bool>,
    pub query_hash_bound: Option<bool>,
    pub reason: Option<String>,
}
