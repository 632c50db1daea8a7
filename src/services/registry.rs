use crate::domain::errors::CheckError;
use crate::domain::models::{AssuranceLevel, CheckListing};
use crate::services::checks::standard_checks;
use crate::services::client::TrqpClient;
use crate::services::config::SuiteSettings;
use std::collections::{BTreeMap, HashMap};

/// `Ok(note)` is a PASS; every other outcome travels as a [`CheckError`].
pub type CheckResult = Result<Option<String>, CheckError>;
pub type CheckFn = fn(&CheckContext<'_>) -> CheckResult;

/// What a check may touch while it runs. Both parts are read-only, so one
/// context is shared by every worker.
pub struct CheckContext<'a> {
    pub client: &'a TrqpClient,
    pub settings: &'a SuiteSettings,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applicability {
    All,
    Al1Plus,
    Al2Plus,
    Al3Plus,
    Al4Only,
}

impl Applicability {
    pub fn admits(self, level: AssuranceLevel) -> bool {
        match self {
            Self::All | Self::Al1Plus => true,
            Self::Al2Plus => level >= AssuranceLevel::Al2,
            Self::Al3Plus => level >= AssuranceLevel::Al3,
            Self::Al4Only => level == AssuranceLevel::Al4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::All => "ALL",
            Self::Al1Plus => "AL1+",
            Self::Al2Plus => "AL2+",
            Self::Al3Plus => "AL3+",
            Self::Al4Only => "AL4-only",
        }
    }
}

pub struct RequirementCheck {
    pub id: &'static str,
    pub name: &'static str,
    pub requirement_ids: &'static [&'static str],
    pub applicability: Applicability,
    /// Burst probes that need the SUT's rate-limit window to themselves.
    pub exclusive: bool,
    pub run: CheckFn,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Run,
    Skip(String),
}

pub fn gate(check: &RequirementCheck, level: AssuranceLevel) -> GateDecision {
    if check.applicability.admits(level) {
        GateDecision::Run
    } else {
        GateDecision::Skip(format!(
            "applies at {}; expected assurance level is {}",
            check.applicability.label(),
            level
        ))
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum RegistryError {
    #[error("duplicate check id: {0}")]
    DuplicateCheck(String),
    #[error("check {0} is not associated with any requirement")]
    Untraced(String),
}

/// Ordered check table plus the check id -> requirement ids association,
/// both fixed at construction.
pub struct Registry {
    checks: Vec<RequirementCheck>,
    positions: HashMap<&'static str, usize>,
    requirements: BTreeMap<&'static str, Vec<String>>,
}

impl Registry {
    pub fn new(checks: Vec<RequirementCheck>) -> Result<Self, RegistryError> {
        let mut positions = HashMap::new();
        let mut requirements = BTreeMap::new();
        for (index, check) in checks.iter().enumerate() {
            if positions.insert(check.id, index).is_some() {
                return Err(RegistryError::DuplicateCheck(check.id.to_string()));
            }
            if check.requirement_ids.is_empty() {
                return Err(RegistryError::Untraced(check.id.to_string()));
            }
            requirements.insert(
                check.id,
                check.requirement_ids.iter().map(|r| r.to_string()).collect(),
            );
        }
        Ok(Self {
            checks,
            positions,
            requirements,
        })
    }

    /// The TSPP-TRQP-0.1 suite in declaration order.
    pub fn standard() -> Result<Self, RegistryError> {
        Self::new(standard_checks())
    }

    pub fn checks(&self) -> &[RequirementCheck] {
        &self.checks
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    pub fn requirements_for(&self, check_id: &str) -> &[String] {
        self.requirements
            .get(check_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Declaration index; unknown ids sort last.
    pub fn position(&self, check_id: &str) -> usize {
        self.positions.get(check_id).copied().unwrap_or(usize::MAX)
    }

    pub fn listing(&self) -> Vec<CheckListing> {
        self.checks
            .iter()
            .map(|c| CheckListing {
                check_id: c.id.to_string(),
                name: c.name.to_string(),
                applicability: c.applicability.label().to_string(),
                exclusive: c.exclusive,
                requirement_ids: self.requirements_for(c.id).to_vec(),
            })
            .collect()
    }
}
