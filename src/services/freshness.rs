use crate::domain::constants::RATE_LIMIT_HEADERS;
use crate::domain::errors::{FreshnessError, TransportError};
use crate::domain::models::ProbeResponse;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Parsed `meta` block that passed [`assert_freshness`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessWindow {
    pub time_evaluated: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Loose shape test: a `T` date/time separator and a zone designator after it.
fn iso8601_like(s: &str) -> bool {
    let Some((_, time)) = s.split_once(['T', 't']) else {
        return false;
    };
    time.ends_with(['Z', 'z']) || time.contains(['+', '-'])
}

fn timestamp<'m>(meta: &'m Value, field: &str) -> Result<(&'m str, DateTime<Utc>), FreshnessError> {
    let raw = meta
        .get(field)
        .ok_or_else(|| FreshnessError::MissingField(field.to_string()))?;
    let malformed = || FreshnessError::MalformedTimestamp {
        field: field.to_string(),
        value: raw.to_string(),
    };
    let s = raw.as_str().ok_or_else(malformed)?;
    if !iso8601_like(s) {
        return Err(malformed());
    }
    DateTime::parse_from_rfc3339(s)
        .map(|t| (s, t.with_timezone(&Utc)))
        .map_err(|_| malformed())
}

/// `expires_at` must not precede `time_evaluated`, neither as an instant nor
/// as a string. Mixed offsets can order the two differently, so both hold.
pub fn assert_freshness(meta: &Value) -> Result<FreshnessWindow, FreshnessError> {
    let (evaluated_raw, time_evaluated) = timestamp(meta, "time_evaluated")?;
    let (expires_raw, expires_at) = timestamp(meta, "expires_at")?;
    if expires_at < time_evaluated || expires_raw < evaluated_raw {
        return Err(FreshnessError::Inverted {
            time_evaluated: evaluated_raw.to_string(),
            expires_at: expires_raw.to_string(),
        });
    }
    Ok(FreshnessWindow {
        time_evaluated,
        expires_at,
    })
}

/// Applies the skew bound a deployment declares in `freshness.max_skew_seconds`.
pub fn assert_within_skew(
    window: &FreshnessWindow,
    now: DateTime<Utc>,
    max_skew_seconds: i64,
) -> Result<(), FreshnessError> {
    let skew = (window.time_evaluated - now).num_seconds();
    if skew.abs() > max_skew_seconds {
        return Err(FreshnessError::Skew {
            value: window.time_evaluated.to_rfc3339(),
            skew_seconds: skew,
            max: max_skew_seconds,
        });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RateLimitValue {
    Int(i64),
    Raw(String),
}

/// Recognised rate-limit headers, keyed by canonical name. Empty means the
/// SUT does not advertise limits, which is allowed.
pub fn parse_rate_limit_headers(resp: &ProbeResponse) -> BTreeMap<String, RateLimitValue> {
    let mut out = BTreeMap::new();
    for name in RATE_LIMIT_HEADERS {
        if let Some(raw) = resp.header(name) {
            let raw = raw.trim();
            let value = raw
                .parse::<i64>()
                .map(RateLimitValue::Int)
                .unwrap_or_else(|_| RateLimitValue::Raw(raw.to_string()));
            out.insert(name.to_string(), value);
        }
    }
    out
}

/// Burst probing state, owned by the single check that drives it.
#[derive(Debug)]
pub struct RateLimitWindow {
    budget: usize,
    sent: usize,
    statuses: Vec<u16>,
    throttled: Option<ProbeResponse>,
}

impl RateLimitWindow {
    pub fn new(budget: usize) -> Self {
        Self {
            budget: budget.max(1),
            sent: 0,
            statuses: Vec::new(),
            throttled: None,
        }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn sent(&self) -> usize {
        self.sent
    }

    pub fn statuses(&self) -> &[u16] {
        &self.statuses
    }

    pub fn throttled(&self) -> Option<&ProbeResponse> {
        self.throttled.as_ref()
    }

    pub fn exhausted(&self) -> bool {
        self.throttled.is_some() || self.sent >= self.budget
    }

    fn observe(&mut self, resp: ProbeResponse) {
        self.sent += 1;
        self.statuses.push(resp.status);
        if resp.status == 429 {
            self.throttled = Some(resp);
        }
    }
}

/// Issues sequential single-shot probes until the SUT answers 429 or the
/// budget runs out. A transport failure stops the burst.
pub fn burst_until_throttled<F>(
    window: &mut RateLimitWindow,
    mut probe: F,
) -> Result<Option<&ProbeResponse>, TransportError>
where
    F: FnMut() -> Result<ProbeResponse, TransportError>,
{
    while !window.exhausted() {
        let resp = probe()?;
        window.observe(resp);
    }
    Ok(window.throttled())
}
