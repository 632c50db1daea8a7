/// Profile identifier stamped into every report.
pub const PROFILE_ID: &str = "TSPP-TRQP-0.1";

pub const METADATA_PATH: &str = "/.well-known/trqp-metadata";
pub const AUTHORIZATION_PATH: &str = "/authorization";
pub const RECOGNITION_PATH: &str = "/recognition";

/// Statuses a TRQP operation may legitimately answer with.
pub const ACCEPTABLE_STATUSES: [u16; 7] = [200, 400, 401, 403, 404, 429, 503];

/// Exact key set of a uniform 404 error body.
pub const NOT_FOUND_KEYS: [&str; 3] = ["error", "message", "meta"];

pub const KEY_PROTECTION_TIERS: [&str; 3] = ["software", "KMS", "HSM"];

pub const RATE_LIMIT_HEADERS: [&str; 4] = [
    "RateLimit-Limit",
    "RateLimit-Remaining",
    "RateLimit-Reset",
    "Retry-After",
];

/// Upper bound for diagnostic notes carried in a report entry.
pub const NOTE_LIMIT: usize = 1000;

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_BURST: usize = 20;
pub const UNIFORM_PROBE_COUNT: usize = 3;

/// Context key the allowlist probe smuggles into its request.
pub const UNKNOWN_CONTEXT_KEY: &str = "tracking_id";

pub const DEADLINE_NOTE: &str = "run deadline exceeded";
