//! Shared data model layer (structs/constants/error taxonomy only).
//!
//! ## Purpose
//! - Keep probe/outcome/report structs in one place.
//! - Avoid cyclic imports between the client, the verifiers and the runner.
//! - Make JSON report schema changes explicit and reviewable.
//!
//! ## Files
//! - `models.rs`: probe, envelope-independent response, outcome and report structs.
//! - `constants.rs`: stable profile constants (paths, accepted statuses, limits).
//! - `errors.rs`: the check error taxonomy and its mapping onto outcome kinds.
//!
//! ## Rule of thumb
//! Domain types should be data-only: no filesystem/network side effects.
//!
//! ## Compatibility note
//! Changes in `ConformanceReport` and `CheckOutcome` alter the persisted report.
//! Keep them synchronized with `schemas/tspp-conformance-report.schema.json`.

pub mod constants;
pub mod errors;
pub mod models;
