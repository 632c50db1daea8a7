//! Service layer: the conformance engine proper.
//!
//! ## Service map
//! - `client.rs`: blocking TRQP client, header injection, response capture.
//! - `schema.rs`: bundled JSON Schemas, violation listing, shape stability.
//! - `envelope.rs`: plain payload / signed envelope unwrapping.
//! - `signature.rs`: key set fetch, compact JWS verification, binding checks.
//! - `freshness.rs`: `meta` timestamps, rate-limit headers, burst window.
//! - `registry.rs`: check table, requirement association, assurance gate.
//! - `checks.rs`: the TSPP-TRQP-0.1 checks.
//! - `runner.rs`: sequential / scoped-thread executor with run deadline.
//! - `report.rs`: aggregation, summary, atomic report persistence.
//! - `config.rs`: run configuration and fixture loading.
//! - `output.rs`: JSON/text output helpers.
//!
//! ## Conventions
//! - Checks return typed errors; only the runner turns them into outcomes.
//! - Network I/O stays in `client.rs`; everything else is pure or file-local.
//! - Keep command handlers thin; delegate to services.

pub mod checks;
pub mod client;
pub mod config;
pub mod envelope;
pub mod freshness;
pub mod output;
pub mod registry;
pub mod report;
pub mod runner;
pub mod schema;
pub mod signature;
