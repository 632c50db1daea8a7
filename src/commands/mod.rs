//! Command handler layer.
//!
//! This module owns CLI-oriented orchestration and output wiring.
//!
//! ## Files
//! - `run.rs`: execute the suite against a SUT and print the report.
//! - `checks.rs`: print the check -> requirement traceability table.
//! - `verify.rs`: offline envelope verification against a saved JWKS.
//!
//! ## Principles
//! - Parse/match CLI inputs here.
//! - Delegate conformance logic to `services/*`.
//! - Keep behavior and output schema stable; non-conformant runs exit 1.

pub mod checks;
pub mod run;
pub mod verify;

pub use checks::handle_checks_command;
pub use run::handle_run_command;
pub use verify::handle_verify_command;
