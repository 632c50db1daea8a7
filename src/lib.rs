//! Conformance engine for Trust Registry Query Protocol deployments claiming
//! the TSPP-TRQP-0.1 profile.
//!
//! The library drives the same suite the `trqp-tspp` binary runs, so CI
//! harnesses can embed it and read the [`domain::models::ConformanceReport`]
//! directly.

pub mod cli;
pub mod commands;
pub mod domain;
pub mod services;
