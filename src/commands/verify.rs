use crate::cli::{Cli, Commands};
use crate::domain::models::VerifyReport;
use crate::services::envelope::unwrap;
use crate::services::output::print_verdict;
use crate::services::signature::{payload_binding, query_hash_binding, verify_envelope, KeySet};
use anyhow::Context;
use serde_json::Value;
use std::path::Path;

pub fn handle_verify_command(cli: &Cli) -> anyhow::Result<bool> {
    let Commands::Verify { envelope, jwks } = &cli.command else {
        return Ok(false);
    };

    let body = read_json(envelope)?;
    let keys = KeySet::from_jwks(&read_json(jwks)?);
    let report = verify_offline(&body, &keys);
    print_verdict(cli.json, report.verified, &report, |r| {
        let mut lines = vec![format!(
            "signed={} keys={} verified={}",
            r.signed, r.key_count, r.verified
        )];
        if let Some(kid) = &r.kid {
            lines.push(format!("kid: {}", kid));
        }
        if let Some(bound) = r.payload_bound {
            lines.push(format!("payload bound: {}", bound));
        }
        if let Some(bound) = r.query_hash_bound {
            lines.push(format!("query_hash bound: {}", bound));
        }
        if let Some(reason) = &r.reason {
            lines.push(format!("reason: {}", reason));
        }
        lines
    })?;
    if !report.verified {
        std::process::exit(1);
    }
    Ok(true)
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let raw =
        std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse {} as JSON", path.display()))
}

fn verify_offline(body: &Value, keys: &KeySet) -> VerifyReport {
    let envelope = unwrap(body);
    let Some(signed) = envelope.as_signed() else {
        return VerifyReport {
            signed: false,
            key_count: keys.len(),
            verified: false,
            kid: None,
            payload_bound: None,
            query_hash_bound: None,
            reason: Some("body is not a signed envelope".to_string()),
        };
    };
    let (verified, kid, reason) = match verify_envelope(signed, keys) {
        Ok(kid) => (true, kid, None),
        Err(reason) => (false, None, Some(reason)),
    };
    VerifyReport {
        signed: true,
        key_count: keys.len(),
        verified,
        kid,
        payload_bound: payload_binding(signed),
        query_hash_bound: query_hash_binding(signed),
        reason,
    }
}
