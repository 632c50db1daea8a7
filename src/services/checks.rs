//! The TSPP-TRQP-0.1 check table.
//!
//! Each check is a plain function over a [`CheckContext`]. A check returns
//! `Ok(note)` on PASS and a [`CheckError`] for everything else; the runner
//! maps the error to its outcome kind.
//!
//! ## Precondition rule
//! - A status outside the acceptable set is a FAIL.
//! - An acceptable non-200 status degrades checks of secondary properties
//!   (freshness, signatures, reflection) to SKIP.

use crate::domain::constants::{
    ACCEPTABLE_STATUSES, KEY_PROTECTION_TIERS, NOT_FOUND_KEYS, PROFILE_ID, UNIFORM_PROBE_COUNT,
    UNKNOWN_CONTEXT_KEY,
};
use crate::domain::errors::{CheckError, FreshnessError};
use crate::domain::models::{
    KeyProtectionDecl, MonitoringDecl, ProbeResponse, SignaturePreference, TransparencyDecl,
};
use crate::services::envelope::{unwrap, ResponseEnvelope, SignedEnvelope};
use crate::services::freshness::{
    assert_freshness, assert_within_skew, burst_until_throttled, parse_rate_limit_headers,
    RateLimitValue, RateLimitWindow,
};
use crate::services::registry::{Applicability, CheckContext, CheckFn, CheckResult, RequirementCheck};
use crate::services::schema::{assert_stable_shape, key_set, validate_bundled, BundledSchema};
use crate::services::signature::{
    fetch_key_set, payload_binding, query_hash_binding, recompute_query_hash, verify_envelope,
    KeySet,
};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::debug;

fn check(
    id: &'static str,
    name: &'static str,
    requirement_ids: &'static [&'static str],
    applicability: Applicability,
    run: CheckFn,
) -> RequirementCheck {
    RequirementCheck {
        id,
        name,
        requirement_ids,
        applicability,
        exclusive: false,
        run,
    }
}

pub fn standard_checks() -> Vec<RequirementCheck> {
    use Applicability::*;
    vec![
        check(
            "metadata_published_and_valid",
            "Metadata is published and schema-valid",
            &["TSPP-META-01", "TSPP-META-02"],
            All,
            metadata_published_and_valid,
        ),
        check(
            "metadata_declares_context_allowlist",
            "Metadata declares a context allowlist",
            &["TSPP-CTX-01"],
            All,
            metadata_declares_context_allowlist,
        ),
        check(
            "authorization_freshness_fields",
            "Authorization responses carry fresh meta",
            &["TSPP-FRESH-01"],
            All,
            authorization_freshness_fields,
        ),
        check(
            "recognition_freshness_fields",
            "Recognition responses carry fresh meta",
            &["TSPP-FRESH-02"],
            All,
            recognition_freshness_fields,
        ),
        check(
            "unknown_context_key_not_reflected",
            "Unknown context keys are rejected or stripped",
            &["TSPP-CTX-02"],
            All,
            unknown_context_key_not_reflected,
        ),
        check(
            "uniform_not_found_surface",
            "Unknown entities get a uniform not-found surface",
            &["TSPP-ERR-01"],
            All,
            uniform_not_found_surface,
        ),
        RequirementCheck {
            exclusive: true,
            ..check(
                "ratelimit_headers_on_429",
                "Throttled responses advertise rate limits",
                &["TSPP-RL-01"],
                All,
                ratelimit_headers_on_429,
            )
        },
        check(
            "bridge_semantic_equivalence",
            "Bridge fixtures are answered equivalently",
            &["TSPP-BRIDGE-01"],
            All,
            bridge_semantic_equivalence,
        ),
        check(
            "al2_signed_response_envelope_shape",
            "Requested signatures produce a signed envelope",
            &["TSPP-AL2-01"],
            Al2Plus,
            al2_signed_response_envelope_shape,
        ),
        check(
            "al2_signed_response_verifies_with_jwks",
            "Requested signatures verify against the published key set",
            &["TSPP-AL2-02"],
            Al2Plus,
            al2_signed_response_verifies_with_jwks,
        ),
        check(
            "al2_signature_payload_binding",
            "Signature covers the envelope payload",
            &["TSPP-AL2-03"],
            Al2Plus,
            al2_signature_payload_binding,
        ),
        check(
            "al3_metadata_declares_default_signing",
            "Metadata declares default response signing",
            &["TSPP-AL3-01"],
            Al3Plus,
            al3_metadata_declares_default_signing,
        ),
        check(
            "al3_signed_envelope_includes_meta",
            "Default-signed envelopes carry query_hash, iat and exp",
            &["TSPP-AL3-02"],
            Al3Plus,
            al3_signed_envelope_includes_meta,
        ),
        check(
            "al3_default_signed_response_verifies",
            "Default-signed responses verify against the published key set",
            &["TSPP-AL3-03"],
            Al3Plus,
            al3_default_signed_response_verifies,
        ),
        check(
            "al3_transparency_uris_resolve",
            "Transparency change log resolves",
            &["TSPP-AL3-04"],
            Al3Plus,
            al3_transparency_uris_resolve,
        ),
        check(
            "al4_key_protection_declared",
            "Key protection tier is declared and evidenced",
            &["TSPP-AL4-02"],
            Al4Only,
            al4_key_protection_declared,
        ),
        check(
            "al4_monitoring_declared",
            "Monitoring posture is declared and evidenced",
            &["TSPP-AL4-03"],
            Al4Only,
            al4_monitoring_declared,
        ),
    ]
}

// ---- shared probes ----

/// Metadata document, or SKIP when it cannot be obtained.
fn published_metadata(ctx: &CheckContext<'_>) -> Result<Value, CheckError> {
    let resp = ctx.client.fetch_metadata()?;
    if resp.status != 200 {
        return Err(CheckError::Precondition(format!(
            "metadata endpoint answered HTTP {}",
            resp.status
        )));
    }
    resp.json
        .ok_or_else(|| CheckError::Precondition("metadata body is not JSON".to_string()))
}

/// Field at `pointer`, typed on its own. Siblings are never deserialized,
/// so an ill-typed field only fails the checks that read it.
fn declared_in<T: DeserializeOwned>(metadata: &Value, pointer: &str) -> Result<Option<T>, CheckError> {
    match metadata.pointer(pointer) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone()).map(Some).map_err(|e| {
            CheckError::Assertion(format!(
                "metadata {} is malformed: {}",
                pointer.trim_start_matches('/').replace('/', "."),
                e
            ))
        }),
    }
}

fn declared<T: DeserializeOwned>(ctx: &CheckContext<'_>, pointer: &str) -> Result<Option<T>, CheckError> {
    declared_in(&published_metadata(ctx)?, pointer)
}

/// Best-effort lookup for checks that only refine their behaviour with metadata.
fn optional_declared<T: DeserializeOwned>(ctx: &CheckContext<'_>, pointer: &str) -> Option<T> {
    declared(ctx, pointer).ok().flatten()
}

/// JSON body of a successful TRQP operation.
fn successful_body<'r>(resp: &'r ProbeResponse, operation: &str) -> Result<&'r Value, CheckError> {
    if !ACCEPTABLE_STATUSES.contains(&resp.status) {
        return Err(CheckError::Assertion(format!(
            "{} answered HTTP {}, outside {:?}: {}",
            operation,
            resp.status,
            ACCEPTABLE_STATUSES,
            resp.body_snippet(200)
        )));
    }
    if resp.status != 200 {
        return Err(CheckError::Precondition(format!(
            "{} answered HTTP {}; property is undefined without a successful response",
            operation, resp.status
        )));
    }
    resp.json.as_ref().ok_or_else(|| {
        CheckError::Assertion(format!(
            "{} answered 200 with a non-JSON body: {}",
            operation,
            resp.body_snippet(200)
        ))
    })
}

/// Single unauthenticated GET of a declared URI that must answer 200.
fn resolves(ctx: &CheckContext<'_>, field: &str, uri: &str) -> Result<(), CheckError> {
    let resp = ctx.client.fetch_uri(uri)?;
    if resp.status != 200 {
        return Err(CheckError::Assertion(format!(
            "{} {} answered HTTP {}",
            field, uri, resp.status
        )));
    }
    debug!(field, uri, "declared uri resolved");
    Ok(())
}

fn published_key_set(ctx: &CheckContext<'_>) -> Result<KeySet, CheckError> {
    let uri = declared::<String>(ctx, "/signing/jwks_uri")?.ok_or_else(|| {
        CheckError::MissingCapability("metadata declares no signing.jwks_uri".to_string())
    })?;
    fetch_key_set(ctx.client, &uri)
}

/// Posts `authorization_valid` and requires a signed envelope back.
fn signed_authorization(
    ctx: &CheckContext<'_>,
    preference: SignaturePreference,
) -> Result<(Value, SignedEnvelope), CheckError> {
    let resp = ctx
        .client
        .post_authorization(&ctx.settings.queries.authorization_valid, preference)?;
    let body = successful_body(&resp, "authorization")?;
    match unwrap(body) {
        ResponseEnvelope::Signed(signed) => Ok((body.clone(), signed)),
        ResponseEnvelope::Plain(_) => Err(CheckError::SignatureVerification(match preference {
            SignaturePreference::Jws => {
                "Accept-Signature: jws was sent but the response is not a signed envelope"
                    .to_string()
            }
            SignaturePreference::None => {
                "successful responses must be signed by default at this assurance level"
                    .to_string()
            }
        })),
    }
}

fn verified_note(kid: Option<String>, keys: &KeySet) -> Option<String> {
    Some(format!(
        "verified by kid {} against {} published key(s)",
        kid.as_deref().unwrap_or("<none>"),
        keys.len()
    ))
}

fn declared_query_hash(envelope: &SignedEnvelope) -> Option<&str> {
    envelope.signature.query_hash.as_deref().or_else(|| {
        envelope
            .meta
            .as_ref()
            .and_then(|m| m.get("query_hash"))
            .and_then(Value::as_str)
    })
}

// ---- AL1 baseline ----

fn metadata_published_and_valid(ctx: &CheckContext<'_>) -> CheckResult {
    let resp = ctx.client.fetch_metadata()?;
    if resp.status != 200 {
        return Err(CheckError::Assertion(format!(
            "metadata endpoint answered HTTP {}: {}",
            resp.status,
            resp.body_snippet(200)
        )));
    }
    let body = resp
        .json
        .as_ref()
        .ok_or_else(|| CheckError::Assertion("metadata body is not JSON".to_string()))?;
    validate_bundled(body, BundledSchema::Metadata)?;

    let profile = body.get("profile").and_then(Value::as_str).unwrap_or_default();
    if profile != PROFILE_ID {
        return Err(CheckError::Assertion(format!(
            "metadata declares profile {:?}, expected {}",
            profile, PROFILE_ID
        )));
    }
    let declared = body
        .get("assurance_level")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if let Some(expected) = ctx.settings.expected_level {
        if declared != expected.as_str() {
            return Err(CheckError::AssuranceLevelMismatch {
                expected,
                declared: declared.to_string(),
            });
        }
    }
    Ok(Some(format!("{} metadata declares {}", profile, declared)))
}

fn metadata_declares_context_allowlist(ctx: &CheckContext<'_>) -> CheckResult {
    let metadata = published_metadata(ctx)?;
    let list = metadata
        .get("context_allowlist")
        .ok_or_else(|| CheckError::Assertion("metadata has no context_allowlist".to_string()))?;
    let items = list
        .as_array()
        .ok_or_else(|| CheckError::Assertion("context_allowlist must be a list".to_string()))?;
    let mut seen = BTreeSet::new();
    let mut keys = Vec::with_capacity(items.len());
    for item in items {
        let key = item
            .as_str()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                CheckError::Assertion(format!(
                    "context_allowlist entries must be non-empty strings, got {}",
                    item
                ))
            })?;
        if !seen.insert(key) {
            return Err(CheckError::Assertion(format!(
                "context_allowlist lists {} twice",
                key
            )));
        }
        keys.push(key);
    }
    Ok(Some(format!("allowlist: [{}]", keys.join(", "))))
}

fn freshness_of(ctx: &CheckContext<'_>, resp: ProbeResponse, operation: &str) -> CheckResult {
    let body = successful_body(&resp, operation)?;
    let envelope = unwrap(body);
    let meta = envelope
        .payload()
        .get("meta")
        .ok_or_else(|| FreshnessError::MissingField("meta".to_string()))?;
    let window = assert_freshness(meta)?;
    let mut note = format!(
        "time_evaluated={} expires_at={}",
        window.time_evaluated.to_rfc3339(),
        window.expires_at.to_rfc3339()
    );
    let max_skew = optional_declared::<i64>(ctx, "/freshness/max_skew_seconds");
    if let Some(max) = max_skew {
        assert_within_skew(&window, Utc::now(), max)?;
        note.push_str(&format!(" within max_skew_seconds={}", max));
    }
    Ok(Some(note))
}

fn authorization_freshness_fields(ctx: &CheckContext<'_>) -> CheckResult {
    let resp = ctx.client.post_authorization(
        &ctx.settings.queries.authorization_valid,
        SignaturePreference::None,
    )?;
    freshness_of(ctx, resp, "authorization")
}

fn recognition_freshness_fields(ctx: &CheckContext<'_>) -> CheckResult {
    let resp = ctx.client.post_recognition(
        &ctx.settings.queries.recognition_valid,
        SignaturePreference::None,
    )?;
    freshness_of(ctx, resp, "recognition")
}

fn unknown_context_key_not_reflected(ctx: &CheckContext<'_>) -> CheckResult {
    let allowlist = match declared::<Vec<String>>(ctx, "/context_allowlist") {
        Ok(list) => list.unwrap_or_default(),
        Err(CheckError::Assertion(reason)) => {
            return Err(CheckError::Precondition(format!(
                "reflection cannot be judged: {}",
                reason
            )))
        }
        Err(e) => return Err(e),
    };
    if allowlist.iter().any(|k| k == UNKNOWN_CONTEXT_KEY) {
        return Err(CheckError::Precondition(format!(
            "allowlist declares {}; the probe key is not unknown to this SUT",
            UNKNOWN_CONTEXT_KEY
        )));
    }
    let query = &ctx.settings.queries.authorization_with_unknown_context_key;
    let resp = ctx
        .client
        .post_authorization(query, SignaturePreference::None)?;
    match resp.status {
        400 => Ok(Some(format!(
            "{} rejected with HTTP 400",
            UNKNOWN_CONTEXT_KEY
        ))),
        200 => {
            let body = successful_body(&resp, "authorization")?;
            let envelope = unwrap(body);
            let mut leaks = Vec::new();
            let reflected: Vec<&String> = envelope
                .payload()
                .get("context")
                .and_then(Value::as_object)
                .map(|c| c.keys().collect())
                .unwrap_or_default();
            for key in &reflected {
                if !allowlist.contains(*key) {
                    leaks.push(format!("context.{} is outside the declared allowlist", key));
                }
            }
            let raw = String::from_utf8_lossy(&resp.body);
            if raw.contains(UNKNOWN_CONTEXT_KEY) {
                leaks.push(format!("response body mentions {}", UNKNOWN_CONTEXT_KEY));
            }
            let probe_value = query
                .get("context")
                .and_then(|c| c.get(UNKNOWN_CONTEXT_KEY))
                .and_then(Value::as_str);
            if let Some(value) = probe_value.filter(|v| raw.contains(*v)) {
                leaks.push(format!("response body reflects the probe value {}", value));
            }
            if !leaks.is_empty() {
                return Err(CheckError::Assertion(leaks.join("; ")));
            }
            Ok(Some(format!(
                "{} stripped; reflected context keys: [{}]",
                UNKNOWN_CONTEXT_KEY,
                reflected
                    .iter()
                    .map(|k| k.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )))
        }
        status if ACCEPTABLE_STATUSES.contains(&status) => Err(CheckError::Precondition(format!(
            "authorization answered HTTP {}; reflection is undefined",
            status
        ))),
        status => Err(CheckError::Assertion(format!(
            "authorization answered HTTP {}, outside {:?}",
            status, ACCEPTABLE_STATUSES
        ))),
    }
}

/// Context keys of `query` outside `allowlist` that `raw` names, or whose
/// string values it repeats.
fn unlisted_context_echoes(query: &Value, allowlist: &[String], raw: &str) -> Vec<String> {
    let Some(context) = query.get("context").and_then(Value::as_object) else {
        return Vec::new();
    };
    let mut echoes = Vec::new();
    for (key, value) in context {
        if allowlist.contains(key) {
            continue;
        }
        if raw.contains(key.as_str()) {
            echoes.push(format!("names context key {}", key));
        }
        if let Some(value) = value.as_str().filter(|v| !v.is_empty() && raw.contains(*v)) {
            echoes.push(format!("repeats context.{} value {}", key, value));
        }
    }
    echoes
}

fn uniform_not_found_surface(ctx: &CheckContext<'_>) -> CheckResult {
    let query = &ctx.settings.queries.authorization_unknown_entity;
    let expected: BTreeSet<String> = NOT_FOUND_KEYS.iter().map(|k| k.to_string()).collect();
    let carries_context = query
        .get("context")
        .and_then(Value::as_object)
        .is_some_and(|c| !c.is_empty());
    let allowlist: Vec<String> = if carries_context {
        optional_declared(ctx, "/context_allowlist").unwrap_or_default()
    } else {
        Vec::new()
    };
    let mut samples = Vec::with_capacity(UNIFORM_PROBE_COUNT);
    let mut shapes = Vec::new();
    let mut violations = Vec::new();

    for attempt in 1..=UNIFORM_PROBE_COUNT {
        let resp = ctx
            .client
            .post_authorization(query, SignaturePreference::None)?;
        samples.push(format!("{}@{}ms", resp.status, resp.elapsed.as_millis()));
        if !ACCEPTABLE_STATUSES.contains(&resp.status) {
            violations.push(format!(
                "probe {}: HTTP {} is outside {:?}",
                attempt, resp.status, ACCEPTABLE_STATUSES
            ));
            continue;
        }
        if resp.status != 404 {
            continue;
        }
        let raw = String::from_utf8_lossy(&resp.body);
        for echo in unlisted_context_echoes(query, &allowlist, &raw) {
            violations.push(format!("probe {}: 404 body {}", attempt, echo));
        }
        let Some(body) = resp.json.as_ref() else {
            shapes.push(key_set(&Value::Null));
            continue;
        };
        let keys = key_set(body);
        if keys != expected {
            violations.push(format!(
                "probe {}: 404 body keys {{{}}} are not exactly {{error,message,meta}}",
                attempt,
                keys.iter().map(String::as_str).collect::<Vec<_>>().join(",")
            ));
        } else {
            validate_bundled(body, BundledSchema::ErrorResponse)?;
        }
        shapes.push(keys);
    }

    if !violations.is_empty() {
        return Err(CheckError::Assertion(violations.join("; ")));
    }
    assert_stable_shape(&shapes)?;
    Ok(Some(format!("samples: {}", samples.join(", "))))
}

fn burst_budget(declared: Option<u64>, cap: usize) -> usize {
    match declared {
        Some(burst) => usize::try_from(burst)
            .unwrap_or(usize::MAX)
            .saturating_add(1)
            .min(cap),
        None => cap,
    }
}

fn ratelimit_headers_on_429(ctx: &CheckContext<'_>) -> CheckResult {
    let declared = optional_declared::<u64>(ctx, "/rate_limits/burst");
    let mut window = RateLimitWindow::new(burst_budget(declared, ctx.settings.burst));
    let query = &ctx.settings.queries.authorization_valid;
    burst_until_throttled(&mut window, || {
        ctx.client
            .post_authorization(query, SignaturePreference::None)
    })?;

    let Some(throttled) = window.throttled() else {
        return Err(CheckError::Precondition(format!(
            "no HTTP 429 within {} requests (budget {}); cannot observe rate-limit headers",
            window.sent(),
            window.budget()
        )));
    };
    let headers = parse_rate_limit_headers(throttled);
    if headers.is_empty() {
        return Err(CheckError::Assertion(format!(
            "HTTP 429 after {} requests carried no RateLimit-* or Retry-After header",
            window.sent()
        )));
    }
    let rendered: Vec<String> = headers
        .iter()
        .map(|(name, value)| match value {
            RateLimitValue::Int(n) => format!("{}={}", name, n),
            RateLimitValue::Raw(s) => format!("{}={}", name, s),
        })
        .collect();
    Ok(Some(format!(
        "429 after {} requests; {}",
        window.sent(),
        rendered.join(" ")
    )))
}

fn bridge_semantic_equivalence(ctx: &CheckContext<'_>) -> CheckResult {
    let Some(fixtures) = ctx.settings.bridge_fixtures.as_ref() else {
        return Err(CheckError::Precondition(
            "no bridge fixtures configured (--bridge-fixtures / TSPP_BRIDGE_FIXTURES)".to_string(),
        ));
    };
    if fixtures.cases.is_empty() {
        return Err(CheckError::NotApplicable(
            "bridge fixture file has no cases".to_string(),
        ));
    }
    let mut mismatches = Vec::new();
    for (index, case) in fixtures.cases.iter().enumerate() {
        let resp = ctx
            .client
            .post_authorization(&case.query, SignaturePreference::None)?;
        if resp.status != 200 {
            mismatches.push(format!(
                "case {}: expected HTTP 200, got {}",
                index, resp.status
            ));
            continue;
        }
        let Some(body) = resp.json.as_ref() else {
            mismatches.push(format!("case {}: body is not JSON", index));
            continue;
        };
        let envelope = unwrap(body);
        for (key, want) in &case.expected {
            let got = envelope.payload().get(key);
            if got != Some(want) {
                mismatches.push(format!(
                    "case {}: {} expected {}, got {}",
                    index,
                    key,
                    want,
                    got.map(Value::to_string)
                        .unwrap_or_else(|| "<absent>".to_string())
                ));
            }
        }
    }
    if !mismatches.is_empty() {
        return Err(CheckError::Assertion(mismatches.join("; ")));
    }
    Ok(Some(format!("{} case(s) equivalent", fixtures.cases.len())))
}

// ---- AL2 ----

fn al2_signed_response_envelope_shape(ctx: &CheckContext<'_>) -> CheckResult {
    let (body, signed) = signed_authorization(ctx, SignaturePreference::Jws)?;
    validate_bundled(&body, BundledSchema::SignedResponse)?;
    Ok(Some(format!(
        "signed envelope alg={} kid={}",
        signed.signature.alg.as_deref().unwrap_or("<none>"),
        signed.signature.kid.as_deref().unwrap_or("<none>")
    )))
}

fn al2_signed_response_verifies_with_jwks(ctx: &CheckContext<'_>) -> CheckResult {
    let keys = published_key_set(ctx)?;
    let (_, signed) = signed_authorization(ctx, SignaturePreference::Jws)?;
    let kid = verify_envelope(&signed, &keys).map_err(CheckError::SignatureVerification)?;
    Ok(verified_note(kid, &keys))
}

fn al2_signature_payload_binding(ctx: &CheckContext<'_>) -> CheckResult {
    let query = &ctx.settings.queries.authorization_valid;
    let resp = ctx
        .client
        .post_authorization(query, SignaturePreference::Jws)?;
    let body = successful_body(&resp, "authorization")?;
    let ResponseEnvelope::Signed(signed) = unwrap(body) else {
        return Err(CheckError::Precondition(
            "response is not a signed envelope; nothing to bind".to_string(),
        ));
    };
    match payload_binding(&signed) {
        Some(true) => {}
        Some(false) => {
            return Err(CheckError::SignatureVerification(
                "JWS payload segment does not decode to the envelope payload".to_string(),
            ))
        }
        None => {
            return Err(CheckError::SignatureVerification(
                "signature.jws is not a compact JWS".to_string(),
            ))
        }
    }
    match query_hash_binding(&signed) {
        None => Ok(Some(
            "payload is bound; no query_hash declared".to_string(),
        )),
        Some(true) => Ok(Some(
            "payload and query_hash are both covered by the signature".to_string(),
        )),
        Some(false) => {
            let allowlist: Vec<String> =
                optional_declared(ctx, "/context_allowlist").unwrap_or_default();
            let recomputed = recompute_query_hash(query, &allowlist);
            let agrees = declared_query_hash(&signed) == Some(recomputed.as_str());
            Err(CheckError::KnownAmbiguity(format!(
                "payload is bound but query_hash is outside the signature input; recomputed hash {} the declared value",
                if agrees { "matches" } else { "differs from" }
            )))
        }
    }
}

// ---- AL3 ----

fn al3_metadata_declares_default_signing(ctx: &CheckContext<'_>) -> CheckResult {
    let metadata = published_metadata(ctx)?;
    let default_signed = declared_in::<bool>(&metadata, "/signing/default_signed_responses")?;
    let response_signing = declared_in::<String>(&metadata, "/signing/response_signing")?;
    if default_signed != Some(true) {
        return Err(CheckError::Assertion(
            "signing.default_signed_responses must be true".to_string(),
        ));
    }
    if response_signing.as_deref() == Some("none") {
        return Err(CheckError::Assertion(
            "signing.response_signing=none contradicts default signing".to_string(),
        ));
    }
    Ok(Some(format!(
        "default signing declared; response_signing={}",
        response_signing.as_deref().unwrap_or("<unset>")
    )))
}

fn al3_signed_envelope_includes_meta(ctx: &CheckContext<'_>) -> CheckResult {
    let (body, signed) = signed_authorization(ctx, SignaturePreference::None)?;
    let meta = signed
        .meta
        .as_ref()
        .ok_or_else(|| CheckError::Assertion("signed envelope carries no meta".to_string()))?;
    let missing: Vec<&str> = ["query_hash", "iat", "exp"]
        .into_iter()
        .filter(|k| !meta.contains_key(*k))
        .collect();
    if !missing.is_empty() {
        return Err(CheckError::Assertion(format!(
            "envelope meta is missing {}",
            missing.join(", ")
        )));
    }
    if let (Some(iat), Some(exp)) = (
        meta.get("iat").and_then(Value::as_i64),
        meta.get("exp").and_then(Value::as_i64),
    ) {
        if exp < iat {
            return Err(CheckError::Assertion(format!(
                "envelope meta exp {} precedes iat {}",
                exp, iat
            )));
        }
    }
    validate_bundled(&body, BundledSchema::SignedResponse)?;
    Ok(Some("envelope meta carries query_hash, iat, exp".to_string()))
}

fn al3_default_signed_response_verifies(ctx: &CheckContext<'_>) -> CheckResult {
    let keys = published_key_set(ctx)?;
    let (_, signed) = signed_authorization(ctx, SignaturePreference::None)?;
    let kid = verify_envelope(&signed, &keys).map_err(CheckError::SignatureVerification)?;
    Ok(verified_note(kid, &keys))
}

fn al3_transparency_uris_resolve(ctx: &CheckContext<'_>) -> CheckResult {
    let transparency = declared::<TransparencyDecl>(ctx, "/transparency")?.ok_or_else(|| {
        CheckError::Assertion("metadata declares no transparency block".to_string())
    })?;
    let uri = transparency.change_log_uri.ok_or_else(|| {
        CheckError::Assertion("transparency.change_log_uri is missing".to_string())
    })?;
    let published_at = transparency.published_at.ok_or_else(|| {
        CheckError::Assertion("transparency.published_at is missing".to_string())
    })?;
    DateTime::parse_from_rfc3339(&published_at).map_err(|_| {
        CheckError::Assertion(format!(
            "transparency.published_at {:?} is not an RFC 3339 date-time",
            published_at
        ))
    })?;
    resolves(ctx, "transparency.change_log_uri", &uri)?;
    Ok(Some(format!(
        "change log {} resolved; published_at={}",
        uri, published_at
    )))
}

// ---- AL4 ----

fn al4_key_protection_declared(ctx: &CheckContext<'_>) -> CheckResult {
    let protection = declared::<KeyProtectionDecl>(ctx, "/key_protection")?.ok_or_else(|| {
        CheckError::Assertion("metadata declares no key_protection block".to_string())
    })?;
    let tier = protection.protection.unwrap_or_default();
    if !KEY_PROTECTION_TIERS.contains(&tier.as_str()) {
        return Err(CheckError::Assertion(format!(
            "key_protection.protection {:?} is not one of {:?}",
            tier, KEY_PROTECTION_TIERS
        )));
    }
    let uri = protection.evidence_uri.ok_or_else(|| {
        CheckError::Assertion("key_protection.evidence_uri is missing".to_string())
    })?;
    resolves(ctx, "key_protection.evidence_uri", &uri)?;
    Ok(Some(format!("{} key protection evidenced at {}", tier, uri)))
}

fn al4_monitoring_declared(ctx: &CheckContext<'_>) -> CheckResult {
    let monitoring = declared::<MonitoringDecl>(ctx, "/monitoring")?.ok_or_else(|| {
        CheckError::Assertion("metadata declares no monitoring block".to_string())
    })?;
    let retention = monitoring
        .evidence_retention_days
        .as_ref()
        .and_then(Value::as_u64)
        .filter(|days| *days > 0)
        .ok_or_else(|| {
            CheckError::Assertion(
                "monitoring.evidence_retention_days must be a positive integer".to_string(),
            )
        })?;
    let contact_declared = match &monitoring.incident_contact {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    };
    if !contact_declared {
        return Err(CheckError::Assertion(
            "monitoring.incident_contact is missing".to_string(),
        ));
    }
    let runbook = monitoring.runbook_uri.ok_or_else(|| {
        CheckError::Assertion("monitoring.runbook_uri is missing".to_string())
    })?;
    resolves(ctx, "monitoring.runbook_uri", &runbook)?;
    Ok(Some(format!(
        "retention {} days; runbook {} resolved",
        retention, runbook
    )))
}
