#![allow(dead_code)]

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{Duration, SecondsFormat, Utc};
use ed25519_dalek::{Signer, SigningKey};
use httpmock::prelude::*;
use httpmock::Mock;
use jsonwebtoken::{Algorithm, EncodingKey};
use serde_json::{json, Value};
use trqp_tspp::domain::models::{AssuranceLevel, ConformanceReport, OutcomeKind};
use trqp_tspp::services::client::{ClientConfig, TrqpClient};
use trqp_tspp::services::config::SuiteSettings;
use trqp_tspp::services::registry::{CheckContext, Registry};
use trqp_tspp::services::report::ReportAggregator;
use trqp_tspp::services::runner::{execute, run_suite, RunOptions};
use trqp_tspp::services::signature::canonical_json;

pub const KID: &str = "sut-signing-1";
pub const VALID_ENTITY: &str = "did:example:issuer-001";
pub const UNKNOWN_ENTITY: &str = "does-not-exist-12345";
pub const CONTEXT_PROBE_ENTITY: &str = "did:example:issuer-002";
pub const RECOGNITION_ENTITY: &str = "did:example:registry-001";
pub const QUERY_HASH: &str = "5f2c0e6e9d1b4a7c";
pub const RSA_KID: &str = "sut-rsa-1";

const RSA_SIGNING_PEM: &[u8] = include_bytes!("../fixtures/rs256-signing.pem");
const RSA_PUBLIC_JWK: &str = include_str!("../fixtures/rs256-signing.jwk.json");

pub fn identity(seed: u8) -> SigningKey {
    SigningKey::from_bytes(&[seed; 32])
}

pub fn jwk(key: &SigningKey, kid: &str) -> Value {
    json!({
        "kty": "OKP",
        "crv": "Ed25519",
        "use": "sig",
        "alg": "EdDSA",
        "kid": kid,
        "x": URL_SAFE_NO_PAD.encode(key.verifying_key().to_bytes()),
    })
}

/// Compact EdDSA JWS over the canonical JSON of `payload`.
pub fn sign_compact(key: &SigningKey, kid: &str, payload: &Value) -> String {
    let header = json!({"alg": "EdDSA", "kid": kid});
    let input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(canonical_json(payload))
    );
    let sig = key.sign(input.as_bytes());
    format!("{}.{}", input, URL_SAFE_NO_PAD.encode(sig.to_bytes()))
}

/// Public half of the RS256 fixture identity, as a JWKS record.
pub fn rsa_jwk() -> Value {
    serde_json::from_str(RSA_PUBLIC_JWK).expect("rsa jwk fixture")
}

/// Compact RS256 JWS over the canonical JSON of `payload`.
pub fn sign_compact_rs256(kid: &str, payload: &Value) -> String {
    let key = EncodingKey::from_rsa_pem(RSA_SIGNING_PEM).expect("rsa pem fixture");
    let header = json!({"alg": "RS256", "kid": kid});
    let input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(canonical_json(payload))
    );
    let sig = jsonwebtoken::crypto::sign(input.as_bytes(), &key, Algorithm::RS256).expect("sign");
    format!("{}.{}", input, sig)
}

pub fn rfc3339(offset_secs: i64) -> String {
    (Utc::now() + Duration::seconds(offset_secs)).to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn fresh_meta() -> Value {
    json!({"time_evaluated": rfc3339(0), "expires_at": rfc3339(300)})
}

pub fn decision_payload(context: Value) -> Value {
    json!({
        "entity_id": VALID_ENTITY,
        "decision": {"authorized": true},
        "context": context,
        "meta": fresh_meta(),
    })
}

pub fn signed_envelope(key: &SigningKey, kid: &str, payload: &Value, meta: Option<Value>) -> Value {
    let mut env = json!({
        "payload": payload,
        "signature": {
            "alg": "EdDSA",
            "kid": kid,
            "jws": sign_compact(key, kid, payload),
            "hash_alg": "SHA-256",
            "issued_at": rfc3339(0),
        },
    });
    if let Some(meta) = meta {
        env["meta"] = meta;
    }
    env
}

/// Metadata document for `level`, valid against the bundled schema.
pub fn metadata_doc(level: &str, base: &str) -> Value {
    let mut doc = json!({
        "profile": "TSPP-TRQP-0.1",
        "assurance_level": level,
        "auth": {"scheme": "bearer", "token_format": "opaque"},
        "rate_limits": {"burst": 5, "window_seconds": 60},
        "freshness": {"max_skew_seconds": 120, "default_ttl_seconds": 300},
        "context_allowlist": ["purpose", "audience", "locale"],
        "signing": {
            "response_signing": if level == "AL1" { "optional" } else { "required" },
            "jwks_uri": format!("{}/jwks", base),
        },
    });
    if level == "AL3" || level == "AL4" {
        doc["signing"]["default_signed_responses"] = json!(true);
        doc["transparency"] = json!({
            "change_log_uri": format!("{}/changelog", base),
            "published_at": "2026-01-15T00:00:00Z",
        });
    }
    if level == "AL4" {
        doc["key_protection"] = json!({
            "protection": "HSM",
            "evidence_uri": format!("{}/evidence/keys", base),
        });
        doc["monitoring"] = json!({
            "evidence_retention_days": 365,
            "incident_contact": "security@registry.example",
            "runbook_uri": format!("{}/evidence/runbook", base),
        });
    }
    doc
}

/// In-process stand-in for a TRQP deployment.
pub struct FakeSut {
    pub server: MockServer,
    pub signer: SigningKey,
}

impl FakeSut {
    pub fn start() -> Self {
        Self {
            server: MockServer::start(),
            signer: identity(7),
        }
    }

    pub fn base(&self) -> String {
        self.server.base_url()
    }

    pub fn serve_metadata(&self, doc: Value) -> Mock<'_> {
        self.server.mock(|when, then| {
            when.method(GET).path("/.well-known/trqp-metadata");
            then.status(200).json_body(doc);
        })
    }

    pub fn serve_jwks(&self, keys: Vec<Value>) -> Mock<'_> {
        self.server.mock(|when, then| {
            when.method(GET).path("/jwks");
            then.status(200).json_body(json!({"keys": keys}));
        })
    }

    pub fn serve_document(&self, path: &str, status: u16) -> Mock<'_> {
        self.server.mock(|when, then| {
            when.method(GET).path(path.to_string());
            then.status(status).json_body(json!({"ok": status == 200}));
        })
    }

    /// `authorization_valid` answered with `body`, for one signature preference.
    pub fn serve_authorization(&self, accept_signature: &str, status: u16, body: Value) -> Mock<'_> {
        self.server.mock(|when, then| {
            when.method(POST)
                .path("/authorization")
                .header("accept-signature", accept_signature)
                .body_contains(VALID_ENTITY);
            then.status(status).json_body(body);
        })
    }

    pub fn serve_recognition(&self, body: Value) -> Mock<'_> {
        self.server.mock(|when, then| {
            when.method(POST).path("/recognition");
            then.status(200).json_body(body);
        })
    }

    pub fn serve_unknown_entity(&self, status: u16, body: Value) -> Mock<'_> {
        self.server.mock(|when, then| {
            when.method(POST)
                .path("/authorization")
                .body_contains(UNKNOWN_ENTITY);
            then.status(status).json_body(body);
        })
    }

    pub fn serve_context_probe(&self, status: u16, body: Value) -> Mock<'_> {
        self.server.mock(|when, then| {
            when.method(POST)
                .path("/authorization")
                .body_contains(CONTEXT_PROBE_ENTITY);
            then.status(status).json_body(body);
        })
    }

    /// Well-behaved baseline surface shared by every level.
    pub fn serve_baseline(&self) {
        self.serve_jwks(vec![jwk(&self.signer, KID)]);
        self.serve_recognition(json!({
            "entity_id": RECOGNITION_ENTITY,
            "recognized": true,
            "meta": fresh_meta(),
        }));
        self.serve_unknown_entity(
            404,
            json!({"error": "not_found", "message": "not found", "meta": fresh_meta()}),
        );
        self.serve_context_probe(200, decision_payload(json!({"purpose": "conformance-probe"})));
    }

    /// Conformant deployment at `level`. Signed responses are returned for
    /// `Accept-Signature: jws` from AL2 and by default from AL3.
    pub fn conformant(level: AssuranceLevel) -> Self {
        Self::conformant_with(level, |_| {})
    }

    /// Conformant deployment whose metadata document is first passed to `edit`.
    pub fn conformant_with(level: AssuranceLevel, edit: impl FnOnce(&mut Value)) -> Self {
        let sut = Self::start();
        let mut doc = metadata_doc(level.as_str(), &sut.base());
        edit(&mut doc);
        sut.serve_metadata(doc);
        sut.serve_baseline();
        let mut payload =
            decision_payload(json!({"purpose": "conformance-probe", "locale": "en-US"}));
        payload["meta"]["query_hash"] = json!(QUERY_HASH);
        let envelope_meta = json!({
            "query_hash": QUERY_HASH,
            "iat": Utc::now().timestamp(),
            "exp": Utc::now().timestamp() + 300,
        });
        let signed = signed_envelope(&sut.signer, KID, &payload, Some(envelope_meta));
        let jws_body = if level >= AssuranceLevel::Al2 {
            signed.clone()
        } else {
            payload.clone()
        };
        let default_body = if level >= AssuranceLevel::Al3 {
            signed
        } else {
            payload
        };
        sut.serve_authorization("jws", 200, jws_body);
        sut.serve_authorization("none", 200, default_body);
        if level >= AssuranceLevel::Al3 {
            sut.serve_document("/changelog", 200);
        }
        if level == AssuranceLevel::Al4 {
            sut.serve_document("/evidence/keys", 200);
            sut.serve_document("/evidence/runbook", 200);
        }
        sut
    }

    pub fn client(&self) -> TrqpClient {
        TrqpClient::new(ClientConfig {
            base_url: self.base(),
            token: Some("dev-token".to_string()),
            dpop: None,
            timeout: std::time::Duration::from_secs(5),
        })
        .expect("client")
    }

    /// Runs the standard suite in-process.
    pub fn run(&self, expected: Option<AssuranceLevel>) -> ConformanceReport {
        let settings = SuiteSettings::new(expected).expect("settings");
        self.run_with(&settings)
    }

    pub fn run_with(&self, settings: &SuiteSettings) -> ConformanceReport {
        let registry = Registry::standard().expect("registry");
        let client = self.client();
        let ctx = CheckContext {
            client: &client,
            settings,
        };
        let aggregator = ReportAggregator::new(&registry);
        run_suite(&registry, &ctx, RunOptions::default(), &aggregator);
        aggregator.finalize(trqp_tspp::domain::models::ReportTarget {
            base_url: self.base(),
            expected_assurance_level: settings.expected_level,
        })
    }

    /// Runs a single check by id.
    pub fn run_check(&self, check_id: &str, settings: &SuiteSettings) -> (OutcomeKind, String) {
        let registry = Registry::standard().expect("registry");
        let check = registry
            .checks()
            .iter()
            .find(|c| c.id == check_id)
            .expect("known check id");
        let client = self.client();
        let ctx = CheckContext {
            client: &client,
            settings,
        };
        let outcome = execute(check, &ctx, &registry);
        (outcome.outcome, outcome.notes.unwrap_or_default())
    }
}

pub fn outcome_of(report: &ConformanceReport, check_id: &str) -> OutcomeKind {
    report
        .results
        .iter()
        .find(|r| r.check_id == check_id)
        .map(|r| r.outcome)
        .expect("check present in report")
}

pub fn bin() -> Command {
    let mut cmd = cargo_bin_cmd!("trqp-tspp");
    cmd.env_remove("TRQP_BASE_URL")
        .env_remove("TRQP_BEARER_TOKEN")
        .env_remove("TRQP_DPOP")
        .env_remove("TSPP_EXPECT_AL")
        .env_remove("TSPP_REPORT_PATH")
        .env_remove("TSPP_QUERIES")
        .env_remove("TSPP_BRIDGE_FIXTURES")
        .env_remove("RUST_LOG");
    cmd
}
