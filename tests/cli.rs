mod common;

use common::{bin, decision_payload, identity, jwk, signed_envelope, FakeSut, KID};
use predicates::str::contains;
use serde_json::{json, Value};
use tempfile::TempDir;
use trqp_tspp::domain::models::AssuranceLevel;

#[test]
fn checks_lists_traceability_table() {
    bin()
        .arg("checks")
        .assert()
        .success()
        .stdout(contains("metadata_published_and_valid\tALL\tTSPP-META-01,TSPP-META-02"))
        .stdout(contains("ratelimit_headers_on_429\tALL exclusive"))
        .stdout(contains("al4_monitoring_declared\tAL4-only"));
}

#[test]
fn checks_json_carries_every_check() {
    let out = bin().args(["--json", "checks"]).output().expect("run checks");
    assert!(out.status.success());
    let doc: Value = serde_json::from_slice(&out.stdout).expect("json");
    assert_eq!(doc["ok"], true);
    let data = doc["data"].as_array().expect("array");
    assert_eq!(data.len(), 17);
    assert_eq!(data[0]["check_id"], "metadata_published_and_valid");
    assert_eq!(data[10]["applicability"], "AL2+");
}

#[test]
fn run_against_conformant_sut_succeeds() {
    let sut = FakeSut::conformant(AssuranceLevel::Al1);
    let dir = TempDir::new().expect("temp dir");
    let report = dir.path().join("tspp.json");

    bin()
        .args(["run", "--base-url", &sut.base(), "--expect-al", "AL1", "--report"])
        .arg(&report)
        .assert()
        .success()
        .stdout(contains("PASS\tmetadata_published_and_valid"))
        .stdout(contains("TSPP-TRQP-0.1 conformant"))
        .stdout(contains("report: "));
    assert!(report.exists());
}

#[test]
fn run_json_reports_ok_true() {
    let sut = FakeSut::conformant(AssuranceLevel::Al2);
    let out = bin()
        .args(["--json", "run", "--expect-al", "al2", "--jobs", "3"])
        .env("TRQP_BASE_URL", sut.base())
        .env("TRQP_BEARER_TOKEN", "dev-token")
        .output()
        .expect("run");
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let doc: Value = serde_json::from_slice(&out.stdout).expect("json");
    assert_eq!(doc["ok"], true);
    assert_eq!(doc["data"]["profile"], "TSPP-TRQP-0.1");
    assert_eq!(doc["data"]["summary"]["exit_status"], 0);
    assert_eq!(doc["data"]["target"]["expected_assurance_level"], "AL2");
}

#[test]
fn non_conformant_run_exits_one() {
    let sut = FakeSut::conformant(AssuranceLevel::Al1);
    bin()
        .args(["run", "--base-url", &sut.base(), "--expect-al", "AL3"])
        .assert()
        .code(1)
        .stdout(contains("FAIL\tmetadata_published_and_valid"))
        .stdout(contains("NOT conformant"));
}

#[test]
fn run_without_base_url_is_a_usage_error() {
    bin()
        .arg("run")
        .assert()
        .failure()
        .stderr(contains("--base-url"));
}

#[test]
fn run_rejects_non_http_base_url() {
    bin()
        .args(["run", "--base-url", "ftp://registry.example"])
        .assert()
        .failure()
        .stderr(contains("http(s)"));
}

#[test]
fn run_rejects_unknown_assurance_level() {
    bin()
        .args(["run", "--base-url", "http://127.0.0.1:9", "--expect-al", "AL9"])
        .assert()
        .failure()
        .stderr(contains("unknown assurance level"));
}

#[test]
fn run_rejects_unreadable_bridge_fixtures() {
    let dir = TempDir::new().expect("temp dir");
    bin()
        .args(["run", "--base-url", "http://127.0.0.1:9", "--bridge-fixtures"])
        .arg(dir.path().join("missing.json"))
        .assert()
        .failure()
        .stderr(contains("missing.json"));
}

fn write(dir: &TempDir, name: &str, doc: &Value) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, serde_json::to_string_pretty(doc).expect("encode")).expect("write");
    path
}

#[test]
fn verify_accepts_matching_key_set() {
    let dir = TempDir::new().expect("temp dir");
    let key = identity(3);
    let payload = decision_payload(json!({"purpose": "audit"}));
    let envelope = write(&dir, "env.json", &signed_envelope(&key, KID, &payload, None));
    let jwks = write(&dir, "jwks.json", &json!({"keys": [jwk(&key, KID)]}));

    let out = bin()
        .args(["--json", "verify", "--envelope"])
        .arg(&envelope)
        .arg("--jwks")
        .arg(&jwks)
        .output()
        .expect("verify");
    assert!(out.status.success());
    let doc: Value = serde_json::from_slice(&out.stdout).expect("json");
    assert_eq!(doc["ok"], true);
    assert_eq!(doc["data"]["verified"], true);
    assert_eq!(doc["data"]["kid"], KID);
    assert_eq!(doc["data"]["payload_bound"], true);
}

#[test]
fn verify_rejects_foreign_key_set() {
    let dir = TempDir::new().expect("temp dir");
    let payload = decision_payload(json!({"purpose": "audit"}));
    let envelope = write(&dir, "env.json", &signed_envelope(&identity(3), KID, &payload, None));
    let jwks = write(&dir, "jwks.json", &json!({"keys": [jwk(&identity(4), KID)]}));

    bin()
        .args(["verify", "--envelope"])
        .arg(&envelope)
        .arg("--jwks")
        .arg(&jwks)
        .assert()
        .code(1)
        .stdout(contains("verified=false"))
        .stdout(contains("reason: "));
}

#[test]
fn verify_reports_unsigned_body() {
    let dir = TempDir::new().expect("temp dir");
    let envelope = write(&dir, "plain.json", &decision_payload(json!({})));
    let jwks = write(&dir, "jwks.json", &json!({"keys": []}));

    bin()
        .args(["verify", "--envelope"])
        .arg(&envelope)
        .arg("--jwks")
        .arg(&jwks)
        .assert()
        .code(1)
        .stdout(contains("not a signed envelope"));
}
