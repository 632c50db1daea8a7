use crate::domain::errors::CheckError;
use jsonschema::JSONSchema;
use serde_json::Value;
use std::collections::BTreeSet;

const METADATA_SCHEMA: &str = include_str!("../../schemas/tspp-trqp-metadata.schema.json");
const SIGNED_RESPONSE_SCHEMA: &str =
    include_str!("../../schemas/tspp-trqp-signed-response.schema.json");
const ERROR_RESPONSE_SCHEMA: &str =
    include_str!("../../schemas/tspp-trqp-error-response.schema.json");
const REPORT_SCHEMA: &str = include_str!("../../schemas/tspp-conformance-report.schema.json");

/// Marker key set for samples whose body was not a JSON object.
pub const NON_OBJECT_SHAPE: &str = "<non-object>";

/// Schemas compiled into the binary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BundledSchema {
    Metadata,
    SignedResponse,
    ErrorResponse,
    Report,
}

impl BundledSchema {
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Metadata => "tspp-trqp-metadata.schema.json",
            Self::SignedResponse => "tspp-trqp-signed-response.schema.json",
            Self::ErrorResponse => "tspp-trqp-error-response.schema.json",
            Self::Report => "tspp-conformance-report.schema.json",
        }
    }

    fn source(self) -> &'static str {
        match self {
            Self::Metadata => METADATA_SCHEMA,
            Self::SignedResponse => SIGNED_RESPONSE_SCHEMA,
            Self::ErrorResponse => ERROR_RESPONSE_SCHEMA,
            Self::Report => REPORT_SCHEMA,
        }
    }

    pub fn load(self) -> anyhow::Result<Value> {
        serde_json::from_str(self.source())
            .map_err(|e| anyhow::anyhow!("bundled schema {} is invalid: {}", self.file_name(), e))
    }
}

/// Validates `instance` and reports every unmet constraint, not just the first.
pub fn validate_against_schema(instance: &Value, schema: &Value) -> Result<(), CheckError> {
    let validator = JSONSchema::compile(schema)
        .map_err(|e| anyhow::anyhow!("schema does not compile: {}", e))?;
    let violations: Vec<String> = match validator.validate(instance) {
        Ok(()) => return Ok(()),
        Err(errors) => errors
            .map(|e| {
                let path = e.instance_path.to_string();
                if path.is_empty() {
                    e.to_string()
                } else {
                    format!("{}: {}", path, e)
                }
            })
            .collect(),
    };
    Err(CheckError::SchemaViolation(violations))
}

pub fn validate_bundled(instance: &Value, schema: BundledSchema) -> Result<(), CheckError> {
    let schema = schema.load()?;
    validate_against_schema(instance, &schema)
}

pub fn key_set(value: &Value) -> BTreeSet<String> {
    match value.as_object() {
        Some(obj) => obj.keys().cloned().collect(),
        None => BTreeSet::from([NON_OBJECT_SHAPE.to_string()]),
    }
}

/// Fails when repeated probes of the same surface produced different key sets.
pub fn assert_stable_shape(samples: &[BTreeSet<String>]) -> Result<(), CheckError> {
    let distinct: BTreeSet<&BTreeSet<String>> = samples.iter().collect();
    if distinct.len() <= 1 {
        return Ok(());
    }
    Err(CheckError::ShapeInconsistency(
        distinct
            .into_iter()
            .map(|keys| {
                format!(
                    "{{{}}}",
                    keys.iter().map(String::as_str).collect::<Vec<_>>().join(",")
                )
            })
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::OutcomeKind;
    use serde_json::json;

    fn al1_metadata() -> Value {
        json!({
            "profile": "TSPP-TRQP-0.1",
            "assurance_level": "AL1",
            "auth": {"scheme": "bearer", "token_format": "opaque"},
            "rate_limits": {"burst": 10, "window_seconds": 60},
            "freshness": {"max_skew_seconds": 120, "default_ttl_seconds": 300},
            "context_allowlist": ["purpose", "audience", "locale"],
            "signing": {"response_signing": "optional", "jwks_uri": "https://sut/jwks"}
        })
    }

    #[test]
    fn bundled_schemas_compile() {
        for s in [
            BundledSchema::Metadata,
            BundledSchema::SignedResponse,
            BundledSchema::ErrorResponse,
            BundledSchema::Report,
        ] {
            let schema = s.load().expect("parse bundled schema");
            JSONSchema::compile(&schema).expect("compile bundled schema");
        }
    }

    #[test]
    fn conformant_metadata_validates() {
        validate_bundled(&al1_metadata(), BundledSchema::Metadata).expect("valid");
    }

    #[test]
    fn every_violation_is_listed() {
        let mut m = al1_metadata();
        m["assurance_level"] = json!("AL9");
        m["rate_limits"]["burst"] = json!("lots");
        m.as_object_mut().expect("object").remove("signing");

        let err = validate_bundled(&m, BundledSchema::Metadata).expect_err("invalid");
        assert_eq!(err.outcome(), OutcomeKind::Fail);
        let CheckError::SchemaViolation(violations) = err else {
            panic!("expected schema violation");
        };
        assert!(violations.len() >= 3, "{violations:?}");
        assert!(violations.iter().any(|v| v.contains("/rate_limits/burst")));
        assert!(violations.iter().any(|v| v.contains("signing")));
    }

    #[test]
    fn al3_metadata_requires_transparency() {
        let mut m = al1_metadata();
        m["assurance_level"] = json!("AL3");
        let err = validate_bundled(&m, BundledSchema::Metadata).expect_err("missing transparency");
        assert!(err.to_string().contains("transparency"));

        m["transparency"] = json!({
            "change_log_uri": "https://sut/changelog",
            "published_at": "2026-01-01T00:00:00Z"
        });
        validate_bundled(&m, BundledSchema::Metadata).expect("valid");
    }

    #[test]
    fn error_response_rejects_extra_keys() {
        let ok = json!({"error": "not_found", "message": "not found", "meta": {}});
        validate_bundled(&ok, BundledSchema::ErrorResponse).expect("valid");
        let leaky = json!({
            "error": "not_found", "message": "no such entity", "meta": {},
            "entity_hint": "did:example:issuer-00"
        });
        assert!(validate_bundled(&leaky, BundledSchema::ErrorResponse).is_err());
    }

    #[test]
    fn identical_shapes_are_stable() {
        let a = key_set(&json!({"error": "x", "message": "y", "meta": {}}));
        let b = key_set(&json!({"meta": {"t": 1}, "message": "z", "error": "q"}));
        assert_stable_shape(&[a.clone(), b, a]).expect("stable");
        assert_stable_shape(&[]).expect("no samples is trivially stable");
    }

    #[test]
    fn differing_shapes_are_reported() {
        let a = key_set(&json!({"error": "x", "message": "y", "meta": {}}));
        let b = key_set(&json!({"error": "x", "message": "y", "meta": {}, "hint": "z"}));
        let c = key_set(&json!("plain text"));
        let err = assert_stable_shape(&[a, b, c]).expect_err("unstable");
        let CheckError::ShapeInconsistency(shapes) = &err else {
            panic!("expected shape inconsistency");
        };
        assert_eq!(shapes.len(), 3);
        assert!(shapes.iter().any(|s| s.contains(NON_OBJECT_SHAPE)));
        assert_eq!(err.outcome(), OutcomeKind::Fail);
    }
}
