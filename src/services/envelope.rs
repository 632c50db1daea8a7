//! PlainPayload / SignedEnvelope unwrapping.
//!
//! A body is a signed envelope iff it is a JSON object carrying both a
//! `payload` and a `signature` key. Everything else, including non-objects,
//! is a plain payload. Every consumer of a TRQP response goes through
//! [`unwrap`] so the rule is applied in one place.

use serde_json::{Map, Value};

/// Signature block of a signed envelope. Fields are optional here; checks
/// decide which ones are mandatory for a given assurance level.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignatureBlock {
    pub alg: Option<String>,
    pub kid: Option<String>,
    pub jws: Option<String>,
    pub query_hash: Option<String>,
    pub hash_alg: Option<String>,
    pub issued_at: Option<String>,
}

impl SignatureBlock {
    fn from_value(value: &Value) -> Self {
        let field = |name: &str| {
            value
                .get(name)
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        Self {
            alg: field("alg"),
            kid: field("kid"),
            jws: field("jws"),
            query_hash: field("query_hash"),
            hash_alg: field("hash_alg"),
            issued_at: field("issued_at"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignedEnvelope {
    pub payload: Value,
    pub signature: SignatureBlock,
    /// Envelope-level `meta` (AL3: `query_hash`, `iat`, `exp`).
    pub meta: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseEnvelope {
    Plain(Value),
    Signed(SignedEnvelope),
}

impl ResponseEnvelope {
    pub fn payload(&self) -> &Value {
        match self {
            Self::Plain(p) => p,
            Self::Signed(s) => &s.payload,
        }
    }

    pub fn signature(&self) -> Option<&SignatureBlock> {
        match self {
            Self::Plain(_) => None,
            Self::Signed(s) => Some(&s.signature),
        }
    }

    pub fn as_signed(&self) -> Option<&SignedEnvelope> {
        match self {
            Self::Plain(_) => None,
            Self::Signed(s) => Some(s),
        }
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, Self::Signed(_))
    }
}

pub fn unwrap(body: &Value) -> ResponseEnvelope {
    let Some(obj) = body.as_object() else {
        return ResponseEnvelope::Plain(body.clone());
    };
    match (obj.get("payload"), obj.get("signature")) {
        (Some(payload), Some(signature)) => ResponseEnvelope::Signed(SignedEnvelope {
            payload: payload.clone(),
            signature: SignatureBlock::from_value(signature),
            meta: obj.get("meta").and_then(Value::as_object).cloned(),
        }),
        _ => ResponseEnvelope::Plain(body.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_body_is_its_own_payload() {
        let body = json!({"decision": {"authorized": "true"}, "meta": {}});
        let env = unwrap(&body);
        assert!(!env.is_signed());
        assert_eq!(env.payload(), &body);
        assert!(env.signature().is_none());
    }

    #[test]
    fn payload_without_signature_stays_plain() {
        let body = json!({"payload": {"decision": true}});
        assert_eq!(unwrap(&body), ResponseEnvelope::Plain(body.clone()));
        let body = json!({"signature": {"jws": "a.b.c"}});
        assert_eq!(unwrap(&body), ResponseEnvelope::Plain(body.clone()));
    }

    #[test]
    fn non_objects_are_plain() {
        for body in [json!(null), json!("text"), json!([1, 2]), json!(7)] {
            assert_eq!(unwrap(&body), ResponseEnvelope::Plain(body.clone()));
        }
    }

    #[test]
    fn signed_envelope_exposes_block_and_meta() {
        let body = json!({
            "payload": {"recognized": true},
            "signature": {
                "alg": "RS256", "kid": "ref-kid-1", "jws": "h.p.s",
                "query_hash": "ab12", "hash_alg": "SHA-256",
                "issued_at": "2026-01-01T00:00:00Z"
            },
            "meta": {"query_hash": "ab12", "iat": 1, "exp": 2}
        });
        let env = unwrap(&body);
        let signed = env.as_signed().expect("signed");
        assert_eq!(signed.payload, json!({"recognized": true}));
        assert_eq!(signed.signature.kid.as_deref(), Some("ref-kid-1"));
        assert_eq!(signed.signature.hash_alg.as_deref(), Some("SHA-256"));
        assert_eq!(signed.meta.as_ref().map(|m| m.len()), Some(3));
    }

    #[test]
    fn unwrapping_is_deterministic() {
        let bodies = [
            json!({"payload": {"a": 1}, "signature": "opaque"}),
            json!({"payload": {"a": 1}}),
            json!({"payload": 3, "signature": {"jws": "x.y.z"}, "extra": true}),
        ];
        for body in bodies {
            assert_eq!(unwrap(&body), unwrap(&body));
        }
        let odd = unwrap(&json!({"payload": {"a": 1}, "signature": "opaque"}));
        assert_eq!(odd.signature(), Some(&SignatureBlock::default()));
    }
}
