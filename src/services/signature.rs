use crate::domain::errors::CheckError;
use crate::services::client::TrqpClient;
use crate::services::envelope::{SignatureBlock, SignedEnvelope};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use jsonwebtoken::jwk::Jwk;
use jsonwebtoken::{Algorithm, DecodingKey};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::str::FromStr;
use tracing::{debug, warn};

/// Public keys published at the SUT's `jwks_uri`, in document order.
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    keys: Vec<Jwk>,
}

impl KeySet {
    /// Records that do not parse as a JWK are dropped, not fatal.
    pub fn from_jwks(document: &Value) -> Self {
        let records = document
            .get("keys")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let mut keys = Vec::new();
        for (index, record) in records.iter().enumerate() {
            match serde_json::from_value::<Jwk>(record.clone()) {
                Ok(jwk) => keys.push(jwk),
                Err(e) => warn!(index, error = %e, "dropping unparseable JWK record"),
            }
        }
        Self { keys }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Keys whose `kid` matches; every key when `kid` is absent or unmatched.
    fn candidates(&self, kid: Option<&str>) -> Vec<&Jwk> {
        if let Some(kid) = kid {
            let matched: Vec<&Jwk> = self
                .keys
                .iter()
                .filter(|k| k.common.key_id.as_deref() == Some(kid))
                .collect();
            if !matched.is_empty() {
                return matched;
            }
        }
        self.keys.iter().collect()
    }
}

/// Single unauthenticated GET. An unreachable or empty key set means the
/// capability is not available, which callers report as SKIP.
pub fn fetch_key_set(client: &TrqpClient, uri: &str) -> Result<KeySet, CheckError> {
    let resp = client.fetch_uri(uri)?;
    if resp.status != 200 {
        return Err(CheckError::MissingCapability(format!(
            "jwks_uri {} answered HTTP {}",
            uri, resp.status
        )));
    }
    let Some(document) = resp.json.as_ref() else {
        return Err(CheckError::MissingCapability(format!(
            "jwks_uri {} did not return JSON",
            uri
        )));
    };
    let keys = KeySet::from_jwks(document);
    if keys.is_empty() {
        return Err(CheckError::MissingCapability(format!(
            "key set at {} has no usable keys",
            uri
        )));
    }
    debug!(uri, keys = keys.len(), "fetched key set");
    Ok(keys)
}

/// The three segments of a compact JWS. An empty payload segment marks a
/// detached signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactJws<'a> {
    header: &'a str,
    payload: &'a str,
    signature: &'a str,
}

impl<'a> CompactJws<'a> {
    pub fn parse(token: &'a str) -> Option<Self> {
        let mut parts = token.trim().split('.');
        let (Some(header), Some(payload), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return None;
        };
        if header.is_empty() || signature.is_empty() {
            return None;
        }
        Some(Self {
            header,
            payload,
            signature,
        })
    }

    pub fn is_detached(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn protected_header(&self) -> Option<Value> {
        decode_segment(self.header)
    }

    pub fn signed_payload(&self) -> Option<Value> {
        decode_segment(self.payload)
    }

    fn signing_input(&self, detached: Option<&Value>) -> Option<String> {
        if self.is_detached() {
            let payload = detached?;
            Some(format!(
                "{}.{}",
                self.header,
                URL_SAFE_NO_PAD.encode(canonical_json(payload))
            ))
        } else {
            Some(format!("{}.{}", self.header, self.payload))
        }
    }
}

fn decode_segment(segment: &str) -> Option<Value> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// True when some key in `key_set` verifies the block's compact JWS.
pub fn verify(signature: &SignatureBlock, key_set: &KeySet) -> bool {
    verify_token(signature, None, key_set).is_ok()
}

/// Verifies an envelope, reattaching its payload when the JWS is detached.
/// Returns the verifying key id, or the reason verification failed.
pub fn verify_envelope(
    envelope: &SignedEnvelope,
    key_set: &KeySet,
) -> Result<Option<String>, String> {
    verify_token(&envelope.signature, Some(&envelope.payload), key_set)
}

fn verify_token(
    signature: &SignatureBlock,
    detached: Option<&Value>,
    key_set: &KeySet,
) -> Result<Option<String>, String> {
    let token = signature
        .jws
        .as_deref()
        .ok_or("signature block carries no jws")?;
    let jws = CompactJws::parse(token).ok_or("jws is not a compact serialization")?;
    let header = jws
        .protected_header()
        .ok_or("protected header is not base64url JSON")?;
    let alg_name = header
        .get("alg")
        .and_then(Value::as_str)
        .ok_or("protected header has no alg")?;
    let alg = Algorithm::from_str(alg_name).map_err(|_| format!("unsupported alg {}", alg_name))?;
    if matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
        return Err(format!(
            "symmetric alg {} cannot be verified against a published key set",
            alg_name
        ));
    }
    if let Some(declared) = signature.alg.as_deref() {
        if declared != alg_name {
            return Err(format!(
                "declared alg {} disagrees with protected header alg {}",
                declared, alg_name
            ));
        }
    }
    if key_set.is_empty() {
        return Err("key set is empty".to_string());
    }

    let kid = header
        .get("kid")
        .and_then(Value::as_str)
        .or(signature.kid.as_deref());
    let message = jws
        .signing_input(detached)
        .ok_or("detached jws without a payload to reattach")?;

    for jwk in key_set.candidates(kid) {
        let key = match DecodingKey::from_jwk(jwk) {
            Ok(k) => k,
            Err(e) => {
                debug!(kid = ?jwk.common.key_id, error = %e, "key unusable for verification");
                continue;
            }
        };
        if let Ok(true) = jsonwebtoken::crypto::verify(jws.signature, message.as_bytes(), &key, alg)
        {
            return Ok(jwk.common.key_id.clone());
        }
    }
    Err(format!(
        "no key in the published set ({} keys) verifies the {} signature{}",
        key_set.len(),
        alg_name,
        kid.map(|k| format!(" for kid {}", k)).unwrap_or_default()
    ))
}

/// Whether the JWS actually signs the envelope's `payload`. `None` when
/// there is no parseable JWS to compare.
pub fn payload_binding(envelope: &SignedEnvelope) -> Option<bool> {
    let jws = CompactJws::parse(envelope.signature.jws.as_deref()?)?;
    if jws.is_detached() {
        return Some(true);
    }
    Some(jws.signed_payload().as_ref() == Some(&envelope.payload))
}

/// Whether the declared `query_hash` is covered by the signature input,
/// either in the protected header or inside the signed payload. `None` when
/// no `query_hash` is declared.
pub fn query_hash_binding(envelope: &SignedEnvelope) -> Option<bool> {
    let declared = envelope.signature.query_hash.as_deref().or_else(|| {
        envelope
            .meta
            .as_ref()
            .and_then(|m| m.get("query_hash"))
            .and_then(Value::as_str)
    })?;
    let Some(jws) = envelope.signature.jws.as_deref().and_then(CompactJws::parse) else {
        return Some(false);
    };
    let carries = |v: &Value| v.get("query_hash").and_then(Value::as_str) == Some(declared);
    let in_header = jws.protected_header().map(|h| carries(&h)).unwrap_or(false);
    let signed = if jws.is_detached() {
        Some(envelope.payload.clone())
    } else {
        jws.signed_payload()
    };
    let in_payload = signed
        .map(|p| carries(&p) || p.get("meta").map(carries).unwrap_or(false))
        .unwrap_or(false);
    Some(in_header || in_payload)
}

/// Compact JSON with object keys sorted at every level.
pub fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let members: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{}:{}", Value::String(k.clone()), canonical_json(&map[k])))
                .collect();
            format!("{{{}}}", members.join(","))
        }
        Value::Array(items) => format!(
            "[{}]",
            items.iter().map(canonical_json).collect::<Vec<_>>().join(",")
        ),
        other => other.to_string(),
    }
}

/// SHA-256 over allowlisted context keys plus the primary identifiers, the
/// binding the reference deployment uses. Canonicalization is operator
/// defined, so a mismatch is informative only.
pub fn recompute_query_hash(request: &Value, allowlist: &[String]) -> String {
    let mut bound = Map::new();
    if let Some(ctx) = request.get("context").and_then(Value::as_object) {
        for k in allowlist {
            if let Some(v) = ctx.get(k) {
                bound.insert(k.clone(), v.clone());
            }
        }
    }
    for k in ["entity_id", "subject_authority_id"] {
        if let Some(v) = request.get(k) {
            bound.insert(k.to_string(), v.clone());
        }
    }
    hex::encode(Sha256::digest(canonical_json(&Value::Object(bound)).as_bytes()))
}
