use crate::domain::constants::{AUTHORIZATION_PATH, METADATA_PATH, RECOGNITION_PATH};
use crate::domain::errors::TransportError;
use crate::domain::models::{ProbeOperation, ProbeRequest, ProbeResponse, SignaturePreference};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub dpop: Option<String>,
    pub timeout: Duration,
}

/// Single-shot TRQP client. Holds no mutable state, so one instance can be
/// shared by reference across worker threads.
pub struct TrqpClient {
    config: ClientConfig,
    http: Client,
}

impl TrqpClient {
    pub fn new(config: ClientConfig) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        let base_url = config.base_url.trim_end_matches('/').to_string();
        Ok(Self {
            config: ClientConfig { base_url, ..config },
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn fetch_metadata(&self) -> Result<ProbeResponse, TransportError> {
        self.send(&ProbeRequest::metadata())
    }

    pub fn post_authorization(
        &self,
        body: &Value,
        signature: SignaturePreference,
    ) -> Result<ProbeResponse, TransportError> {
        self.send(&ProbeRequest::authorization(body.clone(), signature))
    }

    pub fn post_recognition(
        &self,
        body: &Value,
        signature: SignaturePreference,
    ) -> Result<ProbeResponse, TransportError> {
        self.send(&ProbeRequest::recognition(body.clone(), signature))
    }

    pub fn send(&self, request: &ProbeRequest) -> Result<ProbeResponse, TransportError> {
        let url = self.url_for(request.operation);
        let request_id = uuid::Uuid::new_v4().to_string();
        let builder = match (&request.operation, &request.body) {
            (ProbeOperation::Metadata, _) | (_, None) => self.http.get(&url),
            (_, Some(body)) => self.http.post(&url).body(body.to_string()),
        };
        let builder = self.with_protocol_headers(builder, request.signature, &request_id);
        debug!(url = %url, request_id = %request_id, accept_signature = request.signature.as_header(), "probe");
        self.execute(&url, builder, request_id)
    }

    /// Unauthenticated GET of a URI the SUT declared (JWKS, evidence, change log).
    pub fn fetch_uri(&self, uri: &str) -> Result<ProbeResponse, TransportError> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let builder = self
            .http
            .get(uri)
            .header(ACCEPT, "application/json")
            .header("X-Request-ID", request_id.as_str());
        debug!(url = %uri, request_id = %request_id, "dereference");
        self.execute(uri, builder, request_id)
    }

    fn url_for(&self, operation: ProbeOperation) -> String {
        let path = match operation {
            ProbeOperation::Metadata => METADATA_PATH,
            ProbeOperation::Authorization => AUTHORIZATION_PATH,
            ProbeOperation::Recognition => RECOGNITION_PATH,
        };
        format!("{}{}", self.config.base_url, path)
    }

    fn with_protocol_headers(
        &self,
        builder: RequestBuilder,
        signature: SignaturePreference,
        request_id: &str,
    ) -> RequestBuilder {
        let mut builder = builder
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .header("Accept-Signature", signature.as_header())
            .header("X-Request-ID", request_id);
        if let Some(token) = &self.config.token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(dpop) = &self.config.dpop {
            builder = builder.header("DPoP", dpop.as_str());
        }
        builder
    }

    fn execute(
        &self,
        url: &str,
        builder: RequestBuilder,
        request_id: String,
    ) -> Result<ProbeResponse, TransportError> {
        let started = Instant::now();
        let resp = builder.send().map_err(|e| self.transport_error(url, e))?;
        let status = resp.status().as_u16();
        let headers: BTreeMap<String, String> = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|v| (k.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = resp
            .bytes()
            .map_err(|e| self.transport_error(url, e))?
            .to_vec();
        let json = serde_json::from_slice(&body).ok();
        let elapsed = started.elapsed();
        debug!(url = %url, status, elapsed_ms = elapsed.as_millis() as u64, "response");
        Ok(ProbeResponse {
            status,
            headers,
            body,
            json,
            request_id,
            elapsed,
        })
    }

    fn transport_error(&self, url: &str, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout {
                url: url.to_string(),
                timeout: self.config.timeout,
            }
        } else {
            TransportError::Failed {
                url: url.to_string(),
                message: e.to_string(),
            }
        }
    }
}
