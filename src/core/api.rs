//! Remote service API boundary.
//!
//! The pipeline drives the remote service through two narrow traits: the
//! version directory (list/clone/activate) and the per-version resource
//! API (domains, backends, package upload). The production implementation
//! is a single HTTP client; tests substitute recording fakes.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::BackendSpec;
use crate::error::{Error, RemoteRequestDetails, Result};
use crate::version::RemoteVersion;

pub const DEFAULT_ENDPOINT: &str = "https://api.roadie-edge.com";

pub const ENDPOINT_ENV: &str = "ROADIE_API_ENDPOINT";
pub const TOKEN_ENV: &str = "ROADIE_API_TOKEN";

/// A domain name attached to a service version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainRecord {
    pub name: String,
}

/// An origin server attached to a service version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendRecord {
    pub name: String,
    pub address: String,
    pub port: u16,
}

/// Remote directory of service versions.
pub trait VersionDirectory {
    fn list_versions(&self, service_id: &str) -> Result<Vec<RemoteVersion>>;
    fn clone_version(&self, service_id: &str, number: u64) -> Result<RemoteVersion>;
    fn activate_version(&self, service_id: &str, number: u64) -> Result<()>;
}

/// Per-version remote resources the deploy pipeline ensures and fills.
pub trait ResourceApi {
    fn list_domains(&self, service_id: &str, version: u64) -> Result<Vec<DomainRecord>>;
    fn create_domain(&self, service_id: &str, version: u64, name: &str) -> Result<()>;
    fn list_backends(&self, service_id: &str, version: u64) -> Result<Vec<BackendRecord>>;
    fn create_backend(&self, service_id: &str, version: u64, spec: &BackendSpec) -> Result<()>;
    fn upload_package(&self, service_id: &str, version: u64, bytes: &[u8]) -> Result<()>;
}

/// HTTP client for the edge service API.
pub struct ApiClient {
    client: reqwest::blocking::Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    /// Build a client from `ROADIE_API_TOKEN` / `ROADIE_API_ENDPOINT`.
    pub fn from_env() -> Result<Self> {
        let token = std::env::var(TOKEN_ENV)
            .map_err(|_| {
                Error::config_missing_key(TOKEN_ENV, Some("environment".to_string()))
                    .with_hint("Export an API token: ROADIE_API_TOKEN=<token>")
            })?;
        let base_url =
            std::env::var(ENDPOINT_ENV).unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());
        Ok(Self::new(base_url, token))
    }

    fn transport_error(&self, method: &str, endpoint: &str, err: reqwest::Error) -> Error {
        Error::remote_unavailable(RemoteRequestDetails {
            method: method.to_string(),
            endpoint: endpoint.to_string(),
            status: None,
            error: err.to_string(),
        })
    }

    fn status_error(&self, method: &str, endpoint: &str, status: u16, body: &str) -> Error {
        Error::remote_request_failed(RemoteRequestDetails {
            method: method.to_string(),
            endpoint: endpoint.to_string(),
            status: Some(status),
            error: body.trim().to_string(),
        })
    }

    fn get(&self, endpoint: &str) -> Result<Value> {
        let url = format!("{}{}", self.base_url, endpoint);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .map_err(|e| self.transport_error("GET", endpoint, e))?;
        self.parse_json("GET", endpoint, response)
    }

    fn put(&self, endpoint: &str, body: &Value) -> Result<Value> {
        let url = format!("{}{}", self.base_url, endpoint);
        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .map_err(|e| self.transport_error("PUT", endpoint, e))?;
        self.parse_json("PUT", endpoint, response)
    }

    fn post(&self, endpoint: &str, body: &Value) -> Result<Value> {
        let url = format!("{}{}", self.base_url, endpoint);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .map_err(|e| self.transport_error("POST", endpoint, e))?;
        self.parse_json("POST", endpoint, response)
    }

    fn parse_json(
        &self,
        method: &str,
        endpoint: &str,
        response: reqwest::blocking::Response,
    ) -> Result<Value> {
        let status = response.status();
        let body = response
            .text()
            .map_err(|e| self.transport_error(method, endpoint, e))?;

        if !status.is_success() {
            return Err(self.status_error(method, endpoint, status.as_u16(), &body));
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(|e| {
            Error::internal_json(
                format!("Invalid JSON response: {}", e),
                Some(format!("{} {}", method, endpoint)),
            )
        })
    }

    fn decode<T: serde::de::DeserializeOwned>(&self, endpoint: &str, value: Value) -> Result<T> {
        serde_json::from_value(value).map_err(|e| {
            Error::internal_json(e.to_string(), Some(format!("decode {}", endpoint)))
        })
    }
}

impl VersionDirectory for ApiClient {
    fn list_versions(&self, service_id: &str) -> Result<Vec<RemoteVersion>> {
        let endpoint = format!("/service/{}/version", service_id);
        let value = self.get(&endpoint)?;
        self.decode(&endpoint, value)
    }

    fn clone_version(&self, service_id: &str, number: u64) -> Result<RemoteVersion> {
        let endpoint = format!("/service/{}/version/{}/clone", service_id, number);
        let value = self.put(&endpoint, &Value::Null)?;
        self.decode(&endpoint, value)
    }

    fn activate_version(&self, service_id: &str, number: u64) -> Result<()> {
        let endpoint = format!("/service/{}/version/{}/activate", service_id, number);
        self.put(&endpoint, &Value::Null)
            .map(|_| ())
            .map_err(|e| match e.code {
                crate::error::ErrorCode::RemoteUnavailable => e,
                _ => Error::deploy_activation_failed(number, e.message),
            })
    }
}

impl ResourceApi for ApiClient {
    fn list_domains(&self, service_id: &str, version: u64) -> Result<Vec<DomainRecord>> {
        let endpoint = format!("/service/{}/version/{}/domain", service_id, version);
        let value = self.get(&endpoint)?;
        self.decode(&endpoint, value)
    }

    fn create_domain(&self, service_id: &str, version: u64, name: &str) -> Result<()> {
        let endpoint = format!("/service/{}/version/{}/domain", service_id, version);
        self.post(&endpoint, &json!({ "name": name }))
            .map(|_| ())
            .map_err(|e| match status_of(&e) {
                Some(409) => Error::deploy_domain_conflict("domain", name, e.message),
                _ => e,
            })
    }

    fn list_backends(&self, service_id: &str, version: u64) -> Result<Vec<BackendRecord>> {
        let endpoint = format!("/service/{}/version/{}/backend", service_id, version);
        let value = self.get(&endpoint)?;
        self.decode(&endpoint, value)
    }

    fn create_backend(&self, service_id: &str, version: u64, spec: &BackendSpec) -> Result<()> {
        let endpoint = format!("/service/{}/version/{}/backend", service_id, version);
        let body = json!({ "name": spec.name, "address": spec.address, "port": spec.port });
        self.post(&endpoint, &body)
            .map(|_| ())
            .map_err(|e| match status_of(&e) {
                Some(409) => Error::deploy_domain_conflict("backend", &spec.name, e.message),
                _ => e,
            })
    }

    fn upload_package(&self, service_id: &str, version: u64, bytes: &[u8]) -> Result<()> {
        let endpoint = format!("/service/{}/version/{}/package", service_id, version);
        let url = format!("{}{}", self.base_url, endpoint);
        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.token)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes.to_vec())
            .send()
            .map_err(|e| self.transport_error("PUT", &endpoint, e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().unwrap_or_default();
        Err(Error::deploy_upload_failed(
            version,
            format!("HTTP {}: {}", status.as_u16(), body.trim()),
        ))
    }
}

/// HTTP status recorded in a remote error's details, if any.
fn status_of(err: &Error) -> Option<u16> {
    err.details
        .get("status")
        .and_then(|v| v.as_u64())
        .map(|v| v as u16)
}
