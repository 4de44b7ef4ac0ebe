//! HTTP transport seam.
//!
//! Everything that touches the network goes through the [`Transport`]
//! trait, so session negotiation and repository fetches can be exercised
//! against scripted transports in tests. [`HttpTransport`] is the
//! production implementation on top of `reqwest`.
//!
//! Transports report *transport-level* outcomes only: a response with any
//! status code is `Ok`, and classification into the CMIS error taxonomy
//! happens in [`classify_status`] / [`classify_transport`].

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use cmis_explorer_core::error::CmisError;

use crate::config::HttpConfig;

/// Accept header sent with every request.
pub const ATOM_ACCEPT: &str =
    "application/atom+xml, application/atomsvc+xml;q=0.9, application/xml;q=0.8";

/// Resolved basic-auth credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: Option<String>,
}

impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// A GET request against a CMIS endpoint.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub auth: Option<BasicAuth>,
}

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

/// Failure to complete an HTTP exchange at all.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("{0}")]
    Other(String),
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, request: &FetchRequest) -> Result<FetchResponse, TransportError>;
}

/// `reqwest`-backed transport with basic auth and a request timeout.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &HttpConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, request: &FetchRequest) -> Result<FetchResponse, TransportError> {
        debug!(url = %request.url, "GET");

        let mut builder = self
            .client
            .get(&request.url)
            .header(reqwest::header::ACCEPT, ATOM_ACCEPT);
        if let Some(auth) = &request.auth {
            builder = builder.basic_auth(&auth.username, auth.password.as_ref());
        }

        let resp = builder.send().await.map_err(map_reqwest_error)?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(map_reqwest_error)?;

        debug!(url = %request.url, status, bytes = body.len(), "response");
        Ok(FetchResponse { status, body })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(e.to_string())
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Other(e.to_string())
    }
}

/// Map a transport failure into the CMIS taxonomy.
pub fn classify_transport(err: TransportError, url: &str) -> CmisError {
    match err {
        TransportError::Timeout(msg) => CmisError::Timeout(format!("{}: {}", url, msg)),
        TransportError::Connect(msg) | TransportError::Other(msg) => {
            CmisError::Unreachable(format!("{}: {}", url, msg))
        }
    }
}

/// Map a non-success HTTP status into the CMIS taxonomy.
///
/// | Status | Error |
/// |--------|-------|
/// | 2xx | none |
/// | 401, 403 | `AuthFailure` |
/// | 404 | `NotFound` |
/// | 408, 504 | `Timeout` |
/// | other | `UnexpectedStatus` |
pub fn classify_status(status: u16, url: &str, server_id: &str) -> Result<(), CmisError> {
    match status {
        200..=299 => Ok(()),
        401 | 403 => Err(CmisError::AuthFailure {
            server_id: server_id.to_string(),
        }),
        404 => Err(CmisError::NotFound(url.to_string())),
        408 | 504 => Err(CmisError::Timeout(format!("{} (HTTP {})", url, status))),
        _ => Err(CmisError::UnexpectedStatus {
            status,
            url: url.to_string(),
        }),
    }
}
