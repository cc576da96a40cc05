//! HTTP transport abstraction for SOAP calls.
//!
//! The protocol core only needs "POST this body to that path and give me
//! the status and body back". [`HttpTransport`] does that over reqwest with
//! a cookie store, which is how the vim25 endpoint keeps a session bound to
//! later calls. [`SimulatedTransport`] replays scripted replies for tests.

use crate::error::{VmwareError, VmwareResult};
use crate::types::VsphereConfig;

use log::{debug, trace};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use url::Url;

/// Raw HTTP reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Transport trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// POST-only transport used by the SOAP client.
///
/// Implementations must be `Send + Sync` so they can be held behind an
/// `Arc`. An `Err` means the call could not complete at all; any HTTP
/// status, including 5xx, comes back as `Ok`.
#[async_trait::async_trait]
pub trait SoapTransport: Send + Sync {
    async fn post(&self, path: &str, body: String) -> VmwareResult<HttpReply>;

    /// Human-readable endpoint for logs and reports.
    fn endpoint(&self) -> String;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  reqwest transport
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// HTTPS transport with a per-instance cookie jar.
pub struct HttpTransport {
    client: Client,
    base_url: Url,
    soap_action: String,
}

impl HttpTransport {
    /// Build a transport from config. No network traffic happens here.
    pub fn new(config: &VsphereConfig) -> VmwareResult<Self> {
        let base_url = Url::parse(&config.base_url())?;

        let client = Client::builder()
            .cookie_store(true)
            .danger_accept_invalid_certs(config.insecure)
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| VmwareError::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            soap_action: config.soap_action.clone(),
        })
    }

    fn headers(&self) -> VmwareResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/xml; charset=utf-8"),
        );
        headers.insert(
            "soapaction",
            HeaderValue::from_str(&self.soap_action)
                .map_err(|e| VmwareError::config(format!("Invalid SOAPAction header: {e}")))?,
        );
        Ok(headers)
    }
}

#[async_trait::async_trait]
impl SoapTransport for HttpTransport {
    async fn post(&self, path: &str, body: String) -> VmwareResult<HttpReply> {
        let url = self.base_url.join(path)?;
        debug!("POST {} ({} bytes)", url, body.len());

        let resp = self
            .client
            .post(url)
            .headers(self.headers()?)
            .body(body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| VmwareError::transport(format!("Failed to read response body: {e}")))?;

        trace!("HTTP {} ({} bytes)", status, body.len());
        Ok(HttpReply { status, body })
    }

    fn endpoint(&self) -> String {
        self.base_url.to_string()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Simulated transport (for testing & offline use)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A request captured by [`SimulatedTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub path: String,
    pub body: String,
}

/// In-memory transport that answers from a queue of scripted replies and
/// records every request. An empty queue answers with a transport error.
#[derive(Default)]
pub struct SimulatedTransport {
    replies: Mutex<VecDeque<VmwareResult<HttpReply>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl SimulatedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply with the given status and body.
    pub async fn push_reply(&self, status: u16, body: impl Into<String>) {
        self.replies
            .lock()
            .await
            .push_back(Ok(HttpReply::new(status, body)));
    }

    /// Queue a transport-level failure.
    pub async fn push_error(&self, error: VmwareError) {
        self.replies.lock().await.push_back(Err(error));
    }

    /// Every request seen so far, in order.
    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().await.clone()
    }

    /// Replies not yet consumed.
    pub async fn pending_replies(&self) -> usize {
        self.replies.lock().await.len()
    }
}

#[async_trait::async_trait]
impl SoapTransport for SimulatedTransport {
    async fn post(&self, path: &str, body: String) -> VmwareResult<HttpReply> {
        self.requests.lock().await.push(RecordedRequest {
            path: path.to_string(),
            body,
        });
        self.replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(VmwareError::transport("Simulated endpoint has no reply queued")))
    }

    fn endpoint(&self) -> String {
        "simulated://sdk".into()
    }
}
