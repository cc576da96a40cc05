//! vim25 SOAP client.
//!
//! Wraps a [`SoapTransport`] and turns each call into one request/response
//! exchange: encode the envelope, POST it to the SDK path, decode the reply
//! and classify failures. Classification order:
//!
//! 1. the transport could not complete the call → `TransportError`
//! 2. a SOAP fault anywhere in the body → `ProtocolFault`
//! 3. a non-2xx status → `UnexpectedStatus`
//! 4. an unparseable body → `MalformedResponse`

use crate::envelope::{self, Decoded};
use crate::error::{VmwareError, VmwareResult};
use crate::transport::{HttpTransport, SoapTransport};
use crate::types::VsphereConfig;

use log::{debug, error, trace};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Longest body excerpt carried in an error message.
const BODY_EXCERPT: usize = 300;

/// vim25 SOAP client.
pub struct VsphereClient {
    transport: Arc<dyn SoapTransport>,
    sdk_path: String,
    request_counter: AtomicU64,
}

impl VsphereClient {
    pub fn new(transport: Arc<dyn SoapTransport>, sdk_path: impl Into<String>) -> Self {
        Self {
            transport,
            sdk_path: sdk_path.into(),
            request_counter: AtomicU64::new(0),
        }
    }

    /// Build a client over [`HttpTransport`] (does NOT log in yet).
    pub fn from_config(config: &VsphereConfig) -> VmwareResult<Self> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::new(Arc::new(transport), config.sdk_path.clone()))
    }

    /// Endpoint description for reports.
    pub fn endpoint(&self) -> String {
        format!(
            "{}{}",
            self.transport.endpoint().trim_end_matches('/'),
            self.sdk_path
        )
    }

    /// Send one vim25 request fragment and return the decoded reply, with
    /// any fault or bad status already turned into an error.
    pub async fn invoke(&self, operation: &str, fragment: &str) -> VmwareResult<Decoded> {
        let req_id = self.request_counter.fetch_add(1, Ordering::Relaxed) + 1;
        let wire = envelope::encode(fragment);
        debug!("vim25 request #{req_id} {operation} ({} bytes)", wire.len());

        let reply = self.transport.post(&self.sdk_path, wire).await.map_err(|e| {
            error!("vim25 request #{req_id} {operation} did not complete: {e}");
            e
        })?;

        debug!(
            "vim25 response #{req_id}: status={}, {} bytes",
            reply.status,
            reply.body.len()
        );
        // Request bodies are not traced; Login carries the password.
        trace!("vim25 response #{req_id} body: {}", reply.body);

        let decoded = envelope::decode(&reply.body);

        if let Some(fault) = decoded.remote_fault() {
            error!("{operation} SOAP fault (HTTP {}): {fault}", reply.status);
            return Err(VmwareError::fault(format!("{operation} failed: {fault}")));
        }

        if !reply.is_success() {
            error!("{operation} returned HTTP {}", reply.status);
            return Err(VmwareError::status(
                reply.status,
                format!(
                    "{operation} returned HTTP {}: {}",
                    reply.status,
                    excerpt(&reply.body)
                ),
            ));
        }

        if decoded.is_malformed() {
            let reason = decoded
                .fault
                .as_ref()
                .map(|f| f.text.clone())
                .unwrap_or_default();
            error!("{operation} response could not be parsed: {reason}");
            return Err(VmwareError::malformed(format!("{operation}: {reason}")));
        }

        Ok(decoded)
    }
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".into();
    }
    trimmed.chars().take(BODY_EXCERPT).collect()
}
