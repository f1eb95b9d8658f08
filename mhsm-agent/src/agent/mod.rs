//! The main agent module. Contains the [`Agent`] type and all associated structures.

pub mod agent_error;
pub(crate) mod builder;
pub mod hsm_api;
pub mod http_transport;

pub use agent_error::AgentError;
pub use builder::AgentBuilder;


use crate::agent::agent_error::HttpErrorPayload;
use crate::agent::hsm_api::{
    CertificateSet, DeletedKeyBundle, DownloadPending, ErrorResponse, KeyBundle,
    SecurityDomainEnvelope,
};
use crate::agent::http_transport::{Method, Transport, TransportResponse};
use crate::identifier::Endpoint;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use url::Url;

/// Every data-plane request names the contract revision it speaks.
const API_VERSION: &str = "7.4";

/// A low-level agent bound to the data plane of one module.
///
/// The agent turns structured identifiers into HTTPS calls and maps response
/// statuses onto the error taxonomy; it holds no mutable state and is cheap
/// to clone. Authentication, retries outside the modeled polling loops, and
/// persistence of identifiers are all the caller's collaborators.
#[derive(Clone)]
pub struct Agent {
    endpoint: Endpoint,
    base_url: Url,
    transport: Arc<dyn Transport + Send + Sync>,
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl Agent {
    /// Create an instance of an [`AgentBuilder`] for building an [`Agent`].
    pub fn builder() -> AgentBuilder {
        Default::default()
    }

    pub(crate) fn new(
        uri: &str,
        expected_domain_suffix: Option<&str>,
        transport: Arc<dyn Transport + Send + Sync>,
    ) -> Result<Agent, AgentError> {
        let endpoint = Endpoint::from_uri(uri, expected_domain_suffix)?;
        let base_url =
            Url::parse(&format!("https://{endpoint}/")).map_err(|e| AgentError::MalformedUri {
                uri: uri.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Agent {
            endpoint,
            base_url,
            transport,
        })
    }

    /// The resolved identity of the module this agent talks to.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn url_for(&self, segments: &[&str]) -> Result<Url, AgentError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AgentError::MalformedUri {
                uri: self.base_url.to_string(),
                reason: "the base URL cannot carry path segments".to_string(),
            })?
            .extend(segments);
        url.query_pairs_mut().append_pair("api-version", API_VERSION);
        Ok(url)
    }

    async fn execute(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<Vec<u8>>,
    ) -> Result<TransportResponse, AgentError> {
        let url = self.url_for(segments)?;
        let response = self.transport.request(method, url.clone(), body).await?;
        if (200..300).contains(&response.status) {
            Ok(response)
        } else {
            Err(map_status_error(&url, response))
        }
    }

    async fn execute_json<A>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<Vec<u8>>,
    ) -> Result<A, AgentError>
    where
        A: DeserializeOwned,
    {
        let response = self.execute(method, segments, body).await?;
        serde_json::from_slice(&response.body).map_err(AgentError::InvalidJsonResponse)
    }

    /// Reads a key, or one specific version of it.
    pub async fn get_key(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> Result<KeyBundle, AgentError> {
        match version {
            Some(version) => {
                self.execute_json(Method::Get, &["keys", name, version], None)
                    .await
            }
            None => self.execute_json(Method::Get, &["keys", name], None).await,
        }
    }

    /// Soft-deletes a key, returning the resulting tombstone.
    pub async fn delete_key(&self, name: &str) -> Result<DeletedKeyBundle, AgentError> {
        self.execute_json(Method::Delete, &["keys", name], None)
            .await
    }

    /// Reads the tombstone of a soft-deleted key.
    pub async fn get_deleted_key(&self, name: &str) -> Result<DeletedKeyBundle, AgentError> {
        self.execute_json(Method::Get, &["deletedkeys", name], None)
            .await
    }

    /// Permanently erases a soft-deleted key. Refused with a conflict while
    /// the soft-delete transition is still settling, and forbidden entirely
    /// on purge-protected modules.
    pub async fn purge_deleted_key(&self, name: &str) -> Result<(), AgentError> {
        self.execute(Method::Delete, &["deletedkeys", name], None)
            .await?;
        Ok(())
    }

    /// Brings a soft-deleted key back to life at its old address.
    pub async fn recover_deleted_key(&self, name: &str) -> Result<KeyBundle, AgentError> {
        self.execute_json(Method::Post, &["deletedkeys", name, "recover"], None)
            .await
    }

    /// Submits the administrator key set and quorum threshold, returning the
    /// envelope holding the encrypted security-domain payload.
    pub async fn security_domain_download(
        &self,
        request: &CertificateSet,
    ) -> Result<SecurityDomainEnvelope, AgentError> {
        let body = serde_json::to_vec(request).map_err(AgentError::InvalidJsonResponse)?;
        self.execute_json(Method::Post, &["securitydomain", "download"], Some(body))
            .await
    }

    /// Probes the progress of an in-flight security-domain transfer.
    pub async fn security_domain_download_pending(
        &self,
    ) -> Result<DownloadPending, AgentError> {
        self.execute_json(Method::Get, &["securitydomain", "download", "pending"], None)
            .await
    }
}

/// Maps a non-2xx response onto the error taxonomy. Absence and in-flight
/// conflicts get their own variants so callers can react to them; everything
/// else is surfaced as the raw HTTP payload.
fn map_status_error(url: &Url, response: TransportResponse) -> AgentError {
    let message = serde_json::from_slice::<ErrorResponse>(&response.body)
        .ok()
        .and_then(|e| e.error.message)
        .unwrap_or_default();
    match response.status {
        404 => AgentError::NotFound {
            uri: url.to_string(),
            message,
        },
        409 => AgentError::Conflict { message },
        _ => AgentError::Http(HttpErrorPayload {
            status: response.status,
            content_type: response.content_type,
            content: response.body,
        }),
    }
}
