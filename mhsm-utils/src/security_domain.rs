//! Quorum-based activation of a module's security domain.
//!
//! A freshly provisioned module is unusable until its security domain is
//! downloaded against a set of administrator certificates and a quorum
//! threshold. The flow here resolves each certificate reference to public-key
//! material, derives the content-based fingerprint the upstream key-
//! identification contract requires, submits one download request, and waits
//! for the transfer to be fully applied.
//!
//! The downloaded payload is an encrypted secret. It is handed back wrapped
//! in [`SecurityDomainPayload`], which keeps it out of `Debug` output; this
//! module never logs it and never embeds it in an error.

use crate::poll::{poll_until_done, DownloadPoller, DEFAULT_TRANSPORT_FAILURE_TOLERANCE};
use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use mhsm_agent::agent::hsm_api::{CertificateSet, SecurityDomainKey};
use mhsm_agent::{Agent, AgentError};
use sha2::{Digest, Sha256};
use std::fmt;
use tokio::time::Instant;
use tracing::debug;

/// Resolves an opaque administrator-certificate reference to DER-encoded
/// public certificate bytes. External collaborator: the reference format and
/// the store it points into are none of this crate's business.
#[async_trait]
pub trait CertificateResolver {
    /// Fetches the certificate the reference points at.
    async fn resolve(&self, reference: &str) -> Result<Vec<u8>, AgentError>;
}

/// The encrypted security-domain blob. Treat as a secret: the wrapper
/// withholds it from `Debug` output, and callers persist it without logging
/// it.
#[derive(Clone)]
pub struct SecurityDomainPayload(String);

impl SecurityDomainPayload {
    /// Unwraps the encrypted blob for persistence.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for SecurityDomainPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecurityDomainPayload(<redacted>)")
    }
}

/// Url-safe unpadded base64 of the SHA-256 digest of the DER encoding; the
/// upstream contract identifies administrator keys by exactly this value.
fn certificate_fingerprint(der: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(der))
}

fn security_domain_key(der: &[u8]) -> SecurityDomainKey {
    let fingerprint = certificate_fingerprint(der);
    SecurityDomainKey {
        kid: fingerprint.clone(),
        kty: "RSA".to_string(),
        key_ops: vec!["verify".to_string()],
        alg: "RSA-OAEP-256".to_string(),
        x5c: vec![STANDARD.encode(der)],
        x5t_s256: fingerprint,
    }
}

/// Downloads the security domain: resolves every certificate reference,
/// assembles the quorum request, submits it, waits for the transfer to be
/// fully applied, and returns the encrypted payload.
///
/// The deadline is ambient and bounds the whole flow, including the
/// download-pending polling.
pub async fn activate_security_domain<R>(
    agent: &Agent,
    resolver: &R,
    certificate_refs: &[String],
    quorum: u32,
    deadline: Instant,
) -> Result<SecurityDomainPayload, AgentError>
where
    R: CertificateResolver + Sync,
{
    let mut certificates = Vec::with_capacity(certificate_refs.len());
    for reference in certificate_refs {
        let der = resolver.resolve(reference).await?;
        certificates.push(security_domain_key(&der));
    }

    let request = CertificateSet {
        certificates,
        required: quorum,
    };
    debug!(
        quorum,
        certificates = request.certificates.len(),
        endpoint = %agent.endpoint(),
        "requesting security domain download"
    );
    let envelope = agent.security_domain_download(&request).await?;

    let mut poller = DownloadPoller::new(agent);
    poll_until_done(&mut poller, DEFAULT_TRANSPORT_FAILURE_TOLERANCE, deadline).await?;

    Ok(SecurityDomainPayload(envelope.value))
}

#[cfg(test)]
mod tests {
    use super::{
        activate_security_domain, certificate_fingerprint, CertificateResolver,
        SecurityDomainPayload,
    };
    use async_trait::async_trait;
    use mhsm_agent::agent::http_transport::{Method, Transport, TransportResponse};
    use mhsm_agent::{Agent, AgentError};
    use std::collections::VecDeque;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::time::Instant;
    use url::Url;

    #[test]
    fn fingerprint_is_deterministic_and_url_safe() {
        let a = certificate_fingerprint(b"certificate-bytes");
        let b = certificate_fingerprint(b"certificate-bytes");
        let c = certificate_fingerprint(b"other-bytes");

        assert_eq!(a, b);
        assert_ne!(a, c);
        // 32 digest bytes encode to 43 characters without padding.
        assert_eq!(a.len(), 43);
        assert!(a
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn payload_debug_output_is_redacted() {
        let payload = SecurityDomainPayload("extremely-secret".to_string());
        let rendered = format!("{payload:?}");
        assert!(!rendered.contains("extremely-secret"));
        assert_eq!(payload.into_inner(), "extremely-secret");
    }

    struct FixedResolver;

    #[async_trait]
    impl CertificateResolver for FixedResolver {
        async fn resolve(&self, reference: &str) -> Result<Vec<u8>, AgentError> {
            Ok(format!("der-for-{reference}").into_bytes())
        }
    }

    /// Routes requests by path and records the download request body.
    struct FakeTransport {
        pending_responses: Mutex<VecDeque<&'static str>>,
        download_body: Arc<Mutex<Option<serde_json::Value>>>,
    }

    impl Transport for FakeTransport {
        fn request<'a>(
            &'a self,
            _method: Method,
            url: Url,
            body: Option<Vec<u8>>,
        ) -> Pin<Box<dyn Future<Output = Result<TransportResponse, AgentError>> + Send + 'a>>
        {
            let reply = match url.path() {
                "/securitydomain/download" => {
                    let parsed = serde_json::from_slice(&body.expect("download carries a body"))
                        .expect("download body is JSON");
                    *self.download_body.lock().unwrap() = Some(parsed);
                    r#"{"value": "encrypted-domain-blob"}"#
                }
                "/securitydomain/download/pending" => self
                    .pending_responses
                    .lock()
                    .unwrap()
                    .pop_front()
                    .expect("unscripted pending probe"),
                other => panic!("unexpected path {other}"),
            };
            Box::pin(async move {
                Ok(TransportResponse {
                    status: 200,
                    content_type: Some("application/json".to_string()),
                    body: reply.as_bytes().to_vec(),
                })
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn activation_assembles_the_quorum_request_and_returns_the_payload() {
        let download_body = Arc::new(Mutex::new(None));
        let transport = FakeTransport {
            pending_responses: Mutex::new(
                [
                    r#"{"status": "InProgress"}"#,
                    r#"{"status": "InProgress", "status_details": "applying"}"#,
                    r#"{"status": "Success"}"#,
                ]
                .into(),
            ),
            download_body: Arc::clone(&download_body),
        };
        let agent = Agent::builder()
            .with_uri("https://h.managedhsm.azure.net")
            .with_transport(transport)
            .build()
            .unwrap();

        let refs = vec!["cert-a".to_string(), "cert-b".to_string()];
        let payload = activate_security_domain(
            &agent,
            &FixedResolver,
            &refs,
            2,
            Instant::now() + Duration::from_secs(120),
        )
        .await
        .unwrap();

        assert_eq!(payload.into_inner(), "encrypted-domain-blob");

        let body = download_body.lock().unwrap().clone().unwrap();
        assert_eq!(body["required"], 2);
        let certificates = body["certificates"].as_array().unwrap();
        assert_eq!(certificates.len(), 2);
        for certificate in certificates {
            assert_eq!(certificate["kid"], certificate["x5t#S256"]);
            assert!(certificate["x5c"].as_array().unwrap().len() == 1);
        }
        // Distinct certificates get distinct fingerprints.
        assert_ne!(certificates[0]["kid"], certificates[1]["kid"]);
    }
}
