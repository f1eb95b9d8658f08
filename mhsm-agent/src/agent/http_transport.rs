//! A [`Transport`] that connects using a reqwest client.

use crate::agent::agent_error::AgentError;
use std::future::Future;
use std::pin::Pin;
use url::Url;

/// The subset of HTTP methods the data plane is addressed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// An idempotent read.
    Get,
    /// A state-changing submission carrying a JSON body.
    Post,
    /// A removal.
    Delete,
}

/// A raw response as seen by the transport. Status interpretation is the
/// agent's job; the transport only fails on connection-level problems.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// The HTTP status code.
    pub status: u16,
    /// The MIME type of `body`, when the service provided one.
    pub content_type: Option<String>,
    /// The response body.
    pub body: Vec<u8>,
}

/// A facade over the connection to one data-plane host. This trait inverses
/// the control from the [`Agent`](super::Agent) over its connection code, and
/// resolves any direct dependency on a specific HTTP client from this crate.
///
/// An implementation of this trait using reqwest is provided with the feature
/// flag `reqwest`. Authentication is the transport's concern: callers that
/// need it supply a preconfigured client.
///
/// Any error returned by this trait bubbles up as [`AgentError::Transport`].
pub trait Transport {
    /// Sends one request and returns the raw response, whatever its status.
    fn request<'a>(
        &'a self,
        method: Method,
        url: Url,
        body: Option<Vec<u8>>,
    ) -> Pin<Box<dyn Future<Output = Result<TransportResponse, AgentError>> + Send + 'a>>;
}

#[cfg(feature = "reqwest")]
mod reqwest_transport {
    use super::{Method, Transport, TransportResponse};
    use crate::agent::agent_error::AgentError;
    use std::future::Future;
    use std::pin::Pin;
    use url::Url;

    /// A [`Transport`] using reqwest to make HTTPS calls to the data plane.
    #[derive(Debug, Clone)]
    pub struct ReqwestTransport {
        client: reqwest::Client,
    }

    impl ReqwestTransport {
        /// Creates a transport with a default rustls-backed client.
        pub fn create() -> Self {
            Self {
                client: reqwest::Client::builder()
                    .use_rustls_tls()
                    .build()
                    .expect("Could not create HTTP client."),
            }
        }

        /// Creates a transport that uses the given client, e.g. one carrying
        /// authentication middleware or a custom root store.
        pub fn create_with_client(client: reqwest::Client) -> Self {
            Self { client }
        }
    }

    impl Transport for ReqwestTransport {
        fn request<'a>(
            &'a self,
            method: Method,
            url: Url,
            body: Option<Vec<u8>>,
        ) -> Pin<Box<dyn Future<Output = Result<TransportResponse, AgentError>> + Send + 'a>>
        {
            async fn run(
                s: &ReqwestTransport,
                method: Method,
                url: Url,
                body: Option<Vec<u8>>,
            ) -> Result<TransportResponse, AgentError> {
                let method = match method {
                    Method::Get => reqwest::Method::GET,
                    Method::Post => reqwest::Method::POST,
                    Method::Delete => reqwest::Method::DELETE,
                };
                let mut request = s.client.request(method, url);
                if let Some(body) = body {
                    request = request
                        .header(reqwest::header::CONTENT_TYPE, "application/json")
                        .body(body);
                }

                let response = request
                    .send()
                    .await
                    .map_err(|x| AgentError::Transport(Box::new(x)))?;

                let status = response.status().as_u16();
                let content_type = response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|value| value.to_str().ok())
                    .map(|x| x.to_string());
                let body = response
                    .bytes()
                    .await
                    .map_err(|x| AgentError::Transport(Box::new(x)))?
                    .to_vec();

                Ok(TransportResponse {
                    status,
                    content_type,
                    body,
                })
            }

            Box::pin(run(self, method, url, body))
        }
    }
}

#[cfg(feature = "reqwest")]
pub use reqwest_transport::ReqwestTransport;
