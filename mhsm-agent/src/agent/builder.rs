use crate::agent::http_transport::Transport;
use crate::agent::{Agent, AgentError};
use std::sync::Arc;

/// A builder for an [`Agent`].
#[derive(Default)]
pub struct AgentBuilder {
    uri: Option<String>,
    expected_domain_suffix: Option<String>,
    transport: Option<Arc<dyn Transport + Send + Sync>>,
}

impl AgentBuilder {
    /// Create an instance of [`Agent`] with the information from this builder.
    pub fn build(self) -> Result<Agent, AgentError> {
        let uri = self.uri.ok_or(AgentError::MissingEndpoint)?;
        let transport: Arc<dyn Transport + Send + Sync> = match self.transport {
            Some(transport) => transport,
            #[cfg(feature = "reqwest")]
            None => Arc::new(crate::agent::http_transport::ReqwestTransport::create()),
            #[cfg(not(feature = "reqwest"))]
            None => return Err(AgentError::MissingTransport),
        };
        Agent::new(&uri, self.expected_domain_suffix.as_deref(), transport)
    }

    /// Set the data-plane base URI of the [`Agent`].
    pub fn with_uri<S: Into<String>>(self, uri: S) -> Self {
        AgentBuilder {
            uri: Some(uri.into()),
            ..self
        }
    }

    /// Require the endpoint to live under this cloud domain suffix. Without
    /// it, whatever suffix the URI carries is accepted and reported back.
    pub fn with_expected_domain_suffix<S: Into<String>>(self, suffix: S) -> Self {
        AgentBuilder {
            expected_domain_suffix: Some(suffix.into()),
            ..self
        }
    }

    /// Provide a transport. With the `reqwest` feature enabled this is
    /// optional; a default rustls-backed transport is created otherwise.
    pub fn with_transport<T: 'static + Transport + Send + Sync>(self, transport: T) -> Self {
        AgentBuilder {
            transport: Some(Arc::new(transport)),
            ..self
        }
    }

    /// Same as [`Self::with_transport`], but reuses an existing shared
    /// transport instead of wrapping a fresh one.
    pub fn with_arc_transport(self, transport: Arc<dyn Transport + Send + Sync>) -> Self {
        AgentBuilder {
            transport: Some(transport),
            ..self
        }
    }
}
