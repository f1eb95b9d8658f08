//! Errors that can occur when using the data-plane agent.

use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use thiserror::Error;

/// An error that occurred when using the agent.
#[derive(Error, Debug)]
pub enum AgentError {
    /// The data-plane URI could not be parsed at all.
    #[error(r#"Invalid data-plane URI "{uri}": {reason}"#)]
    MalformedUri {
        /// The offending raw string.
        uri: String,
        /// Why the URI was rejected.
        reason: String,
    },

    /// The URI parsed, but its host or path does not match the identifier
    /// shape the caller asked for.
    #[error(r#""{raw}" does not match the expected format "{expected}""#)]
    SchemaMismatch {
        /// The offending raw string.
        raw: String,
        /// The canonical format template the string was expected to match.
        expected: &'static str,
    },

    /// The host resolved to a different cloud domain than the caller expected.
    #[error(r#""{uri}" is hosted under "{actual}" but the expected domain suffix is "{expected}""#)]
    DomainMismatch {
        /// The offending raw string.
        uri: String,
        /// The domain suffix the host actually carries.
        actual: String,
        /// The domain suffix the caller expected.
        expected: String,
    },

    /// The service confirmed the addressed item is absent. Fatal when an
    /// existing item was expected; treated as success when confirming a
    /// deletion.
    #[error(r#"The item at "{uri}" was not found: {message}"#)]
    NotFound {
        /// The address that was probed.
        uri: String,
        /// The message returned by the service, if any.
        message: String,
    },

    /// The service refused the call because a conflicting state transition is
    /// still in flight.
    #[error("The service reported a conflict: {message}")]
    Conflict {
        /// The message returned by the service.
        message: String,
    },

    /// The deadline elapsed while waiting on a remote state transition.
    #[error("Timed out waiting for {description}")]
    Timeout {
        /// The awaited condition.
        description: String,
    },

    /// There was an error underneath the HTTP client.
    #[error("A transport error occurred: {0}")]
    Transport(#[source] Box<dyn Error + Send + Sync>),

    /// The service returned an HTTP error that maps to no richer variant.
    #[error("The service returned an HTTP error: {0}")]
    Http(HttpErrorPayload),

    /// A response body could not be decoded as JSON.
    #[error("Invalid JSON response: {0}")]
    InvalidJsonResponse(#[from] serde_json::Error),

    /// The agent was built without a data-plane URI.
    #[error("A data-plane URI must be provided before building the agent.")]
    MissingEndpoint,

    /// The agent was built without a transport.
    #[error("A transport must be provided before building the agent.")]
    MissingTransport,
}

/// An HTTP error returned by the service.
pub struct HttpErrorPayload {
    /// The HTTP status code.
    pub status: u16,
    /// The MIME type of `content`.
    pub content_type: Option<String>,
    /// The body of the error.
    pub content: Vec<u8>,
}

impl HttpErrorPayload {
    fn fmt_human_readable(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        // Always try to render the body as text; fall back to the raw bytes.
        f.write_fmt(format_args!(
            "status {}, content type {:?}, content: {}",
            self.status,
            self.content_type.clone().unwrap_or_default(),
            String::from_utf8(self.content.clone()).unwrap_or_else(|_| format!(
                "(unable to decode content as UTF-8: {:?})",
                self.content
            )),
        ))?;
        Ok(())
    }
}

impl Debug for HttpErrorPayload {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        self.fmt_human_readable(f)
    }
}

impl Display for HttpErrorPayload {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        self.fmt_human_readable(f)
    }
}
