//! The `mhsm-agent` crate is the client-side core for the data plane of a
//! managed hardware security module: the per-instance HTTPS surface hosting
//! keys, role definitions and role assignments, distinct from the
//! provisioning surface of the management API.
//!
//! ## Overview
//! The crate has two halves:
//!
//! * [`identifier`]: the resource-identifier codec. Data-plane objects are
//!   addressed by host+path strings in several structurally similar but
//!   incompatible shapes; the codec turns them into typed identifiers with
//!   strict parsing, lenient normalization where upstream casing defects
//!   demand it, and a decoder for the deprecated pre-canonical shape.
//! * [`agent`]: the [`Agent`] itself, a thin clonable client that turns
//!   identifiers into HTTPS calls through a pluggable [`agent::http_transport::Transport`]
//!   and maps response statuses onto one error taxonomy.
//!
//! Higher-level flows (the delete/purge lifecycle, pollers, security-domain
//! activation) live in the companion `mhsm-utils` crate.
//!
//! ## Example
//! ```no_run
//! use mhsm_agent::Agent;
//!
//! # async fn run() -> Result<(), mhsm_agent::AgentError> {
//! let agent = Agent::builder()
//!     .with_uri("https://example.managedhsm.azure.net")
//!     .with_expected_domain_suffix("managedhsm.azure.net")
//!     .build()?;
//!
//! let tombstone = agent.delete_key("rotation-key").await?;
//! println!("recoverable at {:?}", tombstone.recovery_id);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod identifier;

pub use agent::{Agent, AgentBuilder, AgentError};
