//! `mhsm-utils` is a collection of higher-level flows on top of `mhsm-agent`
//! for driving the long-running, eventually-consistent state transitions of a
//! managed HSM's data plane: the two-phase delete/purge lifecycle, the poller
//! family with its poll-until-done driver, and quorum-based security-domain
//! activation.
//!
//! Everything here is blocking from the caller's view: each flow occupies the
//! invoking task for the duration of its loop, suspending only at inter-probe
//! sleep points, and gives up only when its ambient deadline elapses.

#![deny(
    missing_docs,
    missing_debug_implementations,
    rustdoc::broken_intra_doc_links,
    rustdoc::private_intra_doc_links
)]

pub mod poll;
pub mod reclaim;
pub mod security_domain;
