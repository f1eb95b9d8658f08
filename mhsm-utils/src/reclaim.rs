//! Two-phase reclamation of soft-deletable nested resources.
//!
//! Deleting a nested resource is not one call: the item first enters a
//! recoverable tombstoned state, and only a later purge erases it for good.
//! Both transitions settle asynchronously in an eventually-consistent
//! directory, so a single "not found" observation immediately after a
//! mutating call is not trustworthy evidence, and absence has to be observed
//! several times in a row before the next step may proceed.
//!
//! [`delete_then_purge`] drives the whole protocol over a
//! [`DeletionCapability`], the four-operation contract each nested-resource
//! kind implements once ([`KeyDeletion`] is the implementation for keys;
//! future kinds add their own).
//!
//! Two concurrent invocations for different resource names are independent.
//! This module does not serialize invocations for the *same* name: callers
//! that share a name must hold their named-lock collaborator's scoped guard
//! across the call.

use async_trait::async_trait;
use mhsm_agent::{Agent, AgentError};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Interval between existence probes.
const PROBE_INTERVAL: Duration = Duration::from_secs(5);

/// Consecutive absence observations required before a transition counts as
/// settled.
const REQUIRED_ABSENT_PROBES: u32 = 3;

/// Observation reported by the existence probes of a [`DeletionCapability`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// The probed address still answers.
    Present,
    /// The service confirmed absence.
    Absent,
}

/// The four operations a soft-deletable nested resource must support for the
/// reclamation protocol to drive it. Implemented once per resource kind.
#[async_trait]
pub trait DeletionCapability {
    /// Starts the soft delete.
    async fn delete(&self) -> Result<(), AgentError>;

    /// Probes whether the live item is still visible.
    async fn check_deleted(&self) -> Result<Presence, AgentError>;

    /// Starts the permanent erase of the tombstone.
    async fn purge(&self) -> Result<(), AgentError>;

    /// Probes whether the tombstone is still visible.
    async fn check_purged(&self) -> Result<Presence, AgentError>;
}

#[derive(Debug, Clone, Copy)]
enum ReclaimPhase {
    Deleted,
    Purged,
}

impl ReclaimPhase {
    fn verb(self) -> &'static str {
        match self {
            Self::Deleted => "deleted",
            Self::Purged => "purged",
        }
    }
}

/// Soft-deletes the item and, when `should_purge` is set, erases the
/// tombstone as well.
///
/// 1. `delete()`; an item that is already absent counts as success.
/// 2. Probe `check_deleted()` every 5s until absence holds for 3 consecutive
///    probes, or the deadline elapses.
/// 3. Without `should_purge`, stop here; the purge operations are never
///    invoked (purge-protected modules forbid them outright).
/// 4. `purge()`, retrying for as long as the service still reports the
///    soft-delete transition in flight; any other refusal is fatal.
/// 5. Probe `check_purged()` as in step 2.
///
/// `description` names the item in timeout errors. The deadline is ambient
/// and the only cancellation mechanism.
pub async fn delete_then_purge<C>(
    capability: &C,
    description: &str,
    should_purge: bool,
    deadline: Instant,
) -> Result<(), AgentError>
where
    C: DeletionCapability + Sync,
{
    match capability.delete().await {
        Ok(()) => {}
        Err(AgentError::NotFound { .. }) => {
            debug!(description, "item was already absent when deletion was requested");
        }
        Err(e) => return Err(e),
    }

    wait_for_absence(capability, ReclaimPhase::Deleted, description, deadline).await?;

    if !should_purge {
        return Ok(());
    }

    loop {
        match capability.purge().await {
            Ok(()) => break,
            Err(e) if is_retryable_purge_conflict(&e) => {
                if Instant::now() >= deadline {
                    return Err(AgentError::Timeout {
                        description: format!("{description} to become purgeable"),
                    });
                }
                debug!(description, "soft delete still settling, retrying purge");
                sleep(PROBE_INTERVAL).await;
            }
            Err(e) => return Err(e),
        }
    }

    wait_for_absence(capability, ReclaimPhase::Purged, description, deadline).await
}

async fn wait_for_absence<C>(
    capability: &C,
    phase: ReclaimPhase,
    description: &str,
    deadline: Instant,
) -> Result<(), AgentError>
where
    C: DeletionCapability + Sync,
{
    let mut streak = 0u32;
    loop {
        let presence = match phase {
            ReclaimPhase::Deleted => capability.check_deleted().await?,
            ReclaimPhase::Purged => capability.check_purged().await?,
        };
        match presence {
            Presence::Absent => {
                streak += 1;
                if streak >= REQUIRED_ABSENT_PROBES {
                    return Ok(());
                }
            }
            Presence::Present => streak = 0,
        }
        if Instant::now() >= deadline {
            return Err(AgentError::Timeout {
                description: format!("{description} to be {}", phase.verb()),
            });
        }
        sleep(PROBE_INTERVAL).await;
    }
}

/// Whether a purge refusal means the soft-delete transition has not settled
/// yet, which the protocol waits out rather than surfaces.
fn is_retryable_purge_conflict(error: &AgentError) -> bool {
    matches!(
        error,
        AgentError::Conflict { message } if message.contains("is currently being deleted")
    )
}

/// [`DeletionCapability`] for keys stored under one module.
#[derive(Debug)]
pub struct KeyDeletion<'agent> {
    agent: &'agent Agent,
    name: String,
}

impl<'agent> KeyDeletion<'agent> {
    /// Binds the capability to one key of the agent's module.
    pub fn new(agent: &'agent Agent, name: impl Into<String>) -> Self {
        Self {
            agent,
            name: name.into(),
        }
    }
}

#[async_trait]
impl DeletionCapability for KeyDeletion<'_> {
    async fn delete(&self) -> Result<(), AgentError> {
        self.agent.delete_key(&self.name).await.map(|_| ())
    }

    async fn check_deleted(&self) -> Result<Presence, AgentError> {
        // The live address: soft deletion is settled once the key no longer
        // answers there.
        presence_of(self.agent.get_key(&self.name, None).await)
    }

    async fn purge(&self) -> Result<(), AgentError> {
        self.agent.purge_deleted_key(&self.name).await
    }

    async fn check_purged(&self) -> Result<Presence, AgentError> {
        presence_of(self.agent.get_deleted_key(&self.name).await)
    }
}

fn presence_of<T>(result: Result<T, AgentError>) -> Result<Presence, AgentError> {
    match result {
        Ok(_) => Ok(Presence::Present),
        Err(AgentError::NotFound { .. }) => Ok(Presence::Absent),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::{delete_then_purge, DeletionCapability, Presence};
    use async_trait::async_trait;
    use mhsm_agent::AgentError;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;

    fn not_found() -> AgentError {
        AgentError::NotFound {
            uri: "https://h.managedhsm.azure.net/keys/k".to_string(),
            message: "gone".to_string(),
        }
    }

    /// Scripted capability. `deleted_probes` and `purged_probes` are drained
    /// in order and the last entry repeats; `purge_errors` are returned
    /// before `purge` finally succeeds.
    #[derive(Default)]
    struct FakeCapability {
        delete_result: Mutex<Option<AgentError>>,
        deleted_probes: Mutex<VecDeque<Presence>>,
        purged_probes: Mutex<VecDeque<Presence>>,
        purge_errors: Mutex<VecDeque<AgentError>>,
        delete_calls: AtomicU32,
        check_deleted_calls: AtomicU32,
        purge_calls: AtomicU32,
        check_purged_calls: AtomicU32,
    }

    impl FakeCapability {
        fn with_deleted_probes(probes: &[Presence]) -> Self {
            let fake = Self::default();
            *fake.deleted_probes.lock().unwrap() = probes.iter().copied().collect();
            fake
        }

        fn next_probe(queue: &Mutex<VecDeque<Presence>>) -> Presence {
            let mut queue = queue.lock().unwrap();
            if queue.len() > 1 {
                queue.pop_front().unwrap()
            } else {
                queue.front().copied().unwrap_or(Presence::Absent)
            }
        }
    }

    #[async_trait]
    impl DeletionCapability for FakeCapability {
        async fn delete(&self) -> Result<(), AgentError> {
            self.delete_calls.fetch_add(1, Ordering::SeqCst);
            match self.delete_result.lock().unwrap().take() {
                Some(error) => Err(error),
                None => Ok(()),
            }
        }

        async fn check_deleted(&self) -> Result<Presence, AgentError> {
            self.check_deleted_calls.fetch_add(1, Ordering::SeqCst);
            Ok(Self::next_probe(&self.deleted_probes))
        }

        async fn purge(&self) -> Result<(), AgentError> {
            self.purge_calls.fetch_add(1, Ordering::SeqCst);
            match self.purge_errors.lock().unwrap().pop_front() {
                Some(error) => Err(error),
                None => Ok(()),
            }
        }

        async fn check_purged(&self) -> Result<Presence, AgentError> {
            self.check_purged_calls.fetch_add(1, Ordering::SeqCst);
            Ok(Self::next_probe(&self.purged_probes))
        }
    }

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(600)
    }

    #[tokio::test(start_paused = true)]
    async fn without_purge_the_purge_operations_are_never_invoked() {
        let fake = FakeCapability::default();

        delete_then_purge(&fake, "key k", false, far_deadline())
            .await
            .unwrap();

        assert_eq!(fake.delete_calls.load(Ordering::SeqCst), 1);
        assert!(fake.check_deleted_calls.load(Ordering::SeqCst) >= 3);
        assert_eq!(fake.purge_calls.load(Ordering::SeqCst), 0);
        assert_eq!(fake.check_purged_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn deleting_an_absent_item_is_not_an_error() {
        let fake = FakeCapability::default();
        *fake.delete_result.lock().unwrap() = Some(not_found());

        delete_then_purge(&fake, "key k", false, far_deadline())
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn other_delete_errors_are_fatal() {
        let fake = FakeCapability::default();
        *fake.delete_result.lock().unwrap() = Some(AgentError::Conflict {
            message: "nope".to_string(),
        });

        let error = delete_then_purge(&fake, "key k", false, far_deadline())
            .await
            .unwrap_err();
        assert!(matches!(error, AgentError::Conflict { .. }));
        assert_eq!(fake.check_deleted_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn absence_must_hold_for_three_consecutive_probes() {
        // A lone absence right after the delete call is not trusted; the
        // streak restarts when the item flickers back into view.
        let fake = FakeCapability::with_deleted_probes(&[
            Presence::Present,
            Presence::Absent,
            Presence::Absent,
            Presence::Present,
            Presence::Absent,
        ]);

        delete_then_purge(&fake, "key k", false, far_deadline())
            .await
            .unwrap();

        assert_eq!(fake.check_deleted_calls.load(Ordering::SeqCst), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn purge_retries_while_the_soft_delete_settles() {
        let fake = FakeCapability::default();
        {
            let mut errors = fake.purge_errors.lock().unwrap();
            for _ in 0..2 {
                errors.push_back(AgentError::Conflict {
                    message: "Key k is currently being deleted".to_string(),
                });
            }
        }

        delete_then_purge(&fake, "key k", true, far_deadline())
            .await
            .unwrap();

        assert_eq!(fake.purge_calls.load(Ordering::SeqCst), 3);
        assert!(fake.check_purged_calls.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn unrelated_purge_refusals_are_fatal() {
        let fake = FakeCapability::default();
        fake.purge_errors
            .lock()
            .unwrap()
            .push_back(AgentError::Conflict {
                message: "purge is forbidden on this module".to_string(),
            });

        let error = delete_then_purge(&fake, "key k", true, far_deadline())
            .await
            .unwrap_err();
        assert!(matches!(error, AgentError::Conflict { .. }));
        assert_eq!(fake.purge_calls.load(Ordering::SeqCst), 1);
        assert_eq!(fake.check_purged_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_expiry_surfaces_as_timeout() {
        let fake = FakeCapability::with_deleted_probes(&[Presence::Present]);

        let error = delete_then_purge(
            &fake,
            "key k",
            false,
            Instant::now() + Duration::from_secs(12),
        )
        .await
        .unwrap_err();

        assert!(matches!(error, AgentError::Timeout { .. }));
    }
}
