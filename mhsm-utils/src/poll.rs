//! The poll-step contract, the poll-until-done driver, and the concrete
//! pollers for module purge, security-domain download, and key recovery.
//!
//! A poller is one repeatable probe; the driver owns the loop. Failure is
//! never a poll status: it travels on the error channel only, and the
//! driver's deadline bounds how long `InProgress` may go on.

use async_trait::async_trait;
use mhsm_agent::{Agent, AgentError};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

/// Terminal-or-not outcome of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    /// The awaited condition has not been reached yet.
    InProgress,
    /// The awaited condition holds.
    Succeeded,
}

/// One probe observation plus how long the driver should wait before the
/// next one.
#[derive(Debug, Clone, Copy)]
pub struct PollResult {
    /// Whether the awaited condition has been reached.
    pub status: PollStatus,
    /// The pause the poller recommends before the next probe.
    pub recommended_interval: Duration,
}

impl PollResult {
    /// A non-terminal observation with the given re-probe recommendation.
    pub fn in_progress(recommended_interval: Duration) -> Self {
        Self {
            status: PollStatus::InProgress,
            recommended_interval,
        }
    }

    /// A terminal observation.
    pub fn succeeded() -> Self {
        Self {
            status: PollStatus::Succeeded,
            recommended_interval: Duration::ZERO,
        }
    }
}

/// A single repeatable probe against remote state.
#[async_trait]
pub trait Poller {
    /// Names the awaited condition; used in timeout errors.
    fn description(&self) -> String;

    /// Performs one probe.
    async fn probe(&mut self) -> Result<PollResult, AgentError>;
}

/// Consecutive transport drops the driver tolerates by default before giving
/// up.
pub const DEFAULT_TRANSPORT_FAILURE_TOLERANCE: u32 = 3;

/// Pause before re-probing after a tolerated transport drop.
const TRANSPORT_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Drives a [`Poller`] until it reports success, the deadline elapses, or an
/// error surfaces.
///
/// Transport failures are tolerated up to `transport_failure_tolerance`
/// consecutive occurrences (a successful probe resets the count), so a
/// single dropped connection does not abort a long wait. Pass `0` for
/// conditions where a transport failure is itself conclusive.
pub async fn poll_until_done<P>(
    poller: &mut P,
    transport_failure_tolerance: u32,
    deadline: Instant,
) -> Result<(), AgentError>
where
    P: Poller + Send,
{
    let mut consecutive_transport_failures = 0u32;
    loop {
        let interval = match poller.probe().await {
            Ok(PollResult {
                status: PollStatus::Succeeded,
                ..
            }) => return Ok(()),
            Ok(PollResult {
                recommended_interval,
                ..
            }) => {
                consecutive_transport_failures = 0;
                recommended_interval
            }
            Err(AgentError::Transport(source)) => {
                consecutive_transport_failures += 1;
                if consecutive_transport_failures > transport_failure_tolerance {
                    return Err(AgentError::Transport(source));
                }
                warn!(
                    failures = consecutive_transport_failures,
                    "transient transport failure while polling"
                );
                TRANSPORT_RETRY_INTERVAL
            }
            Err(e) => return Err(e),
        };
        if Instant::now() >= deadline {
            return Err(AgentError::Timeout {
                description: poller.description(),
            });
        }
        sleep(interval).await;
    }
}

/// Management-plane capability the module purge poller needs: the
/// recently-deleted listing and the purge call itself. The management API is
/// an external collaborator; implementations adapt whatever client the
/// caller already has.
#[async_trait]
pub trait ModulePurge {
    /// Whether the module still appears in the recently-deleted listing.
    async fn is_listed_as_deleted(&self) -> Result<bool, AgentError>;

    /// Issues the purge call (again).
    async fn purge(&self) -> Result<(), AgentError>;
}

/// An apparently ignored purge is re-issued after this long. The upstream
/// service has been observed to silently drop the initial purge call.
const PURGE_REISSUE_GATE: Duration = Duration::from_secs(60);

const PURGE_PROBE_INTERVAL: Duration = Duration::from_secs(10);

/// Waits for a purged module to disappear from the recently-deleted listing,
/// re-issuing the purge whenever the gate elapses without progress.
#[derive(Debug)]
pub struct ModulePurgePoller<C> {
    client: C,
    module_name: String,
    last_attempt: Instant,
}

impl<C> ModulePurgePoller<C> {
    /// Starts the poller right after the caller issued the initial purge;
    /// the re-issue gate is armed from now.
    pub fn new(client: C, module_name: impl Into<String>) -> Self {
        Self {
            client,
            module_name: module_name.into(),
            last_attempt: Instant::now(),
        }
    }
}

#[async_trait]
impl<C> Poller for ModulePurgePoller<C>
where
    C: ModulePurge + Send + Sync,
{
    fn description(&self) -> String {
        format!(
            "module {} to disappear from the recently-deleted listing",
            self.module_name
        )
    }

    async fn probe(&mut self) -> Result<PollResult, AgentError> {
        if !self.client.is_listed_as_deleted().await? {
            return Ok(PollResult::succeeded());
        }
        if self.last_attempt.elapsed() >= PURGE_REISSUE_GATE {
            warn!(
                module = %self.module_name,
                "purge appears to have been dropped upstream, re-issuing"
            );
            self.client.purge().await?;
            self.last_attempt = Instant::now();
        }
        Ok(PollResult::in_progress(PURGE_PROBE_INTERVAL))
    }
}

/// Sentinel the service reports once a security-domain transfer is fully
/// applied.
const DOWNLOAD_SUCCESS_SENTINEL: &str = "Success";

const DOWNLOAD_PROBE_INTERVAL: Duration = Duration::from_secs(5);

/// Waits for an in-flight security-domain transfer to be fully applied.
/// There is no failure sentinel; exhaustion is the caller's deadline.
#[derive(Debug)]
pub struct DownloadPoller<'agent> {
    agent: &'agent Agent,
}

impl<'agent> DownloadPoller<'agent> {
    /// Binds the poller to the module whose transfer is in flight.
    pub fn new(agent: &'agent Agent) -> Self {
        Self { agent }
    }
}

#[async_trait]
impl Poller for DownloadPoller<'_> {
    fn description(&self) -> String {
        format!(
            "security domain download on {} to complete",
            self.agent.endpoint()
        )
    }

    async fn probe(&mut self) -> Result<PollResult, AgentError> {
        let pending = self.agent.security_domain_download_pending().await?;
        if pending.status == DOWNLOAD_SUCCESS_SENTINEL {
            Ok(PollResult::succeeded())
        } else {
            debug!(status = %pending.status, "security domain transfer still pending");
            Ok(PollResult::in_progress(DOWNLOAD_PROBE_INTERVAL))
        }
    }
}

const RECOVERY_PROBE_INTERVAL: Duration = Duration::from_secs(5);

/// Waits for a recovered key to answer at its live address again. Existence
/// is the proof: the first successful read ends the wait, whatever the key's
/// attributes say. Drive this with a transport-failure tolerance of zero;
/// a network failure here is conclusive, not pending.
#[derive(Debug)]
pub struct KeyRecoveryPoller<'agent> {
    agent: &'agent Agent,
    name: String,
}

impl<'agent> KeyRecoveryPoller<'agent> {
    /// Binds the poller to the key being recovered.
    pub fn new(agent: &'agent Agent, name: impl Into<String>) -> Self {
        Self {
            agent,
            name: name.into(),
        }
    }
}

#[async_trait]
impl Poller for KeyRecoveryPoller<'_> {
    fn description(&self) -> String {
        format!(
            "key {} to reappear on {}",
            self.name,
            self.agent.endpoint()
        )
    }

    async fn probe(&mut self) -> Result<PollResult, AgentError> {
        match self.agent.get_key(&self.name, None).await {
            Ok(_) => Ok(PollResult::succeeded()),
            Err(AgentError::NotFound { .. }) => {
                Ok(PollResult::in_progress(RECOVERY_PROBE_INTERVAL))
            }
            Err(e) => Err(e),
        }
    }
}
