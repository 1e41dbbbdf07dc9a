//! Shard handles and the events shards publish

use chord_common::{ClientError, ClientResult};
use chord_core::{GatewayEvent, Version};
use governor::clock::{Clock, DefaultClock};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use parking_lot::RwLock;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::protocol::GatewayCommand;
use crate::session::{Session, SessionState};

/// Everything shards report, on one broadcast channel
#[derive(Debug, Clone)]
pub enum ShardEvent {
    StateChanged {
        shard_id: u32,
        state: SessionState,
    },
    /// A decoded dispatch, already applied to the cache
    Dispatch {
        shard_id: u32,
        sequence: Option<u64>,
        version: Version,
        event: Arc<GatewayEvent>,
    },
    /// The shard gave up; other shards keep running
    Terminated {
        shard_id: u32,
        error: Arc<ClientError>,
    },
}

impl ShardEvent {
    pub fn shard_id(&self) -> u32 {
        match self {
            Self::StateChanged { shard_id, .. }
            | Self::Dispatch { shard_id, .. }
            | Self::Terminated { shard_id, .. } => *shard_id,
        }
    }
}

/// Point-in-time view of a shard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardStatus {
    pub shard_id: u32,
    pub state: SessionState,
    pub latency: Option<Duration>,
    pub sequence: Option<u64>,
    pub session_id: Option<String>,
}

/// Gateway command limiter: `limit` commands per `period`
pub fn command_limiter(limit: u32, period: Duration) -> DefaultDirectRateLimiter {
    let burst = NonZeroU32::new(limit).unwrap_or(NonZeroU32::MIN);
    let quota = Quota::with_period(period / burst.get())
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst);
    RateLimiter::direct(quota)
}

/// Cheap handle to a running shard
#[derive(Clone)]
pub struct ShardHandle {
    shard_id: u32,
    session: Arc<RwLock<Session>>,
    commands: mpsc::Sender<GatewayCommand>,
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl ShardHandle {
    pub fn new(
        session: Arc<RwLock<Session>>,
        commands: mpsc::Sender<GatewayCommand>,
        limiter: DefaultDirectRateLimiter,
    ) -> Self {
        let shard_id = session.read().shard_id;
        Self {
            shard_id,
            session,
            commands,
            limiter: Arc::new(limiter),
        }
    }

    pub fn id(&self) -> u32 {
        self.shard_id
    }

    pub fn status(&self) -> ShardStatus {
        let session = self.session.read();
        ShardStatus {
            shard_id: session.shard_id,
            state: session.state,
            latency: session.latency,
            sequence: session.sequence,
            session_id: session.session_id.clone(),
        }
    }

    /// Queue a command, waiting for the command limit if needed
    ///
    /// Commands are written once the shard is connected.
    pub async fn send(&self, command: GatewayCommand) -> ClientResult<()> {
        self.limiter.until_ready().await;
        self.commands
            .send(command)
            .await
            .map_err(|_| ClientError::Cancelled)
    }

    /// Queue a command or fail with `RateLimited` right away
    pub fn try_send(&self, command: GatewayCommand) -> ClientResult<()> {
        if let Err(not_until) = self.limiter.check() {
            let retry_after = not_until.wait_time_from(DefaultClock::default().now());
            tracing::debug!(shard_id = self.shard_id, retry_after_ms = retry_after.as_millis() as u64, "Command limit reached");
            return Err(ClientError::RateLimited {
                global: false,
                retry_after,
            });
        }
        self.commands.try_send(command).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => ClientError::transient("command queue full"),
            mpsc::error::TrySendError::Closed(_) => ClientError::Cancelled,
        })
    }
}

impl std::fmt::Debug for ShardHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardHandle")
            .field("shard_id", &self.shard_id)
            .field("state", &self.session.read().state)
            .finish()
    }
}
