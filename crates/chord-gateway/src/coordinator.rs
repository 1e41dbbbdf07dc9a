//! Shard coordinator
//!
//! Owns every shard of the client. Shard count and indices are fixed for the
//! coordinator's lifetime; each shard runs its own supervised task that
//! reconnects with capped backoff and stops for good on a fatal close or
//! after too many consecutive failed connections.

use chord_cache::EntityCache;
use chord_common::{Backoff, ClientError, ClientResult};
use chord_core::{EventDecoder, Snowflake};
use parking_lot::Mutex;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use crate::identify::IdentifyLimiter;
use crate::protocol::GatewayCommand;
use crate::session::{Disconnect, GatewaySession, SessionContext, SessionState, ShardConfig};
use crate::shard::{command_limiter, ShardEvent, ShardHandle, ShardStatus};
use crate::transport::Connector;

const EVENT_CAPACITY: usize = 4096;
const COMMAND_CAPACITY: usize = 64;

/// Guild to shard routing used by the platform
pub fn shard_for_guild(guild_id: Snowflake, shard_count: u32) -> u32 {
    (guild_id.shard_bits() % u64::from(shard_count.max(1))) as u32
}

pub struct ShardCoordinator {
    ctx: SessionContext,
    max_reconnect_attempts: u32,
    handles: Vec<ShardHandle>,
    pending: Mutex<Vec<GatewaySession>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shutdown: watch::Sender<bool>,
}

impl ShardCoordinator {
    /// Prepare `config.shard_count` shards; nothing connects until [`start`](Self::start)
    pub fn new(
        config: ShardConfig,
        max_reconnect_attempts: u32,
        connector: Arc<dyn Connector>,
        cache: Arc<EntityCache>,
    ) -> Self {
        let identify = IdentifyLimiter::new(config.gateway.max_concurrency, config.gateway.identify_spacing);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (shutdown, _) = watch::channel(false);

        let ctx = SessionContext {
            config: Arc::new(config),
            connector,
            identify: Arc::new(identify),
            decoder: Arc::new(EventDecoder::new()),
            cache,
            events,
        };

        let gateway = &ctx.config.gateway;
        let mut handles = Vec::new();
        let mut pending = Vec::new();
        for shard_id in 0..ctx.config.shard_count.max(1) {
            let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
            let session = GatewaySession::new(shard_id, ctx.clone(), rx);
            handles.push(ShardHandle::new(
                session.session(),
                tx,
                command_limiter(gateway.command_limit, gateway.command_period),
            ));
            pending.push(session);
        }

        Self {
            ctx,
            max_reconnect_attempts,
            handles,
            pending: Mutex::new(pending),
            tasks: Mutex::new(Vec::new()),
            shutdown,
        }
    }

    /// Spawn one supervised task per shard; later calls do nothing
    pub fn start(&self) {
        let sessions: Vec<GatewaySession> = self.pending.lock().drain(..).collect();
        if sessions.is_empty() {
            return;
        }
        tracing::info!(
            shards = sessions.len(),
            max_concurrency = self.ctx.identify.max_concurrency(),
            "Starting shards"
        );

        let gateway = &self.ctx.config.gateway;
        let mut tasks = self.tasks.lock();
        for session in sessions {
            let supervisor = Supervisor {
                backoff: Backoff::new(gateway.backoff_base, gateway.backoff_max),
                max_attempts: self.max_reconnect_attempts,
                events: self.ctx.events.clone(),
            };
            tasks.push(tokio::spawn(supervisor.run(session, self.shutdown.subscribe())));
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ShardEvent> {
        self.ctx.events.subscribe()
    }

    pub fn shard_count(&self) -> u32 {
        self.handles.len() as u32
    }

    pub fn shard(&self, shard_id: u32) -> Option<&ShardHandle> {
        self.handles.get(shard_id as usize)
    }

    pub fn shards(&self) -> &[ShardHandle] {
        &self.handles
    }

    /// The shard that receives a guild's events
    pub fn shard_for_guild(&self, guild_id: Snowflake) -> u32 {
        shard_for_guild(guild_id, self.shard_count())
    }

    pub fn statuses(&self) -> Vec<ShardStatus> {
        self.handles.iter().map(ShardHandle::status).collect()
    }

    /// Identify slots currently held
    pub fn identifies_in_flight(&self) -> usize {
        self.ctx.identify.in_use()
    }

    /// Send a command on the shard owning its guild, or shard 0
    pub async fn send(&self, command: GatewayCommand) -> ClientResult<()> {
        let shard_id = command.guild_id().map_or(0, |guild_id| self.shard_for_guild(guild_id));
        match self.shard(shard_id) {
            Some(handle) => handle.send(command).await,
            None => Err(ClientError::Cancelled),
        }
    }

    /// Stop every shard, closing transports and heartbeats, and wait for them
    pub async fn shutdown(&self) {
        self.shutdown.send_replace(true);
        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        tracing::info!(shards = tasks.len(), "Shutting down shards");

        for task in tasks {
            if let Err(err) = task.await {
                tracing::warn!(error = %err, "Shard task failed");
            }
        }
    }
}

impl std::fmt::Debug for ShardCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardCoordinator")
            .field("shards", &self.handles.len())
            .field("config", &self.ctx.config)
            .finish()
    }
}

/// Restart policy of one shard
struct Supervisor {
    backoff: Backoff,
    max_attempts: u32,
    events: broadcast::Sender<ShardEvent>,
}

impl Supervisor {
    async fn run(mut self, mut session: GatewaySession, mut shutdown: watch::Receiver<bool>) {
        let shard_id = session.shard_id();
        let mut failures = 0u32;

        loop {
            let result = session.run_connection(&mut shutdown).await;
            if session.was_connected() {
                failures = 0;
                self.backoff.reset();
            }

            let (delay, error) = match result {
                Ok(Disconnect::Shutdown) => break,
                Ok(Disconnect::InvalidSession { .. }) => (invalid_session_delay(), None),
                Ok(Disconnect::Reconnect) => (self.backoff.next_delay(), None),
                Err(err) if err.is_fatal() => {
                    self.terminate(&session, err);
                    return;
                }
                Err(err) => {
                    tracing::warn!(shard_id, error = %err, kind = err.kind(), "Connection failed");
                    (self.backoff.next_delay(), Some(err))
                }
            };

            if !session.was_connected() {
                failures += 1;
                if self.max_attempts > 0 && failures >= self.max_attempts {
                    let reason = error.map_or_else(|| "no successful connection".to_string(), |err| err.to_string());
                    self.terminate(
                        &session,
                        ClientError::Transient(format!("gave up after {failures} attempts: {reason}")),
                    );
                    return;
                }
            }

            tracing::debug!(shard_id, delay_ms = delay.as_millis() as u64, failures, "Reconnecting");
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => break,
            }
        }

        session.set_state(SessionState::Disconnected);
        tracing::info!(shard_id, "Shard stopped");
    }

    fn terminate(&self, session: &GatewaySession, error: ClientError) {
        let shard_id = session.shard_id();
        tracing::error!(shard_id, error = %error, "Shard terminated");
        session.set_state(SessionState::Disconnected);
        let _ = self.events.send(ShardEvent::Terminated {
            shard_id,
            error: Arc::new(error),
        });
    }
}

/// Wait before reconnecting after Invalid Session
fn invalid_session_delay() -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(1_000..=5_000))
}
