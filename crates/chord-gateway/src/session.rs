//! Gateway session
//!
//! Drives one shard's connection through
//! `Connecting -> AwaitingHello -> Identifying|Resuming -> Connected`, and
//! keeps the resumable part of the session (id, sequence, resume URL) across
//! connections. A single task owns the transport, so there is never more than
//! one handshake in flight for a session.

use chord_cache::EntityCache;
use chord_common::{ClientError, ClientResult, GatewayConfig};
use chord_core::{EventDecoder, GatewayEvent, GatewayIntents};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{timeout, Instant};

use crate::heartbeat::{first_beat_delay, HeartbeatSignal, HeartbeatTimer};
use crate::identify::IdentifyLimiter;
use crate::protocol::{
    CloseAction, GatewayCommand, GatewayMessage, HelloPayload, IdentifyPayload,
    IdentifyProperties, OpCode, PresenceUpdatePayload, ResumePayload,
};
use crate::shard::ShardEvent;
use crate::transport::{Connector, Frame, Transport};

/// Close code that keeps the session resumable
const RESUMABLE_CLOSE: u16 = 4000;
/// Close code that ends the session
const NORMAL_CLOSE: u16 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Disconnected,
    Connecting,
    AwaitingHello,
    Identifying,
    Resuming,
    /// READY or RESUMED received
    Connected,
    Reconnecting,
}

impl SessionState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::AwaitingHello => "awaiting_hello",
            Self::Identifying => "identifying",
            Self::Resuming => "resuming",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-shard session data
#[derive(Debug, Clone)]
pub struct Session {
    pub shard_id: u32,
    pub shard_count: u32,
    pub session_id: Option<String>,
    /// Highest dispatch sequence seen
    pub sequence: Option<u64>,
    pub resume_url: Option<String>,
    pub state: SessionState,
    pub last_heartbeat_sent: Option<Instant>,
    pub last_heartbeat_ack: Option<Instant>,
    /// Heartbeat round trip
    pub latency: Option<Duration>,
}

impl Session {
    pub fn new(shard_id: u32, shard_count: u32) -> Self {
        Self {
            shard_id,
            shard_count,
            session_id: None,
            sequence: None,
            resume_url: None,
            state: SessionState::Disconnected,
            last_heartbeat_sent: None,
            last_heartbeat_ack: None,
            latency: None,
        }
    }

    pub fn can_resume(&self) -> bool {
        self.session_id.is_some() && self.sequence.is_some()
    }

    /// Keep the highest sequence; returns whether it advanced
    pub fn record_sequence(&mut self, sequence: u64) -> bool {
        match self.sequence {
            Some(current) if current >= sequence => false,
            _ => {
                self.sequence = Some(sequence);
                true
            }
        }
    }

    /// Forget the session so the next connection identifies
    pub fn invalidate(&mut self) {
        self.session_id = None;
        self.sequence = None;
        self.resume_url = None;
    }
}

/// Identify settings shared by all shards
#[derive(Clone)]
pub struct ShardConfig {
    pub token: String,
    pub intents: GatewayIntents,
    pub shard_count: u32,
    pub gateway: GatewayConfig,
    /// Presence sent with Identify
    pub presence: Option<PresenceUpdatePayload>,
}

impl std::fmt::Debug for ShardConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardConfig")
            .field("token", &"[redacted]")
            .field("intents", &self.intents)
            .field("shard_count", &self.shard_count)
            .field("gateway", &self.gateway)
            .finish()
    }
}

/// Collaborators every session of a coordinator shares
#[derive(Clone)]
pub struct SessionContext {
    pub config: Arc<ShardConfig>,
    pub connector: Arc<dyn Connector>,
    pub identify: Arc<IdentifyLimiter>,
    pub decoder: Arc<EventDecoder>,
    pub cache: Arc<EntityCache>,
    pub events: broadcast::Sender<ShardEvent>,
}

/// How a connection ended without a fatal error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disconnect {
    Shutdown,
    /// Reconnect; resumes if the session survived
    Reconnect,
    InvalidSession { resumable: bool },
}

pub struct GatewaySession {
    shard_id: u32,
    ctx: SessionContext,
    session: Arc<RwLock<Session>>,
    commands: mpsc::Receiver<GatewayCommand>,
    connected: bool,
}

impl GatewaySession {
    pub fn new(shard_id: u32, ctx: SessionContext, commands: mpsc::Receiver<GatewayCommand>) -> Self {
        let session = Session::new(shard_id, ctx.config.shard_count);
        Self {
            shard_id,
            ctx,
            session: Arc::new(RwLock::new(session)),
            commands,
            connected: false,
        }
    }

    pub fn shard_id(&self) -> u32 {
        self.shard_id
    }

    /// Shared view of the session data
    pub fn session(&self) -> Arc<RwLock<Session>> {
        Arc::clone(&self.session)
    }

    /// Whether the last connection reached `Connected`
    pub fn was_connected(&self) -> bool {
        self.connected
    }

    pub fn set_state(&self, state: SessionState) {
        let previous = std::mem::replace(&mut self.session.write().state, state);
        if previous != state {
            tracing::debug!(shard_id = self.shard_id, from = %previous, to = %state, "Session state changed");
            let _ = self.ctx.events.send(ShardEvent::StateChanged {
                shard_id: self.shard_id,
                state,
            });
        }
    }

    fn state(&self) -> SessionState {
        self.session.read().state
    }

    fn connect_url(&self, resume: bool) -> String {
        let gateway = &self.ctx.config.gateway;
        let base = resume
            .then(|| self.session.read().resume_url.clone())
            .flatten()
            .unwrap_or_else(|| gateway.url.clone());
        format!("{}/?v={}&encoding=json", base.trim_end_matches('/'), gateway.version)
    }

    /// Run one connection from connect to close
    pub async fn run_connection(&mut self, shutdown: &mut watch::Receiver<bool>) -> ClientResult<Disconnect> {
        self.connected = false;
        if *shutdown.borrow() {
            return Ok(Disconnect::Shutdown);
        }

        let resume = self.session.read().can_resume();
        if !resume {
            tokio::select! {
                () = self.ctx.identify.acquire(self.shard_id) => {}
                _ = shutdown.changed() => return Ok(Disconnect::Shutdown),
            }
        }

        self.set_state(SessionState::Connecting);
        let url = self.connect_url(resume);
        let handshake_timeout = self.ctx.config.gateway.handshake_timeout;
        tracing::info!(shard_id = self.shard_id, resume, url = %url, "Connecting to gateway");

        let mut transport = match timeout(handshake_timeout, self.ctx.connector.connect(&url)).await {
            Ok(connected) => connected?,
            Err(_) => return Err(ClientError::HandshakeTimeout),
        };

        self.set_state(SessionState::AwaitingHello);
        let hello = tokio::select! {
            hello = timeout(handshake_timeout, self.await_hello(transport.as_mut())) => hello,
            _ = shutdown.changed() => {
                close_quietly(transport.as_mut(), NORMAL_CLOSE, self.shard_id).await;
                return Ok(Disconnect::Shutdown);
            }
        };
        let hello = match hello {
            Ok(Ok(hello)) => hello,
            Ok(Err(err)) => return Err(err),
            Err(_) => {
                close_quietly(transport.as_mut(), RESUMABLE_CLOSE, self.shard_id).await;
                return Err(ClientError::HandshakeTimeout);
            }
        };

        let interval = hello.interval();
        tracing::debug!(shard_id = self.shard_id, interval_ms = hello.heartbeat_interval, "Hello received");
        let (beat_tx, mut beats) = mpsc::channel(4);
        let heartbeat = HeartbeatTimer::start(interval, first_beat_delay(interval, self.shard_id), beat_tx);

        let result = match self.handshake(transport.as_mut(), resume).await {
            Ok(()) => {
                self.event_loop(transport.as_mut(), &heartbeat, &mut beats, shutdown)
                    .await
            }
            Err(err) => Err(err),
        };
        heartbeat.stop();

        let close_code = match result {
            Ok(Disconnect::Shutdown | Disconnect::InvalidSession { resumable: false }) => NORMAL_CLOSE,
            _ => RESUMABLE_CLOSE,
        };
        close_quietly(transport.as_mut(), close_code, self.shard_id).await;

        self.set_state(match result {
            Ok(Disconnect::Shutdown) => SessionState::Disconnected,
            _ => SessionState::Reconnecting,
        });
        result
    }

    async fn await_hello(&self, transport: &mut dyn Transport) -> ClientResult<HelloPayload> {
        loop {
            match transport.recv().await {
                None => return Err(ClientError::transient("connection ended before Hello")),
                Some(Err(err)) => return Err(err),
                Some(Ok(Frame::Close(code))) => {
                    self.on_close(code)?;
                    return Err(ClientError::transient("connection closed before Hello"));
                }
                Some(Ok(Frame::Text(text))) => {
                    match GatewayMessage::from_json(&text).ok().and_then(|message| message.as_hello()) {
                        Some(hello) => return Ok(hello),
                        None => tracing::debug!(shard_id = self.shard_id, "Ignoring frame before Hello"),
                    }
                }
            }
        }
    }

    async fn handshake(&self, transport: &mut dyn Transport, resume: bool) -> ClientResult<()> {
        let config = &self.ctx.config;

        if resume {
            let (session_id, seq) = {
                let session = self.session.read();
                (session.session_id.clone(), session.sequence)
            };
            if let (Some(session_id), Some(seq)) = (session_id, seq) {
                self.set_state(SessionState::Resuming);
                tracing::info!(shard_id = self.shard_id, seq, "Resuming session");
                let payload = ResumePayload {
                    token: config.token.clone(),
                    session_id,
                    seq,
                };
                return self.send(transport, &GatewayMessage::resume(&payload)).await;
            }
        }

        self.set_state(SessionState::Identifying);
        tracing::info!(shard_id = self.shard_id, shard_count = config.shard_count, "Identifying");
        let payload = IdentifyPayload {
            token: config.token.clone(),
            intents: config.intents,
            properties: IdentifyProperties::default(),
            shard: [self.shard_id, config.shard_count],
            large_threshold: config.gateway.large_threshold,
            presence: config.presence.clone(),
        };
        self.send(transport, &GatewayMessage::identify(&payload)).await
    }

    async fn event_loop(
        &mut self,
        transport: &mut dyn Transport,
        heartbeat: &HeartbeatTimer,
        beats: &mut mpsc::Receiver<HeartbeatSignal>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> ClientResult<Disconnect> {
        loop {
            let connected = self.state() == SessionState::Connected;

            tokio::select! {
                frame = transport.recv() => match frame {
                    None => return Err(ClientError::transient("gateway stream ended")),
                    Some(Err(err)) => return Err(err),
                    Some(Ok(Frame::Close(code))) => return self.on_close(code),
                    Some(Ok(Frame::Text(text))) => {
                        if let Some(disconnect) = self.on_text(transport, heartbeat, &text).await? {
                            return Ok(disconnect);
                        }
                    }
                },
                Some(signal) = beats.recv() => match signal {
                    HeartbeatSignal::Beat => self.send_heartbeat(transport, heartbeat).await?,
                    HeartbeatSignal::Zombied => {
                        tracing::warn!(shard_id = self.shard_id, "Heartbeat not acknowledged, reconnecting");
                        return Err(ClientError::Zombied);
                    }
                },
                Some(command) = self.commands.recv(), if connected => {
                    self.send(transport, &command.to_message()).await?;
                }
                _ = shutdown.changed() => return Ok(Disconnect::Shutdown),
            }
        }
    }

    async fn on_text(
        &mut self,
        transport: &mut dyn Transport,
        heartbeat: &HeartbeatTimer,
        text: &str,
    ) -> ClientResult<Option<Disconnect>> {
        let message = match GatewayMessage::from_json(text) {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!(shard_id = self.shard_id, error = %err, "Undecodable gateway frame");
                return Ok(None);
            }
        };
        tracing::trace!(shard_id = self.shard_id, op = %message.op, seq = ?message.s, "Frame received");

        match message.op {
            OpCode::Dispatch => {
                self.on_dispatch(message);
                Ok(None)
            }
            OpCode::Heartbeat => {
                tracing::debug!(shard_id = self.shard_id, "Heartbeat requested by gateway");
                self.send_heartbeat(transport, heartbeat).await?;
                Ok(None)
            }
            OpCode::HeartbeatAck => {
                heartbeat.acked();
                self.record_ack(Instant::now());
                Ok(None)
            }
            OpCode::Reconnect => {
                tracing::info!(shard_id = self.shard_id, "Gateway requested reconnect");
                Ok(Some(Disconnect::Reconnect))
            }
            OpCode::InvalidSession => {
                let resumable = message.as_invalid_session().unwrap_or(false);
                tracing::warn!(shard_id = self.shard_id, resumable, "Session invalidated");
                if !resumable {
                    self.session.write().invalidate();
                }
                Ok(Some(Disconnect::InvalidSession { resumable }))
            }
            op => {
                tracing::debug!(shard_id = self.shard_id, op = %op, "Unexpected op code");
                Ok(None)
            }
        }
    }

    fn on_dispatch(&mut self, message: GatewayMessage) {
        let version = self.ctx.cache.clock().tick();
        if let Some(seq) = message.s {
            self.session.write().record_sequence(seq);
        }
        let Some(name) = message.t else {
            return;
        };

        let event = match self.ctx.decoder.decode(&name, message.d) {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(shard_id = self.shard_id, event = %name, error = %err, "Failed to decode dispatch");
                return;
            }
        };

        match &event {
            GatewayEvent::Ready(ready) => {
                {
                    let mut session = self.session.write();
                    session.session_id = Some(ready.session_id.clone());
                    session.resume_url.clone_from(&ready.resume_gateway_url);
                }
                tracing::info!(
                    shard_id = self.shard_id,
                    user = %ready.user.id,
                    guilds = ready.guilds.len(),
                    "Shard ready"
                );
                self.connected = true;
                self.set_state(SessionState::Connected);
            }
            GatewayEvent::Resumed => {
                tracing::info!(shard_id = self.shard_id, "Session resumed");
                self.connected = true;
                self.set_state(SessionState::Connected);
            }
            _ => {}
        }

        self.ctx.cache.apply_event(&event, version);
        let _ = self.ctx.events.send(ShardEvent::Dispatch {
            shard_id: self.shard_id,
            sequence: message.s,
            version,
            event: Arc::new(event),
        });
    }

    async fn send_heartbeat(&self, transport: &mut dyn Transport, heartbeat: &HeartbeatTimer) -> ClientResult<()> {
        let seq = self.session.read().sequence;
        let frame = GatewayMessage::heartbeat(seq);

        match timeout(self.ctx.config.gateway.heartbeat_send_timeout, self.send(transport, &frame)).await {
            Ok(sent) => sent?,
            Err(_) => return Err(ClientError::Zombied),
        }

        heartbeat.sent();
        self.session.write().last_heartbeat_sent = Some(Instant::now());
        tracing::trace!(shard_id = self.shard_id, seq = ?seq, "Heartbeat sent");
        Ok(())
    }

    fn record_ack(&self, now: Instant) {
        let mut session = self.session.write();
        session.last_heartbeat_ack = Some(now);
        session.latency = session.last_heartbeat_sent.map(|sent| now - sent);
        tracing::trace!(shard_id = self.shard_id, latency = ?session.latency, "Heartbeat acknowledged");
    }

    fn on_close(&self, code: Option<u16>) -> ClientResult<Disconnect> {
        match CloseAction::classify(code) {
            CloseAction::Resume => {
                tracing::warn!(shard_id = self.shard_id, code = ?code, "Gateway closed, will resume");
                Ok(Disconnect::Reconnect)
            }
            CloseAction::Reidentify => {
                tracing::warn!(shard_id = self.shard_id, code = ?code, "Gateway closed, session lost");
                self.session.write().invalidate();
                Ok(Disconnect::Reconnect)
            }
            CloseAction::Fatal => {
                let code = code.unwrap_or_default();
                tracing::error!(shard_id = self.shard_id, code, "Gateway closed with fatal code");
                Err(ClientError::FatalClose { code })
            }
        }
    }

    async fn send(&self, transport: &mut dyn Transport, message: &GatewayMessage) -> ClientResult<()> {
        let json = message.to_json()?;
        tracing::trace!(shard_id = self.shard_id, op = %message.op, "Sending frame");
        transport.send(json).await
    }
}

async fn close_quietly(transport: &mut dyn Transport, code: u16, shard_id: u32) {
    if let Err(err) = transport.close(code).await {
        tracing::debug!(shard_id, code, error = %err, "Close failed");
    }
}

impl std::fmt::Debug for GatewaySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewaySession")
            .field("shard_id", &self.shard_id)
            .field("session", &*self.session.read())
            .finish()
    }
}
