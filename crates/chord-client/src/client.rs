//! Client context
//!
//! Holds the shared version clock, the entity cache, the REST dispatcher and
//! the shard coordinator. Nothing here is global; every handle is reached
//! through a [`Client`].

use std::sync::Arc;
use std::time::Duration;

use chord_cache::EntityCache;
use chord_common::{ClientConfig, ClientResult, ShardCount};
use chord_core::VersionClock;
use chord_gateway::protocol::PresenceUpdatePayload;
use chord_gateway::{Connector, ShardConfig, ShardCoordinator, ShardEvent, TungsteniteConnector};
use chord_rest::{
    GatewayBot, HttpClient, RateLimitEvent, ReqwestClient, RequestDispatcher, ShutdownMode,
};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

const MIN_PRUNE_PERIOD: Duration = Duration::from_secs(1);

/// Builds a [`Client`], resolving the shard count first when it is `auto`
pub struct ClientBuilder {
    config: ClientConfig,
    connector: Option<Arc<dyn Connector>>,
    http: Option<Arc<dyn HttpClient>>,
    presence: Option<PresenceUpdatePayload>,
}

impl ClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            connector: None,
            http: None,
            presence: None,
        }
    }

    /// Replace the WebSocket connector
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Replace the HTTP client
    pub fn http_client(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = Some(http);
        self
    }

    /// Presence sent with every Identify
    pub fn presence(mut self, presence: PresenceUpdatePayload) -> Self {
        self.presence = Some(presence);
        self
    }

    /// Validate the configuration and wire every component
    ///
    /// With [`ShardCount::Auto`] this asks `GET /gateway/bot` for the
    /// recommended shard count, gateway URL and identify concurrency.
    pub async fn build(self) -> ClientResult<Client> {
        let Self {
            mut config,
            connector,
            http,
            presence,
        } = self;
        config.validate()?;

        let clock = Arc::new(VersionClock::new());
        let cache = Arc::new(EntityCache::with_clock(config.cache.clone(), Arc::clone(&clock)));

        let http = match http {
            Some(http) => http,
            None => Arc::new(ReqwestClient::new(&config.rest)?),
        };
        let rest = RequestDispatcher::new(config.rest.clone(), &config.token, http, clock)?;

        let shard_count = match config.shards {
            ShardCount::Fixed(count) => count,
            ShardCount::Auto => {
                let bot = rest.get_gateway_bot().await?;
                apply_gateway_bot(&mut config, &bot)
            }
        };

        let shard_config = ShardConfig {
            token: config.token.clone(),
            intents: config.intents,
            shard_count,
            gateway: config.gateway.clone(),
            presence,
        };
        let connector = connector.unwrap_or_else(|| Arc::new(TungsteniteConnector));
        let gateway = ShardCoordinator::new(
            shard_config,
            config.max_reconnect_attempts,
            connector,
            Arc::clone(&cache),
        );

        info!(
            shards = shard_count,
            max_concurrency = config.gateway.max_concurrency,
            intents = config.intents.bits(),
            "Client ready"
        );

        Ok(Client {
            config: Arc::new(config),
            cache,
            rest,
            gateway: Arc::new(gateway),
            pruner: Arc::new(Mutex::new(None)),
        })
    }
}

/// Take the platform's recommendations, returning the shard count
fn apply_gateway_bot(config: &mut ClientConfig, bot: &GatewayBot) -> u32 {
    let limit = bot.session_start_limit;
    if limit.is_exhausted() {
        warn!(
            total = limit.total,
            reset_after_ms = limit.reset_after,
            "Session start limit exhausted, identifies will fail until it resets"
        );
    }
    info!(
        shards = bot.shards,
        remaining = limit.remaining,
        max_concurrency = limit.max_concurrency,
        "Using recommended sharding"
    );

    config.gateway.url.clone_from(&bot.url);
    config.gateway.max_concurrency = limit.max_concurrency.max(1);
    bot.shards.max(1)
}

/// Handle to a running client; cheap to clone
#[derive(Clone)]
pub struct Client {
    config: Arc<ClientConfig>,
    cache: Arc<EntityCache>,
    rest: RequestDispatcher,
    gateway: Arc<ShardCoordinator>,
    pruner: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Client {
    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    /// Connect every shard and start pruning idle REST buckets
    pub fn start(&self) {
        self.gateway.start();

        let mut pruner = self.pruner.lock();
        if pruner.is_none() {
            let rest = self.rest.clone();
            let period = self.config.rest.bucket_idle_timeout.max(MIN_PRUNE_PERIOD);
            *pruner = Some(tokio::spawn(async move {
                let mut ticks = tokio::time::interval(period);
                ticks.tick().await;
                loop {
                    ticks.tick().await;
                    rest.prune_idle();
                }
            }));
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<EntityCache> {
        &self.cache
    }

    pub fn rest(&self) -> &RequestDispatcher {
        &self.rest
    }

    pub fn gateway(&self) -> &ShardCoordinator {
        &self.gateway
    }

    /// Events from every shard
    pub fn subscribe(&self) -> broadcast::Receiver<ShardEvent> {
        self.gateway.subscribe()
    }

    /// 429 notifications from the REST side
    pub fn rate_limits(&self) -> broadcast::Receiver<RateLimitEvent> {
        self.rest.subscribe()
    }

    /// Close every shard, then let queued REST requests finish
    pub async fn shutdown(&self) {
        info!("Shutting down client");
        if let Some(pruner) = self.pruner.lock().take() {
            pruner.abort();
        }
        self.gateway.shutdown().await;
        self.rest.shutdown(ShutdownMode::Drain).await;
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("gateway", &self.gateway)
            .field("cache", &self.cache.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{config, MockHttp};
    use chord_common::ClientError;
    use serde_json::json;

    fn gateway_bot(remaining: u32) -> serde_json::Value {
        json!({
            "url": "wss://gateway.example",
            "shards": 3,
            "session_start_limit": {
                "total": 1000,
                "remaining": remaining,
                "reset_after": 14_400_000,
                "max_concurrency": 2
            }
        })
    }

    #[tokio::test]
    async fn test_auto_sharding_uses_gateway_bot() {
        let http = MockHttp::new();
        http.respond("/gateway/bot", 200, gateway_bot(999));

        let client = Client::builder(config(ShardCount::Auto))
            .http_client(http)
            .build()
            .await
            .unwrap();

        assert_eq!(client.gateway().shard_count(), 3);
        assert_eq!(client.config().gateway.url, "wss://gateway.example");
        assert_eq!(client.config().gateway.max_concurrency, 2);
    }

    #[tokio::test]
    async fn test_exhausted_start_limit_still_builds() {
        let http = MockHttp::new();
        http.respond("/gateway/bot", 200, gateway_bot(0));

        let client = Client::builder(config(ShardCount::Auto))
            .http_client(http)
            .build()
            .await
            .unwrap();
        assert_eq!(client.gateway().shard_count(), 3);
    }

    #[tokio::test]
    async fn test_fixed_sharding_skips_gateway_bot() {
        let http = MockHttp::new();

        let client = Client::builder(config(ShardCount::Fixed(4)))
            .http_client(http)
            .build()
            .await
            .unwrap();

        assert_eq!(client.gateway().shard_count(), 4);
        assert_eq!(client.gateway().statuses().len(), 4);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let result = Client::builder(config(ShardCount::Fixed(0)))
            .http_client(MockHttp::new())
            .build()
            .await;

        assert!(matches!(result, Err(ClientError::Config(_))));
    }

    #[tokio::test]
    async fn test_gateway_bot_failure_surfaces() {
        let http = MockHttp::new();
        http.respond("/gateway/bot", 401, json!({ "message": "401: Unauthorized" }));

        let err = Client::builder(config(ShardCount::Auto))
            .http_client(http)
            .build()
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Http { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_shutdown_before_start() {
        let client = Client::builder(config(ShardCount::Fixed(1)))
            .http_client(MockHttp::new())
            .build()
            .await
            .unwrap();

        client.shutdown().await;
        assert_eq!(client.rest().outstanding(), 0);
    }
}
