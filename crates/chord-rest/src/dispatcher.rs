//! Request dispatcher
//!
//! `submit` stamps a request with a cache version, queues it on its bucket and
//! hands back a future. Each bucket with pending work is drained by a single
//! executor task, so a bucket never has two requests in flight and runs its
//! queue in FIFO order. Buckets do not order against each other.

use chord_common::{Backoff, ClientError, ClientResult, RestConfig};
use chord_core::{Version, VersionClock};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{broadcast, oneshot, watch, Notify};
use tokio::time::Instant;

use crate::bucket::{Admission, Bucket, BucketSnapshot, BucketTable};
use crate::global::GlobalLimiter;
use crate::headers::{RateLimitBody, RateLimitHeaders, RateLimitScope};
use crate::http::{HttpClient, HttpRequest, HttpResponse};
use crate::models::GatewayBot;
use crate::route::Route;

/// Delay before replaying a 429 that carried no retry hint
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);
const RETRY_BASE: Duration = Duration::from_millis(500);
const RETRY_MAX: Duration = Duration::from_secs(10);
const EVENT_CAPACITY: usize = 256;

/// Successful response
#[derive(Debug, Clone)]
pub struct RestResponse {
    pub status: u16,
    pub body: Vec<u8>,
    /// Version stamped when the request was submitted
    pub version: Version,
}

impl RestResponse {
    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> ClientResult<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// A decoded value with the version to write it to the cache under
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub value: T,
    pub version: Version,
}

/// Published whenever a 429 is received
#[derive(Debug, Clone)]
pub struct RateLimitEvent {
    pub bucket: String,
    pub route: String,
    pub global: bool,
    pub scope: Option<RateLimitScope>,
    pub retry_after: Duration,
}

/// What happens to queued requests on shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Finish everything already queued
    Drain,
    /// Fail queued requests with `Cancelled`
    Cancel,
}

/// Future returned by [`RequestDispatcher::submit`]
#[derive(Debug)]
pub struct ResponseFuture {
    version: Version,
    rx: oneshot::Receiver<ClientResult<RestResponse>>,
}

impl ResponseFuture {
    /// Version the request was stamped with
    pub fn version(&self) -> Version {
        self.version
    }
}

impl Future for ResponseFuture {
    type Output = ClientResult<RestResponse>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or(Err(ClientError::Cancelled)))
    }
}

struct QueuedRequest {
    route: Route,
    body: Option<Vec<u8>>,
    version: Version,
    attempts: u32,
    rate_limit_hits: u32,
    reply: oneshot::Sender<ClientResult<RestResponse>>,
}

struct Inner {
    http: Arc<dyn HttpClient>,
    config: RestConfig,
    authorization: HeaderValue,
    table: BucketTable<QueuedRequest>,
    global: GlobalLimiter,
    clock: Arc<VersionClock>,
    events: broadcast::Sender<RateLimitEvent>,
    shutdown: watch::Sender<Option<ShutdownMode>>,
    outstanding: AtomicUsize,
    idle: Notify,
}

/// Rate-limit aware REST pipeline
#[derive(Clone)]
pub struct RequestDispatcher {
    inner: Arc<Inner>,
}

impl RequestDispatcher {
    /// Create a dispatcher
    ///
    /// # Errors
    /// Returns `Config` if the token cannot be sent as a header
    pub fn new(
        config: RestConfig,
        token: &str,
        http: Arc<dyn HttpClient>,
        clock: Arc<VersionClock>,
    ) -> ClientResult<Self> {
        let mut authorization = HeaderValue::from_str(&format!("Bot {token}")).map_err(|_| {
            chord_common::ConfigError::InvalidValue("CHORD_TOKEN", "not a valid header value".to_string())
        })?;
        authorization.set_sensitive(true);

        let global = GlobalLimiter::new(config.global_concurrency);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (shutdown, _) = watch::channel(None);

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                config,
                authorization,
                table: BucketTable::new(),
                global,
                clock,
                events,
                shutdown,
                outstanding: AtomicUsize::new(0),
                idle: Notify::new(),
            }),
        })
    }

    /// Queue a request on its bucket
    pub fn submit(&self, route: Route, body: Option<Value>) -> ResponseFuture {
        let inner = &self.inner;
        let version = inner.clock.tick();
        let (reply, rx) = oneshot::channel();

        if inner.shutdown.borrow().is_some() {
            let _ = reply.send(Err(ClientError::Cancelled));
            return ResponseFuture { version, rx };
        }

        let key = inner.table.resolve_key(&route);
        tracing::trace!(bucket = %key, route = %route, version = %version, "Request queued");

        inner.outstanding.fetch_add(1, Ordering::AcqRel);
        let request = QueuedRequest {
            route,
            body: body.map(|value| value.to_string().into_bytes()),
            version,
            attempts: 0,
            rate_limit_hits: 0,
            reply,
        };
        let (bucket, claimed) = inner.table.enqueue(&key, request);
        if claimed {
            spawn_executor(Arc::clone(inner), bucket);
        }

        ResponseFuture { version, rx }
    }

    /// Submit and decode the JSON body
    pub async fn request<T: DeserializeOwned>(
        &self,
        route: Route,
        body: Option<Value>,
    ) -> ClientResult<Versioned<T>> {
        let response = self.submit(route, body).await?;
        Ok(Versioned {
            value: response.json()?,
            version: response.version,
        })
    }

    /// `GET /gateway/bot`: URL, recommended shards and session start limits
    pub async fn get_gateway_bot(&self) -> ClientResult<GatewayBot> {
        let response = self.request(Route::get_gateway_bot(), None).await?;
        Ok(response.value)
    }

    /// Receive rate-limit notifications
    pub fn subscribe(&self) -> broadcast::Receiver<RateLimitEvent> {
        self.inner.events.subscribe()
    }

    /// State of the bucket a route currently maps to
    pub fn bucket_snapshot(&self, route: &Route) -> BucketSnapshot {
        let key = self.inner.table.resolve_key(route);
        self.inner.table.bucket(&key).snapshot()
    }

    /// Drop buckets unused for the configured idle timeout
    pub fn prune_idle(&self) -> usize {
        let removed = self
            .inner
            .table
            .prune(Instant::now(), self.inner.config.bucket_idle_timeout);
        if removed > 0 {
            tracing::debug!(removed, "Pruned idle buckets");
        }
        removed
    }

    /// Requests submitted and not yet answered
    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::Acquire)
    }

    /// Stop accepting requests and wait for the queues to settle
    pub async fn shutdown(&self, mode: ShutdownMode) {
        let inner = &self.inner;
        inner.shutdown.send_replace(Some(mode));
        tracing::info!(mode = ?mode, outstanding = self.outstanding(), "REST dispatcher shutting down");

        if mode == ShutdownMode::Cancel {
            for bucket in inner.table.buckets() {
                for request in bucket.drain() {
                    inner.complete(request, Err(ClientError::Cancelled));
                }
            }
        }

        loop {
            let idle = inner.idle.notified();
            if inner.outstanding.load(Ordering::Acquire) == 0 {
                break;
            }
            idle.await;
        }
    }
}

impl std::fmt::Debug for RequestDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestDispatcher")
            .field("buckets", &self.inner.table.len())
            .field("outstanding", &self.outstanding())
            .finish()
    }
}

impl Inner {
    fn complete(&self, request: QueuedRequest, result: ClientResult<RestResponse>) {
        let _ = request.reply.send(result);
        if self.outstanding.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }

    fn cancelling(&self) -> bool {
        *self.shutdown.borrow() == Some(ShutdownMode::Cancel)
    }

    fn build_request(&self, request: &QueuedRequest) -> HttpRequest {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, self.authorization.clone());
        if request.body.is_some() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        HttpRequest {
            method: request.route.method().clone(),
            url: format!("{}{}", self.config.base_url, request.route.path()),
            headers,
            body: request.body.clone(),
        }
    }

    async fn send(&self, request: &QueuedRequest) -> ClientResult<HttpResponse> {
        let http_request = self.build_request(request);
        match tokio::time::timeout(self.config.request_timeout, self.http.execute(http_request)).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::Transient(format!(
                "request timed out after {:?}",
                self.config.request_timeout
            ))),
        }
    }

    fn publish(&self, event: RateLimitEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }
}

fn spawn_executor(inner: Arc<Inner>, bucket: Arc<Bucket<QueuedRequest>>) {
    tokio::spawn(run_bucket(inner, bucket));
}

/// Wait until the bucket admits its head; `false` if cancelled meanwhile
async fn admit(
    inner: &Inner,
    bucket: &Bucket<QueuedRequest>,
    shutdown: &mut watch::Receiver<Option<ShutdownMode>>,
) -> bool {
    loop {
        if inner.cancelling() {
            return false;
        }
        match bucket.admit(Instant::now()) {
            Admission::Ready => return true,
            Admission::Wait(wait) => {
                tracing::debug!(bucket = %bucket.key(), wait_ms = wait.as_millis() as u64, "Bucket exhausted, waiting");
                tokio::select! {
                    () = tokio::time::sleep(wait) => {}
                    _ = shutdown.changed() => {}
                }
            }
        }
    }
}

async fn run_bucket(inner: Arc<Inner>, bucket: Arc<Bucket<QueuedRequest>>) {
    let mut shutdown = inner.shutdown.subscribe();

    while let Some(request) = bucket.next() {
        if request.reply.is_closed() {
            inner.complete(request, Err(ClientError::Cancelled));
            continue;
        }
        if !admit(&inner, &bucket, &mut shutdown).await {
            inner.complete(request, Err(ClientError::Cancelled));
            continue;
        }

        let permit = tokio::select! {
            permit = inner.global.acquire() => Some(permit),
            () = wait_for_cancel(&mut shutdown) => None,
        };
        let Some(permit) = permit else {
            inner.complete(request, Err(ClientError::Cancelled));
            continue;
        };

        let result = inner.send(&request).await;
        drop(permit);

        handle_result(&inner, &bucket, request, result).await;
    }

    tracing::trace!(bucket = %bucket.key(), "Bucket executor idle");
}

async fn wait_for_cancel(shutdown: &mut watch::Receiver<Option<ShutdownMode>>) {
    if shutdown
        .wait_for(|mode| *mode == Some(ShutdownMode::Cancel))
        .await
        .is_err()
    {
        std::future::pending::<()>().await;
    }
}

async fn handle_result(
    inner: &Arc<Inner>,
    bucket: &Arc<Bucket<QueuedRequest>>,
    mut request: QueuedRequest,
    result: ClientResult<HttpResponse>,
) {
    let response = match result {
        Ok(response) => response,
        Err(err) => {
            retry_or_fail(inner, bucket, request, err).await;
            return;
        }
    };

    let now = Instant::now();
    let headers = RateLimitHeaders::from_headers(&response.headers);
    bucket.update(&headers, now);

    // Re-key the bucket once the platform names it
    let home = match &headers.bucket {
        Some(hash) => {
            let reconciled = inner.table.reconcile(bucket, &request.route, hash);
            if !Arc::ptr_eq(&reconciled.bucket, bucket) {
                reconciled.bucket.update(&headers, now);
            }
            if reconciled.needs_executor {
                spawn_executor(Arc::clone(inner), Arc::clone(&reconciled.bucket));
            }
            reconciled.bucket
        }
        None => Arc::clone(bucket),
    };

    match response.status {
        429 => {
            let body: Option<RateLimitBody> = serde_json::from_slice(&response.body).ok();
            let retry_after = headers
                .retry_after
                .or_else(|| body.as_ref().map(RateLimitBody::retry_after))
                .unwrap_or(DEFAULT_RETRY_AFTER);
            let global = headers.global
                || headers.scope == Some(RateLimitScope::Global)
                || body.as_ref().is_some_and(|b| b.global);

            if global {
                inner.global.pause(retry_after);
            } else {
                home.exhaust(now + retry_after);
            }

            tracing::warn!(
                bucket = %home.key(),
                route = %request.route,
                global,
                retry_after_ms = retry_after.as_millis() as u64,
                "Rate limited"
            );
            inner.publish(RateLimitEvent {
                bucket: home.key().to_string(),
                route: request.route.bucket_route(),
                global,
                scope: headers.scope,
                retry_after,
            });

            request.rate_limit_hits += 1;
            if request.rate_limit_hits > inner.config.max_rate_limit_retries {
                inner.complete(
                    request,
                    Err(ClientError::RateLimited {
                        global,
                        retry_after,
                    }),
                );
            } else if home.push_front(request) {
                spawn_executor(Arc::clone(inner), home);
            }
        }
        502..=504 => {
            let err = ClientError::http(response.status, status_message(&response));
            retry_or_fail(inner, &home, request, err).await;
        }
        status if response.is_success() => {
            let version = request.version;
            inner.complete(
                request,
                Ok(RestResponse {
                    status,
                    body: response.body,
                    version,
                }),
            );
        }
        status => {
            let message = status_message(&response);
            tracing::debug!(route = %request.route, status, message = %message, "Request rejected");
            inner.complete(request, Err(ClientError::http(status, message)));
        }
    }
}

/// Back off and replay at the head of the bucket, or give up
async fn retry_or_fail(
    inner: &Arc<Inner>,
    bucket: &Arc<Bucket<QueuedRequest>>,
    mut request: QueuedRequest,
    err: ClientError,
) {
    request.attempts += 1;
    if request.attempts > inner.config.max_retries {
        tracing::warn!(route = %request.route, attempts = request.attempts, error = %err, "Request failed");
        inner.complete(request, Err(err));
        return;
    }

    let delay = Backoff::new(RETRY_BASE, RETRY_MAX).delay_for(request.attempts - 1);
    tracing::debug!(
        route = %request.route,
        attempt = request.attempts,
        delay_ms = delay.as_millis() as u64,
        error = %err,
        "Retrying request"
    );
    tokio::time::sleep(delay).await;

    if inner.cancelling() {
        inner.complete(request, Err(ClientError::Cancelled));
    } else if bucket.push_front(request) {
        spawn_executor(Arc::clone(inner), Arc::clone(bucket));
    }
}

fn status_message(response: &HttpResponse) -> String {
    serde_json::from_slice::<Value>(&response.body)
        .ok()
        .and_then(|body| body.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| format!("status {}", response.status))
}
