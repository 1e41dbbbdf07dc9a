//! REST side of the client
//!
//! Requests are grouped into rate-limit buckets keyed by route and major
//! parameter. Each bucket runs its queue in order and respects the window the
//! platform reports; a global limiter caps total concurrency and absorbs
//! global 429s.

pub mod bucket;
pub mod dispatcher;
pub mod global;
pub mod headers;
pub mod http;
pub mod models;
pub mod route;

pub use bucket::BucketSnapshot;
pub use dispatcher::{
    RateLimitEvent, RequestDispatcher, ResponseFuture, RestResponse, ShutdownMode, Versioned,
};
pub use headers::{RateLimitHeaders, RateLimitScope};
pub use http::{HttpClient, HttpRequest, HttpResponse, ReqwestClient};
pub use models::{GatewayBot, SessionStartLimit};
pub use route::Route;
