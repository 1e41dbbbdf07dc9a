//! Retry helpers

mod backoff;

pub use backoff::Backoff;
