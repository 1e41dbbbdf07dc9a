//! # chord-client
//!
//! The [`Client`] context object: one version clock, one entity cache, one
//! REST dispatcher and one shard coordinator, wired together.
//!
//! ## Example
//!
//! ```ignore
//! use chord_client::Client;
//! use chord_common::ClientConfig;
//!
//! let client = Client::builder(ClientConfig::from_env()?).build().await?;
//! let mut events = client.subscribe();
//! client.start();
//!
//! while let Ok(event) = events.recv().await {
//!     // ...
//! }
//! client.shutdown().await;
//! ```

mod client;
mod resources;

pub use client::{Client, ClientBuilder};
