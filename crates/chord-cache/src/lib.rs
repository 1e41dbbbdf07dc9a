//! # chord-cache
//!
//! In-memory entity cache fed by gateway dispatches and REST responses.
//!
//! ## Features
//!
//! - **Versioned stores**: one `DashMap` per kind; older writes never replace newer ones
//! - **Atomic merges**: partial updates merge under the entry lock and publish a new snapshot
//! - **Dispatch routing**: typed gateway events applied with cascading guild deletes
//! - **Relations by lookup**: models hold ids, helpers resolve them
//!
//! ## Example
//!
//! ```ignore
//! use chord_cache::EntityCache;
//! use chord_common::CacheConfig;
//! use chord_core::{Guild, Snowflake};
//!
//! let cache = EntityCache::new(CacheConfig::default());
//! let version = cache.clock().tick();
//! cache.apply_event(&event, version);
//!
//! let guild = cache.resolve::<Guild>(&Snowflake::new(41771983423143937));
//! ```

mod entity_cache;
mod store;

pub use entity_cache::{CacheStats, Cached, EntityCache};
pub use store::{CacheEntry, Store, WriteOutcome};
