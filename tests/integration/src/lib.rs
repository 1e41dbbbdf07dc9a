//! Integration test utilities for chord
//!
//! Scripted doubles for the gateway transport and the HTTP client, plus the
//! payloads the scenarios feed through them. Nothing here touches the network.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
