//! # chord-gateway
//!
//! Gateway connections: the per-shard session state machine, heartbeating,
//! identify concurrency and the coordinator that supervises every shard.
//!
//! ## Example
//!
//! ```ignore
//! use chord_gateway::{ShardConfig, ShardCoordinator, TungsteniteConnector};
//!
//! let coordinator = ShardCoordinator::new(config, 10, Arc::new(TungsteniteConnector), cache);
//! let mut events = coordinator.subscribe();
//! coordinator.start();
//! while let Ok(event) = events.recv().await {
//!     // ...
//! }
//! ```

pub mod coordinator;
pub mod heartbeat;
pub mod identify;
pub mod protocol;
pub mod session;
pub mod shard;
pub mod transport;

pub use coordinator::{shard_for_guild, ShardCoordinator};
pub use heartbeat::{first_beat_delay, max_first_beat_jitter, HeartbeatSignal, HeartbeatTimer};
pub use identify::IdentifyLimiter;
pub use protocol::{CloseAction, CloseCode, GatewayCommand, GatewayMessage, OpCode};
pub use session::{Disconnect, GatewaySession, Session, SessionContext, SessionState, ShardConfig};
pub use shard::{ShardEvent, ShardHandle, ShardStatus};
pub use transport::{Connector, Frame, Transport, TungsteniteConnector};
