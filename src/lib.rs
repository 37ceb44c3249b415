pub mod api;
pub mod config;
pub mod database;
pub mod engine;
pub mod error;
pub mod logging;
pub mod models;
pub mod platforms;
pub mod scheduler;
pub mod tasks;

// Re-export the main error types for convenience
pub use api::FetchError;
pub use error::{TrackerError, TrackerResult};

// Re-export configuration
pub use config::{ConfigManager, TrackerConfig};

// Re-export database modules
pub use database::{ChannelRegistry, StreamRegistry, TrackerDatabase, ViewerSeriesStore};

// Re-export the reconciliation engine
pub use engine::{
    reconcile_channel, reconcile_heartbeat, Capabilities, LiveObservation, ObservedState,
    PlatformAdapter, RawPayload,
};

// Re-export platform plumbing
pub use platforms::{LiveFetch, LiveStateRequest, PlatformClient, PlatformHandle};

pub use models::{Channel, Platform, Stream, StreamStatus, TrackedChannel};
pub use scheduler::{Scheduler, TaskLock};
pub use tasks::{TaskContext, TaskKind, TaskSummary};
