//! Core functionality for the report grid component
//!
//! This crate provides the report settings document, its change tracking,
//! the settings synchronization engine and the event bus shared by the
//! views and data crates.

pub mod config;
pub mod error;
pub mod events;
pub mod record;
pub mod settings;
pub mod sync;

// Re-export commonly used types
pub use config::{FeatureFlags, FieldOverride, GridConfig, ModelDefaults};
pub use error::{GridError, GridResult};
pub use events::{Event, EventBus, SubscriptionId};
pub use record::{ModelKey, Record, RecordId};
pub use settings::{
    Change, ColumnSetting, Flashback, ItemRef, SettingItem, SettingsDocument, Tracked, ViewId,
    ViewSettings,
};
pub use sync::{
    SettingsSyncEngine, SettingsTransport, SyncApplied, SyncOptions, SyncOutcome, SyncRequest,
};
