//! Record models for the report grid
//!
//! The record storage engine itself lives outside this workspace; this crate
//! defines the interface the views talk to, an in-memory implementation, the
//! lifecycle manager that owns every model binding of a region, and the
//! master/detail settle stage.

pub mod cascade;
pub mod lifecycle;
pub mod memory;
pub mod model;

// Re-exports
pub use cascade::{DetailCascade, DetailTarget};
pub use lifecycle::ModelLifecycleManager;
pub use memory::{MemoryModel, MemoryModelStore};
pub use model::{FieldDef, Model, ModelHandle, ModelOptions, ModelStore, ParentLink};
