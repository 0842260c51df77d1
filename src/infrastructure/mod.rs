//! Infrastructure layer - external service integrations
//!
//! - HTTP client for the work item service
//! - Tokio runtime bridge for async commands
//! - External editor process

pub mod api;
pub mod editor;
pub mod runtime;

pub use editor::Editor;
pub use runtime::RuntimeBridge;
