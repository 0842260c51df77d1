//! Runtime infrastructure - Tokio runtime bridge for async commands

mod bridge;
mod worker;

pub use bridge::{RuntimeBridge, RuntimeCommand};
pub use worker::run_task;
