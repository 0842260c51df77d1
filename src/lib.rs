//! itemdeck: terminal dashboard for Azure DevOps work items
//!
//! - `app`: the dashboard coordinator
//! - `core`: messages, commands, the tab trait, the action controller
//! - `modules`: the tabs and the async workflows behind their actions
//! - `infrastructure`: REST client, runtime bridge, external editor
//! - `store`: local YAML templates
//! - `config`: settings file and keybinds

pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod infrastructure;
pub mod logging;
pub mod modules;
pub mod store;
pub mod ui;
