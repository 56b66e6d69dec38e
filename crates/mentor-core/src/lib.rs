//! Core mentor library (store, provider, controller, config).

pub mod config;
pub mod controller;
pub mod logging;
pub mod prompts;
pub mod provider;
pub mod store;
