pub mod chat;
pub mod config;
pub mod lessons;
