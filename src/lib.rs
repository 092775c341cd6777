pub mod animation;
pub mod api;
pub mod client;
pub mod config;
pub mod dice;
pub mod error;
pub mod notice;
pub mod poller;
pub mod reconcile;
pub mod session;
pub mod ui;
