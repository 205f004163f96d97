pub mod auth;
pub mod config;
pub mod controller;
pub mod error;
pub mod http;
pub mod logging;
pub mod state;
