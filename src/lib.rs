//! INVESTA trading-portfolio backend.
//!
//! Account signup and login plus token-guarded access to holdings,
//! positions and order entry, served over warp.

pub mod accounts;
pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod store;
