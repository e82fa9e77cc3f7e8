//! # flowgate_core
//!
//! Core domain logic for Flowgate: token lifecycle, credit admission
//! control, the streaming relay, and the collaborator clients they
//! depend on.

pub mod auth;
pub mod clients;
pub mod credits;
pub mod db;
pub mod history;
pub mod id;
pub mod migrate;
pub mod models;
pub mod relay;
pub mod users;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
