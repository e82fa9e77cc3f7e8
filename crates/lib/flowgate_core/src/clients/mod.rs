//! Collaborator clients.
//!
//! The identity provider, credit ledger, and upstream flow engine are
//! external services. Each is consumed through an injected trait with
//! a reqwest-backed implementation; nothing in the gateway holds an
//! ambient singleton client.

pub mod engine;
pub mod identity;
pub mod ledger;
