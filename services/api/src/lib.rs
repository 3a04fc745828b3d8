//! Concierge API Library Crate
//!
//! This library contains the HTTP surface of the voice assistant: configuration,
//! application state, the multipart request handler, and routing. The `api`
//! binary is a thin wrapper around this library.

pub mod after;
pub mod caller;
pub mod config;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
