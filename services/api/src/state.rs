//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the assistant pipeline
//! and the transport limits applied to every request.

use concierge_core::assistant::Assistant;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
/// Nothing in here is mutated after startup.
#[derive(Clone)]
pub struct AppState {
    pub assistant: Arc<Assistant>,
    pub max_upload_bytes: usize,
}
