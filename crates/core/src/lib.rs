//! Concierge core: the voice-assistant request pipeline and its service clients.
//!
//! Nothing here knows about HTTP framing; the API service parses requests into
//! [`assistant::AssistantRequest`] and renders [`assistant::Reply`] values.

pub mod assistant;
pub mod command;
pub mod conversation;
pub mod llm_client;
pub mod persona;
pub mod skills;
pub mod speech;
pub mod transcription;

#[cfg(test)]
mod test_support;
