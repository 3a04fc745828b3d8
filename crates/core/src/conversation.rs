use serde::{Deserialize, Serialize};
use std::fmt;

/// Who authored a turn in the caller-supplied history.
///
/// Only `user` and `assistant` are accepted from callers; the system persona is
/// always supplied by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatRole::User => write!(f, "user"),
            ChatRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single prior turn of the conversation, as sent by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Everything the chat model sees for one completion.
///
/// `turns` keeps the caller's order and always ends with the new user utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub turns: Vec<ChatTurn>,
}

impl Prompt {
    /// Builds a prompt from the persona, the prior history and the new transcript.
    pub fn new(system: String, history: Vec<ChatTurn>, transcript: &str) -> Self {
        let mut turns = history;
        turns.push(ChatTurn::user(transcript));
        Self { system, turns }
    }
}
