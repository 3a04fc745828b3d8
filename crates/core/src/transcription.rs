//! Speech-to-text for audio utterances.

use anyhow::{Context, Result};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{AudioInput, CreateTranscriptionRequestArgs},
};
use async_trait::async_trait;
use bytes::Bytes;

/// An uploaded audio clip, as received from the caller.
#[derive(Debug, Clone)]
pub struct AudioUpload {
    /// Original file name; transcription services use its extension to sniff the format.
    pub file_name: String,
    pub data: Bytes,
}

/// A service that converts speech audio into text.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Returns the raw transcription text. Callers decide what counts as empty.
    async fn transcribe(&self, audio: AudioUpload) -> Result<String>;
}

/// Whisper-style transcription through an OpenAI-compatible `/audio/transcriptions` endpoint.
pub struct OpenAICompatibleTranscriber {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAICompatibleTranscriber {
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl Transcriber for OpenAICompatibleTranscriber {
    async fn transcribe(&self, audio: AudioUpload) -> Result<String> {
        tracing::debug!(
            audio_bytes = audio.data.len(),
            file_name = %audio.file_name,
            "starting transcription"
        );

        let request = CreateTranscriptionRequestArgs::default()
            .file(AudioInput::from_vec_u8(audio.file_name, audio.data.to_vec()))
            .model(&self.model)
            .build()?;

        let response = self
            .client
            .audio()
            .transcribe(request)
            .await
            .context("Transcription request failed")?;

        Ok(response.text)
    }
}
