//! Text-to-speech synthesis.
//!
//! The synthesized audio is never buffered: the upstream response body is handed
//! back as a byte stream so it can be piped straight into the HTTP response.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::{pin::Pin, time::Duration};

/// A stream of raw audio bytes.
pub type AudioStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Sample rate of the synthesized PCM audio.
pub const OUTPUT_SAMPLE_RATE: u32 = 24_000;

#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("speech service request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("speech service responded with {status}")]
    Rejected { status: reqwest::StatusCode },
}

/// A service that turns response text into speech audio.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<AudioStream, SynthesisError>;
}

/// HTTP client for streamed synthesis.
///
/// Only connecting and gaps between body chunks are bounded; a total request
/// timeout would cut off long replies part way through the audio.
pub fn streaming_http_client(idle_timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(idle_timeout)
        .read_timeout(idle_timeout)
        .build()
}

/// Settings for the Cartesia `tts/bytes` endpoint.
#[derive(Debug)]
pub struct CartesiaSettings {
    pub api_key: SecretString,
    pub base_url: String,
    pub api_version: String,
    pub model_id: String,
    pub voice_id: String,
}

/// Cartesia text-to-speech, fixed to raw little-endian f32 PCM at 24 kHz.
pub struct CartesiaSynthesizer {
    client: reqwest::Client,
    settings: CartesiaSettings,
}

#[derive(Debug, Serialize)]
struct TtsRequest<'a> {
    model_id: &'a str,
    transcript: &'a str,
    voice: VoiceSpec<'a>,
    output_format: OutputFormat,
}

#[derive(Debug, Serialize)]
struct VoiceSpec<'a> {
    mode: &'static str,
    id: &'a str,
}

#[derive(Debug, Serialize)]
struct OutputFormat {
    container: &'static str,
    encoding: &'static str,
    sample_rate: u32,
}

impl CartesiaSynthesizer {
    pub fn new(client: reqwest::Client, settings: CartesiaSettings) -> Self {
        Self { client, settings }
    }

    fn request_body<'a>(&'a self, text: &'a str) -> TtsRequest<'a> {
        TtsRequest {
            model_id: &self.settings.model_id,
            transcript: text,
            voice: VoiceSpec {
                mode: "id",
                id: &self.settings.voice_id,
            },
            output_format: OutputFormat {
                container: "raw",
                encoding: "pcm_f32le",
                sample_rate: OUTPUT_SAMPLE_RATE,
            },
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for CartesiaSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<AudioStream, SynthesisError> {
        let url = format!("{}/tts/bytes", self.settings.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(url)
            .header("Cartesia-Version", &self.settings.api_version)
            .header("X-API-Key", self.settings.api_key.expose_secret())
            .json(&self.request_body(text))
            .send()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "speech request failed"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, %body, "speech service error");
            return Err(SynthesisError::Rejected { status });
        }

        Ok(Box::pin(
            response.bytes_stream().map_err(std::io::Error::other),
        ))
    }
}
