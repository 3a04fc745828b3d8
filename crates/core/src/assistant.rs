//! Request Pipeline
//!
//! Drives a single utterance from raw input to a finished reply:
//!
//! 1. Normalize the input into a transcript (transcribing audio if needed).
//! 2. Classify the transcript against the scripted command table.
//! 3. Either run the matching skill, or ask the chat model and synthesize its answer.
//!
//! The pipeline holds no per-request state; every collaborator is injected at
//! construction so tests can swap in doubles.

use crate::{
    command::{Command, classify},
    conversation::{ChatTurn, Prompt},
    llm_client::ChatClient,
    persona::{CallerContext, Persona},
    skills::{
        catalog::{KnowledgeCatalog, find_product},
        web_search::{WebSearch, format_results},
        youtube,
    },
    speech::{AudioStream, SpeechSynthesizer, SynthesisError},
    transcription::{AudioUpload, Transcriber},
};
use chrono::Utc;
use std::{fmt, sync::Arc, time::Instant};
use tracing::{info, instrument, warn};

/// What the caller said, before normalization.
#[derive(Debug, Clone)]
pub enum UtteranceInput {
    Text(String),
    Audio(AudioUpload),
}

/// One inbound request, already parsed from the transport.
#[derive(Debug, Clone)]
pub struct AssistantRequest {
    pub input: UtteranceInput,
    /// Prior turns, oldest first.
    pub history: Vec<ChatTurn>,
    pub caller: CallerContext,
}

/// Whether a skill reply represents success or an unreachable backing service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkillStatus {
    Ok,
    Unavailable,
}

/// Plain-text reply from a scripted skill. Never carries audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillReply {
    pub status: SkillStatus,
    pub text: String,
    /// A URL the client may open; informational only, not a redirect.
    pub location: Option<String>,
}

impl SkillReply {
    fn ok(text: String) -> Self {
        Self {
            status: SkillStatus::Ok,
            text,
            location: None,
        }
    }

    fn link(text: String, url: String) -> Self {
        Self {
            status: SkillStatus::Ok,
            text,
            location: Some(url),
        }
    }

    fn unavailable(text: String) -> Self {
        Self {
            status: SkillStatus::Unavailable,
            text,
            location: None,
        }
    }
}

/// A chat answer together with its synthesized audio.
pub struct SpokenReply {
    pub transcript: String,
    pub response: String,
    pub audio: AudioStream,
}

impl fmt::Debug for SpokenReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpokenReply")
            .field("transcript", &self.transcript)
            .field("response", &self.response)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub enum Reply {
    Skill(SkillReply),
    Spoken(SpokenReply),
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("no usable transcript")]
    NoTranscript,
    #[error("chat completion failed: {0:#}")]
    Completion(anyhow::Error),
    #[error("speech synthesis failed: {0}")]
    Synthesis(#[from] SynthesisError),
}

/// The external services the pipeline depends on.
#[derive(Clone)]
pub struct Services {
    pub transcriber: Arc<dyn Transcriber>,
    pub chat: Arc<dyn ChatClient>,
    pub speech: Arc<dyn SpeechSynthesizer>,
    pub search: Arc<dyn WebSearch>,
    pub catalog: Arc<dyn KnowledgeCatalog>,
}

pub struct Assistant {
    services: Services,
    persona: Persona,
}

impl Assistant {
    pub fn new(services: Services, persona: Persona) -> Self {
        Self { services, persona }
    }

    /// Runs the full pipeline for one request.
    #[instrument(name = "pipeline", skip_all)]
    pub async fn respond(&self, request: AssistantRequest) -> Result<Reply, PipelineError> {
        let transcript = self.transcript(request.input).await?;

        let command = classify(&transcript);
        info!(?command, "transcript classified");

        let reply = match command {
            Command::Chat => {
                let spoken = self
                    .converse(transcript, request.history, &request.caller)
                    .await?;
                return Ok(Reply::Spoken(spoken));
            }
            Command::YoutubeSearch { query } => {
                let url = youtube::search_url(&query);
                SkillReply::link(format!("Opening YouTube search: {}", url), url)
            }
            Command::YoutubeVideo => {
                let url = youtube::video_url(youtube::FIXED_VIDEO_ID);
                SkillReply::link(format!("Opening YouTube video: {}", url), url)
            }
            Command::WebSearch { query } => self.web_search(query).await,
            Command::ProductInfo { name } => self.product_info(name).await,
        };
        Ok(Reply::Skill(reply))
    }

    /// Produces a non-empty transcript from text or audio input.
    ///
    /// Text is returned untouched. Audio is transcribed and trimmed; any failure,
    /// including an all-whitespace result, becomes [`PipelineError::NoTranscript`].
    pub async fn transcript(&self, input: UtteranceInput) -> Result<String, PipelineError> {
        match input {
            UtteranceInput::Text(text) if text.is_empty() => Err(PipelineError::NoTranscript),
            UtteranceInput::Text(text) => Ok(text),
            UtteranceInput::Audio(audio) => {
                let started = Instant::now();
                let result = self.services.transcriber.transcribe(audio).await;
                info!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "transcribe"
                );

                match result {
                    Ok(text) => {
                        let text = text.trim();
                        if text.is_empty() {
                            warn!("transcription was empty");
                            Err(PipelineError::NoTranscript)
                        } else {
                            Ok(text.to_string())
                        }
                    }
                    Err(e) => {
                        warn!(error = ?e, "transcription failed");
                        Err(PipelineError::NoTranscript)
                    }
                }
            }
        }
    }

    async fn web_search(&self, query: String) -> SkillReply {
        let apology = || {
            SkillReply::ok(format!(
                "Sorry, I couldn't retrieve stock information for \"{}\".",
                query
            ))
        };

        match self.services.search.search(&query).await {
            Ok(items) if items.is_empty() => {
                info!(%query, "web search returned no results");
                apology()
            }
            Ok(items) => SkillReply::ok(format_results(&items)),
            Err(e) => {
                warn!(%query, error = %e, "web search failed");
                apology()
            }
        }
    }

    async fn product_info(&self, name: String) -> SkillReply {
        let products = match self.services.catalog.products().await {
            Ok(products) => products,
            Err(e) => {
                warn!(error = %e, "knowledge catalog unavailable");
                return SkillReply::unavailable(
                    "Unable to retrieve knowledge products at this time.".to_string(),
                );
            }
        };

        match find_product(&products, &name) {
            Some(product) => SkillReply::ok(product.summary()),
            None => SkillReply::ok(format!(
                "Sorry, I couldn't find information on \"{}\".",
                name
            )),
        }
    }

    /// Asks the chat model for an answer and synthesizes it.
    async fn converse(
        &self,
        transcript: String,
        history: Vec<ChatTurn>,
        caller: &CallerContext,
    ) -> Result<SpokenReply, PipelineError> {
        let system = self.persona.render(caller, Utc::now());
        let prompt = Prompt::new(system, history, &transcript);

        let started = Instant::now();
        let response = self
            .services
            .chat
            .complete(prompt)
            .await
            .map_err(PipelineError::Completion)?;
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "text completion"
        );

        let started = Instant::now();
        let audio = self.services.speech.synthesize(&response).await?;
        info!(elapsed_ms = started.elapsed().as_millis() as u64, "synthesis");

        Ok(SpokenReply {
            transcript,
            response,
            audio,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        llm_client::MockChatClient,
        skills::{
            catalog::{CatalogError, MockKnowledgeCatalog, Product},
            web_search::{MockWebSearch, SearchError, SearchItem},
        },
        speech::MockSpeechSynthesizer,
        transcription::MockTranscriber,
    };
    use bytes::Bytes;
    use futures::{StreamExt, stream};

    /// Mocks with no expectations: any call panics.
    struct Mocks {
        transcriber: MockTranscriber,
        chat: MockChatClient,
        speech: MockSpeechSynthesizer,
        search: MockWebSearch,
        catalog: MockKnowledgeCatalog,
    }

    impl Mocks {
        fn new() -> Self {
            Self {
                transcriber: MockTranscriber::new(),
                chat: MockChatClient::new(),
                speech: MockSpeechSynthesizer::new(),
                search: MockWebSearch::new(),
                catalog: MockKnowledgeCatalog::new(),
            }
        }

        fn into_assistant(self) -> Assistant {
            Assistant::new(
                Services {
                    transcriber: Arc::new(self.transcriber),
                    chat: Arc::new(self.chat),
                    speech: Arc::new(self.speech),
                    search: Arc::new(self.search),
                    catalog: Arc::new(self.catalog),
                },
                Persona::new("You are Alex. Location: {location}. Time: {time}."),
            )
        }
    }

    fn text_request(text: &str) -> AssistantRequest {
        AssistantRequest {
            input: UtteranceInput::Text(text.to_string()),
            history: vec![],
            caller: CallerContext::default(),
        }
    }

    fn audio_request() -> AssistantRequest {
        AssistantRequest {
            input: UtteranceInput::Audio(AudioUpload {
                file_name: "input.webm".to_string(),
                data: Bytes::from_static(b"\x1a\x45\xdf\xa3"),
            }),
            history: vec![],
            caller: CallerContext::default(),
        }
    }

    fn widget_catalog() -> Vec<Product> {
        vec![Product {
            name: "WidgetPro".to_string(),
            description: "A better widget.".to_string(),
            link: "https://aitek.test/widgetpro".to_string(),
        }]
    }

    fn skill(reply: Reply) -> SkillReply {
        match reply {
            Reply::Skill(skill) => skill,
            other => panic!("expected a skill reply, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_text_input_is_verbatim() {
        let assistant = Mocks::new().into_assistant();
        for text in ["  padded  ", "MiXeD case", "emoji 🎧 ok"] {
            let transcript = assistant
                .transcript(UtteranceInput::Text(text.to_string()))
                .await
                .unwrap();
            assert_eq!(transcript, text);
        }
    }

    #[tokio::test]
    async fn test_empty_text_is_no_transcript() {
        let assistant = Mocks::new().into_assistant();
        let err = assistant
            .transcript(UtteranceInput::Text(String::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NoTranscript));
    }

    #[tokio::test]
    async fn test_audio_transcript_is_trimmed() {
        let mut mocks = Mocks::new();
        mocks
            .transcriber
            .expect_transcribe()
            .times(1)
            .returning(|_| Ok("  search youtube for cats \n".to_string()));
        let assistant = mocks.into_assistant();

        let reply = skill(assistant.respond(audio_request()).await.unwrap());
        assert_eq!(
            reply.location.as_deref(),
            Some("https://www.youtube.com/results?search_query=cats")
        );
    }

    #[tokio::test]
    async fn test_whitespace_audio_is_no_transcript() {
        let mut mocks = Mocks::new();
        mocks
            .transcriber
            .expect_transcribe()
            .returning(|_| Ok(" \t\n ".to_string()));
        mocks.chat.expect_complete().never();
        let assistant = mocks.into_assistant();

        let err = assistant.respond(audio_request()).await.unwrap_err();
        assert!(matches!(err, PipelineError::NoTranscript));
    }

    #[tokio::test]
    async fn test_failed_transcription_is_no_transcript() {
        let mut mocks = Mocks::new();
        mocks
            .transcriber
            .expect_transcribe()
            .returning(|_| Err(anyhow::anyhow!("400: audio file is empty")));
        mocks.chat.expect_complete().never();
        let assistant = mocks.into_assistant();

        let err = assistant.respond(audio_request()).await.unwrap_err();
        assert!(matches!(err, PipelineError::NoTranscript));
    }

    #[tokio::test]
    async fn test_youtube_search_skips_chat() {
        let mut mocks = Mocks::new();
        mocks.chat.expect_complete().never();
        mocks.speech.expect_synthesize().never();
        let assistant = mocks.into_assistant();

        let reply = skill(
            assistant
                .respond(text_request("search youtube for lofi beats"))
                .await
                .unwrap(),
        );
        assert_eq!(reply.status, SkillStatus::Ok);
        assert_eq!(
            reply.text,
            "Opening YouTube search: https://www.youtube.com/results?search_query=lofi%20beats"
        );
        assert_eq!(
            reply.location.as_deref(),
            Some("https://www.youtube.com/results?search_query=lofi%20beats")
        );
    }

    #[tokio::test]
    async fn test_youtube_video() {
        let mut mocks = Mocks::new();
        mocks.chat.expect_complete().never();
        let assistant = mocks.into_assistant();

        let reply = skill(
            assistant
                .respond(text_request("OPEN YOUTUBE VIDEO"))
                .await
                .unwrap(),
        );
        assert_eq!(
            reply.text,
            "Opening YouTube video: https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
        assert_eq!(
            reply.location.as_deref(),
            Some("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
        );
    }

    #[tokio::test]
    async fn test_web_search_formats_results() {
        let mut mocks = Mocks::new();
        mocks
            .search
            .expect_search()
            .withf(|query| query == "ACME")
            .times(1)
            .returning(|_| {
                Ok(vec![
                    SearchItem {
                        title: "ACME Corp".to_string(),
                        snippet: "Up 3% today".to_string(),
                        link: "https://finance.test/acme".to_string(),
                    },
                    SearchItem {
                        title: "ACME news".to_string(),
                        snippet: "Quarterly results".to_string(),
                        link: "https://news.test/acme".to_string(),
                    },
                ])
            });
        mocks.chat.expect_complete().never();
        let assistant = mocks.into_assistant();

        let reply = skill(
            assistant
                .respond(text_request("search stock for ACME"))
                .await
                .unwrap(),
        );
        assert_eq!(reply.status, SkillStatus::Ok);
        assert_eq!(
            reply.text,
            "ACME Corp\nUp 3% today\nhttps://finance.test/acme\n\nACME news\nQuarterly results\nhttps://news.test/acme"
        );
        assert!(reply.location.is_none());
    }

    #[tokio::test]
    async fn test_web_search_failure_apologizes() {
        let mut mocks = Mocks::new();
        mocks
            .search
            .expect_search()
            .returning(|_| Err(SearchError::NotConfigured));
        mocks.chat.expect_complete().never();
        let assistant = mocks.into_assistant();

        let reply = skill(
            assistant
                .respond(text_request("search stock for ACME"))
                .await
                .unwrap(),
        );
        assert_eq!(reply.status, SkillStatus::Ok);
        assert_eq!(
            reply.text,
            "Sorry, I couldn't retrieve stock information for \"ACME\"."
        );
    }

    #[tokio::test]
    async fn test_web_search_without_results_apologizes() {
        let mut mocks = Mocks::new();
        mocks.search.expect_search().returning(|_| Ok(vec![]));
        let assistant = mocks.into_assistant();

        let reply = skill(
            assistant
                .respond(text_request("search stock for nothing at all"))
                .await
                .unwrap(),
        );
        assert_eq!(
            reply.text,
            "Sorry, I couldn't retrieve stock information for \"nothing at all\"."
        );
    }

    #[tokio::test]
    async fn test_product_found() {
        let mut mocks = Mocks::new();
        mocks
            .catalog
            .expect_products()
            .times(1)
            .returning(|| Ok(widget_catalog()));
        mocks.chat.expect_complete().never();
        let assistant = mocks.into_assistant();

        let reply = skill(
            assistant
                .respond(text_request("tell me about WidgetPro"))
                .await
                .unwrap(),
        );
        assert_eq!(reply.status, SkillStatus::Ok);
        assert_eq!(
            reply.text,
            "Product Name: WidgetPro\nDescription: A better widget.\nLink: https://aitek.test/widgetpro"
        );
    }

    #[tokio::test]
    async fn test_product_not_found_apologizes() {
        let mut mocks = Mocks::new();
        mocks
            .catalog
            .expect_products()
            .returning(|| Ok(widget_catalog()));
        mocks.chat.expect_complete().never();
        let assistant = mocks.into_assistant();

        let reply = skill(
            assistant
                .respond(text_request("tell me about Nonexistent"))
                .await
                .unwrap(),
        );
        assert_eq!(reply.status, SkillStatus::Ok);
        assert_eq!(
            reply.text,
            "Sorry, I couldn't find information on \"Nonexistent\"."
        );
    }

    #[tokio::test]
    async fn test_catalog_failure_is_unavailable_and_skips_chat() {
        let mut mocks = Mocks::new();
        mocks
            .catalog
            .expect_products()
            .returning(|| Err(CatalogError::Rejected(reqwest::StatusCode::BAD_GATEWAY)));
        mocks.chat.expect_complete().never();
        mocks.speech.expect_synthesize().never();
        let assistant = mocks.into_assistant();

        let reply = skill(
            assistant
                .respond(text_request("tell me about WidgetPro"))
                .await
                .unwrap(),
        );
        assert_eq!(reply.status, SkillStatus::Unavailable);
        assert_eq!(
            reply.text,
            "Unable to retrieve knowledge products at this time."
        );
    }

    #[tokio::test]
    async fn test_chat_fallback_speaks_answer() {
        let mut mocks = Mocks::new();
        mocks
            .chat
            .expect_complete()
            .withf(|prompt| {
                prompt
                    .system
                    .starts_with("You are Alex. Location: unknown. Time: ")
                    && prompt.turns
                        == vec![
                            ChatTurn::user("hello"),
                            ChatTurn::assistant("Hello, My Highness."),
                            ChatTurn::user("what's the weather"),
                        ]
            })
            .times(1)
            .returning(|_| Ok("It's sunny.".to_string()));
        mocks
            .speech
            .expect_synthesize()
            .withf(|text| text == "It's sunny.")
            .times(1)
            .returning(|_| {
                Ok(Box::pin(stream::iter(vec![
                    Ok(Bytes::from_static(&[0, 0, 128, 63])),
                    Ok(Bytes::from_static(&[0, 0, 0, 0])),
                ])))
            });
        let assistant = mocks.into_assistant();

        let request = AssistantRequest {
            history: vec![
                ChatTurn::user("hello"),
                ChatTurn::assistant("Hello, My Highness."),
            ],
            ..text_request("what's the weather")
        };

        let spoken = match assistant.respond(request).await.unwrap() {
            Reply::Spoken(spoken) => spoken,
            other => panic!("expected a spoken reply, got {:?}", other),
        };
        assert_eq!(spoken.transcript, "what's the weather");
        assert_eq!(spoken.response, "It's sunny.");

        let chunks: Vec<_> = spoken.audio.collect().await;
        let audio: Vec<u8> = chunks
            .into_iter()
            .flat_map(|c| c.unwrap().to_vec())
            .collect();
        assert_eq!(audio, vec![0, 0, 128, 63, 0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn test_persona_uses_caller_location() {
        let mut mocks = Mocks::new();
        mocks
            .chat
            .expect_complete()
            .withf(|prompt| prompt.system.contains("Location: Makati, 00, PH."))
            .times(1)
            .returning(|_| Ok("Mabuhay!".to_string()));
        mocks
            .speech
            .expect_synthesize()
            .returning(|_| Ok(Box::pin(stream::empty())));
        let assistant = mocks.into_assistant();

        let request = AssistantRequest {
            caller: CallerContext {
                city: Some("Makati".to_string()),
                region: Some("00".to_string()),
                country: Some("PH".to_string()),
                timezone: Some("Asia/Manila".to_string()),
            },
            ..text_request("good morning")
        };
        assert!(matches!(
            assistant.respond(request).await.unwrap(),
            Reply::Spoken(_)
        ));
    }

    #[tokio::test]
    async fn test_chat_failure_skips_synthesis() {
        let mut mocks = Mocks::new();
        mocks
            .chat
            .expect_complete()
            .returning(|_| Err(anyhow::anyhow!("model overloaded")));
        mocks.speech.expect_synthesize().never();
        let assistant = mocks.into_assistant();

        let err = assistant
            .respond(text_request("what's the weather"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Completion(_)));
    }

    #[tokio::test]
    async fn test_synthesis_rejection_is_error() {
        let mut mocks = Mocks::new();
        mocks
            .chat
            .expect_complete()
            .returning(|_| Ok("It's sunny.".to_string()));
        mocks.speech.expect_synthesize().returning(|_| {
            Err(SynthesisError::Rejected {
                status: reqwest::StatusCode::UNAUTHORIZED,
            })
        });
        let assistant = mocks.into_assistant();

        let err = assistant
            .respond(text_request("what's the weather"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Synthesis(SynthesisError::Rejected { .. })
        ));
    }
}
