//! Axum Handlers for the REST API
//!
//! `POST /api` turns one multipart form into an assistant reply. Skill answers
//! come back as plain text; chat answers come back as a raw audio stream with
//! the transcript and response text in percent-encoded headers.

use axum::{
    body::Body,
    extract::{Multipart, State, multipart::MultipartRejection},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use concierge_core::{
    assistant::{
        AssistantRequest, PipelineError, Reply, SkillReply, SkillStatus, SpokenReply,
        UtteranceInput,
    },
    conversation::ChatTurn,
    transcription::AudioUpload,
};
use std::{sync::Arc, time::Instant};
use tracing::{Instrument, Span, debug, error, info, info_span};

use crate::{
    after::AfterResponse,
    caller::{caller_context, request_id},
    models::AssistantForm,
    state::AppState,
};

/// Percent-encoded transcript of the caller's utterance.
pub const TRANSCRIPT_HEADER: &str = "x-transcript";
/// Percent-encoded text of the assistant's answer.
pub const RESPONSE_HEADER: &str = "x-response";

/// File name used when an audio part arrives without one.
const DEFAULT_AUDIO_FILE_NAME: &str = "input.webm";

#[derive(Debug)]
pub enum ApiError {
    /// The form could not be read or did not match the expected shape.
    InvalidRequest,
    /// The input produced no usable transcript.
    NoTranscript,
    /// The speech service failed; details are logged where the failure happens.
    SynthesisFailed,
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::InvalidRequest => {
                (StatusCode::BAD_REQUEST, "Invalid request").into_response()
            }
            ApiError::NoTranscript => (StatusCode::BAD_REQUEST, "Invalid audio").into_response(),
            ApiError::SynthesisFailed => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Voice synthesis failed").into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal server error occurred.",
                )
                    .into_response()
            }
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::NoTranscript => ApiError::NoTranscript,
            PipelineError::Synthesis(e) => {
                error!(error = %e, "voice synthesis failed");
                ApiError::SynthesisFailed
            }
            PipelineError::Completion(e) => ApiError::InternalServerError(e),
        }
    }
}

/// Answer a spoken or typed utterance.
#[utoipa::path(
    post,
    path = "/api",
    request_body(content = AssistantForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Skill answer as text, or synthesized speech as raw pcm_f32le audio at 24 kHz",
            headers(
                ("X-Transcript" = String, description = "Percent-encoded transcript (audio replies only)"),
                ("X-Response" = String, description = "Percent-encoded response text (audio replies only)"),
            )
        ),
        (status = 400, description = "Malformed form (`Invalid request`) or no usable transcript (`Invalid audio`)"),
        (status = 500, description = "Speech synthesis, chat completion, or knowledge catalog failure")
    ),
    params(
        ("x-vercel-ip-city" = Option<String>, Header, description = "Caller city, percent-encoded"),
        ("x-vercel-ip-country-region" = Option<String>, Header, description = "Caller region code"),
        ("x-vercel-ip-country" = Option<String>, Header, description = "Caller country code"),
        ("x-vercel-ip-timezone" = Option<String>, Header, description = "Caller IANA timezone")
    )
)]
pub async fn respond(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let span = info_span!("assistant_request", request_id = %request_id(&headers));

    async move {
        let multipart = multipart.map_err(|e| {
            debug!(error = %e, "request is not a readable multipart form");
            ApiError::InvalidRequest
        })?;
        let (input, history) = read_form(multipart).await?;

        let request = AssistantRequest {
            input,
            history,
            caller: caller_context(&headers),
        };

        match state.assistant.respond(request).await? {
            Reply::Skill(reply) => Ok(skill_response(reply)),
            Reply::Spoken(reply) => spoken_response(reply),
        }
    }
    .instrument(span)
    .await
}

/// Reads the `input` and `message` fields. Unknown fields are ignored.
async fn read_form(mut multipart: Multipart) -> Result<(UtteranceInput, Vec<ChatTurn>), ApiError> {
    let mut input = None;
    let mut history = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(invalid)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("input") => {
                if input.is_some() {
                    debug!("duplicate `input` field");
                    return Err(ApiError::InvalidRequest);
                }
                // File parts carry a file name; plain text parts do not.
                input = Some(match field.file_name().map(str::to_owned) {
                    Some(file_name) => {
                        let file_name = if file_name.is_empty() {
                            DEFAULT_AUDIO_FILE_NAME.to_string()
                        } else {
                            file_name
                        };
                        let data = field.bytes().await.map_err(invalid)?;
                        UtteranceInput::Audio(AudioUpload { file_name, data })
                    }
                    None => UtteranceInput::Text(field.text().await.map_err(invalid)?),
                });
            }
            Some("message") => {
                let raw = field.text().await.map_err(invalid)?;
                let turn: ChatTurn = serde_json::from_str(&raw).map_err(invalid)?;
                history.push(turn);
            }
            _ => {}
        }
    }

    let input = input.ok_or_else(|| {
        debug!("missing `input` field");
        ApiError::InvalidRequest
    })?;
    Ok((input, history))
}

fn invalid(err: impl std::fmt::Display) -> ApiError {
    debug!(error = %err, "rejecting malformed form");
    ApiError::InvalidRequest
}

/// Plain-text skill answer, with the link in `Location` when there is one.
fn skill_response(reply: SkillReply) -> Response {
    let status = match reply.status {
        SkillStatus::Ok => StatusCode::OK,
        SkillStatus::Unavailable => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let mut response = (status, reply.text).into_response();
    if let Some(url) = reply.location {
        match HeaderValue::from_str(&url) {
            Ok(value) => {
                response.headers_mut().insert(header::LOCATION, value);
            }
            Err(e) => debug!(error = %e, %url, "skipping unrepresentable Location header"),
        }
    }
    response
}

/// Percent-encodes text so it is always a valid header value.
pub fn encode_header_value(text: &str) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(&urlencoding::encode(text))
        .map_err(|e| ApiError::InternalServerError(e.into()))
}

/// Streams the synthesized audio straight through, with text metadata in headers.
fn spoken_response(reply: SpokenReply) -> Result<Response, ApiError> {
    let transcript = encode_header_value(&reply.transcript)?;
    let response_text = encode_header_value(&reply.response)?;

    let started = Instant::now();
    let span = Span::current();
    let body = AfterResponse::new(
        reply.audio,
        Box::new(move || {
            let _entered = span.enter();
            info!(elapsed_ms = started.elapsed().as_millis() as u64, "stream");
        }),
    );

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(TRANSCRIPT_HEADER, transcript)
        .header(RESPONSE_HEADER, response_text)
        .body(Body::from_stream(body))
        .map_err(|e| ApiError::InternalServerError(e.into()))
}
