//! Main Entrypoint for the Concierge API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Loading the persona prompt.
//! 3. Initializing the upstream clients (LLM, speech, search, catalog).
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use concierge_api::{config::Config, router::create_router, state::AppState};
use concierge_core::{
    assistant::{Assistant, Services},
    llm_client::{OpenAICompatibleClient, single_attempt_client},
    persona::Persona,
    skills::{
        catalog::HttpKnowledgeCatalog,
        web_search::{GoogleCseCredentials, GoogleCustomSearch},
    },
    speech::{CartesiaSettings, CartesiaSynthesizer, streaming_http_client},
    transcription::OpenAICompatibleTranscriber,
};
use secrecy::ExposeSecret;
use std::{collections::HashMap, fs, net::SocketAddr, sync::Arc};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

/// A helper function to load prompts from a directory.
fn load_prompts(prompts_path: &std::path::Path) -> anyhow::Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();
    for entry in fs::read_dir(prompts_path)
        .with_context(|| format!("Failed to read prompts directory {}", prompts_path.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let prompt_key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem")?
                .to_string();
            let content = fs::read_to_string(&path)?;
            prompts.insert(prompt_key, content);
        }
    }
    Ok(prompts)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    let web_search_enabled = config.web_search_enabled();
    let Config {
        bind_address,
        llm_api_key,
        llm_base_url,
        chat_model,
        transcription_model,
        cartesia_api_key,
        cartesia_base_url,
        cartesia_version,
        cartesia_model,
        cartesia_voice_id,
        google_cse_api_key,
        google_cse_id,
        knowledge_catalog_url,
        prompts_path,
        upstream_timeout,
        max_upload_bytes,
        ..
    } = config;

    // --- 3. Load the Persona ---
    let prompts = load_prompts(&prompts_path)?;
    let persona = Persona::new(
        prompts
            .get("system_prompt")
            .context("system_prompt.md not found in prompts directory")?
            .clone(),
    );

    // --- 4. Initialize Upstream Clients ---
    let http = reqwest::Client::builder()
        .timeout(upstream_timeout)
        .build()
        .context("Failed to build HTTP client")?;

    let openai_config = OpenAIConfig::new()
        .with_api_key(llm_api_key.expose_secret())
        .with_api_base(&llm_base_url);
    let llm = single_attempt_client(openai_config, http.clone());

    // Audio is streamed through, so the speech client only bounds idle gaps.
    let speech_http =
        streaming_http_client(upstream_timeout).context("Failed to build speech HTTP client")?;

    let search_credentials = match (google_cse_api_key, google_cse_id) {
        (Some(api_key), Some(engine_id)) => Some(GoogleCseCredentials { api_key, engine_id }),
        _ => None,
    };
    if !web_search_enabled {
        warn!("GOOGLE_CSE_API_KEY or GOOGLE_CSE_ID not set; stock searches will apologize");
    }

    let services = Services {
        transcriber: Arc::new(OpenAICompatibleTranscriber::new(
            llm.clone(),
            transcription_model.clone(),
        )),
        chat: Arc::new(OpenAICompatibleClient::new(llm, chat_model.clone())),
        speech: Arc::new(CartesiaSynthesizer::new(
            speech_http,
            CartesiaSettings {
                api_key: cartesia_api_key,
                base_url: cartesia_base_url,
                api_version: cartesia_version,
                model_id: cartesia_model,
                voice_id: cartesia_voice_id,
            },
        )),
        search: Arc::new(GoogleCustomSearch::new(http.clone(), search_credentials)),
        catalog: Arc::new(HttpKnowledgeCatalog::new(http, knowledge_catalog_url)),
    };

    let app_state = Arc::new(AppState {
        assistant: Arc::new(Assistant::new(services, persona)),
        max_upload_bytes,
    });

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);

    let app = create_router(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // --- 6. Start Server ---
    info!(
        llm_base_url = %llm_base_url,
        chat_model = %chat_model,
        transcription_model = %transcription_model,
        web_search_enabled,
        bind_address = %bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
