//! Session bootstrap and the transcription-driven turn loop.

use crate::config::AgentConfig;
use hearth_session::{
    BackendOverrides, IntakeAgent, SessionError, StorySession, UsageCollector,
};
use hearth_types::SessionData;
use hearth_voice::{
    select_recognizer, ElevenLabsTts, LiveKitRoom, OpenAiLlm, RoomService, VoiceError,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Voice(#[from] VoiceError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Runs one agent session to completion: bootstrap, the turn loop, and
/// the usage summary at shutdown.
pub async fn run(config: AgentConfig) -> Result<(), WorkerError> {
    let missing = config.missing_optional();
    if !missing.is_empty() {
        warn!(
            "missing optional environment variables: {}",
            missing.join(", ")
        );
    }

    // Speech recognition: primary provider with a logged fallback, one
    // construction attempt each.
    let recognizer = select_recognizer(
        config.deepgram_api_key.as_deref(),
        &config.openai_api_key,
    )?;

    let llm = Arc::new(OpenAiLlm::new(
        &config.openai_api_key,
        &config.worker.llm_model,
    )?);
    let tts = Arc::new(ElevenLabsTts::new(config.eleven_api_key.as_deref())?);

    // The storyteller gets its own backend instances, distinct from the
    // session defaults.
    let story_backends = BackendOverrides {
        llm: Some(Arc::new(OpenAiLlm::new(
            &config.openai_api_key,
            &config.worker.llm_model,
        )?)),
        tts: Some(Arc::new(ElevenLabsTts::new(
            config.eleven_api_key.as_deref(),
        )?)),
    };

    let service = Arc::new(RoomService::new(config.livekit.clone()));
    let room_name = config.worker.room_name.clone();
    if let Err(e) = service.create_room(&room_name).await {
        // The platform may have created the room already; the join below
        // is the operation that matters.
        warn!(room = room_name.as_str(), "create_room failed: {e}");
    }
    let room = tokio::time::timeout(
        Duration::from_secs(config.worker.init_timeout_secs),
        LiveKitRoom::connect(service, &room_name, recognizer),
    )
    .await
    .map_err(|_| {
        VoiceError::RoomService(format!(
            "room join timed out after {} seconds",
            config.worker.init_timeout_secs
        ))
    })??;
    let room = Arc::new(room);
    let mut transcriptions = room.subscribe_transcriptions();

    let mut session = StorySession::new(llm, tts, room, SessionData::new());

    // Log each metrics payload as it is emitted and keep the running
    // totals for the shutdown summary.
    let collector = Arc::new(Mutex::new(UsageCollector::new()));
    let mut metrics_rx = session.subscribe_metrics();
    let metrics_collector = collector.clone();
    tokio::spawn(async move {
        while let Ok(event) = metrics_rx.recv().await {
            info!(metrics = ?event, "metrics collected");
            metrics_collector
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .collect(&event);
        }
    });

    session
        .start(Box::new(IntakeAgent::new(story_backends)))
        .await?;

    // Drive the session until the storyteller tears the room down or the
    // process is asked to stop.
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    while !session.is_terminated() {
        tokio::select! {
            event = transcriptions.recv() => match event {
                Ok(event) => {
                    info!(speaker = event.speaker.as_str(), "user turn");
                    session.handle_user_turn(&event.text).await?;
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "transcription stream lagged");
                }
                Err(RecvError::Closed) => break,
            },
            () = &mut shutdown => {
                info!("shutdown requested");
                break;
            }
        }
    }

    let summary = collector
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .summary();
    info!(%summary, "usage");

    Ok(())
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
