use hearth_voice::VoiceError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("voice backend error: {0}")]
    Voice(#[from] VoiceError),

    #[error("unknown capability: {0}")]
    UnknownCapability(String),

    #[error("invalid capability arguments: {0}")]
    InvalidArguments(#[from] serde_json::Error),

    #[error("language backend returned an empty reply")]
    EmptyReply,

    #[error("session is already terminated")]
    Terminated,

    #[error("session has no active persona")]
    NoActivePersona,
}
