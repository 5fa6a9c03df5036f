use serde::{Deserialize, Serialize};

use tably_core::{ReservationParams, TurnRole};

/// Gateway frame categories. Only `response_required` asks for an answer;
/// everything else is informational and produces no outbound frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionType {
    ResponseRequired,
    ReminderRequired,
    UpdateOnly,
    CallDetails,
    PingPong,
    #[serde(other)]
    Unsupported,
}

impl InteractionType {
    pub fn requires_response(self) -> bool {
        matches!(self, Self::ResponseRequired)
    }
}

/// One transcript entry as the gateway sends it.
#[derive(Clone, Debug, Deserialize)]
pub struct TranscriptTurn {
    pub role: TurnRole,
    pub content: String,
}

/// A frame received from the gateway. Unknown fields are ignored; the
/// transcript is the gateway's cumulative view of the call so far.
#[derive(Clone, Debug, Deserialize)]
pub struct InboundFrame {
    pub interaction_type: InteractionType,
    pub response_id: Option<u64>,
    #[serde(default)]
    pub transcript: Vec<TranscriptTurn>,
    #[serde(default, alias = "reservation_params")]
    pub metadata: Option<ReservationParams>,
}

impl InboundFrame {
    /// The most recent user utterance, scanning from the end of the
    /// transcript.
    pub fn last_user_message(&self) -> Option<&str> {
        self.transcript
            .iter()
            .rev()
            .find(|turn| turn.role == TurnRole::User)
            .map(|turn| turn.content.as_str())
    }
}

/// A frame sent back to the gateway. Every variant carries
/// `content_complete: true`; partial streaming is not used.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OutboundFrame {
    Reply {
        content: String,
        content_complete: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        response_id: Option<u64>,
    },
    Error {
        error: String,
        content_complete: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        response_id: Option<u64>,
    },
}

impl OutboundFrame {
    /// Sent once on connect so the gateway knows the stream is live.
    pub fn priming() -> Self {
        Self::Reply { content: String::new(), content_complete: true, response_id: None }
    }

    pub fn reply(content: impl Into<String>, response_id: Option<u64>) -> Self {
        Self::Reply { content: content.into(), content_complete: true, response_id }
    }

    pub fn error(message: impl Into<String>, response_id: Option<u64>) -> Self {
        Self::Error { error: message.into(), content_complete: true, response_id }
    }
}
