use std::fmt;

use serde::{Deserialize, Serialize};

/// Reservation details bound to one call session. Supplied by the voice
/// gateway's call metadata and immutable for the lifetime of the session.
///
/// The gateway's wire shape uses `people` and `name`; both spellings are
/// accepted on deserialization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationParams {
    pub date: String,
    pub time: String,
    #[serde(alias = "people")]
    pub party_size: u32,
    #[serde(alias = "name")]
    pub customer_name: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    /// The voice gateway labels our side `agent` in call transcripts.
    #[serde(alias = "agent")]
    Assistant,
}

/// One entry in a session's transcript. The sequence is append-only and
/// never reordered or truncated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: TurnRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: TurnRole::Assistant, content: content.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReservationId(pub String);

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Confirmed,
    Cancelled,
}

/// A booked reservation. Created by `ReservationCalendar::add`; the only
/// permitted mutation is the confirmed -> cancelled status transition.
/// Records are never physically deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub date: String,
    pub party_size: u32,
    pub customer_name: String,
    pub phone_number: String,
    pub status: ReservationStatus,
}

#[cfg(test)]
mod tests {
    use super::{ConversationTurn, ReservationParams, TurnRole};

    #[test]
    fn params_accept_gateway_field_spellings() {
        let params: ReservationParams = serde_json::from_str(
            r#"{"date": "2024-03-20", "time": "19:00", "people": 4, "name": "John Doe"}"#,
        )
        .expect("gateway shape should parse");

        assert_eq!(params.party_size, 4);
        assert_eq!(params.customer_name, "John Doe");
    }

    #[test]
    fn params_accept_canonical_field_names() {
        let params: ReservationParams = serde_json::from_str(
            r#"{"date": "2024-03-20", "time": "19:00", "party_size": 2, "customer_name": "Ana"}"#,
        )
        .expect("canonical shape should parse");

        assert_eq!(params.party_size, 2);
        assert_eq!(params.customer_name, "Ana");
    }

    #[test]
    fn gateway_agent_role_maps_to_assistant() {
        let turn: ConversationTurn =
            serde_json::from_str(r#"{"role": "agent", "content": "Hello!"}"#)
                .expect("agent role should parse");
        assert_eq!(turn.role, TurnRole::Assistant);

        let turn: ConversationTurn =
            serde_json::from_str(r#"{"role": "user", "content": "Hi"}"#)
                .expect("user role should parse");
        assert_eq!(turn.role, TurnRole::User);
    }
}
