use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use tably_core::ReservationCalendar;

pub const CHECK_AVAILABILITY: &str = "check_availability";
pub const MAKE_RESERVATION: &str = "make_reservation";

pub type SharedCalendar = Arc<RwLock<ReservationCalendar>>;

#[derive(Debug, Deserialize)]
pub struct CheckAvailabilityInput {
    pub date: String,
    pub party_size: u32,
}

#[derive(Debug, Deserialize)]
pub struct MakeReservationInput {
    pub date: String,
    pub time: String,
    pub party_size: u32,
    pub name: String,
    #[serde(default)]
    pub phone_number: Option<String>,
}

/// A tool call decoded from the model's function-call payload.
#[derive(Debug)]
pub enum ToolInvocation {
    CheckAvailability(CheckAvailabilityInput),
    MakeReservation(MakeReservationInput),
}

impl ToolInvocation {
    pub fn parse(name: &str, arguments: &str) -> Result<Self, String> {
        match name {
            CHECK_AVAILABILITY => serde_json::from_str(arguments)
                .map(Self::CheckAvailability)
                .map_err(|err| format!("invalid {CHECK_AVAILABILITY} arguments: {err}")),
            MAKE_RESERVATION => serde_json::from_str(arguments)
                .map(Self::MakeReservation)
                .map_err(|err| format!("invalid {MAKE_RESERVATION} arguments: {err}")),
            other => Err(format!("unknown tool `{other}`")),
        }
    }
}

/// OpenAI function schemas for the fixed reservation toolset. The set never
/// changes at runtime.
pub fn tool_schemas() -> Vec<Value> {
    vec![
        json!({
            "type": "function",
            "function": {
                "name": CHECK_AVAILABILITY,
                "description": "Check which reservation times are available on a given date.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "date": {
                            "type": "string",
                            "description": "Requested date, e.g. 2024-03-20"
                        },
                        "party_size": {
                            "type": "integer",
                            "description": "Number of guests"
                        }
                    },
                    "required": ["date", "party_size"]
                }
            }
        }),
        json!({
            "type": "function",
            "function": {
                "name": MAKE_RESERVATION,
                "description": "Book a table once date, time, party size and name are confirmed.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "date": {
                            "type": "string",
                            "description": "Reservation date, e.g. 2024-03-20"
                        },
                        "time": {
                            "type": "string",
                            "description": "Reservation time, e.g. 19:00"
                        },
                        "party_size": {
                            "type": "integer",
                            "description": "Number of guests"
                        },
                        "name": {
                            "type": "string",
                            "description": "Name the reservation is under"
                        },
                        "phone_number": {
                            "type": "string",
                            "description": "Contact phone number, if the guest gave one"
                        }
                    },
                    "required": ["date", "time", "party_size", "name"]
                }
            }
        }),
    ]
}

/// Executes tool calls against the calendar. Execution never fails outward:
/// parse and domain failures are encoded as an `error` field in the result
/// payload so the model can recover in conversation.
#[derive(Clone)]
pub struct ToolExecutor {
    calendar: SharedCalendar,
}

impl ToolExecutor {
    pub fn new(calendar: SharedCalendar) -> Self {
        Self { calendar }
    }

    pub fn calendar(&self) -> &SharedCalendar {
        &self.calendar
    }

    pub async fn execute(&self, name: &str, arguments: &str) -> Value {
        let invocation = match ToolInvocation::parse(name, arguments) {
            Ok(invocation) => invocation,
            Err(message) => {
                warn!(tool = name, error = %message, "rejected malformed tool call");
                return json!({ "error": message });
            }
        };

        match invocation {
            ToolInvocation::CheckAvailability(input) => {
                let calendar = self.calendar.read().await;
                let times = calendar.available_times(&input.date, input.party_size);
                debug!(date = %input.date, party_size = input.party_size, "checked availability");
                json!({
                    "available": !times.is_empty(),
                    "suggested_times": times,
                })
            }
            ToolInvocation::MakeReservation(input) => {
                let mut calendar = self.calendar.write().await;
                let phone = input.phone_number.unwrap_or_default();
                let reservation = calendar.add(
                    &format!("{} {}", input.date, input.time),
                    input.party_size,
                    &input.name,
                    &phone,
                );
                debug!(reservation_id = %reservation.id, "booked reservation");
                json!({
                    "success": true,
                    "reservation_id": reservation.id.to_string(),
                    "confirmation_message": format!(
                        "Reservation confirmed for {} on {} at {}",
                        input.name, input.date, input.time
                    ),
                })
            }
        }
    }
}
