use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use tably_agent::llm::AgentError;
use tably_agent::{AgentRuntime, ReservationSession};

use crate::frames::{InboundFrame, OutboundFrame};
use crate::registry::SessionRegistry;

pub const NO_MESSAGE_ERROR: &str = "No message provided.";
pub const MISSING_PARAMS_ERROR: &str = "Missing reservation parameters.";

/// Failures that should tear the stream down. Everything recoverable is
/// answered in-band with an error frame instead.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("agent exchange failed for call `{call_id}`: {source}")]
    Agent {
        call_id: String,
        #[source]
        source: AgentError,
    },
}

/// Turns inbound gateway frames into outbound frames, one call at a time.
/// The transport loop in the server crate feeds frames sequentially per
/// connection, which gives strict per-call ordering for free.
#[derive(Clone)]
pub struct RelayHandler {
    registry: SessionRegistry,
    runtime: Arc<AgentRuntime>,
}

impl RelayHandler {
    pub fn new(registry: SessionRegistry, runtime: Arc<AgentRuntime>) -> Self {
        Self { registry, runtime }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Handles one frame. `Ok(None)` means the frame needed no answer;
    /// `Ok(Some(_))` is a frame to send back; `Err(_)` means the exchange
    /// failed and the connection should close after a best-effort error
    /// frame.
    #[instrument(skip_all, fields(call_id = %call_id, response_id = frame.response_id))]
    pub async fn handle_frame(
        &self,
        call_id: &str,
        frame: InboundFrame,
    ) -> Result<Option<OutboundFrame>, RelayError> {
        if !frame.interaction_type.requires_response() {
            debug!(interaction_type = ?frame.interaction_type, "ignoring non-answerable frame");
            return Ok(None);
        }

        let session = match self.registry.lookup(call_id).await {
            Some(session) => session,
            None => match frame.metadata.clone() {
                Some(params) => {
                    let session =
                        ReservationSession::new(call_id, params, Arc::clone(&self.runtime));
                    self.registry.bind(call_id, session).await
                }
                None => {
                    warn!("answerable frame arrived before reservation metadata");
                    return Ok(Some(OutboundFrame::error(
                        MISSING_PARAMS_ERROR,
                        frame.response_id,
                    )));
                }
            },
        };

        let Some(message) = frame.last_user_message().map(str::to_owned) else {
            return Ok(Some(OutboundFrame::error(NO_MESSAGE_ERROR, frame.response_id)));
        };

        let mut session = session.lock().await;
        match session.process_message(&message).await {
            Ok(reply) => Ok(Some(OutboundFrame::reply(reply, frame.response_id))),
            Err(source) => Err(RelayError::Agent { call_id: call_id.to_owned(), source }),
        }
    }

    /// Drops the session for a finished call. Safe to call for unknown ids.
    pub async fn close_call(&self, call_id: &str) {
        if self.registry.remove(call_id).await {
            info!(call_id, "closed call session");
        }
    }
}
