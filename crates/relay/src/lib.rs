//! Voice gateway relay.
//!
//! Bridges the telephony gateway's websocket frame protocol to the agent:
//! decodes inbound call frames (`frames`), keeps one session per call id
//! (`registry`) and turns answerable frames into agent exchanges
//! (`handler`). Transport is deliberately out of scope; the server crate
//! owns sockets and feeds frames in one at a time.

pub mod frames;
pub mod handler;
pub mod registry;

pub use frames::{InboundFrame, InteractionType, OutboundFrame};
pub use handler::{RelayError, RelayHandler, MISSING_PARAMS_ERROR, NO_MESSAGE_ERROR};
pub use registry::SessionRegistry;
