//! Conversational reservation agent.
//!
//! This crate is the "brain" of the tably system:
//! - Talks to an OpenAI-compatible chat-completions endpoint (`llm`)
//! - Executes the fixed reservation toolset against the calendar (`tools`)
//! - Runs the bounded tool loop and owns per-call session state (`session`)
//!
//! # Key Types
//!
//! - `LlmClient` - Pluggable trait over the chat endpoint; tests script it
//! - `AgentRuntime` - Stateless orchestrator shared by all sessions
//! - `ReservationSession` - Per-call transcript and bound parameters
//!
//! # Principle
//!
//! The model decides what to say, never what is booked. Bookings go through
//! `ToolExecutor` into the calendar, and tool failures are reported back to
//! the model as data rather than aborting the exchange.

pub mod llm;
pub mod session;
pub mod tools;

pub use llm::{AgentError, ChatMessage, ChatReply, ChatRequest, LlmClient, OpenRouterClient};
pub use session::{AgentRuntime, ReservationSession};
pub use tools::{SharedCalendar, ToolExecutor};
