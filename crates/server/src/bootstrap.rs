use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

use tably_agent::llm::{AgentError, LlmClient, OpenRouterClient};
use tably_agent::{AgentRuntime, SharedCalendar, ToolExecutor};
use tably_core::config::AppConfig;
use tably_core::ReservationCalendar;
use tably_relay::{RelayHandler, SessionRegistry};

use crate::outbound::CallInitiator;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("llm client setup failed: {0}")]
    Llm(#[from] AgentError),
}

/// Everything the HTTP and websocket surfaces share. Cheap to clone; all
/// heavy state sits behind `Arc`s.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub calendar: SharedCalendar,
    pub runtime: Arc<AgentRuntime>,
    pub relay: RelayHandler,
    pub initiator: Arc<CallInitiator>,
}

/// Wires the runtime together from config with the real LLM client.
pub fn build(config: AppConfig) -> Result<AppState, BootstrapError> {
    let client = Arc::new(OpenRouterClient::new(&config.llm)?);
    Ok(build_with_client(config, client))
}

/// Same wiring with an injected client; tests script it.
pub fn build_with_client(config: AppConfig, client: Arc<dyn LlmClient>) -> AppState {
    let calendar: SharedCalendar = Arc::new(RwLock::new(ReservationCalendar::new(
        config.restaurant.opening_hour,
        config.restaurant.closing_hour,
    )));
    let runtime = Arc::new(AgentRuntime::new(
        client,
        ToolExecutor::new(Arc::clone(&calendar)),
        config.restaurant.clone(),
    ));
    let relay = RelayHandler::new(SessionRegistry::new(), Arc::clone(&runtime));
    let initiator = Arc::new(CallInitiator::new(&config.gateway));

    info!(
        model = %config.llm.model,
        restaurant = %config.restaurant.name,
        "runtime assembled"
    );

    AppState { config: Arc::new(config), calendar, runtime, relay, initiator }
}
