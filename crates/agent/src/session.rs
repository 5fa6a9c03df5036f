use std::sync::Arc;

use tracing::{debug, instrument, warn};

use tably_core::config::RestaurantConfig;
use tably_core::{ConversationTurn, ReservationParams, TurnRole};

use crate::llm::{AgentError, ChatMessage, ChatRequest, LlmClient};
use crate::tools::{tool_schemas, ToolExecutor};

/// Upper bound on tool rounds within one exchange. The model gets tool
/// results back and must eventually answer in prose.
const DEFAULT_MAX_TOOL_ROUNDS: usize = 4;

/// Stateless orchestrator shared by every session and the HTTP chat
/// endpoint. Holds the model client, the toolset and the restaurant
/// identity baked into the system prompt.
pub struct AgentRuntime {
    client: Arc<dyn LlmClient>,
    tools: ToolExecutor,
    restaurant: RestaurantConfig,
    max_tool_rounds: usize,
}

impl AgentRuntime {
    pub fn new(client: Arc<dyn LlmClient>, tools: ToolExecutor, restaurant: RestaurantConfig) -> Self {
        Self { client, tools, restaurant, max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS }
    }

    fn system_prompt(&self, params: Option<&ReservationParams>) -> String {
        let mut prompt = format!(
            "You are a friendly and professional restaurant reservation assistant for \
             {name}. You help guests book tables over the phone.\n\
             Restaurant phone number: {phone}. Largest party you can seat: \
             {max_party} guests.\n\
             Keep replies short and natural for a voice conversation. Confirm date, \
             time, party size and the guest's name before booking. Use the \
             check_availability tool to look up open times and the make_reservation \
             tool to book once everything is confirmed.",
            name = self.restaurant.name,
            phone = self.restaurant.phone,
            max_party = self.restaurant.max_party_size,
        );

        if let Some(params) = params {
            prompt.push_str(&format!(
                "\n\nThe caller already requested this reservation when the call was \
                 placed; treat it as the starting point of the conversation:\n\
                 - Date: {date}\n- Time: {time}\n- Party size: {party_size}\n- Name: {name}",
                date = params.date,
                time = params.time,
                party_size = params.party_size,
                name = params.customer_name,
            ));
        }

        prompt
    }

    /// Runs one exchange: transcript so far plus the new user input, with a
    /// bounded tool loop. Returns the assistant's prose reply.
    #[instrument(skip_all, fields(turn_count = transcript.len()))]
    pub async fn respond(
        &self,
        params: Option<&ReservationParams>,
        transcript: &[ConversationTurn],
        input: &str,
    ) -> Result<String, AgentError> {
        let mut messages = vec![ChatMessage::system(self.system_prompt(params))];
        for turn in transcript {
            messages.push(match turn.role {
                TurnRole::User => ChatMessage::user(turn.content.clone()),
                TurnRole::Assistant => ChatMessage::assistant(turn.content.clone()),
            });
        }
        messages.push(ChatMessage::user(input));

        for round in 0..=self.max_tool_rounds {
            let reply = self
                .client
                .chat(ChatRequest { messages: messages.clone(), tools: tool_schemas() })
                .await?;

            if reply.tool_calls.is_empty() {
                return reply
                    .content
                    .filter(|content| !content.trim().is_empty())
                    .ok_or(AgentError::EmptyReply);
            }

            if round == self.max_tool_rounds {
                warn!(round, "tool round limit reached without a prose reply");
                break;
            }

            debug!(round, call_count = reply.tool_calls.len(), "executing tool round");
            messages.push(ChatMessage::assistant_tool_calls(reply.tool_calls.clone()));
            for call in reply.tool_calls {
                let result =
                    self.tools.execute(&call.function.name, &call.function.arguments).await;
                messages.push(ChatMessage::tool_result(call.id, result.to_string()));
            }
        }

        Err(AgentError::Model("tool round limit exceeded".to_owned()))
    }
}

/// One voice call's conversation state. Created when the first answerable
/// frame arrives with reservation metadata; parameters never change after
/// that and the transcript only grows.
pub struct ReservationSession {
    call_id: String,
    params: ReservationParams,
    transcript: Vec<ConversationTurn>,
    runtime: Arc<AgentRuntime>,
}

impl ReservationSession {
    pub fn new(call_id: impl Into<String>, params: ReservationParams, runtime: Arc<AgentRuntime>) -> Self {
        Self { call_id: call_id.into(), params, transcript: Vec::new(), runtime }
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn params(&self) -> &ReservationParams {
        &self.params
    }

    pub fn transcript(&self) -> &[ConversationTurn] {
        &self.transcript
    }

    /// Produces the assistant reply for one user utterance. On success the
    /// transcript grows by exactly the user turn and the assistant turn, in
    /// that order; on failure it is left untouched.
    pub async fn process_message(&mut self, input: &str) -> Result<String, AgentError> {
        let reply =
            self.runtime.respond(Some(&self.params), &self.transcript, input).await?;

        self.transcript.push(ConversationTurn::user(input));
        self.transcript.push(ConversationTurn::assistant(reply.clone()));
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use tokio::sync::RwLock;

    use super::{AgentRuntime, ReservationSession};
    use crate::llm::{AgentError, ChatReply, ChatRequest, FunctionCall, LlmClient, ToolCallRequest};
    use crate::tools::{SharedCalendar, ToolExecutor, MAKE_RESERVATION};
    use tably_core::config::RestaurantConfig;
    use tably_core::{ReservationCalendar, ReservationParams, TurnRole};

    struct ScriptedClient {
        replies: Mutex<VecDeque<Result<ChatReply, AgentError>>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedClient {
        fn new(replies: Vec<Result<ChatReply, AgentError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn recorded_requests(&self) -> Vec<ChatRequest> {
            self.requests.lock().map(|requests| requests.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        async fn chat(&self, request: ChatRequest) -> Result<ChatReply, AgentError> {
            if let Ok(mut requests) = self.requests.lock() {
                requests.push(request);
            }
            self.replies
                .lock()
                .ok()
                .and_then(|mut replies| replies.pop_front())
                .unwrap_or_else(|| Err(AgentError::Model("script exhausted".to_owned())))
        }
    }

    fn restaurant() -> RestaurantConfig {
        RestaurantConfig {
            name: "Pizza Palace".to_owned(),
            phone: "+1234567890".to_owned(),
            max_party_size: 8,
            opening_hour: 11,
            closing_hour: 22,
        }
    }

    fn runtime_with(client: Arc<ScriptedClient>) -> (Arc<AgentRuntime>, SharedCalendar) {
        let calendar: SharedCalendar = Arc::new(RwLock::new(ReservationCalendar::new(11, 22)));
        let runtime = Arc::new(AgentRuntime::new(
            client,
            ToolExecutor::new(Arc::clone(&calendar)),
            restaurant(),
        ));
        (runtime, calendar)
    }

    fn params() -> ReservationParams {
        ReservationParams {
            date: "2024-03-20".to_owned(),
            time: "19:00".to_owned(),
            party_size: 4,
            customer_name: "John Doe".to_owned(),
        }
    }

    fn prose(content: &str) -> Result<ChatReply, AgentError> {
        Ok(ChatReply { content: Some(content.to_owned()), tool_calls: Vec::new() })
    }

    #[tokio::test]
    async fn successful_exchange_appends_exactly_two_turns() {
        let client = ScriptedClient::new(vec![prose("Good evening! A table for four at 7pm?")]);
        let (runtime, _calendar) = runtime_with(Arc::clone(&client));
        let mut session = ReservationSession::new("call-1", params(), runtime);

        let reply = session.process_message("Hello").await.expect("exchange should succeed");
        assert!(!reply.is_empty());

        let transcript = session.transcript();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].role, TurnRole::User);
        assert_eq!(transcript[0].content, "Hello");
        assert_eq!(transcript[1].role, TurnRole::Assistant);
        assert_eq!(transcript[1].content, reply);
    }

    #[tokio::test]
    async fn failed_exchange_leaves_transcript_untouched() {
        let client = ScriptedClient::new(vec![
            prose("Hi John! Table for four on March 20th at 7pm, correct?"),
            Err(AgentError::Model("upstream 500".to_owned())),
        ]);
        let (runtime, _calendar) = runtime_with(Arc::clone(&client));
        let mut session = ReservationSession::new("call-1", params(), runtime);

        session.process_message("Hello").await.expect("first exchange should succeed");
        let error = session.process_message("Yes please").await;
        assert!(error.is_err());
        assert_eq!(session.transcript().len(), 2);
    }

    #[tokio::test]
    async fn params_survive_exchanges_unchanged() {
        let client = ScriptedClient::new(vec![prose("Hello!"), prose("Anything else?")]);
        let (runtime, _calendar) = runtime_with(Arc::clone(&client));
        let mut session = ReservationSession::new("call-1", params(), runtime);

        session.process_message("Hi").await.expect("exchange should succeed");
        session.process_message("Thanks").await.expect("exchange should succeed");
        assert_eq!(session.params(), &params());
    }

    #[tokio::test]
    async fn system_prompt_embeds_reservation_params() {
        let client = ScriptedClient::new(vec![prose("Hello!")]);
        let (runtime, _calendar) = runtime_with(Arc::clone(&client));
        let mut session = ReservationSession::new("call-1", params(), runtime);

        session.process_message("Hi").await.expect("exchange should succeed");

        let requests = client.recorded_requests();
        let system = requests[0].messages[0].content.clone().unwrap_or_default();
        assert!(system.contains("Pizza Palace"));
        assert!(system.contains("2024-03-20"));
        assert!(system.contains("John Doe"));
    }

    #[tokio::test]
    async fn tool_round_feeds_results_back_and_books() {
        let booking_call = ToolCallRequest {
            id: "call_1".to_owned(),
            kind: "function".to_owned(),
            function: FunctionCall {
                name: MAKE_RESERVATION.to_owned(),
                arguments:
                    r#"{"date":"2024-03-20","time":"19:00","party_size":4,"name":"John Doe"}"#
                        .to_owned(),
            },
        };
        let client = ScriptedClient::new(vec![
            Ok(ChatReply { content: None, tool_calls: vec![booking_call] }),
            prose("You're all set for March 20th at 7pm!"),
        ]);
        let (runtime, calendar) = runtime_with(Arc::clone(&client));
        let mut session = ReservationSession::new("call-1", params(), runtime);

        let reply = session.process_message("Book it").await.expect("exchange should succeed");
        assert!(reply.contains("all set"));
        assert_eq!(calendar.read().await.len(), 1);

        let requests = client.recorded_requests();
        assert_eq!(requests.len(), 2);
        let tool_message = requests[1]
            .messages
            .iter()
            .find(|message| message.role == "tool")
            .expect("tool result should be fed back");
        assert!(tool_message.content.clone().unwrap_or_default().contains("RES-"));
    }

    #[tokio::test]
    async fn runaway_tool_loop_is_bounded() {
        let endless_call = || ToolCallRequest {
            id: "call_loop".to_owned(),
            kind: "function".to_owned(),
            function: FunctionCall {
                name: "check_availability".to_owned(),
                arguments: r#"{"date":"2024-03-20","party_size":4}"#.to_owned(),
            },
        };
        let replies = (0..8)
            .map(|_| Ok(ChatReply { content: None, tool_calls: vec![endless_call()] }))
            .collect();
        let client = ScriptedClient::new(replies);
        let (runtime, _calendar) = runtime_with(Arc::clone(&client));
        let mut session = ReservationSession::new("call-1", params(), runtime);

        let result = session.process_message("Hello").await;
        assert!(result.is_err());
        assert!(session.transcript().is_empty());
    }

    #[tokio::test]
    async fn generic_prompt_without_params_for_text_chat() {
        let client = ScriptedClient::new(vec![prose("We open at 11am.")]);
        let (runtime, _calendar) = runtime_with(Arc::clone(&client));

        let reply = runtime
            .respond(None, &[], "When do you open?")
            .await
            .expect("exchange should succeed");
        assert!(!reply.is_empty());

        let requests = client.recorded_requests();
        let system = requests[0].messages[0].content.clone().unwrap_or_default();
        assert!(system.contains("Pizza Palace"));
        assert!(!system.contains("starting point"));
    }
}
