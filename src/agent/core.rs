//! Agent core implementation with the plan/dispatch loop
//!
//! One user turn runs as a sequence of rounds. Each round asks the planner
//! for the next step given the whole conversation; if it answers with
//! operation requests they are validated and dispatched one at a time, in
//! order, and their results appended before the next round. The turn ends
//! when the planner answers without requests, the planner fails, the round
//! ceiling is reached, or the user cancels.

use crate::config::AgentConfig;
use crate::error::{Result, SnowAgentError};
use crate::gateway::Gateway;
use crate::operations::{OperationCatalog, OperationRequest, OperationResult};
use crate::providers::Provider;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::conversation::{Conversation, Snapshot, Turn};
use super::metrics::{record_operation, TurnMetrics};

/// Answer text used when the round ceiling is hit before any planner text
pub const INCOMPLETE_MARKER: &str =
    "[incomplete] The request could not be finished within the allowed number of planning rounds.";

/// Answer text for a cancelled turn
pub const CANCELLED_MARKER: &str =
    "[cancelled] The request was cancelled. Operations that already ran were not rolled back.";

/// How a turn ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The planner answered without further requests
    Completed,
    /// The round ceiling was reached
    RoundLimitExceeded {
        /// The ceiling in force
        limit: usize,
    },
    /// The planner failed or answered with nothing usable
    PlannerUnavailable {
        /// What went wrong
        message: String,
    },
    /// The user cancelled the turn
    Cancelled,
}

impl TurnOutcome {
    /// Stable label, used for metrics and logs
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::RoundLimitExceeded { .. } => "round_limit_exceeded",
            Self::PlannerUnavailable { .. } => "planner_unavailable",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns true for [`TurnOutcome::Completed`]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// The error equivalent of a non-completed outcome
    pub fn to_error(&self) -> Option<SnowAgentError> {
        match self {
            Self::Completed => None,
            Self::RoundLimitExceeded { limit } => {
                Some(SnowAgentError::RoundLimitExceeded { limit: *limit })
            }
            Self::PlannerUnavailable { message } => {
                Some(SnowAgentError::PlannerUnavailable(message.clone()))
            }
            Self::Cancelled => Some(SnowAgentError::CancelledByUser),
        }
    }
}

/// What a turn produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalAnswer {
    /// Text to show the user
    pub text: String,
    /// How the turn ended
    pub outcome: TurnOutcome,
    /// Planner invocations used
    pub rounds: usize,
    /// Operation requests processed (dispatched or rejected)
    pub operations: usize,
}

impl FinalAnswer {
    /// Returns true if the turn completed normally
    pub fn is_complete(&self) -> bool {
        self.outcome.is_completed()
    }
}

/// Progress notifications emitted while a turn runs
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// A planner round is starting
    RoundStarted {
        /// 1-based round number
        round: usize,
    },
    /// Planner text that accompanied operation requests
    PlannerNote {
        /// Round the note belongs to
        round: usize,
        /// The text
        text: String,
    },
    /// An operation request is about to be validated and dispatched
    OperationStarted {
        /// Round the request belongs to
        round: usize,
        /// The request
        request: OperationRequest,
    },
    /// An operation request produced its result
    OperationFinished {
        /// Round the result belongs to
        round: usize,
        /// The result
        result: OperationResult,
    },
    /// The turn is over
    TurnFinished {
        /// How it ended
        outcome: TurnOutcome,
        /// Planner invocations used
        rounds: usize,
    },
}

/// Callback receiving [`AgentEvent`]s
pub type EventObserver = Arc<dyn Fn(&AgentEvent) + Send + Sync>;

#[derive(Debug, Default)]
struct LoopState {
    round_count: usize,
    operations: usize,
    last_text: Option<String>,
}

/// The agent driving one conversation session
///
/// # Examples
///
/// ```ignore
/// use snow_agent::agent::Agent;
/// use snow_agent::config::AgentConfig;
///
/// # async fn example() -> snow_agent::error::Result<()> {
/// # let provider = unimplemented!();
/// # let gateway = unimplemented!();
/// let mut agent = Agent::new(provider, gateway, AgentConfig::default())?;
/// let answer = agent.process_turn("List the in-progress update sets").await?;
/// println!("{}", answer.text);
/// # Ok(())
/// # }
/// ```
pub struct Agent {
    provider: Arc<dyn Provider>,
    gateway: Arc<dyn Gateway>,
    catalog: OperationCatalog,
    conversation: Conversation,
    config: AgentConfig,
    observer: Option<EventObserver>,
}

impl Agent {
    /// Creates a new agent instance
    ///
    /// # Arguments
    ///
    /// * `provider` - The planner backend
    /// * `gateway` - Executes operations against the instance
    /// * `config` - Agent configuration (round ceiling, output)
    ///
    /// # Errors
    ///
    /// Returns `SnowAgentError::Config` if `max_rounds` is zero
    pub fn new(
        provider: impl Provider + 'static,
        gateway: impl Gateway + 'static,
        config: AgentConfig,
    ) -> Result<Self> {
        Self::from_parts(Arc::new(provider), Arc::new(gateway), config)
    }

    /// Creates a new agent instance from boxed trait objects
    ///
    /// Useful when the provider is chosen at runtime from configuration.
    ///
    /// # Errors
    ///
    /// Returns `SnowAgentError::Config` if `max_rounds` is zero
    pub fn new_boxed(
        provider: Box<dyn Provider>,
        gateway: Box<dyn Gateway>,
        config: AgentConfig,
    ) -> Result<Self> {
        Self::from_parts(Arc::from(provider), Arc::from(gateway), config)
    }

    fn from_parts(
        provider: Arc<dyn Provider>,
        gateway: Arc<dyn Gateway>,
        config: AgentConfig,
    ) -> Result<Self> {
        if config.max_rounds == 0 {
            return Err(
                SnowAgentError::Config("max_rounds must be greater than 0".to_string()).into(),
            );
        }

        Ok(Self {
            provider,
            gateway,
            catalog: OperationCatalog::servicenow(),
            conversation: Conversation::new(),
            config,
            observer: None,
        })
    }

    /// Register a progress observer
    pub fn with_observer(mut self, observer: impl Fn(&AgentEvent) + Send + Sync + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Run one user turn to completion
    ///
    /// # Errors
    ///
    /// Returns `SnowAgentError::InvalidInput` for blank input. Planner
    /// failures, the round ceiling and cancellation are reported through
    /// [`FinalAnswer::outcome`], not as errors.
    pub async fn process_turn(&mut self, user_text: &str) -> Result<FinalAnswer> {
        self.process_turn_with_cancel(user_text, &CancellationToken::new())
            .await
    }

    /// Run one user turn, stopping early if `cancel` fires
    ///
    /// Cancellation is honored at round boundaries and between operation
    /// dispatches. An operation already in flight always finishes and its
    /// result is recorded; operations not yet started are skipped.
    ///
    /// # Errors
    ///
    /// Returns `SnowAgentError::InvalidInput` for blank input
    pub async fn process_turn_with_cancel(
        &mut self,
        user_text: &str,
        cancel: &CancellationToken,
    ) -> Result<FinalAnswer> {
        let user_text = user_text.trim();
        if user_text.is_empty() {
            return Err(
                SnowAgentError::InvalidInput("request must not be empty".to_string()).into(),
            );
        }

        info!("Starting turn");
        let mut metrics = TurnMetrics::new();
        let mut state = LoopState::default();
        self.conversation.append(Turn::user(user_text));

        let answer = loop {
            if cancel.is_cancelled() {
                break self.cancel_turn(&state, &mut metrics);
            }

            state.round_count += 1;
            let round = state.round_count;
            debug!("Round {}/{}", round, self.config.max_rounds);
            self.emit(AgentEvent::RoundStarted { round });

            let snapshot = self.conversation.snapshot();
            let response = match self.provider.complete(&snapshot, &self.catalog).await {
                Ok(response) => response,
                Err(e) => {
                    warn!("Planner call failed: {:#}", e);
                    let outcome = TurnOutcome::PlannerUnavailable {
                        message: e.to_string(),
                    };
                    let text = format!("[error] The planner is unavailable: {}", e);
                    break self.finish(&state, &mut metrics, outcome, text);
                }
            };

            if let Some(usage) = response.usage {
                debug!(
                    prompt_tokens = usage.prompt_tokens,
                    completion_tokens = usage.completion_tokens,
                    "Planner usage"
                );
            }

            if response.is_empty() {
                warn!("Planner returned neither text nor operation requests");
                let outcome = TurnOutcome::PlannerUnavailable {
                    message: "planner returned an empty response".to_string(),
                };
                let text = "[error] The planner returned an empty response.".to_string();
                break self.finish(&state, &mut metrics, outcome, text);
            }

            if response.is_final() {
                let text = response.text.unwrap_or_default();
                self.conversation
                    .append(Turn::assistant(Some(text.clone()), Vec::new()));
                break self.finish(&state, &mut metrics, TurnOutcome::Completed, text);
            }

            if let Some(text) = response.text.as_ref().filter(|t| !t.trim().is_empty()) {
                state.last_text = Some(text.clone());
                self.emit(AgentEvent::PlannerNote {
                    round,
                    text: text.clone(),
                });
            }

            debug!("Dispatching {} operation requests", response.requests.len());
            self.conversation
                .append(Turn::assistant(response.text, response.requests.clone()));

            let mut interrupted = false;
            for request in &response.requests {
                if cancel.is_cancelled() {
                    interrupted = true;
                    break;
                }
                let result = self.run_request(round, request).await;
                state.operations += 1;
                self.conversation.append(Turn::tool_result(result));
            }

            if interrupted {
                break self.cancel_turn(&state, &mut metrics);
            }

            if state.round_count >= self.config.max_rounds {
                warn!("Round limit ({}) reached", self.config.max_rounds);
                let outcome = TurnOutcome::RoundLimitExceeded {
                    limit: self.config.max_rounds,
                };
                let text = state
                    .last_text
                    .clone()
                    .unwrap_or_else(|| INCOMPLETE_MARKER.to_string());
                break self.finish(&state, &mut metrics, outcome, text);
            }
        };

        Ok(answer)
    }

    async fn run_request(&self, round: usize, request: &OperationRequest) -> OperationResult {
        self.emit(AgentEvent::OperationStarted {
            round,
            request: request.clone(),
        });

        let result = match self.catalog.resolve(request) {
            Err(failure) => {
                warn!("{}", failure.to_error(&request.operation_name));
                OperationResult::failed(&request.request_id, &request.operation_name, &failure)
            }
            Ok(call) => {
                debug!(
                    request_id = %call.request_id,
                    operation = %call.operation,
                    table = call.str_param("table").unwrap_or("-"),
                    "Dispatching operation"
                );
                match self.gateway.invoke(&call).await {
                    Ok(payload) => {
                        OperationResult::ok(&request.request_id, &request.operation_name, payload)
                    }
                    Err(failure) => OperationResult::failed(
                        &request.request_id,
                        &request.operation_name,
                        &failure,
                    ),
                }
            }
        };

        let status = match result.failure() {
            Some(failure) => failure.kind.as_str(),
            None => "ok",
        };
        record_operation(&request.operation_name, status);

        self.emit(AgentEvent::OperationFinished {
            round,
            result: result.clone(),
        });
        result
    }

    fn cancel_turn(&mut self, state: &LoopState, metrics: &mut TurnMetrics) -> FinalAnswer {
        info!("Turn cancelled by user");
        self.conversation.append(Turn::cancelled());
        self.finish(
            state,
            metrics,
            TurnOutcome::Cancelled,
            CANCELLED_MARKER.to_string(),
        )
    }

    fn finish(
        &self,
        state: &LoopState,
        metrics: &mut TurnMetrics,
        outcome: TurnOutcome,
        text: String,
    ) -> FinalAnswer {
        metrics.record_finish(outcome.label(), state.round_count, state.operations);
        info!(
            outcome = outcome.label(),
            rounds = state.round_count,
            operations = state.operations,
            "Turn finished in {:?}",
            metrics.elapsed()
        );
        self.emit(AgentEvent::TurnFinished {
            outcome: outcome.clone(),
            rounds: state.round_count,
        });

        FinalAnswer {
            text,
            outcome,
            rounds: state.round_count,
            operations: state.operations,
        }
    }

    fn emit(&self, event: AgentEvent) {
        if let Some(observer) = &self.observer {
            observer(&event);
        }
    }

    /// Drop the conversation and start over
    pub fn reset(&mut self) {
        self.conversation.clear();
    }

    /// Number of turns in the conversation
    pub fn turn_count(&self) -> usize {
        self.conversation.len()
    }

    /// Borrow the conversation log
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Snapshot of the conversation log
    pub fn snapshot(&self) -> Snapshot {
        self.conversation.snapshot()
    }

    /// Planner backend in use
    pub fn provider(&self) -> &dyn Provider {
        self.provider.as_ref()
    }
}
