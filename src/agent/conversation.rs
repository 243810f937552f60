//! Conversation log for a single session
//!
//! The log is append-only during a session. Turns are numbered in append
//! order and never edited afterwards; `clear` is the only way to drop them.
//! Readers take a [`Snapshot`], which stays valid even if the log grows.

use crate::operations::{OperationRequest, OperationResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Human input
    User,
    /// Planner output, or the cancellation marker
    Assistant,
    /// Outcome of one dispatched operation
    ToolResult,
}

/// What a turn holds
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnContent {
    /// User text
    Text {
        /// The text as entered
        text: String,
    },
    /// Planner output: optional text plus zero or more operation requests
    Plan {
        /// Narrative text, if the planner produced any
        text: Option<String>,
        /// Requests in planner order
        requests: Vec<OperationRequest>,
    },
    /// Result of one operation
    Result {
        /// The recorded result
        result: OperationResult,
    },
    /// The user cancelled the turn before it finished
    Cancelled,
}

/// One entry of the conversation log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Turn {
    ordinal: usize,
    role: Role,
    content: TurnContent,
    recorded_at: DateTime<Utc>,
}

impl Turn {
    fn new(role: Role, content: TurnContent) -> Self {
        Self {
            ordinal: 0,
            role,
            content,
            recorded_at: Utc::now(),
        }
    }

    /// User turn
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, TurnContent::Text { text: text.into() })
    }

    /// Planner turn
    ///
    /// Blank text is stored as `None`.
    pub fn assistant(text: Option<String>, requests: Vec<OperationRequest>) -> Self {
        let text = text.filter(|t| !t.trim().is_empty());
        Self::new(Role::Assistant, TurnContent::Plan { text, requests })
    }

    /// Operation result turn
    pub fn tool_result(result: OperationResult) -> Self {
        Self::new(Role::ToolResult, TurnContent::Result { result })
    }

    /// Cancellation marker
    pub fn cancelled() -> Self {
        Self::new(Role::Assistant, TurnContent::Cancelled)
    }

    /// Position in the log, starting at 0
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Author of the turn
    pub fn role(&self) -> Role {
        self.role
    }

    /// Turn payload
    pub fn content(&self) -> &TurnContent {
        &self.content
    }

    /// When the turn was appended
    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }

    /// User or planner text, if the turn carries any
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            TurnContent::Text { text } => Some(text.as_str()),
            TurnContent::Plan { text, .. } => text.as_deref(),
            _ => None,
        }
    }

    /// Operation requests carried by a planner turn
    pub fn requests(&self) -> &[OperationRequest] {
        match &self.content {
            TurnContent::Plan { requests, .. } => requests.as_slice(),
            _ => &[],
        }
    }

    /// Operation result carried by a result turn
    pub fn result(&self) -> Option<&OperationResult> {
        match &self.content {
            TurnContent::Result { result } => Some(result),
            _ => None,
        }
    }

    /// Returns true for the cancellation marker
    pub fn is_cancellation(&self) -> bool {
        matches!(self.content, TurnContent::Cancelled)
    }
}

/// Immutable view of the log at a point in time
pub type Snapshot = Arc<[Turn]>;

/// Append-only conversation log
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    /// Create an empty conversation
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn, assigning the next ordinal
    ///
    /// # Returns
    ///
    /// The ordinal given to the turn
    ///
    /// # Examples
    ///
    /// ```
    /// use snow_agent::agent::{Conversation, Turn};
    ///
    /// let mut conversation = Conversation::new();
    /// assert_eq!(conversation.append(Turn::user("list update sets")), 0);
    /// assert_eq!(conversation.append(Turn::assistant(Some("Done".into()), vec![])), 1);
    /// ```
    pub fn append(&mut self, mut turn: Turn) -> usize {
        let ordinal = self.turns.len();
        turn.ordinal = ordinal;
        self.turns.push(turn);
        ordinal
    }

    /// Copy of the log as it is now
    pub fn snapshot(&self) -> Snapshot {
        Arc::from(self.turns.as_slice())
    }

    /// Borrow the turns in order
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Drop every turn
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Number of turns
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Returns true if no turns have been appended
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Number of turns with the given role
    pub fn count_by_role(&self, role: Role) -> usize {
        self.turns.iter().filter(|t| t.role == role).count()
    }
}
