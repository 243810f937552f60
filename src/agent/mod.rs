//! Agent module for snow-agent
//!
//! This module contains the conversation log, the plan/dispatch loop that
//! drives one user turn, and per-turn metrics.

pub mod conversation;
pub mod core;
pub mod metrics;

pub use conversation::{Conversation, Role, Snapshot, Turn, TurnContent};
pub use core::{
    Agent, AgentEvent, EventObserver, FinalAnswer, TurnOutcome, CANCELLED_MARKER,
    INCOMPLETE_MARKER,
};
