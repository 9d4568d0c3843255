use std::fmt;

use thiserror::Error;
use tracing::{debug, error, warn};

/// Assistant turn recorded when the answer provider fails.
pub const FALLBACK_ANSWER: &str = "⚠️ 죄송해요, 답변 중 오류가 발생했어요.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One turn of the conversation. Never modified after it is appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    role: Role,
    content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Idle,
    Pending,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GuardError {
    #[error("resolve called with no prompt awaiting an answer")]
    InvalidState,
}

/// Message log of one chat session plus the guard against double submission.
///
/// While a prompt is awaiting its answer every `submit` is rejected, whether
/// or not the content matches the pending prompt. `resolve` always records
/// exactly one assistant turn and returns the session to idle.
#[derive(Debug, Default)]
pub struct ConversationState {
    messages: Vec<Message>,
    last_submitted_prompt: Option<String>,
    awaiting_answer: bool,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `content` as a user turn unless a prompt is still in flight.
    ///
    /// Returns `true` when accepted. The caller is then responsible for
    /// fetching the answer and handing it to [`resolve`](Self::resolve).
    pub fn submit(&mut self, content: &str) -> bool {
        if self.awaiting_answer {
            if self.last_submitted_prompt.as_deref() == Some(content) {
                debug!("Rejected duplicate submission of the pending prompt");
            } else {
                debug!("Rejected submission while another prompt is pending");
            }
            return false;
        }

        self.messages.push(Message::new(Role::User, content));
        self.last_submitted_prompt = Some(content.to_string());
        self.awaiting_answer = true;
        true
    }

    /// Records the answer to the pending prompt.
    ///
    /// A failed outcome is logged and replaced by [`FALLBACK_ANSWER`]; it is
    /// never returned to the caller. The only error is calling this while
    /// nothing is pending, which leaves the state untouched.
    pub fn resolve<E: fmt::Display>(
        &mut self,
        outcome: Result<String, E>,
    ) -> Result<(), GuardError> {
        if !self.awaiting_answer {
            error!("resolve called while idle");
            return Err(GuardError::InvalidState);
        }

        let answer = match outcome {
            Ok(answer) => answer,
            Err(e) => {
                warn!(error = %e, "Answer provider failed, using fallback answer");
                FALLBACK_ANSWER.to_string()
            }
        };

        self.messages.push(Message::new(Role::Assistant, answer));
        self.awaiting_answer = false;
        Ok(())
    }

    pub fn snapshot(&self) -> &[Message] {
        &self.messages
    }

    pub fn last_submitted_prompt(&self) -> Option<&str> {
        self.last_submitted_prompt.as_deref()
    }

    pub fn is_awaiting_answer(&self) -> bool {
        self.awaiting_answer
    }

    pub fn state(&self) -> GuardState {
        if self.is_awaiting_answer() {
            GuardState::Pending
        } else {
            GuardState::Idle
        }
    }

    /// The most recent assistant turn, if the log ends with one.
    pub fn last_answer(&self) -> Option<&Message> {
        self.messages
            .last()
            .filter(|message| message.role() == Role::Assistant)
    }
}
