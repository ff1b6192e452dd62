//! Conversation state.
//!
//! An ordered log of question/answer turns giving the answerer short-term
//! memory. Session-scoped and never persisted: it lives for the duration
//! of a chat session and is cleared explicitly or lost on exit.

/// One completed question/answer exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub question: String,
    pub answer: String,
}

/// Ordered conversation log.
#[derive(Debug, Default, Clone)]
pub struct ConversationLog {
    turns: Vec<Turn>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a completed turn. Called only after a successful answer;
    /// a failed query never records a half-formed turn.
    pub fn append(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.turns.push(Turn {
            question: question.into(),
            answer: answer.into(),
        });
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Serialize the whole log, oldest first, as `Q:`/`A:` lines.
    pub fn render(&self) -> String {
        self.turns
            .iter()
            .map(|t| format!("Q: {}\nA: {}", t.question, t.answer))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
