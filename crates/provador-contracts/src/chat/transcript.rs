use serde::{Deserialize, Serialize};

pub const STYLIST_GREETING: &str =
    "Olá! Sou a TrocaRápida AI, sua estilista virtual. O que achou do look? Pergunte o que quiser sobre combinações, acessórios ou ocasiões.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

/// Append-only stylist conversation bound to the displayed result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTranscript {
    turns: Vec<ChatTurn>,
}

impl ChatTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the greeting if nothing has been said yet. Returns whether it did.
    pub fn seed_greeting(&mut self) -> bool {
        if !self.turns.is_empty() {
            return false;
        }
        self.push_assistant(STYLIST_GREETING);
        true
    }

    pub fn push_user(&mut self, content: impl Into<String>) -> &ChatTurn {
        self.push(ChatRole::User, content.into())
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) -> &ChatTurn {
        self.push(ChatRole::Assistant, content.into())
    }

    /// Failures stay in the conversation as an assistant turn.
    pub fn push_error(&mut self, message: &str) -> &ChatTurn {
        self.push_assistant(format_error_turn(message))
    }

    fn push(&mut self, role: ChatRole, content: String) -> &ChatTurn {
        let index = self.turns.len();
        self.turns.push(ChatTurn { role, content });
        &self.turns[index]
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&ChatTurn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn reset(&mut self) {
        self.turns.clear();
    }
}

pub fn format_error_turn(message: &str) -> String {
    format!("Desculpe, algo deu errado: {message}")
}
