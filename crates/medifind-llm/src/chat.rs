//! Chat session state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::client::TextGenerator;
use crate::extraction::{extract_medicine_names, quick_actions};
use crate::prompts::{make_conversation_prompt, make_turn_prompt, medicine_info_query, GREETING};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    User,
    Bot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// Bold names found in a bot reply; `None` when there were none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medicines: Option<Vec<String>>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: MessageKind::User,
            text: text.into(),
            timestamp: Utc::now(),
            medicines: None,
        }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        let text = text.into();
        let names = extract_medicine_names(&text);
        Self {
            id: Uuid::new_v4(),
            kind: MessageKind::Bot,
            text,
            timestamp: Utc::now(),
            medicines: (!names.is_empty()).then_some(names),
        }
    }

    pub fn is_user(&self) -> bool {
        self.kind == MessageKind::User
    }

    /// Names to offer as quick-search actions (at most three).
    pub fn quick_actions(&self) -> &[String] {
        self.medicines.as_deref().map(quick_actions).unwrap_or(&[])
    }
}

/// How much of the conversation goes into each request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryMode {
    /// Only the current message is sent; history is for display.
    #[default]
    Stateless,
    /// The last `max_turns` exchanges are replayed before the message.
    Replay { max_turns: usize },
}

/// One conversation with the assistant.
///
/// History is append-only and starts with the greeting. A turn always
/// produces a bot message: generator failures become a fixed fallback reply.
pub struct ChatSession<G: ?Sized> {
    generator: Arc<G>,
    mode: HistoryMode,
    messages: Vec<ChatMessage>,
}

impl<G: TextGenerator + ?Sized> ChatSession<G> {
    pub fn new(generator: Arc<G>) -> Self {
        Self::with_mode(generator, HistoryMode::default())
    }

    pub fn with_mode(generator: Arc<G>, mode: HistoryMode) -> Self {
        Self {
            generator,
            mode,
            messages: vec![ChatMessage::bot(GREETING)],
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn mode(&self) -> HistoryMode {
        self.mode
    }

    /// Send `input` and return the reply. Blank input is ignored.
    pub async fn send(&mut self, input: &str) -> Option<&ChatMessage> {
        let text = input.trim();
        if text.is_empty() {
            return None;
        }

        let prompt = self.prompt_for(text);
        self.messages.push(ChatMessage::user(text));

        let reply = match self.generator.generate(&prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "Chat completion failed");
                e.fallback_reply().to_string()
            }
        };

        let message = ChatMessage::bot(reply);
        debug!(medicines = message.medicines.as_ref().map_or(0, Vec::len), "Chat reply");
        self.messages.push(message);
        self.messages.last()
    }

    /// Ask about a saved medicine, as when chat is opened from favorites.
    pub async fn ask_about(&mut self, medicine_name: &str) -> Option<&ChatMessage> {
        if medicine_name.trim().is_empty() {
            return None;
        }
        self.send(&medicine_info_query(medicine_name)).await
    }

    fn prompt_for(&self, text: &str) -> String {
        match self.mode {
            HistoryMode::Stateless => make_turn_prompt(text),
            HistoryMode::Replay { max_turns } => {
                let turns = self.exchanges();
                let skip = turns.len().saturating_sub(max_turns);
                make_conversation_prompt(&turns[skip..], text)
            }
        }
    }

    /// Completed (user, bot) pairs, oldest first. The greeting is not one.
    fn exchanges(&self) -> Vec<(&str, &str)> {
        self.messages
            .windows(2)
            .filter(|pair| pair[0].kind == MessageKind::User && pair[1].kind == MessageKind::Bot)
            .map(|pair| (pair[0].text.as_str(), pair[1].text.as_str()))
            .collect()
    }
}
