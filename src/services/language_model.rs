use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

#[async_trait]
pub trait LanguageModelService: Send + Sync {
    fn model(&self) -> &str;

    /// Sends the messages and returns the text of the first reply.
    async fn complete(&self, messages: &[ChatMessage]) -> AppResult<String>;
}

/// Chat session on top of a model; owns the running history.
pub struct Conversation {
    model: Arc<dyn LanguageModelService>,
    history: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new(model: Arc<dyn LanguageModelService>) -> Self {
        Self {
            model,
            history: Vec::new(),
        }
    }

    pub fn model_name(&self) -> &str {
        self.model.model()
    }

    pub async fn chat(
        &mut self,
        user_message: &str,
        system_prompt: Option<&str>,
        use_history: bool,
    ) -> AppResult<String> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        if let Some(system) = system_prompt {
            messages.push(ChatMessage::system(system));
        }
        if use_history {
            messages.extend(self.history.iter().cloned());
        }
        messages.push(ChatMessage::user(user_message));

        let reply = self.model.complete(&messages).await?;

        if use_history {
            self.history.push(ChatMessage::user(user_message));
            self.history.push(ChatMessage::assistant(reply.clone()));
        }
        Ok(reply)
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }
}
