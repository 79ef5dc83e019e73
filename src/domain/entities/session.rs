use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Server-side conversation context holding the most recent exchanges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub exchanges: VecDeque<Exchange>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            exchanges: VecDeque::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Appends an exchange, dropping the oldest ones beyond `max_exchanges`.
    pub fn push_exchange(&mut self, exchange: Exchange, max_exchanges: usize) {
        self.exchanges.push_back(exchange);
        while self.exchanges.len() > max_exchanges {
            self.exchanges.pop_front();
        }
        self.updated_at = Utc::now();
    }

    /// Renders the history as alternating `User:` / `Assistant:` lines.
    pub fn render_history(&self) -> Option<String> {
        if self.exchanges.is_empty() {
            return None;
        }

        let lines = self
            .exchanges
            .iter()
            .flat_map(|e| {
                [
                    format!("{}: {}", MessageRole::User.as_str(), e.query),
                    format!("{}: {}", MessageRole::Assistant.as_str(), e.answer),
                ]
            })
            .collect::<Vec<_>>();

        Some(lines.join("\n"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    pub query: String,
    pub answer: String,
}

impl Exchange {
    pub fn new(query: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            answer: answer.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}
