use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids;

pub const DEFAULT_TITLE: &str = "New conversation";
pub const MAX_TITLE_CHARS: usize = 50;

/// Truncates `text` to at most [`MAX_TITLE_CHARS`] characters.
pub fn derive_title(text: &str) -> String {
    text.chars().take(MAX_TITLE_CHARS).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recommended product. Only `name` is guaranteed; everything else is
/// shown when present and omitted otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl Product {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }
}

/// One row of a comparison table. `values[i]` belongs to `attributes[i]`
/// of the owning [`Comparison`]; `None` means unknown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub name: String,
    #[serde(default)]
    pub values: Vec<Option<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comparison {
    pub attributes: Vec<String>,
    #[serde(default)]
    pub products: Vec<ComparisonRow>,
}

impl Comparison {
    /// Value of `attribute_index` for the row at `row_index`, `None` when
    /// unknown or out of range.
    pub fn value(&self, row_index: usize, attribute_index: usize) -> Option<&str> {
        self.products
            .get(row_index)?
            .values
            .get(attribute_index)?
            .as_deref()
    }
}

/// The `{text, products, comparison}` triple derived from an agent reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedReply {
    pub text: String,
    pub products: Vec<Product>,
    pub comparison: Option<Comparison>,
}

impl NormalizedReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), ..Self::default() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub products: Vec<Product>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison: Option<Comparison>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: ids::message_id(),
            role: MessageRole::User,
            content: content.into(),
            products: Vec::new(),
            comparison: None,
            timestamp: Utc::now(),
            error: false,
        }
    }

    pub fn assistant(reply: NormalizedReply) -> Self {
        Self {
            id: ids::message_id(),
            role: MessageRole::Assistant,
            content: reply.text,
            products: reply.products,
            comparison: reply.comparison,
            timestamp: Utc::now(),
            error: false,
        }
    }

    /// Synthetic assistant message standing in for a failed agent call.
    pub fn error(content: impl Into<String>) -> Self {
        Self {
            error: true,
            ..Self::assistant(NormalizedReply::text(content))
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == MessageRole::User
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub session_id: String,
    pub title: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(title: Option<&str>) -> Self {
        let now = Utc::now();
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(derive_title)
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());
        Self {
            id: ids::conversation_id(),
            session_id: ids::session_id(),
            title,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}
