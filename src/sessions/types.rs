//! Session, turn, and citation types shared across the conversation core.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which page surface a scope belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Surface {
    /// Free-form chat across all readable documents.
    Chat,
    /// Query against a single named index.
    Query,
}

impl Surface {
    /// Shared prefix of every durable-storage key belonging to this surface.
    pub fn storage_prefix(self) -> String {
        format!("{self}_sessions")
    }
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Surface::Chat => write!(f, "chat"),
            Surface::Query => write!(f, "query"),
        }
    }
}

/// Composite key identifying an independent session partition.
///
/// Each scope owns its own repository instance and durable-storage key, so
/// switching surfaces (or target indexes) never leaks sessions across scopes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ScopeKey {
    pub surface: Surface,
    pub index: Option<String>,
}

impl ScopeKey {
    pub fn chat() -> Self {
        Self {
            surface: Surface::Chat,
            index: None,
        }
    }

    pub fn query(index: impl Into<String>) -> Self {
        Self {
            surface: Surface::Query,
            index: Some(index.into()),
        }
    }

    /// The durable-storage key for this scope's session document.
    pub fn storage_key(&self) -> String {
        match &self.index {
            Some(index) => format!("{}:{index}", self.surface.storage_prefix()),
            None => self.surface.storage_prefix(),
        }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.index {
            Some(index) => write!(f, "{}:{index}", self.surface),
            None => write!(f, "{}", self.surface),
        }
    }
}

/// A retrieved document excerpt supporting an assistant answer.
///
/// `metadata` is opaque pass-through data; the core only reads `filename` for
/// default display. `relevance` is used for optional ranking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Citation {
    pub text: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance: Option<f64>,
}

impl Citation {
    /// Source filename from metadata, if the backend attached one.
    pub fn filename(&self) -> Option<&str> {
        self.metadata.get("filename").and_then(|v| v.as_str())
    }
}

/// One message in a conversation, authored by the user or the assistant.
///
/// Modeled as a tagged union so user turns cannot carry sources.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Turn {
    User {
        content: String,
        timestamp: DateTime<Utc>,
    },
    Assistant {
        content: String,
        timestamp: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sources: Option<Vec<Citation>>,
    },
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Turn::User {
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>, sources: Vec<Citation>) -> Self {
        Turn::Assistant {
            content: content.into(),
            timestamp: Utc::now(),
            sources: Some(sources),
        }
    }

    pub fn role(&self) -> &'static str {
        match self {
            Turn::User { .. } => "user",
            Turn::Assistant { .. } => "assistant",
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Turn::User { content, .. } | Turn::Assistant { content, .. } => content,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Turn::User { timestamp, .. } | Turn::Assistant { timestamp, .. } => *timestamp,
        }
    }

    /// Citations attached to an assistant turn. Empty for user turns.
    pub fn sources(&self) -> &[Citation] {
        match self {
            Turn::Assistant {
                sources: Some(sources),
                ..
            } => sources,
            _ => &[],
        }
    }
}

/// One persisted conversation thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub name: String,
    pub messages: Vec<Turn>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Default label for freshly created sessions.
pub const DEFAULT_SESSION_NAME: &str = "New Chat";

impl Session {
    /// Create an empty session with a fresh timestamp-based id.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: now.to_rfc3339_opts(SecondsFormat::Nanos, true),
            name: DEFAULT_SESSION_NAME.to_string(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append turns in order, bumping `updated_at`.
    pub fn append(&mut self, turns: impl IntoIterator<Item = Turn>) {
        self.messages.extend(turns);
        self.updated_at = Utc::now();
    }

    /// Truncate the timeline to empty, bumping `updated_at`.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.updated_at = Utc::now();
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_storage_keys_are_disjoint() {
        assert_eq!(ScopeKey::chat().storage_key(), "chat_sessions");
        assert_eq!(
            ScopeKey::query("handbook").storage_key(),
            "query_sessions:handbook"
        );
        assert_ne!(
            ScopeKey::query("a").storage_key(),
            ScopeKey::query("b").storage_key()
        );
    }

    #[test]
    fn every_storage_key_carries_its_surface_prefix() {
        assert!(ScopeKey::chat()
            .storage_key()
            .starts_with(&Surface::Chat.storage_prefix()));
        assert!(ScopeKey::query("handbook")
            .storage_key()
            .starts_with(&Surface::Query.storage_prefix()));
    }

    #[test]
    fn new_session_has_default_name_and_empty_timeline() {
        let session = Session::new();
        assert_eq!(session.name, DEFAULT_SESSION_NAME);
        assert!(session.messages.is_empty());
        assert_eq!(session.created_at, session.updated_at);
    }

    #[test]
    fn append_preserves_order_and_bumps_updated_at() {
        let mut session = Session::new();
        let before = session.updated_at;
        session.append([Turn::user("first"), Turn::assistant("second", vec![])]);

        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[0].content(), "first");
        assert_eq!(session.messages[1].content(), "second");
        assert!(session.updated_at >= before);
    }

    #[test]
    fn clear_truncates_but_keeps_session() {
        let mut session = Session::new();
        session.append([Turn::user("hello")]);
        session.clear();
        assert!(session.messages.is_empty());
    }

    #[test]
    fn user_turns_never_carry_sources() {
        let turn = Turn::user("question");
        assert!(turn.sources().is_empty());

        let json = serde_json::to_value(&turn).unwrap();
        assert!(json.get("sources").is_none());
        assert_eq!(json["role"], "user");
    }

    #[test]
    fn assistant_turn_serializes_with_role_tag_and_sources() {
        let citation = Citation {
            text: "excerpt".to_string(),
            metadata: serde_json::Map::new(),
            relevance: Some(0.9),
        };
        let turn = Turn::assistant("answer", vec![citation]);

        let json = serde_json::to_value(&turn).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["sources"][0]["text"], "excerpt");
    }

    #[test]
    fn session_serializes_with_camel_case_iso_timestamps() {
        let session = Session::new();
        let json = serde_json::to_value(&session).unwrap();

        let created = json["createdAt"].as_str().unwrap();
        assert!(created.contains('T'), "expected ISO-8601, got {created}");
        assert!(json.get("updatedAt").is_some());
    }

    #[test]
    fn session_round_trips_field_equal() {
        let mut session = Session::new();
        session.append([
            Turn::user("capital of France"),
            Turn::assistant(
                "Paris",
                vec![Citation {
                    text: "Paris is the capital".to_string(),
                    metadata: serde_json::Map::from_iter([(
                        "filename".to_string(),
                        serde_json::Value::String("geo.pdf".to_string()),
                    )]),
                    relevance: None,
                }],
            ),
        ]);

        let json = serde_json::to_string(&session).unwrap();
        let revived: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(session, revived);
    }

    #[test]
    fn citation_filename_reads_metadata() {
        let citation = Citation {
            text: String::new(),
            metadata: serde_json::Map::from_iter([(
                "filename".to_string(),
                serde_json::Value::String("report.pdf".to_string()),
            )]),
            relevance: None,
        };
        assert_eq!(citation.filename(), Some("report.pdf"));
    }
}
