//! Change scopes and the event carried on the bus.
//!
//! A scope names the resource domain a mutation touched. Page controllers
//! subscribe to the scope they render; `*` matches every scope on either side.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Well-known scopes
// ---------------------------------------------------------------------------

pub const SCOPE_ALL: &str = "*";
pub const SCOPE_NOTICES: &str = "notices";
pub const SCOPE_FAQS: &str = "faqs";
pub const SCOPE_USERS: &str = "users";
pub const SCOPE_SCRAPER: &str = "scraper";
pub const SCOPE_LOGS: &str = "logs";
pub const SCOPE_DASHBOARD: &str = "dashboard";
pub const SCOPE_CHATBOT: &str = "chatbot";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scope(String);

impl Scope {
    /// Build a scope; a blank name becomes the wildcard.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Self::all();
        }
        Self(trimmed.to_string())
    }

    pub fn all() -> Self {
        Self(SCOPE_ALL.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.0 == SCOPE_ALL
    }

    /// Exact match, or a wildcard on either side.
    pub fn matches(&self, other: &Scope) -> bool {
        self.is_wildcard() || other.is_wildcard() || self.0 == other.0
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::all()
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Scope {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Scope {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub id: String,
    pub scope: Scope,
    pub detail: serde_json::Value,
    pub created_at: String,
}

impl ChangeEvent {
    pub fn new(scope: Scope, detail: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            scope,
            detail,
            created_at: Utc::now().to_rfc3339(),
        }
    }
}
