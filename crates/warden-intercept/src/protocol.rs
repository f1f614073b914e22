//! Message protocol between the page and the background proxy
//!
//! Messages serialize as JSON objects tagged by `type`:
//!
//! ```json
//! {"type":"CONFIGURE_BLOCKER","blockedScripts":["useuserextension"],"bypassEnabled":false}
//! {"type":"BLOCKED_SCRIPT","url":"https://cdn.example.com/useUserExtension-7c796cda.js"}
//! ```

use serde::{Deserialize, Serialize};

/// Page to proxy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProxyCommand {
    /// Replace the proxy's patterns and bypass state
    #[serde(rename_all = "camelCase")]
    ConfigureBlocker {
        /// Block patterns
        blocked_scripts: Vec<String>,
        /// Whether the proxy should let everything through
        bypass_enabled: bool,
    },
    /// Let everything through
    EnableBypassMode,
    /// Resume blocking
    DisableBypassMode,
    /// Ask for the URLs blocked so far
    GetBlockedScripts,
}

/// Proxy to page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProxyEvent {
    /// A request was answered with the stub
    BlockedScript {
        /// Blocked URL
        url: String,
    },
    /// Answer to [`ProxyCommand::GetBlockedScripts`]
    #[serde(rename_all = "camelCase")]
    BlockedScriptsList {
        /// Blocked URLs, oldest first
        blocked_scripts: Vec<String>,
    },
}

impl ProxyCommand {
    /// Encode as JSON
    ///
    /// # Errors
    /// Returns the serializer error (not expected for these shapes)
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode from JSON
    ///
    /// # Errors
    /// Returns an error for unknown `type` tags or malformed fields
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

impl ProxyEvent {
    /// Encode as JSON
    ///
    /// # Errors
    /// Returns the serializer error (not expected for these shapes)
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode from JSON
    ///
    /// # Errors
    /// Returns an error for unknown `type` tags or malformed fields
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
