//! Control-plane protocol
//!
//! Requests are JSON objects dispatched on `cmd`; every request gets exactly
//! one response. TypeScript definitions for the panel are generated from
//! these types (`cargo test` writes them to `bindings/`).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

/// Commands the control plane understands.
pub const COMMANDS: &[&str] = &["getState", "toggleEnabled", "toggleSite", "resetCounts"];

/// Old field names, read when the current name is absent.
const LEGACY_FIELDS: &[(&str, &str)] = &[("tabId", "sessionId"), ("host", "site")];

/// Error code for a command name not in [`COMMANDS`].
pub const UNKNOWN_COMMAND: &str = "unknown-cmd";

/// Error turning a raw message into a [`Request`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
    #[error("Malformed request: {0}")]
    BadRequest(String),
}

impl ProtocolError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownCommand(_) => UNKNOWN_COMMAND,
            Self::BadRequest(_) => "bad-request",
        }
    }
}

/// A control-plane request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "cmd", rename_all = "camelCase")]
#[ts(export)]
pub enum Request {
    #[serde(rename_all = "camelCase")]
    GetState {
        #[serde(default)]
        #[ts(type = "number | null")]
        session_id: Option<i64>,
        #[serde(default)]
        site: Option<String>,
    },
    ToggleEnabled {
        #[serde(default)]
        enabled: bool,
    },
    ToggleSite {
        #[serde(default)]
        site: Option<String>,
        /// true removes the site from the allowlist
        #[serde(default)]
        block: bool,
    },
    ResetCounts,
}

impl Request {
    /// Parse a raw message. Anything without a known `cmd` is an unknown
    /// command; a known command with mistyped fields is a bad request.
    pub fn parse(msg: &Value) -> Result<Self, ProtocolError> {
        let cmd = msg.get("cmd").and_then(Value::as_str).unwrap_or("");
        if !COMMANDS.contains(&cmd) {
            return Err(ProtocolError::UnknownCommand(cmd.to_string()));
        }
        let mut msg = msg.clone();
        if let Value::Object(fields) = &mut msg {
            // Older popups send `tabId` and `host`
            for &(legacy, field) in LEGACY_FIELDS {
                if !fields.contains_key(field) {
                    if let Some(value) = fields.remove(legacy) {
                        fields.insert(field.to_string(), value);
                    }
                }
            }
        }
        serde_json::from_value(msg).map_err(|e| ProtocolError::BadRequest(e.to_string()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::GetState { .. } => "getState",
            Self::ToggleEnabled { .. } => "toggleEnabled",
            Self::ToggleSite { .. } => "toggleSite",
            Self::ResetCounts => "resetCounts",
        }
    }
}

// =============================================================================
// Responses
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StateReply {
    pub enabled: bool,
    /// The site is not on the allowlist
    pub site_blocked: bool,
    #[ts(type = "number")]
    pub session_blocked: u64,
    #[ts(type = "number")]
    pub total_blocked: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct EnabledReply {
    pub ok: bool,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct AllowlistReply {
    pub ok: bool,
    pub allowlist: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct AckReply {
    pub ok: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct ErrorReply {
    pub ok: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub detail: Option<String>,
}

/// A control-plane response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(untagged)]
#[ts(export)]
pub enum Response {
    State(StateReply),
    Enabled(EnabledReply),
    Allowlist(AllowlistReply),
    Ack(AckReply),
    Error(ErrorReply),
}

impl Response {
    pub fn ack() -> Self {
        Self::Ack(AckReply { ok: true })
    }

    pub fn error(code: &str) -> Self {
        Self::Error(ErrorReply {
            ok: false,
            error: code.to_string(),
            detail: None,
        })
    }

    pub fn error_with_detail(code: &str, detail: impl Into<String>) -> Self {
        Self::Error(ErrorReply {
            ok: false,
            error: code.to_string(),
            detail: Some(detail.into()),
        })
    }

    /// False only for error responses.
    pub fn is_ok(&self) -> bool {
        !matches!(self, Self::Error(_))
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
