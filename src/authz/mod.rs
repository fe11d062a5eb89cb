//! Authorization core: request/decision types, action classification,
//! the policy store, and the decision engine.
//!
//! `Request` and `Decision` serialize with the field names the Docker
//! daemon uses on the authorization plugin wire (`RequestMethod`,
//! `Allow`, `Msg`, ...), so a transport can decode straight into them.

use serde::{Deserialize, Serialize};

pub mod action;
pub mod engine;
pub mod policy;

pub use action::{classify, is_read_action, Action, ActionKind};
pub use engine::DecisionEngine;
pub use policy::{ConfigError, Policy, PolicyStore};

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// A single intercepted API call, populated by the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Authenticated caller identity. Empty when the transport could not
    /// authenticate the caller.
    #[serde(rename = "User", default)]
    pub user: String,
    /// How the transport authenticated `user` (opaque to the core).
    #[serde(rename = "UserAuthNMethod", default)]
    pub user_authn_method: String,
    /// Raw HTTP method.
    #[serde(rename = "RequestMethod", default)]
    pub method: String,
    /// Raw request URI including any version prefix and query string.
    #[serde(rename = "RequestURI", default)]
    pub uri: String,
    /// Opaque request payload. Never interpreted by the core.
    #[serde(rename = "RequestBody", default, with = "body_base64")]
    pub body: Vec<u8>,
}

impl Request {
    /// Build a request with an empty body.
    pub fn new(
        method: impl Into<String>,
        uri: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            user_authn_method: String::new(),
            method: method.into(),
            uri: uri.into(),
            body: Vec::new(),
        }
    }

    /// Attach a body payload.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }
}

/// Request bodies travel base64-encoded on the plugin wire.
mod body_base64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        match encoded {
            Some(s) if !s.is_empty() => STANDARD.decode(s).map_err(serde::de::Error::custom),
            _ => Ok(Vec::new()),
        }
    }
}

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// Allow/deny outcome for a single request.
///
/// Construct through [`Decision::allow`], [`Decision::deny`] or
/// [`Decision::failure`]; a non-empty `error` always comes with
/// `allow == false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Whether the request may proceed to the daemon.
    #[serde(rename = "Allow")]
    pub allow: bool,
    /// Human-readable justification, safe to show to the caller.
    #[serde(rename = "Msg", default)]
    pub message: String,
    /// Failure description; empty unless evaluation itself failed.
    #[serde(rename = "Err", default)]
    pub error: String,
}

impl Decision {
    /// An allow decision.
    pub fn allow(message: impl Into<String>) -> Self {
        Self {
            allow: true,
            message: message.into(),
            error: String::new(),
        }
    }

    /// A deny decision with a reason.
    pub fn deny(message: impl Into<String>) -> Self {
        Self {
            allow: false,
            message: message.into(),
            error: String::new(),
        }
    }

    /// A failed evaluation. Always denies.
    pub fn failure(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            allow: false,
            message: format!("authorization failed: {error}"),
            error,
        }
    }

    /// Returns `true` when the transport must surface a failure status.
    pub fn is_failure(&self) -> bool {
        !self.error.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Authorizer seam
// ---------------------------------------------------------------------------

/// Decides requests (client → daemon) and responses (daemon → client).
pub trait Authorizer: Send + Sync {
    /// Decide whether a request may reach the daemon.
    fn authorize_request(&self, request: &Request) -> Decision;

    /// Decide whether a daemon response may reach the client.
    fn authorize_response(&self, request: &Request) -> Decision;
}
