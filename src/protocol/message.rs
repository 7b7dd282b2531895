//! Protocol message and status codes.

use serde::Serialize;

/// Current protocol version written by this daemon.
pub const PROTOCOL_VERSION: u8 = 1;

/// Conventional `type` tag for JSON bodies.
pub const TYPE_JSON: &str = "json";

/// Response status. Closed set; anything else on the wire is a framing error.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    Ok = 0,
    Timeout = 1,
    Failed = 2,
    Unauthorized = 3,
    Accepted = 4,
    Unresolved = 5,
}

impl StatusCode {
    /// Stable label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::Timeout => "TIMEOUT",
            StatusCode::Failed => "FAILED",
            StatusCode::Unauthorized => "UNAUTHORIZED",
            StatusCode::Accepted => "ACCEPTED",
            StatusCode::Unresolved => "REQUEST_UNRESOLVED",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StatusCode::Ok | StatusCode::Accepted)
    }
}

impl TryFrom<u8> for StatusCode {
    type Error = u8;

    fn try_from(val: u8) -> Result<Self, Self::Error> {
        match val {
            0 => Ok(StatusCode::Ok),
            1 => Ok(StatusCode::Timeout),
            2 => Ok(StatusCode::Failed),
            3 => Ok(StatusCode::Unauthorized),
            4 => Ok(StatusCode::Accepted),
            5 => Ok(StatusCode::Unresolved),
            other => Err(other),
        }
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single request or response exchanged over the daemon socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Protocol version.
    pub version: u8,
    /// Response status. Requests carry `Ok`.
    pub status: StatusCode,
    /// Short tag describing the body encoding (e.g. "json").
    pub kind: String,
    /// Opaque payload, conventionally JSON.
    pub body: Vec<u8>,
    /// Subsystem the request is addressed to.
    pub target: String,
    /// Operation within the target subsystem.
    pub method: String,
}

impl Message {
    /// Build a request frame for `target`/`method`.
    pub fn request(target: impl Into<String>, method: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            status: StatusCode::Ok,
            kind: TYPE_JSON.to_string(),
            body,
            target: target.into(),
            method: method.into(),
        }
    }

    /// Build a request whose body is the JSON encoding of `value`.
    pub fn json_request<T: Serialize>(
        target: impl Into<String>,
        method: impl Into<String>,
        value: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::request(target, method, serde_json::to_vec(value)?))
    }

    /// Build a response to `self`, echoing its target and method.
    pub fn reply(&self, status: StatusCode, body: Vec<u8>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            status,
            kind: TYPE_JSON.to_string(),
            body,
            target: self.target.clone(),
            method: self.method.clone(),
        }
    }

    /// Copy of the routing fields with an empty body.
    pub fn without_body(&self) -> Self {
        Self {
            version: self.version,
            status: self.status,
            kind: self.kind.clone(),
            body: Vec::new(),
            target: self.target.clone(),
            method: self.method.clone(),
        }
    }

    /// Build an error response with a `{"error": ...}` body.
    pub fn error_reply(&self, status: StatusCode, message: impl std::fmt::Display) -> Self {
        let body = serde_json::json!({ "error": message.to_string() });
        self.reply(status, body.to_string().into_bytes())
    }

    /// Deserialize the body as JSON.
    pub fn json<'a, T: serde::Deserialize<'a>>(&'a self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}
