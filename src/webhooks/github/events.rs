use std::{fmt::Display, str::FromStr};

use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{Map, Value};
use thiserror::Error;

mod ping;
mod push;

pub use ping::*;
pub use push::*;

/// Event kinds this service accepts, as named by the `X-GitHub-Event` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitHubEventType {
    Ping,
    Push,
}

impl FromStr for GitHubEventType {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ping" => Ok(Self::Ping),
            "push" => Ok(Self::Push),
            other => Err(DecodeError::UnsupportedEvent(other.to_owned())),
        }
    }
}

impl Display for GitHubEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ping => f.write_str("ping"),
            Self::Push => f.write_str("push"),
        }
    }
}

#[derive(Debug)]
pub enum GitHubEvent {
    Ping(PingEvent),
    Push(PushEvent),
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unsupported event `{0}`, only `ping` and `push` are handled")]
    UnsupportedEvent(String),
    #[error("couldn't decode {event} payload: {source}")]
    Malformed {
        event: GitHubEventType,
        #[source]
        source: serde_json::Error,
    },
}

impl GitHubEvent {
    /// Decodes `body` into the variant named by `event_type`.
    ///
    /// The variant is only ever chosen from the header, the body shape is never used to guess it.
    pub fn decode(event_type: &str, body: &[u8]) -> Result<Self, DecodeError> {
        let event_type: GitHubEventType = event_type.parse()?;
        let malformed = |source| DecodeError::Malformed {
            event: event_type,
            source,
        };

        let event = match event_type {
            GitHubEventType::Ping => Self::Ping(decode_object(body).map_err(malformed)?),
            GitHubEventType::Push => Self::Push(decode_object(body).map_err(malformed)?),
        };

        Ok(event)
    }
}

/// Payloads are always JSON objects. Derived structs would otherwise also accept the array form.
fn decode_object<T: DeserializeOwned>(body: &[u8]) -> Result<T, serde_json::Error> {
    let object: Map<String, Value> = serde_json::from_slice(body)?;
    serde_json::from_value(Value::Object(object))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GitHubUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub login: Option<String>,
    #[allow(dead_code)]
    pub id: Option<u64>,
}

impl GitHubUser {
    /// Best human-readable handle available in the payload.
    pub fn display_name(&self) -> &str {
        self.login
            .as_deref()
            .or(self.name.as_deref())
            .or(self.email.as_deref())
            .unwrap_or("unknown")
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Repository {
    pub id: u64,
    #[allow(dead_code)]
    pub name: String,
    pub full_name: String,
}
