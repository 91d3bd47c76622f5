use std::{fmt, io};

use rocket::{
    data::{ByteUnit, FromData, Outcome},
    http::{ContentType, HeaderMap, Status},
    response::{self, Responder},
    serde::json::Json,
    Data, Request, Response, State,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, trace, warn};

mod events;
pub use events::*;

mod signing;
pub use signing::{validate_signature, SignatureError, SignatureScheme};

use crate::checks::CommitCheckDispatcher;

const CONTENT_TYPE: &str = "Content-Type";
const JSON: &str = "application/json";
const X_GITHUB_EVENT: &str = "X-GitHub-Event";
/// Rocket limit name for the webhook body, e.g. `ROCKET_LIMITS={github-webhook="5MiB"}`.
pub const LIMIT_NAME: &str = "github-webhook";
/// GitHub caps deliveries at 25 MB, anything bigger never comes from it.
const LIMIT: ByteUnit = ByteUnit::Mebibyte(25);

/// Secret shared with GitHub, used to sign every webhook delivery.
pub struct GitHubSecret(Vec<u8>);

impl GitHubSecret {
    /// An empty secret would still produce valid-looking signatures, so it's refused outright.
    pub fn new(secret: impl Into<Vec<u8>>) -> Option<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            None
        } else {
            Some(Self(secret))
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for GitHubSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("GitHubSecret(..)")
    }
}

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("unsupported content type, must be application/json")]
    UnsupportedContentType,
    #[error("missing or empty X-GitHub-Event header")]
    MissingEvent,
    #[error("missing or unprefixed {0} header")]
    MissingSignature(&'static str),
    #[error("unable to read request content: {0}")]
    BodyUnreadable(#[source] io::Error),
    #[error("payload exceeds the {0} limit")]
    PayloadTooLarge(ByteUnit),
    #[error("bad signature")]
    BadSignature(#[source] SignatureError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("webhook secret isn't configured")]
    SecretUnavailable,
}

impl IntakeError {
    pub fn status(&self) -> Status {
        match self {
            Self::UnsupportedContentType => Status::UnsupportedMediaType,
            Self::MissingEvent | Self::Decode(_) => Status::BadRequest,
            Self::MissingSignature(_) | Self::BadSignature(_) => Status::Unauthorized,
            Self::PayloadTooLarge(_) => Status::PayloadTooLarge,
            Self::BodyUnreadable(_) | Self::SecretUnavailable => Status::InternalServerError,
        }
    }

    fn title(&self) -> &'static str {
        match self {
            Self::UnsupportedContentType => "Unsupported content type",
            Self::MissingEvent => "Missing event header",
            Self::MissingSignature(_) => "Missing signature",
            Self::BodyUnreadable(_) => "Request body unreadable",
            Self::PayloadTooLarge(_) => "Payload too large",
            Self::BadSignature(_) => "Bad signature",
            Self::Decode(DecodeError::UnsupportedEvent(_)) => "Unsupported event",
            Self::Decode(DecodeError::Malformed { .. }) => "Failed to decode payload",
            Self::SecretUnavailable => "Internal server error",
        }
    }

    fn fail<'r, T>(self) -> Outcome<'r, T, Self> {
        Outcome::Error((self.status(), self))
    }
}

/// Problem details body sent back on every rejected delivery.
#[derive(Debug, Serialize)]
struct Problem {
    title: &'static str,
    status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

impl<'r> Responder<'r, 'static> for IntakeError {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        let problem = Problem {
            title: self.title(),
            status: status.code,
            // internal failures don't need to be explained to the caller
            detail: (status.code < 500).then(|| self.to_string()),
        };

        Response::build_from(Json(problem).respond_to(request)?)
            .status(status)
            .header(ContentType::new("application", "problem+json"))
            .ok()
    }
}

/// Headers of a delivery that passed the checks done before its body is read.
#[derive(Debug, PartialEq, Eq)]
pub struct WebhookHeaders {
    pub event_type: String,
    pub scheme: SignatureScheme,
    pub signature: String,
}

impl WebhookHeaders {
    pub fn extract(headers: &HeaderMap<'_>) -> Result<Self, IntakeError> {
        if headers.get_one(CONTENT_TYPE) != Some(JSON) {
            trace!(
                "content type `{:?}` wasn't json, stopping here...",
                headers.get_one(CONTENT_TYPE)
            );
            return Err(IntakeError::UnsupportedContentType);
        }

        let event_type = match headers.get_one(X_GITHUB_EVENT) {
            Some(event_type) if !event_type.is_empty() => event_type.to_owned(),
            _ => {
                trace!("couldn't locate {} header", X_GITHUB_EVENT);
                return Err(IntakeError::MissingEvent);
            }
        };

        // the SHA-256 signature is preferred whenever GitHub sends it
        let scheme = if headers.contains(SignatureScheme::Sha256.header()) {
            SignatureScheme::Sha256
        } else {
            SignatureScheme::Sha1
        };
        let signature = match headers.get_one(scheme.header()) {
            Some(signature) if signature.starts_with(scheme.prefix()) => signature.to_owned(),
            _ => {
                trace!("couldn't locate a prefixed {} header", scheme.header());
                return Err(IntakeError::MissingSignature(scheme.header()));
            }
        };

        Ok(Self {
            event_type,
            scheme,
            signature,
        })
    }
}

/// A fully read delivery, consumed once by [`WebhookRequest::authenticate`].
#[derive(Debug)]
pub struct WebhookRequest {
    pub headers: WebhookHeaders,
    pub body: Vec<u8>,
}

impl WebhookRequest {
    /// Verifies the signature, and only then looks at the body.
    pub fn authenticate(self, secret: &GitHubSecret) -> Result<GitHubEvent, IntakeError> {
        validate_signature(
            self.headers.scheme,
            secret.as_bytes(),
            &self.headers.signature,
            &self.body,
        )
        .map_err(IntakeError::BadSignature)?;
        trace!("validated GitHub payload");

        Ok(GitHubEvent::decode(&self.headers.event_type, &self.body)?)
    }
}

pub struct SignedGitHubEvent(pub GitHubEvent);

#[rocket::async_trait]
impl<'r> FromData<'r> for SignedGitHubEvent {
    type Error = IntakeError;

    async fn from_data(request: &'r Request<'_>, data: Data<'r>) -> Outcome<'r, Self> {
        trace!("received payload on GitHub webhook endpoint: {:?}", request);

        let headers = match WebhookHeaders::extract(request.headers()) {
            Ok(headers) => headers,
            Err(e) => return e.fail(),
        };

        let size_limit = request.limits().get(LIMIT_NAME).unwrap_or(LIMIT);
        let body = match data.open(size_limit).into_bytes().await {
            Ok(bytes) if bytes.is_complete() => bytes.into_inner(),
            Ok(_) => {
                trace!("payload was too big");
                return IntakeError::PayloadTooLarge(size_limit).fail();
            }
            Err(e) => return IntakeError::BodyUnreadable(e).fail(),
        };

        let secret = match request.rocket().state::<GitHubSecret>() {
            Some(secret) => secret,
            None => return IntakeError::SecretUnavailable.fail(),
        };

        match (WebhookRequest { headers, body }).authenticate(secret) {
            Ok(event) => Outcome::Success(SignedGitHubEvent(event)),
            Err(e) => e.fail(),
        }
    }
}

#[rocket::post("/push", data = "<event>")]
pub fn github_webhook(
    event: Result<SignedGitHubEvent, IntakeError>,
    dispatcher: &State<CommitCheckDispatcher>,
) -> Result<(), IntakeError> {
    let SignedGitHubEvent(event) = event.map_err(|e| {
        warn!("rejected GitHub webhook: {}", e);
        e
    })?;

    match event {
        GitHubEvent::Ping(ping) => info!(
            "received ping for hook {:?} on `{}` (#{}): {}",
            ping.hook_id,
            ping.repository.full_name,
            ping.repository.id,
            ping.zen.as_deref().unwrap_or_default()
        ),
        GitHubEvent::Push(push) => {
            info!(
                "received push of {} commits to {} on `{}` by {}",
                push.commits.len(),
                push.r#ref,
                push.repository.full_name,
                push.pusher.display_name()
            );
            // checks run detached, their outcome never reaches the caller
            dispatcher.dispatch_checks(&push.repository.full_name, &push.commits);
        }
    }

    Ok(())
}
