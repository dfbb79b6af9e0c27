use std::future::Future;
use std::pin::Pin;

use snafu::Snafu;
use tokio::sync::mpsc;

use super::persona::Persona;

/// Identifier for one streaming generation session.
///
/// A fresh value is allocated on every submit so events from an earlier turn can be rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamSessionId(pub u64);

impl StreamSessionId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Speaker role as seen by the generation service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub provider_id: String,
    pub api_key: String,
    pub endpoint: String,
    pub model_id: String,
}

impl ProviderConfig {
    pub fn new(
        provider_id: impl Into<String>,
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        model_id: impl Into<String>,
    ) -> Self {
        Self {
            provider_id: provider_id.into().trim().to_string(),
            api_key: api_key.into().trim().to_string(),
            endpoint: endpoint.into().trim().to_string(),
            model_id: model_id.into().trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderMessage {
    pub role: Role,
    pub content: String,
}

impl ProviderMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// One generation request. The last message is the prompt, earlier ones are prior turns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub session_id: StreamSessionId,
    pub messages: Vec<ProviderMessage>,
}

impl StreamRequest {
    pub fn new(session_id: StreamSessionId, messages: Vec<ProviderMessage>) -> Self {
        Self {
            session_id,
            messages,
        }
    }

    pub fn prompt(&self) -> Option<&str> {
        self.messages
            .last()
            .map(|message| message.content.as_str())
    }
}

/// Provider-agnostic stream payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEventPayload {
    /// A non-empty text fragment, in service order.
    Delta(String),
    Done,
    /// The stream failed; fragments already delivered stay valid.
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEvent {
    pub session_id: StreamSessionId,
    pub payload: StreamEventPayload,
}

impl StreamEvent {
    pub fn delta(session_id: StreamSessionId, text: impl Into<String>) -> Self {
        Self {
            session_id,
            payload: StreamEventPayload::Delta(text.into()),
        }
    }

    pub fn done(session_id: StreamSessionId) -> Self {
        Self {
            session_id,
            payload: StreamEventPayload::Done,
        }
    }

    pub fn error(session_id: StreamSessionId, message: impl Into<String>) -> Self {
        Self {
            session_id,
            payload: StreamEventPayload::Error(message.into()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.payload,
            StreamEventPayload::Done | StreamEventPayload::Error(_)
        )
    }
}

pub type ProviderWorker = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ProviderError {
    #[snafu(display("missing API key for provider '{provider_id}'"))]
    MissingApiKey {
        stage: &'static str,
        provider_id: String,
    },
    #[snafu(display("provider '{provider_id}' is not supported"))]
    UnsupportedProvider {
        stage: &'static str,
        provider_id: String,
    },
    #[snafu(display("persona configuration is invalid: {details}"))]
    InvalidPersona {
        stage: &'static str,
        details: String,
    },
    #[snafu(display("stream request for {session_id:?} has no messages"))]
    EmptyMessageSet {
        stage: &'static str,
        session_id: StreamSessionId,
    },
    #[snafu(display("http client failed on `{stage}`, {source}"))]
    HttpClient {
        stage: &'static str,
        source: rig::http_client::Error,
    },
    #[snafu(display("completions failed on `{stage}`, {source}"))]
    CompletionsFailed {
        stage: &'static str,
        source: rig::completion::CompletionError,
    },
}

/// Receiving half of one generation. Finite and not restartable.
pub struct ProviderEventStream {
    session_id: StreamSessionId,
    events: mpsc::UnboundedReceiver<StreamEvent>,
}

pub struct ProviderStreamHandle {
    pub stream: ProviderEventStream,
    pub worker: ProviderWorker,
}

impl ProviderEventStream {
    pub(crate) fn new(
        session_id: StreamSessionId,
        events: mpsc::UnboundedReceiver<StreamEvent>,
    ) -> Self {
        Self { session_id, events }
    }

    /// Builds an already-closed stream that yields a single failure.
    ///
    /// Lets callers route a request that could not be started through the same path as a
    /// stream that failed mid-flight.
    pub fn failed(session_id: StreamSessionId, message: impl Into<String>) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let _ = event_tx.send(StreamEvent::error(session_id, message));
        Self::new(session_id, event_rx)
    }

    pub fn session_id(&self) -> StreamSessionId {
        self.session_id
    }

    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }
}

pub trait LlmProvider: Send + Sync {
    fn id(&self) -> &str;
    fn model_id(&self) -> &str;
    fn persona(&self) -> &Persona;
    fn stream_chat(&self, request: StreamRequest) -> ProviderResult<ProviderStreamHandle>;
}

pub(crate) fn make_event_stream(
    session_id: StreamSessionId,
) -> (mpsc::UnboundedSender<StreamEvent>, ProviderEventStream) {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    (event_tx, ProviderEventStream::new(session_id, event_rx))
}
