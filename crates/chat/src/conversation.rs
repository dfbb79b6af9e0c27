use std::sync::Arc;

use samvad_llm::{
    LlmProvider, ProviderEventStream, ProviderMessage, Role as ProviderRole, StreamEvent,
    StreamEventPayload, StreamRequest, StreamSessionId,
};

use crate::message::{Message, MessageId, MessageStatus, Role, Transcript};
use crate::state::{StreamState, StreamTransition};

/// Why a submit did not start a turn. Either way the conversation is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitRejected {
    /// The prompt was empty or whitespace only.
    EmptyPrompt,
    /// A stream is already in flight.
    Busy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Completed {
        model_message_id: MessageId,
    },
    Failed {
        model_message_id: MessageId,
        reason: String,
    },
    Ignored(SubmitRejected),
}

/// A turn that has been opened but whose events have not been consumed yet.
pub struct PendingTurn {
    pub session_id: StreamSessionId,
    pub user_message_id: MessageId,
    pub model_message_id: MessageId,
    pub events: ProviderEventStream,
}

#[derive(Debug, Clone, Copy)]
struct ActiveStream {
    session_id: StreamSessionId,
    model_message_id: MessageId,
}

/// Single-session conversation state machine.
///
/// Owns the transcript and the stream lifecycle. The provider is injected at construction
/// and already carries the persona, so a conversation cannot exist without a usable client.
pub struct Conversation {
    provider: Arc<dyn LlmProvider>,
    transcript: Transcript,
    stream_state: StreamState,
    active_stream: Option<ActiveStream>,
    next_stream_session_id: u64,
}

impl Conversation {
    /// Starts a session seeded with the persona's greeting.
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        let greeting = provider.persona().greeting.clone();
        Self::with_greeting(provider, greeting)
    }

    pub fn with_greeting(provider: Arc<dyn LlmProvider>, greeting: impl Into<String>) -> Self {
        Self {
            provider,
            transcript: Transcript::seeded(greeting),
            stream_state: StreamState::Idle,
            active_stream: None,
            next_stream_session_id: 1,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn messages(&self) -> &[Message] {
        self.transcript.messages()
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.transcript.last()
    }

    pub fn stream_state(&self) -> &StreamState {
        &self.stream_state
    }

    pub fn is_loading(&self) -> bool {
        self.stream_state.is_loading()
    }

    pub fn error(&self) -> Option<&str> {
        self.stream_state.error()
    }

    /// The placeholder currently being filled, if a stream is in flight.
    pub fn pending_message_id(&self) -> Option<MessageId> {
        self.active_stream
            .map(|active_stream| active_stream.model_message_id)
    }

    /// Runs one whole turn: opens it, folds every event, and reports how it ended.
    ///
    /// `on_update` is called after each state change. Stream failures never escape; they end
    /// the turn in the errored state with an apology appended to the transcript.
    pub async fn submit<F>(&mut self, text: &str, mut on_update: F) -> SubmitOutcome
    where
        F: FnMut(&Self),
    {
        let mut turn = match self.begin_turn(text) {
            Ok(turn) => turn,
            Err(rejection) => return SubmitOutcome::Ignored(rejection),
        };
        on_update(self);

        while let Some(event) = turn.events.recv().await {
            let terminal = event.is_terminal();
            if self.apply_stream_event(event) {
                on_update(self);
            }
            if terminal {
                break;
            }
        }

        if self.handle_stream_closed(turn.session_id) {
            on_update(self);
        }

        match self
            .transcript
            .get(turn.model_message_id)
            .map(Message::status)
        {
            Some(MessageStatus::Failed(reason)) => SubmitOutcome::Failed {
                model_message_id: turn.model_message_id,
                reason: reason.clone(),
            },
            _ => SubmitOutcome::Completed {
                model_message_id: turn.model_message_id,
            },
        }
    }

    /// Opens a turn: appends the user message and an empty placeholder, then starts the
    /// provider request on the current tokio runtime.
    ///
    /// Rejected submits change nothing.
    pub fn begin_turn(&mut self, text: &str) -> Result<PendingTurn, SubmitRejected> {
        if text.trim().is_empty() {
            tracing::debug!("ignoring empty prompt");
            return Err(SubmitRejected::EmptyPrompt);
        }

        let session_id = StreamSessionId::new(self.next_stream_session_id);
        self.stream_state = self
            .stream_state
            .apply(StreamTransition::Start(session_id))
            .map_err(|rejection| {
                tracing::debug!(?rejection, "ignoring submit while a stream is in flight");
                SubmitRejected::Busy
            })?;
        self.next_stream_session_id = self.next_stream_session_id.saturating_add(1);

        let user_message_id = self.transcript.push_user(text);
        let request_messages = self.provider_history();
        let model_message_id = self.transcript.open_placeholder(session_id);

        self.active_stream = Some(ActiveStream {
            session_id,
            model_message_id,
        });

        tracing::info!(
            session_id = session_id.0,
            user_message_id = user_message_id.0,
            model_message_id = model_message_id.0,
            history_len = request_messages.len(),
            provider_id = %self.provider.id(),
            "starting stream"
        );

        let request = StreamRequest::new(session_id, request_messages);
        let events = match self.provider.stream_chat(request) {
            Ok(handle) => {
                // Detached: the worker stops on its own once the stream is dropped.
                tokio::spawn(handle.worker);
                handle.stream
            }
            Err(error) => {
                tracing::error!(
                    session_id = session_id.0,
                    error = %error,
                    "provider refused to open a stream"
                );
                ProviderEventStream::failed(session_id, error.to_string())
            }
        };

        Ok(PendingTurn {
            session_id,
            user_message_id,
            model_message_id,
            events,
        })
    }

    /// Folds one provider event into the conversation. Returns true when anything changed.
    ///
    /// Events that do not belong to the in-flight session are dropped.
    pub fn apply_stream_event(&mut self, event: StreamEvent) -> bool {
        let Some(active_stream) = self.current_stream(event.session_id) else {
            tracing::debug!(
                session_id = event.session_id.0,
                "dropping stale stream event"
            );
            return false;
        };

        match event.payload {
            StreamEventPayload::Delta(fragment) => {
                if fragment.is_empty() {
                    return false;
                }
                self.transcript
                    .append_fragment(active_stream.model_message_id, &fragment)
            }
            StreamEventPayload::Done => {
                self.finish_stream(active_stream);
                true
            }
            StreamEventPayload::Error(reason) => {
                self.fail_stream(active_stream, reason);
                true
            }
        }
    }

    /// Treats a stream that closed without a terminal event as failed.
    pub fn handle_stream_closed(&mut self, session_id: StreamSessionId) -> bool {
        let Some(active_stream) = self.current_stream(session_id) else {
            return false;
        };

        self.fail_stream(
            active_stream,
            "provider stream ended before a terminal event".to_string(),
        );
        true
    }

    fn current_stream(&self, session_id: StreamSessionId) -> Option<ActiveStream> {
        self.active_stream.filter(|active_stream| {
            active_stream.session_id == session_id
                && self.stream_state.accepts_stream_event(session_id)
        })
    }

    fn finish_stream(&mut self, active_stream: ActiveStream) {
        let text_len = self
            .transcript
            .get(active_stream.model_message_id)
            .map(|message| message.text().len())
            .unwrap_or_default();
        tracing::info!(
            session_id = active_stream.session_id.0,
            text_len,
            "stream completed"
        );

        self.finalize_stream(
            active_stream,
            MessageStatus::Done,
            StreamTransition::Complete(active_stream.session_id),
        );
    }

    fn fail_stream(&mut self, active_stream: ActiveStream, reason: String) {
        tracing::warn!(
            session_id = active_stream.session_id.0,
            reason = %reason,
            "stream failed"
        );

        let apology = self.provider.persona().apology.clone();
        self.finalize_stream(
            active_stream,
            MessageStatus::Failed(reason.clone()),
            StreamTransition::Fail {
                session_id: active_stream.session_id,
                message: apology.clone(),
            },
        );
        // The partial placeholder stays as it was; the apology is its own entry.
        self.transcript.push_failure(apology, reason);
    }

    fn finalize_stream(
        &mut self,
        active_stream: ActiveStream,
        final_status: MessageStatus,
        transition: StreamTransition,
    ) {
        match self.stream_state.apply(transition) {
            Ok(next_state) => self.stream_state = next_state,
            Err(rejection) => {
                tracing::error!(?rejection, "stream transition rejected during finalize");
            }
        }

        self.transcript
            .finish(active_stream.model_message_id, final_status);
        self.active_stream = None;
    }

    /// Completed, non-empty turns in order, ending with the newest user message.
    ///
    /// Each placeholder directly follows its prompt, so a prompt whose reply failed is
    /// dropped together with that reply.
    fn provider_history(&self) -> Vec<ProviderMessage> {
        let messages = self.transcript.messages();
        messages
            .iter()
            .enumerate()
            .filter(|(index, message)| match message.role() {
                Role::User => !messages.get(index + 1).is_some_and(Message::is_failed),
                Role::Model => matches!(message.status(), MessageStatus::Done),
            })
            .map(|(_, message)| message)
            .filter(|message| !message.text().trim().is_empty())
            .map(|message| {
                let role = match message.role() {
                    Role::User => ProviderRole::User,
                    Role::Model => ProviderRole::Assistant,
                };
                ProviderMessage::new(role, message.text())
            })
            .collect()
    }
}
