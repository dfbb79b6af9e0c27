//! In-process provider that replays canned turns. Only built for tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::persona::Persona;
use super::provider::{
    LlmProvider, ProviderResult, ProviderStreamHandle, ProviderWorker, StreamEvent,
    StreamRequest, make_event_stream,
};

/// One step of a scripted turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    Fragment(String),
    Fail(String),
    /// Close the stream without a terminal event.
    Hangup,
}

pub struct ScriptedProvider {
    persona: Persona,
    turns: Mutex<VecDeque<Vec<ScriptStep>>>,
    requests: Arc<Mutex<Vec<StreamRequest>>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            persona: Persona::default(),
            turns: Mutex::new(VecDeque::new()),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queues a turn that streams `fragments` and then completes.
    pub fn push_fragments<I, S>(&self, fragments: I) -> &Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let steps = fragments
            .into_iter()
            .map(|fragment| ScriptStep::Fragment(fragment.into()))
            .collect();
        self.push_turn(steps)
    }

    pub fn push_turn(&self, steps: Vec<ScriptStep>) -> &Self {
        self.lock_turns().push_back(steps);
        self
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<StreamRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn lock_turns(&self) -> std::sync::MutexGuard<'_, VecDeque<Vec<ScriptStep>>> {
        self.turns
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl LlmProvider for ScriptedProvider {
    fn id(&self) -> &str {
        "scripted"
    }

    fn model_id(&self) -> &str {
        "scripted-model"
    }

    fn persona(&self) -> &Persona {
        &self.persona
    }

    fn stream_chat(&self, request: StreamRequest) -> ProviderResult<ProviderStreamHandle> {
        let session_id = request.session_id;
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request);

        // An unscripted turn behaves like an empty, successful generation.
        let steps = self.lock_turns().pop_front().unwrap_or_default();
        let (event_tx, stream) = make_event_stream(session_id);

        let worker: ProviderWorker = Box::pin(async move {
            for step in steps {
                tokio::task::yield_now().await;
                let event = match step {
                    ScriptStep::Fragment(text) => StreamEvent::delta(session_id, text),
                    ScriptStep::Fail(message) => {
                        let _ = event_tx.send(StreamEvent::error(session_id, message));
                        return;
                    }
                    ScriptStep::Hangup => return,
                };
                if event_tx.send(event).is_err() {
                    return;
                }
            }
            let _ = event_tx.send(StreamEvent::done(session_id));
        });

        Ok(ProviderStreamHandle { stream, worker })
    }
}
