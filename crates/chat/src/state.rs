use samvad_llm::StreamSessionId;

/// Stream lifecycle for the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StreamState {
    #[default]
    Idle,
    Awaiting(StreamSessionId),
    Errored {
        session_id: StreamSessionId,
        message: String,
    },
}

/// State transition input for stream lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamTransition {
    Start(StreamSessionId),
    Complete(StreamSessionId),
    Fail {
        session_id: StreamSessionId,
        message: String,
    },
}

/// Rejection reason for illegal stream transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamTransitionRejection {
    AlreadyStreaming {
        active: StreamSessionId,
        attempted: StreamSessionId,
    },
    NoActiveStream,
    SessionMismatch {
        active: StreamSessionId,
        attempted: StreamSessionId,
    },
}

pub type StreamTransitionResult = Result<StreamState, StreamTransitionRejection>;

impl StreamState {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Awaiting(_))
    }

    pub fn active_session(&self) -> Option<StreamSessionId> {
        match self {
            Self::Awaiting(session_id) => Some(*session_id),
            Self::Idle | Self::Errored { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Errored { message, .. } => Some(message),
            Self::Idle | Self::Awaiting(_) => None,
        }
    }

    /// Returns true when incoming stream data matches the active session.
    pub fn accepts_stream_event(&self, session_id: StreamSessionId) -> bool {
        matches!(self, Self::Awaiting(active) if *active == session_id)
    }

    /// Applies one transition deterministically.
    ///
    /// `Idle` and `Errored` may start a new session; starting clears any error. Terminal
    /// transitions must name the active session exactly.
    pub fn apply(&self, transition: StreamTransition) -> StreamTransitionResult {
        match transition {
            StreamTransition::Start(session_id) => self.apply_start(session_id),
            StreamTransition::Complete(session_id) => {
                self.apply_terminal(session_id, || Self::Idle)
            }
            StreamTransition::Fail {
                session_id,
                message,
            } => self.apply_terminal(session_id, || Self::Errored {
                session_id,
                message,
            }),
        }
    }

    fn apply_start(&self, session_id: StreamSessionId) -> StreamTransitionResult {
        match self {
            Self::Awaiting(active) => Err(StreamTransitionRejection::AlreadyStreaming {
                active: *active,
                attempted: session_id,
            }),
            Self::Idle | Self::Errored { .. } => Ok(Self::Awaiting(session_id)),
        }
    }

    fn apply_terminal(
        &self,
        session_id: StreamSessionId,
        next: impl FnOnce() -> Self,
    ) -> StreamTransitionResult {
        match self {
            Self::Awaiting(active) if *active == session_id => Ok(next()),
            Self::Awaiting(active) => Err(StreamTransitionRejection::SessionMismatch {
                active: *active,
                attempted: session_id,
            }),
            Self::Idle | Self::Errored { .. } => Err(StreamTransitionRejection::NoActiveStream),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIRST: StreamSessionId = StreamSessionId::new(1);
    const SECOND: StreamSessionId = StreamSessionId::new(2);

    #[test]
    fn idle_start_complete_cycle() {
        let awaiting = StreamState::Idle
            .apply(StreamTransition::Start(FIRST))
            .expect("start from idle");
        assert!(awaiting.is_loading());
        assert!(awaiting.accepts_stream_event(FIRST));
        assert!(!awaiting.accepts_stream_event(SECOND));

        let idle = awaiting
            .apply(StreamTransition::Complete(FIRST))
            .expect("complete active");
        assert_eq!(idle, StreamState::Idle);
        assert!(!idle.is_loading());
    }

    #[test]
    fn failure_sets_error_and_a_new_start_clears_it() {
        let errored = StreamState::Awaiting(FIRST)
            .apply(StreamTransition::Fail {
                session_id: FIRST,
                message: "sorry".to_string(),
            })
            .expect("fail active");
        assert_eq!(errored.error(), Some("sorry"));
        assert!(!errored.is_loading());

        let restarted = errored
            .apply(StreamTransition::Start(SECOND))
            .expect("start from errored");
        assert_eq!(restarted, StreamState::Awaiting(SECOND));
        assert_eq!(restarted.error(), None);
    }

    #[test]
    fn second_start_while_awaiting_is_rejected() {
        let result = StreamState::Awaiting(FIRST).apply(StreamTransition::Start(SECOND));

        assert_eq!(
            result,
            Err(StreamTransitionRejection::AlreadyStreaming {
                active: FIRST,
                attempted: SECOND,
            })
        );
    }

    #[test]
    fn terminal_transitions_require_the_active_session() {
        assert_eq!(
            StreamState::Awaiting(FIRST).apply(StreamTransition::Complete(SECOND)),
            Err(StreamTransitionRejection::SessionMismatch {
                active: FIRST,
                attempted: SECOND,
            })
        );
        assert_eq!(
            StreamState::Idle.apply(StreamTransition::Complete(FIRST)),
            Err(StreamTransitionRejection::NoActiveStream)
        );
        assert_eq!(StreamState::Idle.active_session(), None);
    }
}
