use chrono::{DateTime, Utc};
use samvad_llm::StreamSessionId;

/// Stable identifier for one message, unique within a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u64);

impl MessageId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Chat speaker role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Model,
}

/// Lifecycle status for one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageStatus {
    Done,
    Streaming(StreamSessionId),
    Failed(String),
}

/// One transcript entry.
///
/// `id`, `role` and `timestamp` are fixed at creation. Text only grows, and only while the
/// message is streaming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    id: MessageId,
    role: Role,
    text: String,
    timestamp: DateTime<Utc>,
    status: MessageStatus,
}

impl Message {
    fn new(id: MessageId, role: Role, text: impl Into<String>, status: MessageStatus) -> Self {
        Self {
            id,
            role,
            text: text.into(),
            timestamp: Utc::now(),
            status,
        }
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn status(&self) -> &MessageStatus {
        &self.status
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.status, MessageStatus::Streaming(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, MessageStatus::Failed(_))
    }
}

/// Ordered conversation history. Insertion order is conversation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    messages: Vec<Message>,
    next_message_id: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            next_message_id: 1,
        }
    }

    /// Creates a transcript whose first entry is a completed model greeting.
    pub fn seeded(greeting: impl Into<String>) -> Self {
        let mut transcript = Self::new();
        transcript.push(Role::Model, greeting, MessageStatus::Done);
        transcript
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Newest entry, always the last one rendered.
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|message| message.id == id)
    }

    pub fn push_user(&mut self, text: impl Into<String>) -> MessageId {
        self.push(Role::User, text, MessageStatus::Done)
    }

    /// Opens an empty model message that fragments of `session_id` will fill.
    pub fn open_placeholder(&mut self, session_id: StreamSessionId) -> MessageId {
        self.push(Role::Model, String::new(), MessageStatus::Streaming(session_id))
    }

    pub fn push_failure(
        &mut self,
        text: impl Into<String>,
        reason: impl Into<String>,
    ) -> MessageId {
        self.push(Role::Model, text, MessageStatus::Failed(reason.into()))
    }

    /// Appends a fragment to a streaming message. Returns false when the message is missing
    /// or already frozen.
    pub fn append_fragment(&mut self, id: MessageId, fragment: &str) -> bool {
        match self.get_mut(id) {
            Some(message) if message.is_streaming() => {
                message.text.push_str(fragment);
                true
            }
            _ => false,
        }
    }

    /// Freezes a streaming message with its terminal status.
    pub fn finish(&mut self, id: MessageId, status: MessageStatus) -> bool {
        match self.get_mut(id) {
            Some(message) if message.is_streaming() => {
                message.status = status;
                true
            }
            _ => false,
        }
    }

    fn push(&mut self, role: Role, text: impl Into<String>, status: MessageStatus) -> MessageId {
        let id = self.alloc_message_id();
        self.messages.push(Message::new(id, role, text, status));
        id
    }

    fn get_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        self.messages.iter_mut().find(|message| message.id == id)
    }

    fn alloc_message_id(&mut self) -> MessageId {
        let id = MessageId::new(self.next_message_id);
        self.next_message_id = self.next_message_id.saturating_add(1);
        id
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_even_within_one_clock_tick() {
        let mut transcript = Transcript::seeded("hello");
        let ids = (0..1_000)
            .map(|index| transcript.push_user(format!("message {index}")))
            .collect::<Vec<_>>();

        let mut unique = ids.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), ids.len());
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(!ids.contains(&transcript.messages()[0].id()));
    }

    #[test]
    fn seeded_transcript_starts_with_a_finished_model_message() {
        let transcript = Transcript::seeded("ॐ नमः शिवाय");
        let greeting = transcript.last().expect("greeting");

        assert_eq!(transcript.len(), 1);
        assert_eq!(greeting.role(), Role::Model);
        assert_eq!(greeting.status(), &MessageStatus::Done);
        assert_eq!(greeting.text(), "ॐ नमः शिवाय");
    }

    #[test]
    fn fragments_only_reach_streaming_messages() {
        let session_id = StreamSessionId::new(1);
        let mut transcript = Transcript::new();
        let user_id = transcript.push_user("question");
        let placeholder_id = transcript.open_placeholder(session_id);
        let opened_at = transcript.get(placeholder_id).expect("placeholder").timestamp();

        assert!(!transcript.append_fragment(user_id, "nope"));
        assert!(transcript.append_fragment(placeholder_id, "ab"));
        assert!(transcript.append_fragment(placeholder_id, "cd"));
        assert!(transcript.finish(placeholder_id, MessageStatus::Done));

        // Frozen after the stream ends.
        assert!(!transcript.append_fragment(placeholder_id, "ef"));
        assert!(!transcript.finish(placeholder_id, MessageStatus::Failed("late".to_string())));

        let placeholder = transcript.get(placeholder_id).expect("placeholder");
        assert_eq!(placeholder.text(), "abcd");
        assert_eq!(placeholder.role(), Role::Model);
        assert_eq!(placeholder.timestamp(), opened_at);
        assert_eq!(transcript.get(user_id).expect("user").text(), "question");
    }

    #[test]
    fn unknown_ids_are_ignored() {
        let mut transcript = Transcript::new();

        assert!(!transcript.append_fragment(MessageId::new(42), "x"));
        assert!(!transcript.finish(MessageId::new(42), MessageStatus::Done));
        assert!(transcript.is_empty());
    }
}
