//! Display sequence.
//!
//! The ordered list of chat messages the session controller maintains, and
//! the `ChatUpdate` feed a UI consumes to mirror it.

use chrono::{DateTime, Utc};

/// Identifier of a message in a `Conversation`. Monotonic per conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u64);

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Agent,
}

/// What a message represents in the session that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// The submitted query
    Query,
    /// The running progress transcript (mutable while streaming)
    Progress,
    /// A final answer
    Answer,
    /// A user-facing failure notice
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: MessageId,
    pub sender: Sender,
    pub kind: MessageKind,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

/// Incremental change to the display, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatUpdate {
    /// Persistent connection opened
    Connected,
    /// Persistent connection closed by the remote side or by failure
    Disconnected,
    /// One raw progress fragment, before accumulation
    Thinking(String),
    /// A message was appended
    Added(ChatMessage),
    /// A message's text was replaced
    Updated { id: MessageId, text: String },
    /// A message was removed
    Removed(MessageId),
    /// The agent is (or is no longer) working on a query
    Busy(bool),
}

/// Ordered chat messages.
#[derive(Debug, Default)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
    next_id: u64,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message and return a copy of it.
    pub fn push(&mut self, sender: Sender, kind: MessageKind, text: impl Into<String>) -> ChatMessage {
        self.next_id += 1;
        let message = ChatMessage {
            id: MessageId(self.next_id),
            sender,
            kind,
            text: text.into(),
            sent_at: Utc::now(),
        };
        self.messages.push(message.clone());
        message
    }

    /// Replace a message's text. Returns false if the id is unknown.
    pub fn update(&mut self, id: MessageId, text: impl Into<String>) -> bool {
        match self.messages.iter_mut().find(|m| m.id == id) {
            Some(message) => {
                message.text = text.into();
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: MessageId) -> Option<ChatMessage> {
        let index = self.messages.iter().position(|m| m.id == id)?;
        Some(self.messages.remove(index))
    }

    pub fn get(&self, id: MessageId) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn count_kind(&self, kind: MessageKind) -> usize {
        self.messages.iter().filter(|m| m.kind == kind).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_monotonic() {
        let mut conversation = Conversation::new();
        let a = conversation.push(Sender::User, MessageKind::Query, "one");
        let b = conversation.push(Sender::Agent, MessageKind::Answer, "two");
        assert!(b.id > a.id);
        assert_eq!(conversation.len(), 2);
    }

    #[test]
    fn test_update_and_remove() {
        let mut conversation = Conversation::new();
        let progress = conversation.push(Sender::Agent, MessageKind::Progress, "step 1");

        assert!(conversation.update(progress.id, "step 1\nstep 2"));
        assert_eq!(conversation.get(progress.id).unwrap().text, "step 1\nstep 2");

        let removed = conversation.remove(progress.id).unwrap();
        assert_eq!(removed.kind, MessageKind::Progress);
        assert!(conversation.is_empty());
        assert!(!conversation.update(progress.id, "gone"));
        assert!(conversation.remove(progress.id).is_none());
    }

    #[test]
    fn test_ids_not_reused_after_remove() {
        let mut conversation = Conversation::new();
        let first = conversation.push(Sender::Agent, MessageKind::Progress, "x");
        conversation.remove(first.id);
        let second = conversation.push(Sender::Agent, MessageKind::Answer, "y");
        assert_ne!(first.id, second.id);
    }
}
