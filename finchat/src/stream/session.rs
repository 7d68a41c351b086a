//! Query Session
//!
//! Single responsibility: The state of one submitted query.
//!
//! # Phases
//!
//! ```text
//!            ┌──────────┐  send ok   ┌───────────┐  FinalAnswer  ┌──────────┐
//! submit ──► │ Sending  │ ─────────► │ Streaming │ ────────────► │ Answered │
//!            └──────────┘            └───────────┘               └──────────┘
//!                 │ not connected /       │ Error                ┌──────────┐
//!                 │ send failed           └────────────────────► │  Failed  │
//!                 ▼                                              └──────────┘
//!          ┌─────────────────┐   call ok → Answered                   ▲
//!          │ FallbackPending │ ───────────────────────────────────────┘
//!          └─────────────────┘   call failed → Failed
//! ```
//!
//! `Idle` is the absence of a session; the controller drops the previous
//! session whenever a new query is submitted.

use uuid::Uuid;

use crate::conversation::MessageId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Sending,
    Streaming,
    FallbackPending,
    Answered,
    Failed,
}

impl SessionPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionPhase::Answered | SessionPhase::Failed)
    }
}

/// One query and the progress accumulated for it.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    query: String,
    phase: SessionPhase,
    transcript: String,
    fragments: usize,
    progress_message: Option<MessageId>,
}

impl Session {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            query: query.into(),
            phase: SessionPhase::Sending,
            transcript: String::new(),
            fragments: 0,
            progress_message: None,
        }
    }

    /// Correlation id for logs.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Every fragment so far, newline-joined.
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments
    }

    /// The display message holding the transcript, once created.
    pub fn progress_message(&self) -> Option<MessageId> {
        self.progress_message
    }

    pub(crate) fn set_progress_message(&mut self, id: MessageId) {
        self.progress_message = Some(id);
    }

    /// Append a progress fragment. Ignored unless streaming.
    ///
    /// Returns the full transcript after the append.
    pub(crate) fn accumulate(&mut self, fragment: &str) -> Option<&str> {
        if self.phase != SessionPhase::Streaming {
            return None;
        }
        if self.fragments > 0 {
            self.transcript.push('\n');
        }
        self.transcript.push_str(fragment);
        self.fragments += 1;
        Some(&self.transcript)
    }

    pub(crate) fn begin_streaming(&mut self) {
        self.phase = SessionPhase::Streaming;
    }

    pub(crate) fn begin_fallback(&mut self) {
        self.phase = SessionPhase::FallbackPending;
    }

    /// Enter `Answered` and clear accumulated progress.
    pub(crate) fn finish_answered(&mut self) {
        self.phase = SessionPhase::Answered;
        self.transcript.clear();
        self.fragments = 0;
        self.progress_message = None;
    }

    /// Enter `Failed`. The progress message, if any, stays where it is.
    pub(crate) fn finish_failed(&mut self) {
        self.phase = SessionPhase::Failed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_sending() {
        let session = Session::new("AAPL price?");
        assert_eq!(session.phase(), SessionPhase::Sending);
        assert_eq!(session.query(), "AAPL price?");
        assert!(session.progress_message().is_none());
        assert!(!session.is_terminal());
    }

    #[test]
    fn test_accumulate_joins_with_newline() {
        let mut session = Session::new("q");
        session.begin_streaming();

        assert_eq!(session.accumulate("looking up ticker"), Some("looking up ticker"));
        assert_eq!(
            session.accumulate("fetching quote"),
            Some("looking up ticker\nfetching quote")
        );
        assert_eq!(session.fragment_count(), 2);
    }

    #[test]
    fn test_empty_fragment_still_counts() {
        let mut session = Session::new("q");
        session.begin_streaming();
        session.accumulate("");
        assert_eq!(session.accumulate("next"), Some("\nnext"));
    }

    #[test]
    fn test_no_accumulation_outside_streaming() {
        let mut session = Session::new("q");
        assert_eq!(session.accumulate("early"), None);

        session.begin_streaming();
        session.accumulate("step");
        session.finish_answered();
        assert_eq!(session.accumulate("late"), None);
        assert_eq!(session.transcript(), "");
        assert!(session.is_terminal());
    }

    #[test]
    fn test_failed_keeps_progress_message() {
        let mut session = Session::new("q");
        session.begin_streaming();
        session.set_progress_message(MessageId(7));
        session.finish_failed();
        assert_eq!(session.progress_message(), Some(MessageId(7)));
        assert_eq!(session.phase(), SessionPhase::Failed);
    }
}
