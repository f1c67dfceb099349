//! The append-only message log behind the chat surface.
//!
//! Only the authority appends; requests arrive from any participant and the
//! per-sender ordering at the authority decides the log's final order. The
//! first message from a participant whose display name is not yet set is a
//! name registration, not a chat line.

use shiv_replication::{
    ListEvent, ParticipantId, Principal, ReplicatedList, SubscriptionId, VarPermission,
};

use crate::scoreboard::Scoreboard;

// ---------------------------------------------------------------------------
// MessageLog
// ---------------------------------------------------------------------------

/// The replicated chat log. Entries are immutable once added.
pub struct MessageLog {
    messages: ReplicatedList<String>,
}

impl MessageLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self {
            messages: ReplicatedList::new(VarPermission::authority_to_everyone()),
        }
    }

    /// Number of lines.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The line at `index`.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.messages.get(index).map(String::as_str)
    }

    /// Iterates over lines in log order.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.messages.iter().map(String::as_str)
    }

    /// The whole backlog, cloned for a Welcome snapshot.
    pub fn backlog(&self) -> Vec<String> {
        self.messages.iter().cloned().collect()
    }

    /// Registers a change callback.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&ListEvent) + 'static,
    {
        self.messages.subscribe(callback)
    }
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// submit_chat
// ---------------------------------------------------------------------------

/// What the authority did with a chat submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatOutcome {
    /// The sender had no registered name; the text became their name.
    NameRegistered,
    /// A chat line was appended.
    Appended {
        /// The rendered line, name prefix included.
        line: String,
    },
    /// Blank or whitespace-only submission; nothing happened.
    Ignored,
}

/// Applies one chat submission on the authority.
///
/// Missing scoreboard entries are created on the fly (a message can race a
/// connect); their first message still registers the name.
pub fn submit_chat(
    log: &mut MessageLog,
    scoreboard: &mut Scoreboard,
    sender: ParticipantId,
    text: &str,
) -> ChatOutcome {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return ChatOutcome::Ignored;
    }

    let name_set = scoreboard
        .entry(sender)
        .is_some_and(|entry| entry.name_set);
    if !name_set {
        scoreboard.set_name(sender, trimmed.to_string());
        return ChatOutcome::NameRegistered;
    }

    let name = scoreboard
        .entry(sender)
        .map(|entry| entry.name.clone())
        .unwrap_or_else(|| format!("User{}", sender.0));
    let line = format!("{name}: {trimmed}");
    // Authority principal; the append cannot be denied.
    let _ = log.messages.push(line.clone(), Principal::Authority);
    ChatOutcome::Appended { line }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_message_registers_name_without_a_line() {
        let mut log = MessageLog::new();
        let mut board = Scoreboard::new();
        let id = ParticipantId(7);
        board.on_connect(id);
        assert_eq!(board.entry(id).unwrap().name, "User7");

        let outcome = submit_chat(&mut log, &mut board, id, "Alice");
        assert_eq!(outcome, ChatOutcome::NameRegistered);
        assert!(log.is_empty());
        let entry = board.entry(id).unwrap();
        assert_eq!(entry.name, "Alice");
        assert!(entry.name_set);

        // The second message is a real chat line.
        let outcome = submit_chat(&mut log, &mut board, id, "hello");
        assert_eq!(
            outcome,
            ChatOutcome::Appended {
                line: "Alice: hello".to_string()
            }
        );
        assert_eq!(log.len(), 1);
        assert_eq!(log.get(0), Some("Alice: hello"));
    }

    #[test]
    fn test_whitespace_submissions_are_ignored() {
        let mut log = MessageLog::new();
        let mut board = Scoreboard::new();
        let id = ParticipantId(1);
        board.on_connect(id);

        assert_eq!(submit_chat(&mut log, &mut board, id, "   "), ChatOutcome::Ignored);
        assert_eq!(submit_chat(&mut log, &mut board, id, ""), ChatOutcome::Ignored);
        assert!(log.is_empty());
        assert!(!board.entry(id).unwrap().name_set);
    }

    #[test]
    fn test_message_text_is_trimmed() {
        let mut log = MessageLog::new();
        let mut board = Scoreboard::new();
        let id = ParticipantId(2);
        board.on_connect(id);
        submit_chat(&mut log, &mut board, id, "  Bob  ");
        assert_eq!(board.entry(id).unwrap().name, "Bob");

        submit_chat(&mut log, &mut board, id, "  hi there  ");
        assert_eq!(log.get(0), Some("Bob: hi there"));
    }

    #[test]
    fn test_message_racing_connect_creates_the_entry() {
        let mut log = MessageLog::new();
        let mut board = Scoreboard::new();
        let id = ParticipantId(3);

        // No on_connect happened yet.
        let outcome = submit_chat(&mut log, &mut board, id, "Cleo");
        assert_eq!(outcome, ChatOutcome::NameRegistered);
        assert_eq!(board.entry(id).unwrap().name, "Cleo");
    }

    #[test]
    fn test_backlog_preserves_log_order() {
        let mut log = MessageLog::new();
        let mut board = Scoreboard::new();
        let id = ParticipantId(4);
        board.on_connect(id);
        submit_chat(&mut log, &mut board, id, "Dora");
        for text in ["one", "two", "three"] {
            submit_chat(&mut log, &mut board, id, text);
        }
        assert_eq!(
            log.backlog(),
            vec!["Dora: one", "Dora: two", "Dora: three"]
        );
    }
}
