//! The ordered, role-tagged context sent to the model.

use crate::provider::{Content, Message, Role};

/// Ordered list of transcript entries; insertion order is chronological order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    entries: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: Message) {
        self.entries.push(entry);
    }

    pub fn push_system(&mut self, content: impl Into<Content>) {
        self.push(Message::system(content));
    }

    pub fn push_user(&mut self, content: impl Into<Content>) {
        self.push(Message::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<Content>) {
        self.push(Message::assistant(content));
    }

    /// Keep only the last `max` entries, dropping the oldest first.
    ///
    /// Returns the number of entries removed.
    pub fn trim(&mut self, max: usize) -> usize {
        let excess = self.entries.len().saturating_sub(max);
        if excess > 0 {
            self.entries.drain(..excess);
        }
        excess
    }

    pub fn entries(&self) -> &[Message] {
        &self.entries
    }

    /// Entries with the given role, oldest first.
    pub fn by_role(&self, role: Role) -> impl Iterator<Item = &Message> {
        self.entries.iter().filter(move |m| m.role == role)
    }

    pub fn last(&self) -> Option<&Message> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
