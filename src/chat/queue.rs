use std::collections::VecDeque;

use super::participant::{Gender, GenderFilter, ParticipantId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub participant: ParticipantId,
    pub gender: Gender,
    pub filter: GenderFilter,
}

impl Entry {
    /// Both sides have to accept each other.
    pub fn compatible_with(&self, other: &Entry) -> bool {
        self.participant != other.participant
            && self.filter.accepts(other.gender)
            && other.filter.accepts(self.gender)
    }
}

/// Participants waiting for a partner, oldest first.
#[derive(Debug, Default)]
pub struct MatchQueue {
    entries: VecDeque<Entry>,
}

impl MatchQueue {
    /// Appends `entry`, dropping any entry the participant already had.
    pub fn enqueue(&mut self, entry: Entry) {
        self.remove(entry.participant);
        self.entries.push_back(entry);
    }

    /// Removes and returns the oldest waiting entry compatible with `requester`.
    pub fn take_match(&mut self, requester: &Entry) -> Option<Entry> {
        let index = self
            .entries
            .iter()
            .position(|candidate| requester.compatible_with(candidate))?;
        self.entries.remove(index)
    }

    pub fn remove(&mut self, participant: ParticipantId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.participant != participant);
        self.entries.len() != before
    }

    pub fn contains(&self, participant: ParticipantId) -> bool {
        self.entries.iter().any(|e| e.participant == participant)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
