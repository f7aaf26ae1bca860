use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::{common::poll::VoterId, db::group::VoterRecord, mongodb::Id};

/// A single voter's eligibility slot for a single poll.
///
/// Entries are snapshotted from a [`VoterGroup`](crate::model::db::group::VoterGroup)
/// when the poll is created; later group edits do not touch them, with one
/// exception: toggling a voter's `enabled` flag propagates to active polls.
///
/// The `(poll_id, voter_id)` pair is unique (enforced by index), and
/// `has_voted` flips to `true` at most once, inside the same transaction
/// that inserts the anonymous vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollVoterEntryCore {
    pub poll_id: Id,
    pub voter_id: VoterId,
    pub enabled: bool,
    pub has_voted: bool,
}

impl PollVoterEntryCore {
    /// Snapshot a group voter into an entry for the given poll.
    pub fn for_poll(poll_id: Id, voter: &VoterRecord) -> Self {
        Self {
            poll_id,
            voter_id: voter.voter_id.clone(),
            enabled: voter.enabled,
            has_voted: false,
        }
    }
}

/// An entry without an ID.
pub type NewPollVoterEntry = PollVoterEntryCore;

/// An entry from the database, with its unique ID.
#[derive(Debug, Serialize, Deserialize)]
pub struct PollVoterEntry {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub entry: PollVoterEntryCore,
}

impl Deref for PollVoterEntry {
    type Target = PollVoterEntryCore;

    fn deref(&self) -> &Self::Target {
        &self.entry
    }
}

impl DerefMut for PollVoterEntry {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.entry
    }
}
