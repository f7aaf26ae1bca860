use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    common::poll::{OptionId, PollKind, PollState},
    db::poll::{NewPoll, Poll, PollCore, PollOption},
    mongodb::Id,
};

/// A poll specification, as submitted by an admin.
#[derive(Debug, Serialize, Deserialize)]
pub struct PollSpec {
    pub question: String,
    /// Option texts in display order; IDs are assigned on creation.
    pub options: Vec<String>,
    #[serde(flatten)]
    pub kind: PollKind,
    /// The group to snapshot eligible voters from.
    pub group_id: Id,
    /// Create the poll already accepting votes instead of as a draft.
    #[serde(default)]
    pub active: bool,
}

impl PollSpec {
    /// Check the spec's internal invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.question.trim().is_empty() {
            return Err("poll question must not be empty".to_string());
        }
        if self.options.len() < 2 {
            return Err("a poll needs at least two options".to_string());
        }
        if let PollKind::Multi { max_selections } = self.kind {
            if max_selections <= 1 || max_selections as usize > self.options.len() {
                return Err(format!(
                    "max_selections must be between 2 and {}",
                    self.options.len()
                ));
            }
        }
        Ok(())
    }

    /// Convert this spec into a poll owned by the given admin, assigning
    /// stable option IDs.
    pub fn into_poll(self, admin_id: Id) -> NewPoll {
        let options = self
            .options
            .into_iter()
            .enumerate()
            .map(|(i, text)| PollOption {
                id: format!("opt_{}", i + 1),
                text,
            })
            .collect();
        PollCore {
            question: self.question,
            options,
            kind: self.kind,
            state: if self.active {
                PollState::Active
            } else {
                PollState::Draft
            },
            admin_id,
            group_id: self.group_id,
            created_at: Utc::now(),
        }
    }
}

/// A short poll listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSummary {
    pub id: Id,
    pub question: String,
    pub state: PollState,
    #[serde(flatten)]
    pub kind: PollKind,
    pub created_at: DateTime<Utc>,
}

impl From<Poll> for PollSummary {
    fn from(poll: Poll) -> Self {
        Self {
            id: poll.id,
            question: poll.poll.question,
            state: poll.poll.state,
            kind: poll.poll.kind,
            created_at: poll.poll.created_at,
        }
    }
}

/// A full poll description for the owning admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollDescription {
    pub id: Id,
    pub question: String,
    pub options: Vec<PollOption>,
    #[serde(flatten)]
    pub kind: PollKind,
    pub state: PollState,
    pub group_id: Id,
    pub created_at: DateTime<Utc>,
}

impl From<Poll> for PollDescription {
    fn from(poll: Poll) -> Self {
        Self {
            id: poll.id,
            question: poll.poll.question,
            options: poll.poll.options,
            kind: poll.poll.kind,
            state: poll.poll.state,
            group_id: poll.poll.group_id,
            created_at: poll.poll.created_at,
        }
    }
}

/// Vote count for one option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionTally {
    pub id: OptionId,
    pub text: String,
    pub votes: u64,
}

/// Tallied results of a closed poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollResults {
    pub poll_id: Id,
    pub question: String,
    /// Number of ballots cast.
    pub total_votes: u64,
    /// Enabled entries in the poll's snapshot.
    pub eligible_voters: u64,
    /// Entries whose slot was consumed.
    pub voters_turned_out: u64,
    pub options: Vec<OptionTally>,
}
