use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{common::poll::OptionId, mongodb::Id};

/// An anonymous ballot.
///
/// This record deliberately carries no voter identifier: it is disjoint from
/// [`PollVoterEntry`](crate::model::db::entry::PollVoterEntry), so the vote
/// collection alone cannot reveal who cast what.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCore {
    pub poll_id: Id,
    /// The chosen option IDs.
    pub selections: Vec<OptionId>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl VoteCore {
    pub fn new(poll_id: Id, selections: Vec<OptionId>) -> Self {
        Self {
            poll_id,
            selections,
            created_at: Utc::now(),
        }
    }
}

/// A vote without an ID.
pub type NewVote = VoteCore;

/// A vote from the database, with its unique ID.
#[derive(Debug, Serialize, Deserialize)]
pub struct Vote {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub vote: VoteCore,
}

impl Deref for Vote {
    type Target = VoteCore;

    fn deref(&self) -> &Self::Target {
        &self.vote
    }
}
