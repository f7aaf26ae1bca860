use serde::{Deserialize, Serialize};

use crate::model::{
    common::poll::{OptionId, PollKind, VoterId},
    db::poll::{Poll, PollOption},
    mongodb::Id,
};

/// A ballot submitted by a voter.
#[derive(Debug, Serialize, Deserialize)]
pub struct CastBallot {
    pub voter_id: VoterId,
    pub selections: Vec<OptionId>,
}

/// What an anonymous voter gets to see of a poll: enough to render the
/// ballot, nothing about the electorate or the owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotPaper {
    pub poll_id: Id,
    pub question: String,
    pub options: Vec<PollOption>,
    #[serde(flatten)]
    pub kind: PollKind,
}

impl From<Poll> for BallotPaper {
    fn from(poll: Poll) -> Self {
        Self {
            poll_id: poll.id,
            question: poll.poll.question,
            options: poll.poll.options,
            kind: poll.poll.kind,
        }
    }
}
