use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

/// An option's unique ID within a poll (`opt_1`, `opt_2`, ...).
pub type OptionId = String;

/// A voter's external identifier (national ID, employee number, ...).
/// Caller-supplied, never generated by us.
pub type VoterId = String;

/// States in the poll lifecycle.
///
/// Transitions are admin-only and monotonic: `Draft -> Active -> Closed`.
/// `Closed` is terminal.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PollState {
    /// Under construction, only visible to its admin.
    Draft,
    /// Accepting votes.
    Active,
    /// Finished; results are available.
    Closed,
}

impl From<PollState> for Bson {
    fn from(state: PollState) -> Self {
        to_bson(&state).expect("Serialisation is infallible")
    }
}

/// How many options a ballot may select.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PollKind {
    /// Exactly one option per ballot.
    Single,
    /// Between 1 and `max_selections` options per ballot.
    Multi { max_selections: u32 },
}

impl PollKind {
    /// The most options a single ballot may carry.
    pub fn max_selections(&self) -> u32 {
        match self {
            Self::Single => 1,
            Self::Multi { max_selections } => *max_selections,
        }
    }
}
