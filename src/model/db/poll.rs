use std::collections::HashSet;
use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{
    common::{
        ballot::BallotRejection,
        poll::{OptionId, PollKind, PollState},
    },
    mongodb::Id,
};

/// A single answer option. The ID is assigned at creation time and immutable
/// thereafter, since votes reference it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    pub id: OptionId,
    pub text: String,
}

/// Core poll data, as stored in the database.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollCore {
    /// The question put to the voters.
    pub question: String,
    /// Answer options, in display order.
    pub options: Vec<PollOption>,
    /// Single- or multi-choice.
    #[serde(flatten)]
    pub kind: PollKind,
    /// Lifecycle state.
    pub state: PollState,
    /// The admin that owns this poll.
    pub admin_id: Id,
    /// The group the voter snapshot was taken from.
    pub group_id: Id,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl PollCore {
    /// Look up an option by ID.
    pub fn option(&self, id: &str) -> Option<&PollOption> {
        self.options.iter().find(|option| option.id == id)
    }

    /// Check a ballot's selections against this poll's options and kind.
    ///
    /// Single-choice polls take exactly one option; multi-choice polls take
    /// between 1 and `max_selections` distinct options. Every selection must
    /// name an option of this poll.
    pub fn validate_selections(&self, selections: &[OptionId]) -> Result<(), BallotRejection> {
        match self.kind {
            PollKind::Single => {
                if selections.len() != 1 {
                    return Err(BallotRejection::invalid_selection(
                        "exactly one option must be selected",
                    ));
                }
            }
            PollKind::Multi { max_selections } => {
                if selections.is_empty() {
                    return Err(BallotRejection::invalid_selection(
                        "at least one option must be selected",
                    ));
                }
                if selections.len() > max_selections as usize {
                    return Err(BallotRejection::invalid_selection(format!(
                        "at most {max_selections} options may be selected"
                    )));
                }
            }
        }

        let mut seen = HashSet::new();
        for id in selections {
            if !seen.insert(id) {
                return Err(BallotRejection::invalid_selection(format!(
                    "option '{id}' selected more than once"
                )));
            }
            if self.option(id).is_none() {
                return Err(BallotRejection::invalid_selection(format!(
                    "no option '{id}' in this poll"
                )));
            }
        }
        Ok(())
    }
}

/// A poll without an ID.
pub type NewPoll = PollCore;

/// A poll from the database, with its unique ID.
#[derive(Debug, Serialize, Deserialize)]
pub struct Poll {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub poll: PollCore,
}

impl Deref for Poll {
    type Target = PollCore;

    fn deref(&self) -> &Self::Target {
        &self.poll
    }
}

impl DerefMut for Poll {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.poll
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn single() -> PollCore {
        PollCore::example_single(Id::new(), Id::new())
    }

    fn multi() -> PollCore {
        PollCore::example_multi(Id::new(), Id::new())
    }

    fn ids(selections: &[&str]) -> Vec<OptionId> {
        selections.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn single_choice_takes_exactly_one() {
        let poll = single();
        assert!(poll.validate_selections(&ids(&["opt_1"])).is_ok());
        assert!(poll.validate_selections(&ids(&[])).is_err());
        assert!(poll.validate_selections(&ids(&["opt_1", "opt_2"])).is_err());
    }

    #[test]
    fn multi_choice_respects_bounds() {
        let poll = multi();
        // max_selections = 2 over three options.
        assert!(poll.validate_selections(&ids(&["opt_1"])).is_ok());
        assert!(poll.validate_selections(&ids(&["opt_1", "opt_3"])).is_ok());
        assert!(poll.validate_selections(&ids(&[])).is_err());
        assert!(poll
            .validate_selections(&ids(&["opt_1", "opt_2", "opt_3"]))
            .is_err());
    }

    #[test]
    fn unknown_and_duplicate_options_are_rejected() {
        let poll = multi();
        assert!(poll.validate_selections(&ids(&["opt_9"])).is_err());
        assert!(poll.validate_selections(&ids(&["opt_1", "opt_1"])).is_err());
    }
}
