use rocket::http::Status;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The outcome of an eligibility check for a `(poll, voter)` pair.
///
/// This is a plain answer, not an error: every variant is a legitimate,
/// user-facing state of the world.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityStatus {
    /// The voter may cast a ballot right now.
    Eligible,
    /// The voter's slot is already consumed.
    AlreadyVoted,
    /// No matching entry, or the entry is disabled.
    NotEligible,
    /// The poll exists but is not accepting votes.
    PollNotActive,
    /// No such poll.
    PollNotFound,
}

/// Why a ballot was refused.
///
/// These are expected business outcomes, rendered to the voter as plain
/// messages; they are distinct from infrastructure failures, which are
/// retry-safe and reported separately.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum BallotRejection {
    #[error("no such poll")]
    PollNotFound,
    #[error("the poll is not accepting votes")]
    PollNotActive,
    #[error("this voter is not eligible to vote in this poll")]
    NotEligible,
    #[error("this voter has already voted in this poll")]
    AlreadyVoted,
    #[error("invalid selection: {detail}")]
    InvalidSelection { detail: String },
}

impl BallotRejection {
    /// The HTTP status this rejection is reported with. The body carries the
    /// machine-readable `reason`, so clients can tell terminal outcomes
    /// (already voted, not eligible) from anything retry-safe.
    pub fn status(&self) -> Status {
        match self {
            Self::PollNotFound => Status::NotFound,
            Self::PollNotActive => Status::Conflict,
            Self::NotEligible => Status::Forbidden,
            Self::AlreadyVoted => Status::Conflict,
            Self::InvalidSelection { .. } => Status::UnprocessableEntity,
        }
    }

    /// Shorthand for an [`InvalidSelection`](Self::InvalidSelection).
    pub fn invalid_selection(detail: impl Into<String>) -> Self {
        Self::InvalidSelection {
            detail: detail.into(),
        }
    }
}
