//! Ballot integrity: eligibility resolution and atomic vote recording.
//!
//! The at-most-one-vote guarantee lives here. Everything the eligibility
//! check established is re-verified inside the transaction that records the
//! vote, so a ballot can never slip through on stale reads.

use mongodb::{bson::doc, Client, ClientSession};

use crate::error::{Error, Result};
use crate::model::{
    common::{
        ballot::{BallotRejection, EligibilityStatus},
        poll::{OptionId, PollState},
    },
    db::{
        entry::PollVoterEntry,
        lookup::PollLookup,
        poll::Poll,
        vote::{NewVote, VoteCore},
    },
    mongodb::{is_transient_transaction_error, is_unknown_commit_error, Coll, Id},
};

/// How many times a vote transaction is re-run after losing a write conflict.
const MAX_VOTE_TXN_RETRIES: u32 = 5;

/// Determine whether the given voter may vote in the given poll right now.
///
/// Pure read; any number of callers may run this concurrently. Eligibility is
/// always scoped by the `(poll, voter)` pair: the same voter ID in another
/// group or poll grants nothing here.
pub async fn resolve_eligibility(
    lookups: &Coll<PollLookup>,
    polls: &Coll<Poll>,
    entries: &Coll<PollVoterEntry>,
    poll_id: Id,
    voter_id: &str,
) -> Result<EligibilityStatus> {
    let lookup = match lookups.find_one(poll_id.as_doc(), None).await? {
        Some(lookup) => lookup,
        None => return Ok(EligibilityStatus::PollNotFound),
    };

    let poll_filter = doc! {
        "_id": *poll_id,
        "admin_id": *lookup.admin_id,
    };
    let poll = match polls.find_one(poll_filter, None).await? {
        Some(poll) => poll,
        None => return Ok(EligibilityStatus::PollNotFound),
    };
    if poll.state != PollState::Active {
        return Ok(EligibilityStatus::PollNotActive);
    }

    let entry_filter = doc! {
        "poll_id": *poll_id,
        "voter_id": voter_id,
    };
    let status = match entries.find_one(entry_filter, None).await? {
        None => EligibilityStatus::NotEligible,
        Some(entry) if !entry.enabled => EligibilityStatus::NotEligible,
        Some(entry) if entry.has_voted => EligibilityStatus::AlreadyVoted,
        Some(_) => EligibilityStatus::Eligible,
    };
    Ok(status)
}

/// Record a ballot: insert the anonymous vote and consume the voter's
/// eligibility slot, as one indivisible operation.
///
/// The selections are validated up front, then the poll state, the entry's
/// `enabled` flag, and `has_voted` are all re-checked inside the transaction.
/// The `has_voted` flip is a conditional update whose filter repeats the
/// preconditions, so of N concurrent submissions for the same `(poll, voter)`
/// exactly one commits and the rest are rejected with `AlreadyVoted`. A
/// failed attempt leaves neither a vote nor a flipped flag, which makes the
/// whole operation safe to retry.
#[allow(clippy::too_many_arguments)]
pub async fn record_vote(
    db_client: &Client,
    lookups: &Coll<PollLookup>,
    polls: &Coll<Poll>,
    entries: &Coll<PollVoterEntry>,
    votes: &Coll<NewVote>,
    poll_id: Id,
    voter_id: &str,
    selections: &[OptionId],
) -> Result<()> {
    // Locate the poll and reject malformed ballots before touching any state.
    let lookup = lookups
        .find_one(poll_id.as_doc(), None)
        .await?
        .ok_or(BallotRejection::PollNotFound)?;
    let poll_filter = doc! {
        "_id": *poll_id,
        "admin_id": *lookup.admin_id,
    };
    let poll = polls
        .find_one(poll_filter, None)
        .await?
        .ok_or(BallotRejection::PollNotFound)?;
    poll.validate_selections(selections)?;
    if poll.state != PollState::Active {
        return Err(BallotRejection::PollNotActive.into());
    }

    // Run the transaction, re-running it if the driver reports a transient
    // conflict (e.g. two voters racing on neighbouring entries). A retry
    // re-reads everything, so a lost race surfaces as `AlreadyVoted`.
    let mut session = db_client.start_session(None).await?;
    let mut attempts = 0;
    loop {
        session.start_transaction(None).await?;
        let outcome = cast_in_session(&mut session, polls, entries, votes, &poll, voter_id, selections).await;
        match outcome {
            Ok(()) => match commit_with_retry(&mut session).await {
                Ok(()) => return Ok(()),
                Err(err) if is_transient_transaction_error(&err) && attempts < MAX_VOTE_TXN_RETRIES => {
                    attempts += 1;
                    debug!("Vote transaction commit conflicted, retrying (attempt {attempts})");
                }
                Err(err) => return Err(err.into()),
            },
            Err(err) => {
                // An abort can itself fail on a torn connection; the original
                // outcome is the interesting one either way.
                let _ = session.abort_transaction().await;
                match err {
                    Error::Db(db_err)
                        if is_transient_transaction_error(&db_err)
                            && attempts < MAX_VOTE_TXN_RETRIES =>
                    {
                        attempts += 1;
                        debug!("Vote transaction conflicted, retrying (attempt {attempts})");
                    }
                    other => return Err(other),
                }
            }
        }
    }
}

/// The body of the vote transaction: re-check, flip, insert.
async fn cast_in_session(
    session: &mut ClientSession,
    polls: &Coll<Poll>,
    entries: &Coll<PollVoterEntry>,
    votes: &Coll<NewVote>,
    poll: &Poll,
    voter_id: &str,
    selections: &[OptionId],
) -> Result<()> {
    // The poll must still be accepting votes at commit time.
    let active_filter = doc! {
        "_id": *poll.id,
        "state": PollState::Active,
    };
    polls
        .find_one_with_session(active_filter, None, session)
        .await?
        .ok_or(BallotRejection::PollNotActive)?;

    // The entry must still exist, be enabled, and be unconsumed. Reading it
    // first lets us distinguish `NotEligible` from `AlreadyVoted`.
    let entry_filter = doc! {
        "poll_id": *poll.id,
        "voter_id": voter_id,
    };
    let entry = entries
        .find_one_with_session(entry_filter, None, session)
        .await?
        .ok_or(BallotRejection::NotEligible)?;
    if !entry.enabled {
        return Err(BallotRejection::NotEligible.into());
    }
    if entry.has_voted {
        return Err(BallotRejection::AlreadyVoted.into());
    }

    // Consume the slot. The filter repeats the preconditions, so if a
    // concurrent submission committed first this matches nothing and the
    // whole transaction is abandoned without effect.
    let consume_filter = doc! {
        "poll_id": *poll.id,
        "voter_id": voter_id,
        "enabled": true,
        "has_voted": false,
    };
    let consume_update = doc! {
        "$set": { "has_voted": true }
    };
    let result = entries
        .update_one_with_session(consume_filter, consume_update, None, session)
        .await?;
    if result.modified_count != 1 {
        return Err(BallotRejection::AlreadyVoted.into());
    }

    // Record the anonymous vote alongside the flip.
    let vote = VoteCore::new(poll.id, selections.to_vec());
    votes.insert_one_with_session(&vote, None, session).await?;
    Ok(())
}

/// Commit, retrying while the driver cannot tell whether the commit landed.
async fn commit_with_retry(session: &mut ClientSession) -> mongodb::error::Result<()> {
    loop {
        match session.commit_transaction().await {
            Ok(()) => return Ok(()),
            Err(err) if is_unknown_commit_error(&err) => {
                debug!("Commit outcome unknown, retrying commit");
            }
            Err(err) => return Err(err),
        }
    }
}
