use std::collections::HashSet;
use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use mongodb::{bson::doc, Client};
use rocket::futures::TryStreamExt;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::poll::{PollState, VoterId},
    db::{entry::PollVoterEntry, poll::Poll},
    mongodb::{Coll, Id},
};

/// How many polls each propagation transaction may touch at once.
const PROPAGATION_CHUNK: usize = 100;

/// A single voter inside a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterRecord {
    /// Caller-supplied external identifier, unique within the group.
    pub voter_id: VoterId,
    pub given_name: String,
    pub family_name: String,
    /// Disabled voters are skipped when a poll snapshots the group, and the
    /// flag is propagated into active polls' snapshots when toggled.
    pub enabled: bool,
}

/// Core voter group data, as stored in the database.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterGroupCore {
    pub name: String,
    /// The admin that owns this group.
    pub admin_id: Id,
    pub voters: Vec<VoterRecord>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl VoterGroupCore {
    /// Create a new group, de-duplicating voters by ID (first occurrence wins).
    pub fn new(name: String, admin_id: Id, voters: Vec<VoterRecord>) -> Self {
        let mut seen = HashSet::new();
        let voters = voters
            .into_iter()
            .filter(|voter| seen.insert(voter.voter_id.clone()))
            .collect();
        Self {
            name,
            admin_id,
            voters,
            created_at: Utc::now(),
        }
    }

    /// The group's voters that are currently enabled.
    pub fn enabled_voters(&self) -> impl Iterator<Item = &VoterRecord> {
        self.voters.iter().filter(|voter| voter.enabled)
    }
}

/// A group without an ID.
pub type NewVoterGroup = VoterGroupCore;

/// A voter group from the database, with its unique ID.
#[derive(Debug, Serialize, Deserialize)]
pub struct VoterGroup {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub group: VoterGroupCore,
}

impl Deref for VoterGroup {
    type Target = VoterGroupCore;

    fn deref(&self) -> &Self::Target {
        &self.group
    }
}

impl DerefMut for VoterGroup {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.group
    }
}

/// The outcome of an enabled-flag propagation, reported back to the admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropagationReport {
    /// Active polls derived from the group that carry an entry for the voter.
    pub polls_matched: u64,
    /// Entries whose `enabled` flag actually changed value.
    pub entries_updated: u64,
}

/// Toggle a voter's `enabled` flag inside a group and propagate the change to
/// every *active* poll snapshotted from that group.
///
/// This is the one deliberate exception to the snapshot rule: draft and
/// closed polls keep the membership they copied at creation time. Each chunk
/// of polls is updated in its own transaction, so the propagation is
/// all-or-nothing per chunk and best-effort overall; the report tells the
/// admin how far it got. Retrying the whole operation is safe.
#[allow(clippy::too_many_arguments)]
pub async fn set_voter_enabled(
    db_client: &Client,
    groups: &Coll<VoterGroup>,
    polls: &Coll<Poll>,
    entries: &Coll<PollVoterEntry>,
    admin_id: Id,
    group_id: Id,
    voter_id: &str,
    enabled: bool,
) -> Result<PropagationReport> {
    // Flip the flag on the group's own record first. A single-document write
    // is atomic on its own.
    let group_filter = doc! {
        "_id": *group_id,
        "admin_id": *admin_id,
        "voters.voter_id": voter_id,
    };
    let group_update = doc! {
        "$set": { "voters.$.enabled": enabled }
    };
    let result = groups.update_one(group_filter, group_update, None).await?;
    if result.matched_count == 0 {
        return Err(Error::not_found(format!(
            "Voter '{voter_id}' in group {group_id}"
        )));
    }

    // Find the active polls whose snapshots came from this group.
    let poll_filter = doc! {
        "admin_id": *admin_id,
        "group_id": *group_id,
        "state": PollState::Active,
    };
    let active_polls: Vec<Poll> = polls.find(poll_filter, None).await?.try_collect().await?;
    let active_polls = active_polls.iter().map(|poll| poll.id).collect::<Vec<_>>();

    // Propagate in chunks, one transaction per chunk.
    let mut report = PropagationReport {
        polls_matched: 0,
        entries_updated: 0,
    };
    for chunk in active_polls.chunks(PROPAGATION_CHUNK) {
        let poll_ids = chunk.iter().map(|id| **id).collect::<Vec<_>>();
        let entry_filter = doc! {
            "poll_id": { "$in": poll_ids },
            "voter_id": voter_id,
        };
        let entry_update = doc! {
            "$set": { "enabled": enabled }
        };

        let mut session = db_client.start_session(None).await?;
        session.start_transaction(None).await?;
        let result = entries
            .update_many_with_session(entry_filter, entry_update, None, &mut session)
            .await?;
        session.commit_transaction().await?;

        report.polls_matched += result.matched_count;
        report.entries_updated += result.modified_count;
    }

    debug!(
        "Propagated enabled={enabled} for voter '{voter_id}' to {} of {} active polls",
        report.entries_updated, report.polls_matched,
    );
    Ok(report)
}
