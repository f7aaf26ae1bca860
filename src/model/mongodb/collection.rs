use std::ops::Deref;

use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};
use rocket::{
    request::{self, FromRequest, Request},
    State,
};

use crate::model::db::{
    admin::{Admin, NewAdmin},
    entry::{NewPollVoterEntry, PollVoterEntry},
    group::{NewVoterGroup, VoterGroup},
    lookup::PollLookup,
    poll::{NewPoll, Poll},
    vote::{NewVote, Vote},
};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r, T> FromRequest<'r> for Coll<T>
where
    T: MongoCollection,
{
    type Error = ();

    /// Get the database connection from the managed state and wrap it in a collection.
    ///
    /// Panics iff the [`Database`] is not managed by [`rocket::Rocket`].
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let db = req.guard::<&State<Database>>().await.unwrap();
        request::Outcome::Success(Coll::from_db(db))
    }
}

// Admin collections
const ADMINS: &str = "admins";
impl MongoCollection for Admin {
    const NAME: &'static str = ADMINS;
}
impl MongoCollection for NewAdmin {
    const NAME: &'static str = ADMINS;
}

// Voter group collections
const GROUPS: &str = "groups";
impl MongoCollection for VoterGroup {
    const NAME: &'static str = GROUPS;
}
impl MongoCollection for NewVoterGroup {
    const NAME: &'static str = GROUPS;
}

// Poll collections
const POLLS: &str = "polls";
impl MongoCollection for Poll {
    const NAME: &'static str = POLLS;
}
impl MongoCollection for NewPoll {
    const NAME: &'static str = POLLS;
}

// Per-poll voter entry collections
const POLL_VOTERS: &str = "poll_voters";
impl MongoCollection for PollVoterEntry {
    const NAME: &'static str = POLL_VOTERS;
}
impl MongoCollection for NewPollVoterEntry {
    const NAME: &'static str = POLL_VOTERS;
}

// Vote collections
const VOTES: &str = "votes";
impl MongoCollection for Vote {
    const NAME: &'static str = VOTES;
}
impl MongoCollection for NewVote {
    const NAME: &'static str = VOTES;
}

// Poll lookup collection
const POLL_LOOKUP: &str = "poll_lookup";
impl MongoCollection for PollLookup {
    const NAME: &'static str = POLL_LOOKUP;
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // Admin collection.
    let admin_index = IndexModel::builder()
        .keys(doc! {"username": 1})
        .options(unique.clone())
        .build();
    Coll::<Admin>::from_db(db)
        .create_index(admin_index, None)
        .await?;

    // Poll voter entry collection: this index is what makes "at most one
    // entry per (poll, voter)" a database-level invariant.
    let entry_index = IndexModel::builder()
        .keys(doc! {"poll_id": 1, "voter_id": 1})
        .options(unique)
        .build();
    Coll::<PollVoterEntry>::from_db(db)
        .create_index(entry_index, None)
        .await?;

    // Vote collection: tallies scan by poll.
    let vote_index = IndexModel::builder().keys(doc! {"poll_id": 1}).build();
    Coll::<Vote>::from_db(db)
        .create_index(vote_index, None)
        .await?;

    // Poll collection: enabled-flag propagation scans by owning group.
    let poll_index = IndexModel::builder()
        .keys(doc! {"admin_id": 1, "group_id": 1, "state": 1})
        .build();
    Coll::<Poll>::from_db(db)
        .create_index(poll_index, None)
        .await?;

    Ok(())
}
