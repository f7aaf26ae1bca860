use std::collections::HashMap;

use mongodb::{bson::doc, Client};
use rocket::{futures::TryStreamExt, http::Status, serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::AuthToken,
            poll::{OptionTally, PollDescription, PollResults, PollSpec, PollSummary},
        },
        common::poll::PollState,
        db::{
            entry::{NewPollVoterEntry, PollVoterEntry, PollVoterEntryCore},
            group::VoterGroup,
            lookup::PollLookup,
            poll::{NewPoll, Poll},
            vote::Vote,
        },
        mongodb::{Coll, Id},
    },
};

pub fn routes() -> Vec<Route> {
    routes![
        get_polls,
        create_poll,
        get_poll,
        activate_poll,
        close_poll,
        delete_poll,
        poll_results,
    ]
}

#[get("/polls")]
async fn get_polls(token: AuthToken, polls: Coll<Poll>) -> Result<Json<Vec<PollSummary>>> {
    let filter = doc! { "admin_id": *token.id };
    let owned: Vec<Poll> = polls.find(filter, None).await?.try_collect().await?;
    Ok(Json(owned.into_iter().map(Into::into).collect()))
}

#[post("/polls", data = "<spec>", format = "json")]
#[allow(clippy::too_many_arguments)]
async fn create_poll(
    token: AuthToken,
    spec: Json<PollSpec>,
    groups: Coll<VoterGroup>,
    new_polls: Coll<NewPoll>,
    polls: Coll<Poll>,
    new_entries: Coll<NewPollVoterEntry>,
    lookups: Coll<PollLookup>,
    db_client: &State<Client>,
) -> Result<Json<PollDescription>> {
    let spec = spec.0;
    spec.validate()
        .map_err(|msg| Error::Status(Status::BadRequest, msg))?;

    // The snapshot source must be one of this admin's groups.
    let group_filter = doc! {
        "_id": *spec.group_id,
        "admin_id": *token.id,
    };
    let group = groups
        .find_one(group_filter, None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Group {}", spec.group_id)))?;
    let eligible = group.enabled_voters().collect::<Vec<_>>();
    if eligible.is_empty() {
        return Err(Error::Status(
            Status::UnprocessableEntity,
            format!("Group {} has no enabled voters", spec.group_id),
        ));
    }

    // Insert the poll, its voter snapshot, and its public lookup entry as
    // one transaction: a half-created poll must never be reachable.
    let poll = {
        let mut session = db_client.start_session(None).await?;
        session.start_transaction(None).await?;

        let new_poll = spec.into_poll(token.id);
        let new_id: Id = new_polls
            .insert_one_with_session(&new_poll, None, &mut session)
            .await?
            .inserted_id
            .as_object_id()
            .unwrap() // Valid because the ID comes directly from the DB.
            .into();

        let entries = eligible
            .iter()
            .map(|voter| PollVoterEntryCore::for_poll(new_id, voter))
            .collect::<Vec<_>>();
        new_entries
            .insert_many_with_session(&entries, None, &mut session)
            .await?;

        let lookup = PollLookup {
            poll_id: new_id,
            admin_id: token.id,
        };
        lookups
            .insert_one_with_session(&lookup, None, &mut session)
            .await?;

        let poll = polls
            .find_one_with_session(new_id.as_doc(), None, &mut session)
            .await?
            .unwrap();

        session.commit_transaction().await?;
        poll
    };

    info!(
        "Created poll {} with {} eligible voters from group {}",
        poll.id,
        eligible.len(),
        poll.group_id
    );
    Ok(Json(poll.into()))
}

#[get("/polls/<poll_id>")]
async fn get_poll(token: AuthToken, poll_id: Id, polls: Coll<Poll>) -> Result<Json<PollDescription>> {
    let poll = owned_poll(&token, poll_id, &polls).await?;
    Ok(Json(poll.into()))
}

#[post("/polls/<poll_id>/activate")]
async fn activate_poll(token: AuthToken, poll_id: Id, polls: Coll<Poll>) -> Result<()> {
    // Guarded single-field update: only a draft can go active.
    let filter = doc! {
        "_id": *poll_id,
        "admin_id": *token.id,
        "state": PollState::Draft,
    };
    let update = doc! {
        "$set": { "state": PollState::Active }
    };
    let result = polls.update_one(filter, update, None).await?;
    if result.modified_count != 1 {
        return Err(Error::Status(
            Status::BadRequest,
            format!(
                "Poll {} doesn't exist or isn't a draft; cannot activate.",
                poll_id
            ),
        ));
    }
    Ok(())
}

#[post("/polls/<poll_id>/close")]
async fn close_poll(token: AuthToken, poll_id: Id, polls: Coll<Poll>) -> Result<()> {
    // Only an active poll can close, and a closed poll stays closed.
    let filter = doc! {
        "_id": *poll_id,
        "admin_id": *token.id,
        "state": PollState::Active,
    };
    let update = doc! {
        "$set": { "state": PollState::Closed }
    };
    let result = polls.update_one(filter, update, None).await?;
    if result.modified_count != 1 {
        return Err(Error::Status(
            Status::BadRequest,
            format!(
                "Poll {} doesn't exist or isn't active; cannot close.",
                poll_id
            ),
        ));
    }
    Ok(())
}

#[delete("/polls/<poll_id>")]
async fn delete_poll(
    token: AuthToken,
    poll_id: Id,
    polls: Coll<Poll>,
    entries: Coll<PollVoterEntry>,
    votes: Coll<Vote>,
    lookups: Coll<PollLookup>,
    db_client: &State<Client>,
) -> Result<()> {
    let poll = owned_poll(&token, poll_id, &polls).await?;

    // An active poll cannot vanish under its voters.
    if poll.state == PollState::Active {
        return Err(Error::Status(
            Status::BadRequest,
            format!("Cannot delete active poll {}", poll_id),
        ));
    }

    // Atomically delete the poll and all associated data.
    {
        let mut session = db_client.start_session(None).await?;
        session.start_transaction(None).await?;

        let result = polls
            .delete_one_with_session(poll_id.as_doc(), None, &mut session)
            .await?;
        assert_eq!(result.deleted_count, 1);

        let by_poll = doc! { "poll_id": *poll_id };
        entries
            .delete_many_with_session(by_poll.clone(), None, &mut session)
            .await?;
        votes
            .delete_many_with_session(by_poll, None, &mut session)
            .await?;
        lookups
            .delete_one_with_session(poll_id.as_doc(), None, &mut session)
            .await?;

        session.commit_transaction().await?;
    }

    Ok(())
}

#[get("/polls/<poll_id>/results")]
async fn poll_results(
    token: AuthToken,
    poll_id: Id,
    polls: Coll<Poll>,
    entries: Coll<PollVoterEntry>,
    votes: Coll<Vote>,
) -> Result<Json<PollResults>> {
    let poll = owned_poll(&token, poll_id, &polls).await?;

    // Product policy: results stay hidden until the poll has closed.
    if poll.state != PollState::Closed {
        return Err(Error::Status(
            Status::BadRequest,
            format!("Poll {} is not closed; results are not available.", poll_id),
        ));
    }

    let by_poll = doc! { "poll_id": *poll_id };
    let cast: Vec<Vote> = votes.find(by_poll, None).await?.try_collect().await?;

    let mut tallies: HashMap<&str, u64> = poll
        .options
        .iter()
        .map(|option| (option.id.as_str(), 0))
        .collect();
    for vote in &cast {
        for selection in &vote.selections {
            if let Some(count) = tallies.get_mut(selection.as_str()) {
                *count += 1;
            }
        }
    }

    let eligible_voters = entries
        .count_documents(
            doc! { "poll_id": *poll_id, "enabled": true },
            None,
        )
        .await?;
    let voters_turned_out = entries
        .count_documents(
            doc! { "poll_id": *poll_id, "has_voted": true },
            None,
        )
        .await?;

    let options = poll
        .options
        .iter()
        .map(|option| OptionTally {
            id: option.id.clone(),
            text: option.text.clone(),
            votes: tallies[option.id.as_str()],
        })
        .collect();

    Ok(Json(PollResults {
        poll_id,
        question: poll.poll.question,
        total_votes: cast.len() as u64,
        eligible_voters,
        voters_turned_out,
        options,
    }))
}

/// Fetch a poll, enforcing that the caller owns it.
async fn owned_poll(token: &AuthToken, poll_id: Id, polls: &Coll<Poll>) -> Result<Poll> {
    let filter = doc! {
        "_id": *poll_id,
        "admin_id": *token.id,
    };
    polls
        .find_one(filter, None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Poll {}", poll_id)))
}
