use mongodb::{bson::doc, Client};
use rocket::{serde::json::Json, Route, State};

use crate::{
    error::Result,
    model::{
        api::ballot::{BallotPaper, CastBallot},
        common::{
            ballot::{BallotRejection, EligibilityStatus},
            poll::PollState,
        },
        db::{
            ballot, entry::PollVoterEntry, lookup::PollLookup, poll::Poll, vote::NewVote,
        },
        mongodb::{Coll, Id},
    },
};

pub fn routes() -> Vec<Route> {
    routes![ballot_paper, eligibility, cast_ballot]
}

/// What a voter needs to render the ballot for an active poll.
/// Deliberately unauthenticated: knowing the poll ID is the only requirement.
#[get("/vote/<poll_id>")]
async fn ballot_paper(
    poll_id: Id,
    lookups: Coll<PollLookup>,
    polls: Coll<Poll>,
) -> Result<Json<BallotPaper>> {
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
    if poll.state != PollState::Active {
        return Err(BallotRejection::PollNotActive.into());
    }
    Ok(Json(poll.into()))
}

/// Pure pre-check so the UI can tell the voter where they stand before they
/// pick options. The verdict is advisory: everything is re-checked when the
/// ballot is actually cast.
#[get("/vote/<poll_id>/eligibility?<voter_id>")]
async fn eligibility(
    poll_id: Id,
    voter_id: String,
    lookups: Coll<PollLookup>,
    polls: Coll<Poll>,
    entries: Coll<PollVoterEntry>,
) -> Result<Json<EligibilityStatus>> {
    let status =
        ballot::resolve_eligibility(&lookups, &polls, &entries, poll_id, &voter_id).await?;
    Ok(Json(status))
}

/// Cast a ballot. On success the vote is recorded anonymously and the
/// voter's slot is consumed, atomically.
#[post("/vote/<poll_id>", data = "<ballot>", format = "json")]
async fn cast_ballot(
    poll_id: Id,
    ballot: Json<CastBallot>,
    lookups: Coll<PollLookup>,
    polls: Coll<Poll>,
    entries: Coll<PollVoterEntry>,
    votes: Coll<NewVote>,
    db_client: &State<Client>,
) -> Result<()> {
    ballot::record_vote(
        db_client,
        &lookups,
        &polls,
        &entries,
        &votes,
        poll_id,
        &ballot.voter_id,
        &ballot.selections,
    )
    .await
}

#[cfg(test)]
mod tests {
    use mongodb::Database;
    use rocket::{
        futures::TryStreamExt, http::ContentType, http::Status, local::asynchronous::Client,
        serde::json::serde_json, serde::json::serde_json::json,
    };

    use crate::model::{
        db::{
            entry::PollVoterEntryCore,
            group::VoterRecord,
            poll::{NewPoll, PollCore},
            vote::Vote,
        },
        mongodb::Coll,
    };

    use super::*;

    /// Insert an example poll (with lookup and entries) and return its ID.
    async fn insert_poll(db: &Database, poll: NewPoll, voters: &[VoterRecord]) -> Id {
        let poll_id: Id = Coll::<NewPoll>::from_db(db)
            .insert_one(&poll, None)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap()
            .into();
        Coll::<PollLookup>::from_db(db)
            .insert_one(
                PollLookup {
                    poll_id,
                    admin_id: poll.admin_id,
                },
                None,
            )
            .await
            .unwrap();
        let entries: Vec<_> = voters
            .iter()
            .map(|voter| PollVoterEntryCore::for_poll(poll_id, voter))
            .collect();
        Coll::<PollVoterEntryCore>::from_db(db)
            .insert_many(&entries, None)
            .await
            .unwrap();
        poll_id
    }

    async fn cast(client: &Client, poll_id: Id, voter_id: &str, selections: &[&str]) -> Status {
        client
            .post(uri!(cast_ballot(poll_id)))
            .header(ContentType::JSON)
            .body(
                json!({
                    "voter_id": voter_id,
                    "selections": selections,
                })
                .to_string(),
            )
            .dispatch()
            .await
            .status()
    }

    async fn rejection_reason(
        client: &Client,
        poll_id: Id,
        voter_id: &str,
        selections: &[&str],
    ) -> String {
        let response = client
            .post(uri!(cast_ballot(poll_id)))
            .header(ContentType::JSON)
            .body(
                json!({
                    "voter_id": voter_id,
                    "selections": selections,
                })
                .to_string(),
            )
            .dispatch()
            .await;
        let body: serde_json::Value =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        body["reason"].as_str().unwrap().to_string()
    }

    #[backend_test]
    async fn ballot_paper_hides_draft_polls(client: Client, db: Database) {
        let voter = VoterRecord::example1();
        let mut poll = PollCore::example_single(Id::new(), Id::new());
        poll.state = crate::model::common::poll::PollState::Draft;
        let poll_id = insert_poll(&db, poll, &[voter]).await;

        let response = client.get(uri!(ballot_paper(poll_id))).dispatch().await;
        assert_eq!(Status::Conflict, response.status());

        let response = client.get(uri!(ballot_paper(Id::new()))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test]
    async fn ballot_paper_shows_active_polls(client: Client, db: Database) {
        let voter = VoterRecord::example1();
        let poll = PollCore::example_single(Id::new(), Id::new());
        let question = poll.question.clone();
        let poll_id = insert_poll(&db, poll, &[voter]).await;

        let response = client.get(uri!(ballot_paper(poll_id))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let paper: BallotPaper =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(paper.poll_id, poll_id);
        assert_eq!(paper.question, question);
        assert_eq!(paper.options.len(), 2);
    }

    #[backend_test]
    async fn eligibility_endpoint_reports_all_statuses(client: Client, db: Database) {
        let voter = VoterRecord::example1();
        let mut disabled = VoterRecord::example2();
        disabled.enabled = false;
        let poll_id = insert_poll(
            &db,
            PollCore::example_single(Id::new(), Id::new()),
            &[voter.clone(), disabled.clone()],
        )
        .await;

        for (voter_id, expected) in [
            (voter.voter_id.as_str(), EligibilityStatus::Eligible),
            (disabled.voter_id.as_str(), EligibilityStatus::NotEligible),
            ("99999999", EligibilityStatus::NotEligible),
        ] {
            let response = client
                .get(uri!(eligibility(poll_id, voter_id)))
                .dispatch()
                .await;
            assert_eq!(Status::Ok, response.status());
            let status: EligibilityStatus =
                serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
            assert_eq!(status, expected);
        }

        // Unknown poll is still a 200 with a verdict, not an error.
        let response = client
            .get(uri!(eligibility(Id::new(), "whoever")))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let status: EligibilityStatus =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(status, EligibilityStatus::PollNotFound);
    }

    #[backend_test]
    async fn single_choice_vote_round_trip(client: Client, db: Database) {
        let voter = VoterRecord::example1();
        let poll_id = insert_poll(
            &db,
            PollCore::example_single(Id::new(), Id::new()),
            &[voter.clone()],
        )
        .await;

        // Cast succeeds.
        assert_eq!(Status::Ok, cast(&client, poll_id, &voter.voter_id, &["opt_1"]).await);

        // The eligibility check now reports the consumed slot.
        let response = client
            .get(uri!(eligibility(poll_id, &voter.voter_id)))
            .dispatch()
            .await;
        let status: EligibilityStatus =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(status, EligibilityStatus::AlreadyVoted);

        // A repeat is told why it failed, machine-readably.
        let reason = rejection_reason(&client, poll_id, &voter.voter_id, &["opt_1"]).await;
        assert_eq!(reason, "already_voted");

        // Exactly one anonymous vote exists.
        let recorded: Vec<Vote> = Coll::<Vote>::from_db(&db)
            .find(doc! {"poll_id": *poll_id}, None)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].selections, vec!["opt_1".to_string()]);
    }

    #[backend_test]
    async fn rejections_carry_distinct_reasons(client: Client, db: Database) {
        let voter = VoterRecord::example1();
        let mut disabled = VoterRecord::example2();
        disabled.enabled = false;

        let active = insert_poll(
            &db,
            PollCore::example_single(Id::new(), Id::new()),
            &[voter.clone(), disabled.clone()],
        )
        .await;
        let mut closed_poll = PollCore::example_single(Id::new(), Id::new());
        closed_poll.state = crate::model::common::poll::PollState::Closed;
        let closed = insert_poll(&db, closed_poll, &[voter.clone()]).await;

        let reason = rejection_reason(&client, active, &disabled.voter_id, &["opt_1"]).await;
        assert_eq!(reason, "not_eligible");

        let reason = rejection_reason(&client, active, "99999999", &["opt_1"]).await;
        assert_eq!(reason, "not_eligible");

        let reason = rejection_reason(&client, active, &voter.voter_id, &[]).await;
        assert_eq!(reason, "invalid_selection");

        let reason = rejection_reason(&client, closed, &voter.voter_id, &["opt_1"]).await;
        assert_eq!(reason, "poll_not_active");

        let reason = rejection_reason(&client, Id::new(), &voter.voter_id, &["opt_1"]).await;
        assert_eq!(reason, "poll_not_found");

        // None of the rejections left a vote behind.
        let count = Coll::<Vote>::from_db(&db)
            .count_documents(None, None)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[backend_test]
    async fn multi_choice_bounds_enforced_end_to_end(client: Client, db: Database) {
        let voter = VoterRecord::example1();
        let another = VoterRecord::example2();
        let third = VoterRecord::example3();
        let poll_id = insert_poll(
            &db,
            PollCore::example_multi(Id::new(), Id::new()),
            &[voter.clone(), another.clone(), third.clone()],
        )
        .await;

        // Size 3 exceeds max_selections = 2.
        let status = cast(
            &client,
            poll_id,
            &voter.voter_id,
            &["opt_1", "opt_2", "opt_3"],
        )
        .await;
        assert_eq!(Status::UnprocessableEntity, status);

        // Sizes 1 and 2 are accepted.
        assert_eq!(Status::Ok, cast(&client, poll_id, &voter.voter_id, &["opt_2"]).await);
        assert_eq!(
            Status::Ok,
            cast(&client, poll_id, &another.voter_id, &["opt_1", "opt_3"]).await
        );
    }
}
