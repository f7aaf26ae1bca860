use mongodb::{bson::doc, Client};
use rocket::{futures::TryStreamExt, http::Status, serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::AuthToken,
            group::{GroupDescription, GroupSpec, GroupSummary},
        },
        db::{
            entry::PollVoterEntry,
            group::{self, NewVoterGroup, PropagationReport, VoterGroup},
            poll::Poll,
        },
        mongodb::{Coll, Id},
    },
};

pub fn routes() -> Vec<Route> {
    routes![
        get_groups,
        create_group,
        get_group,
        delete_group,
        set_voter_enabled,
    ]
}

#[get("/groups")]
async fn get_groups(token: AuthToken, groups: Coll<VoterGroup>) -> Result<Json<Vec<GroupSummary>>> {
    let filter = doc! { "admin_id": *token.id };
    let owned: Vec<VoterGroup> = groups.find(filter, None).await?.try_collect().await?;
    Ok(Json(owned.into_iter().map(Into::into).collect()))
}

#[post("/groups", data = "<spec>", format = "json")]
async fn create_group(
    token: AuthToken,
    spec: Json<GroupSpec>,
    new_groups: Coll<NewVoterGroup>,
    groups: Coll<VoterGroup>,
) -> Result<Json<GroupDescription>> {
    let spec = spec.0;
    spec.validate()
        .map_err(|msg| Error::Status(Status::BadRequest, msg))?;

    // Voters are de-duplicated by ID here; the group is the authority on who
    // exists, polls only ever snapshot it.
    let group = spec.into_group(token.id);
    let new_id: Id = new_groups
        .insert_one(&group, None)
        .await?
        .inserted_id
        .as_object_id()
        .unwrap() // Valid because the ID comes directly from the DB.
        .into();

    let group = groups.find_one(new_id.as_doc(), None).await?.unwrap();
    Ok(Json(group.into()))
}

#[get("/groups/<group_id>")]
async fn get_group(
    token: AuthToken,
    group_id: Id,
    groups: Coll<VoterGroup>,
) -> Result<Json<GroupDescription>> {
    let filter = doc! {
        "_id": *group_id,
        "admin_id": *token.id,
    };
    let group = groups
        .find_one(filter, None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Group {}", group_id)))?;
    Ok(Json(group.into()))
}

#[delete("/groups/<group_id>")]
async fn delete_group(token: AuthToken, group_id: Id, groups: Coll<VoterGroup>) -> Result<()> {
    // Polls hold their own snapshot of the membership, so deleting a group
    // never affects an existing poll.
    let filter = doc! {
        "_id": *group_id,
        "admin_id": *token.id,
    };
    let result = groups.delete_one(filter, None).await?;
    if result.deleted_count == 0 {
        Err(Error::not_found(format!("Group {}", group_id)))
    } else {
        Ok(())
    }
}

#[put(
    "/groups/<group_id>/voters/<voter_id>/enabled",
    data = "<enabled>",
    format = "json"
)]
#[allow(clippy::too_many_arguments)]
async fn set_voter_enabled(
    token: AuthToken,
    group_id: Id,
    voter_id: String,
    enabled: Json<bool>,
    groups: Coll<VoterGroup>,
    polls: Coll<Poll>,
    entries: Coll<PollVoterEntry>,
    db_client: &State<Client>,
) -> Result<Json<PropagationReport>> {
    let report = group::set_voter_enabled(
        db_client,
        &groups,
        &polls,
        &entries,
        token.id,
        group_id,
        &voter_id,
        enabled.0,
    )
    .await?;
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use mongodb::Database;
    use rocket::{
        http::ContentType, local::asynchronous::Client, serde::json::serde_json,
        serde::json::serde_json::json,
    };

    use crate::model::{
        api::{group::VoterSpec, poll::PollSpec},
        common::poll::PollState,
        db::{entry::PollVoterEntryCore, lookup::PollLookup, poll::NewPoll},
    };

    use super::*;

    async fn create_example_group(client: &Client) -> GroupDescription {
        let response = client
            .post(uri!(create_group))
            .header(ContentType::JSON)
            .body(json!(GroupSpec::example()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        serde_json::from_str(&response.into_string().await.unwrap()).unwrap()
    }

    /// Insert a poll snapshotted from the given group, bypassing the API.
    async fn insert_poll_for_group(
        db: &Database,
        group: &GroupDescription,
        admin_id: Id,
        state: PollState,
    ) -> Id {
        let mut poll: NewPoll = PollSpec::example_single(group.id).into_poll(admin_id);
        poll.state = state;
        let poll_id: Id = Coll::<NewPoll>::from_db(db)
            .insert_one(&poll, None)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap()
            .into();
        Coll::<PollLookup>::from_db(db)
            .insert_one(PollLookup { poll_id, admin_id }, None)
            .await
            .unwrap();
        let entries: Vec<_> = group
            .voters
            .iter()
            .map(|voter| PollVoterEntryCore {
                poll_id,
                voter_id: voter.voter_id.clone(),
                enabled: voter.enabled,
                has_voted: false,
            })
            .collect();
        Coll::<PollVoterEntryCore>::from_db(db)
            .insert_many(&entries, None)
            .await
            .unwrap();
        poll_id
    }

    async fn entry_for(db: &Database, poll_id: Id, voter_id: &str) -> PollVoterEntry {
        Coll::<PollVoterEntry>::from_db(db)
            .find_one(doc! {"poll_id": *poll_id, "voter_id": voter_id}, None)
            .await
            .unwrap()
            .unwrap()
    }

    #[backend_test(admin)]
    async fn group_creation_dedups_and_lists(client: Client) {
        let mut spec = GroupSpec::example();
        spec.voters.push(VoterSpec {
            voter_id: spec.voters[0].voter_id.clone(),
            given_name: "Duplicate".to_string(),
            family_name: "Entry".to_string(),
        });

        let response = client
            .post(uri!(create_group))
            .header(ContentType::JSON)
            .body(json!(spec).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let group: GroupDescription =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(group.voters.len(), GroupSpec::example().voters.len());

        let response = client.get(uri!(get_groups)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let summaries: Vec<GroupSummary> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].voter_count, group.voters.len());
    }

    #[backend_test(admin)]
    async fn invalid_group_specs_are_rejected(client: Client) {
        for spec in [
            json!({"name": "", "voters": [{"voter_id": "1"}]}),
            json!({"name": "Empty", "voters": []}),
            json!({"name": "Blank IDs", "voters": [{"voter_id": "  "}]}),
        ] {
            let response = client
                .post(uri!(create_group))
                .header(ContentType::JSON)
                .body(spec.to_string())
                .dispatch()
                .await;
            assert_eq!(Status::BadRequest, response.status());
        }
    }

    #[backend_test(admin)]
    async fn get_and_delete_group(client: Client) {
        let group = create_example_group(&client).await;

        let response = client.get(uri!(get_group(group.id))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let fetched: GroupDescription =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(fetched, group);

        let response = client.delete(uri!(delete_group(group.id))).dispatch().await;
        assert_eq!(Status::Ok, response.status());

        let response = client.get(uri!(get_group(group.id))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test(admin)]
    async fn disabling_a_voter_propagates_to_active_polls_only(client: Client, db: Database) {
        let group = create_example_group(&client).await;
        let admin_id = Coll::<crate::model::db::admin::Admin>::from_db(&db)
            .find_one(None, None)
            .await
            .unwrap()
            .unwrap()
            .id;

        let active_poll = insert_poll_for_group(&db, &group, admin_id, PollState::Active).await;
        let closed_poll = insert_poll_for_group(&db, &group, admin_id, PollState::Closed).await;
        let draft_poll = insert_poll_for_group(&db, &group, admin_id, PollState::Draft).await;
        let voter_id = group.voters[0].voter_id.clone();

        let response = client
            .put(uri!(set_voter_enabled(group.id, &voter_id)))
            .header(ContentType::JSON)
            .body("false")
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let report: PropagationReport =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(report.polls_matched, 1);
        assert_eq!(report.entries_updated, 1);

        // The group record itself is updated...
        let response = client.get(uri!(get_group(group.id))).dispatch().await;
        let fetched: GroupDescription =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        let voter = fetched
            .voters
            .iter()
            .find(|voter| voter.voter_id == voter_id)
            .unwrap();
        assert!(!voter.enabled);

        // ...the active poll's entry follows, the others keep their snapshot.
        assert!(!entry_for(&db, active_poll, &voter_id).await.enabled);
        assert!(entry_for(&db, closed_poll, &voter_id).await.enabled);
        assert!(entry_for(&db, draft_poll, &voter_id).await.enabled);

        // Re-enabling propagates the same way.
        let response = client
            .put(uri!(set_voter_enabled(group.id, &voter_id)))
            .header(ContentType::JSON)
            .body("true")
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        assert!(entry_for(&db, active_poll, &voter_id).await.enabled);
    }

    #[backend_test(admin)]
    async fn toggling_an_unknown_voter_is_not_found(client: Client) {
        let group = create_example_group(&client).await;

        let response = client
            .put(uri!(set_voter_enabled(group.id, "00000000")))
            .header(ContentType::JSON)
            .body("false")
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }
}
