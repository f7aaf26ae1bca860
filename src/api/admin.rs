use mongodb::bson::doc;
use rocket::{futures::TryStreamExt, http::Status, serde::json::Json, Route};

use crate::{
    error::{Error, Result},
    model::{
        api::{admin::AdminCredentials, auth::AuthToken},
        db::admin::{Admin, NewAdmin},
        mongodb::{is_duplicate_key_error, Coll},
    },
};

pub fn routes() -> Vec<Route> {
    routes![get_admins, create_admin, delete_admin]
}

#[get("/admins")]
async fn get_admins(_token: AuthToken, admins: Coll<Admin>) -> Result<Json<Vec<String>>> {
    let admin_list: Vec<Admin> = admins.find(None, None).await?.try_collect().await?;
    let admin_names = admin_list
        .into_iter()
        .map(|admin| admin.admin.username)
        .collect();
    Ok(Json(admin_names))
}

#[post("/admins", data = "<new_admin>", format = "json")]
async fn create_admin(
    _token: AuthToken,
    new_admin: Json<AdminCredentials>,
    admins: Coll<NewAdmin>,
) -> Result<()> {
    // Check username uniqueness.
    let filter = doc! {
        "username": &new_admin.username,
    };
    let existing = admins.find_one(filter, None).await?;
    if existing.is_some() {
        return Err(Error::Status(
            Status::BadRequest,
            format!("Admin username already in use: {}", new_admin.username),
        ));
    }

    // Create and insert the admin. The unique index catches a concurrent
    // creation that slipped past the check above.
    let username = new_admin.0.username.clone();
    let admin: NewAdmin = new_admin
        .0
        .try_into()
        .map_err(|_| Error::Status(Status::BadRequest, "Illegal admin credentials".to_string()))?;
    match admins.insert_one(admin, None).await {
        Ok(_) => Ok(()),
        Err(err) if is_duplicate_key_error(&err) => Err(Error::Status(
            Status::BadRequest,
            format!("Admin username already in use: {}", username),
        )),
        Err(err) => Err(err.into()),
    }
}

#[delete("/admins", data = "<username>", format = "json")]
async fn delete_admin(
    _token: AuthToken,
    username: Json<String>,
    admins: Coll<Admin>,
) -> Result<()> {
    let username = username.0;
    // Prevent deleting the last admin.
    let count = admins.count_documents(None, None).await?;
    if count == 1 {
        return Err(Error::Status(
            Status::UnprocessableEntity,
            "Cannot delete last admin!".to_string(),
        ));
    }

    let filter = doc! {
        "username": &username,
    };
    let result = admins.delete_one(filter, None).await?;
    if result.deleted_count == 0 {
        Err(Error::not_found(format!("Admin {}", username)))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::ContentType, local::asynchronous::Client, serde::json::serde_json,
        serde::json::serde_json::json,
    };

    use crate::model::db::admin::DEFAULT_ADMIN_USERNAME;

    use super::*;

    #[backend_test(admin)]
    async fn create_and_delete_admin(client: Client, admins: Coll<Admin>) {
        // Create a second admin.
        let response = client
            .post(uri!(create_admin))
            .header(ContentType::JSON)
            .body(json!(AdminCredentials::example2()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());

        let inserted = admins
            .find_one(
                doc! { "username": &AdminCredentials::example2().username },
                None,
            )
            .await
            .unwrap();
        assert!(inserted.is_some());

        // Delete it again.
        let response = client
            .delete(uri!(delete_admin))
            .header(ContentType::JSON)
            .body(json!(AdminCredentials::example2().username).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());

        let count = admins.count_documents(None, None).await.unwrap();
        assert_eq!(count, 1);
    }

    #[backend_test(admin)]
    async fn cannot_delete_last_admin(client: Client) {
        let response = client
            .delete(uri!(delete_admin))
            .header(ContentType::JSON)
            .body(json!(DEFAULT_ADMIN_USERNAME).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::UnprocessableEntity, response.status());
    }

    #[backend_test(admin)]
    async fn duplicate_username_is_rejected(client: Client) {
        let response = client
            .post(uri!(create_admin))
            .header(ContentType::JSON)
            .body(json!(AdminCredentials::example1()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());
    }

    #[backend_test]
    async fn admin_routes_require_login(client: Client) {
        let response = client.get(uri!(get_admins)).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test(admin)]
    async fn list_admins(client: Client) {
        let response = client.get(uri!(get_admins)).dispatch().await;
        assert_eq!(Status::Ok, response.status());

        let raw_response = response.into_string().await.unwrap();
        let names: Vec<String> = serde_json::from_str(&raw_response).unwrap();
        assert_eq!(names, vec![DEFAULT_ADMIN_USERNAME.to_string()]);
    }
}
