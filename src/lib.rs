#[macro_use]
extern crate log;
#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;

use rocket::{Build, Rocket};

use config::{ConfigFairing, DatabaseFairing};
use logging::LoggerFairing;

/// Assemble the full server: config, database, logging, routes.
pub async fn build() -> Rocket<Build> {
    rocket::build()
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
        .attach(LoggerFairing)
        .mount("/", api::routes())
}

/// Connect a database client using the configured URI.
/// Used by the test harness, which manages databases itself.
#[cfg(test)]
pub(crate) async fn db_client() -> mongodb::Client {
    let db_uri = rocket::build()
        .figment()
        .extract_inner::<String>("db_uri")
        .expect("`db_uri` not set");
    mongodb::Client::with_uri_str(&db_uri)
        .await
        .expect("Could not connect to database")
}

/// Build a rocket instance against a specific, pre-connected database.
/// This skips the [`DatabaseFairing`] so tests control the database name.
#[cfg(test)]
pub(crate) async fn rocket_for_db(client: mongodb::Client, db_name: &str) -> Rocket<Build> {
    use crate::model::mongodb::{ensure_indexes_exist, Coll};

    let db = client.database(db_name);
    ensure_indexes_exist(&db)
        .await
        .expect("Failed to set up database indexes");
    crate::model::db::admin::ensure_admin_exists(&Coll::from_db(&db))
        .await
        .expect("Failed to bootstrap default admin");

    rocket::build()
        .attach(ConfigFairing)
        .attach(LoggerFairing)
        .manage(client)
        .manage(db)
        .mount("/", api::routes())
}
