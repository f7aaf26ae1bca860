use rocket::Route;

pub mod admin;
pub mod auth;
pub mod group;
pub mod poll;
pub mod voting;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(auth::routes());
    routes.extend(admin::routes());
    routes.extend(group::routes());
    routes.extend(poll::routes());
    routes.extend(voting::routes());
    routes
}
