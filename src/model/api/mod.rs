pub mod admin;
pub mod auth;
pub mod ballot;
pub mod group;
pub mod poll;
