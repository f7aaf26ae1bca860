pub mod admin;
pub mod ballot;
pub mod entry;
pub mod group;
pub mod lookup;
pub mod poll;
pub mod vote;
