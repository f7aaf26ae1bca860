use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Public mapping from a poll ID to its owning admin.
///
/// Polls live under their admin's namespace; an anonymous voter holding only
/// a poll ID resolves the owner through this collection instead of
/// enumerating admins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollLookup {
    #[serde(rename = "_id")]
    pub poll_id: Id,
    pub admin_id: Id,
}
