use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    common::poll::VoterId,
    db::group::{NewVoterGroup, VoterGroup, VoterGroupCore, VoterRecord},
    mongodb::Id,
};

/// A voter submitted as part of a new group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoterSpec {
    pub voter_id: VoterId,
    #[serde(default)]
    pub given_name: String,
    #[serde(default)]
    pub family_name: String,
}

/// A voter group specification, as submitted by an admin.
#[derive(Debug, Serialize, Deserialize)]
pub struct GroupSpec {
    pub name: String,
    pub voters: Vec<VoterSpec>,
}

impl GroupSpec {
    /// Basic sanity checks before the group is accepted.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("group name must not be empty".to_string());
        }
        if self.voters.is_empty() {
            return Err("a group needs at least one voter".to_string());
        }
        if self.voters.iter().any(|voter| voter.voter_id.trim().is_empty()) {
            return Err("voter IDs must not be empty".to_string());
        }
        Ok(())
    }

    /// Convert this spec into a group owned by the given admin.
    /// Duplicate voter IDs are dropped; the first occurrence wins.
    pub fn into_group(self, admin_id: Id) -> NewVoterGroup {
        let voters = self
            .voters
            .into_iter()
            .map(|voter| VoterRecord {
                voter_id: voter.voter_id,
                given_name: voter.given_name,
                family_name: voter.family_name,
                enabled: true,
            })
            .collect();
        VoterGroupCore::new(self.name, admin_id, voters)
    }
}

/// A short group listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub id: Id,
    pub name: String,
    pub voter_count: usize,
    pub created_at: DateTime<Utc>,
}

impl From<VoterGroup> for GroupSummary {
    fn from(group: VoterGroup) -> Self {
        Self {
            id: group.id,
            name: group.group.name,
            voter_count: group.group.voters.len(),
            created_at: group.group.created_at,
        }
    }
}

/// A voter as reported back to the owning admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterDescription {
    pub voter_id: VoterId,
    pub given_name: String,
    pub family_name: String,
    pub enabled: bool,
}

impl From<VoterRecord> for VoterDescription {
    fn from(voter: VoterRecord) -> Self {
        Self {
            voter_id: voter.voter_id,
            given_name: voter.given_name,
            family_name: voter.family_name,
            enabled: voter.enabled,
        }
    }
}

/// A full group description for the owning admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDescription {
    pub id: Id,
    pub name: String,
    pub voters: Vec<VoterDescription>,
    pub created_at: DateTime<Utc>,
}

impl From<VoterGroup> for GroupDescription {
    fn from(group: VoterGroup) -> Self {
        Self {
            id: group.id,
            name: group.group.name,
            voters: group.group.voters.into_iter().map(Into::into).collect(),
            created_at: group.group.created_at,
        }
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl GroupSpec {
        pub fn example() -> Self {
            Self {
                name: "Engineering".to_string(),
                voters: vec![
                    VoterSpec {
                        voter_id: "34882716".to_string(),
                        given_name: "Amelia".to_string(),
                        family_name: "Zhang".to_string(),
                    },
                    VoterSpec {
                        voter_id: "29034411".to_string(),
                        given_name: "Bruno".to_string(),
                        family_name: "Okafor".to_string(),
                    },
                    VoterSpec {
                        voter_id: "51126790".to_string(),
                        given_name: "Carla".to_string(),
                        family_name: "Ibarra".to_string(),
                    },
                ],
            }
        }
    }
}
