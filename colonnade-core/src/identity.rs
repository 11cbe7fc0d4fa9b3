//! Identity types for COLONNADE records and viewers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Database-local numeric identifier of a record.
/// Cheap and stable within one database, NOT across database copies.
pub type RecordId = i64;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Generate a new UUIDv7 (timestamp-sortable) portable key.
pub fn new_portable_key() -> Uuid {
    Uuid::now_v7()
}

/// Identifier of a record type, e.g. `"persons.contact"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordTypeId(String);

impl RecordTypeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordTypeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Owner of a persisted cell set: an individual user or a team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Owner {
    User(Uuid),
    Team(Uuid),
}

/// The identity on whose behalf values are rendered and entities edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewer {
    pub id: Uuid,
    pub is_superuser: bool,
    /// Teams this viewer belongs to.
    pub teams: Vec<Uuid>,
}

impl Viewer {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            is_superuser: false,
            teams: Vec::new(),
        }
    }

    pub fn superuser(id: Uuid) -> Self {
        Self {
            id,
            is_superuser: true,
            teams: Vec::new(),
        }
    }

    pub fn with_team(mut self, team: Uuid) -> Self {
        self.teams.push(team);
        self
    }

    pub fn is_member_of(&self, team: Uuid) -> bool {
        self.teams.contains(&team)
    }

    /// True when this viewer is the owner, or belongs to the owning team.
    pub fn owns(&self, owner: &Owner) -> bool {
        match owner {
            Owner::User(id) => *id == self.id,
            Owner::Team(team) => self.is_member_of(*team),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewer_owns_user_and_team() {
        let team = Uuid::new_v4();
        let viewer = Viewer::new(Uuid::new_v4()).with_team(team);

        assert!(viewer.owns(&Owner::User(viewer.id)));
        assert!(viewer.owns(&Owner::Team(team)));
        assert!(!viewer.owns(&Owner::User(Uuid::new_v4())));
        assert!(!viewer.owns(&Owner::Team(Uuid::new_v4())));
    }

    #[test]
    fn test_record_type_id_serializes_as_string() {
        let id = RecordTypeId::new("persons.contact");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"persons.contact\"");
        assert_eq!(id.to_string(), "persons.contact");
    }
}
