use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Other => "other",
        }
    }

    /// Parse the stored lowercase form.
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "male" => Some(Self::Male),
            "female" => Some(Self::Female),
            "other" => Some(Self::Other),
            _ => None,
        }
    }

    /// Single-letter marker used in rendered trees.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Male => "M",
            Self::Female => "F",
            Self::Other => "O",
        }
    }
}

/// Permission level a user holds on a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Editor,
    Viewer,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Editor => "editor",
            Self::Viewer => "viewer",
        }
    }

    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "owner" => Some(Self::Owner),
            "editor" => Some(Self::Editor),
            "viewer" => Some(Self::Viewer),
            _ => None,
        }
    }

    /// Owners and editors may create and edit members.
    pub fn can_edit(self) -> bool {
        matches!(self, Self::Owner | Self::Editor)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Owner => "Owner",
            Self::Editor => "Editor",
            Self::Viewer => "Viewer",
        }
    }
}

/// Edge kind between two members.
///
/// `Parent` edges point from ancestor to descendant. `Spouse` and `Sibling`
/// are stored as one directed row but read symmetrically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationType {
    Parent,
    Spouse,
    Sibling,
}

impl RelationType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Parent => "parent",
            Self::Spouse => "spouse",
            Self::Sibling => "sibling",
        }
    }

    /// Legacy rows may carry a NULL or empty type; those are lineage edges.
    /// Any other unrecognised value is `None`.
    pub fn from_stored(raw: Option<&str>) -> Option<Self> {
        match raw.map(str::trim) {
            None | Some("") | Some("parent") => Some(Self::Parent),
            Some("spouse") => Some(Self::Spouse),
            Some("sibling") => Some(Self::Sibling),
            Some(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    pub id: i64,
    pub owner_id: i64,
    pub generation_limit: i64,
    pub created_at: DateTime<Utc>,
}

impl Tree {
    pub fn allows_generation(&self, generation: i64) -> bool {
        (1..=self.generation_limit).contains(&generation)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeAccess {
    pub tree_id: i64,
    pub user_id: i64,
    pub role: Role,
}

/// A person node. The lock triple is advisory and only consulted by the
/// dialog engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: i64,
    pub tree_id: i64,
    pub name: String,
    pub dob: Option<NaiveDate>,
    pub gender: Gender,
    pub phone: Option<String>,
    pub generation_level: i64,
    pub is_locked: bool,
    pub locked_by: Option<i64>,
    pub lock_expires_at: Option<DateTime<Utc>>,
}

impl Member {
    /// `"Alice (F)"`
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.gender.symbol())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub id: i64,
    pub tree_id: i64,
    pub parent_id: i64,
    pub child_id: i64,
    pub relation_type: RelationType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub member_id: i64,
    pub event_type: String,
    pub event_date: NaiveDate,
    pub description: Option<String>,
}
