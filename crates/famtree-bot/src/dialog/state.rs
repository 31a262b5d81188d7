use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use famtree_types::Gender;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// Fields collected by the add-member flow before the relative is chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDraft {
    pub name: String,
    pub dob: NaiveDate,
    pub gender: Gender,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditField {
    Name,
    Dob,
    Gender,
    Phone,
}

impl EditField {
    pub fn from_choice(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(Self::Name),
            "2" => Some(Self::Dob),
            "3" => Some(Self::Gender),
            "4" => Some(Self::Phone),
            _ => None,
        }
    }

    pub fn prompt(self) -> &'static str {
        match self {
            Self::Name => "Enter new Name:",
            Self::Dob => "Enter new DOB (DD-MM-YYYY):",
            Self::Gender => "Enter new Gender (Male/Female/Other):",
            Self::Phone => "Enter new Phone (or 'skip' to clear it):",
        }
    }
}

/// Where a user is in the conversation, carrying exactly the context that
/// step needs.
///
/// Persisted as a pair: the variant tag (e.g. `ADD_MEMBER_DOB`) and a JSON
/// object of the variant's fields.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DialogState {
    #[default]
    MainMenu,

    AddMemberName,
    AddMemberDob {
        name: String,
    },
    AddMemberGender {
        name: String,
        dob: NaiveDate,
    },
    AddMemberPhone {
        name: String,
        dob: NaiveDate,
        gender: Gender,
    },
    AddMemberRelation {
        draft: MemberDraft,
    },
    AddMemberRelationType {
        draft: MemberDraft,
        relative_id: i64,
    },

    EditSelectMember,
    EditSelectField {
        member_id: i64,
    },
    EditEnterValue {
        member_id: i64,
        field: EditField,
    },
    EditRelationTarget {
        member_id: i64,
    },
    EditRelationType {
        member_id: i64,
        target_id: i64,
    },

    ShareEnterPhone,
    TransferEnterPhone,
    DeleteConfirm,

    EventSelectMember,
    EventAction {
        member_id: i64,
    },
    EventType {
        member_id: i64,
    },
    EventDate {
        member_id: i64,
        event_type: String,
    },
}

const TAG: &str = "state";

impl DialogState {
    /// Split into `(tag, context JSON)` for storage.
    pub fn to_record(&self) -> Result<(String, String)> {
        let Value::Object(mut fields) = serde_json::to_value(self)? else {
            return Err(anyhow!("dialog state did not serialize to an object"));
        };
        let tag = match fields.remove(TAG) {
            Some(Value::String(tag)) => tag,
            _ => return Err(anyhow!("dialog state is missing its tag")),
        };
        Ok((tag, Value::Object(fields).to_string()))
    }

    /// Rebuild from storage. Anything unreadable falls back to the main menu.
    pub fn from_record(tag: Option<&str>, data: Option<&str>) -> Self {
        let Some(tag) = tag.map(str::trim).filter(|t| !t.is_empty()) else {
            return Self::MainMenu;
        };

        let mut fields = match data.map(serde_json::from_str::<Value>) {
            None => Map::new(),
            Some(Ok(Value::Object(fields))) => fields,
            Some(Ok(Value::Null)) => Map::new(),
            Some(Ok(_)) | Some(Err(_)) => {
                warn!(tag, "Unreadable dialog context, returning to main menu");
                return Self::MainMenu;
            }
        };
        fields.insert(TAG.into(), Value::String(tag.to_string()));

        match serde_json::from_value(Value::Object(fields)) {
            Ok(state) => state,
            Err(e) => {
                warn!(tag, "Unknown or invalid dialog state ({}), returning to main menu", e);
                Self::MainMenu
            }
        }
    }

    /// Member whose edit lock this state depends on.
    pub fn locked_member(&self) -> Option<i64> {
        match self {
            Self::EditSelectField { member_id }
            | Self::EditEnterValue { member_id, .. }
            | Self::EditRelationTarget { member_id }
            | Self::EditRelationType { member_id, .. } => Some(*member_id),
            _ => None,
        }
    }
}
